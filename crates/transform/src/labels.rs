//! Label decoding: `<prefix>-<selector>-<param...>` keys into per-selector
//! parameter maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use gwemu_core::LabelPrefix;
use tracing::{debug, trace};

use crate::TransformError;

/// Parameters for one selector, keyed by parameter name.
pub type Params = BTreeMap<String, String>;

/// Selector name -> parameters. Ordered so downstream synthesis is reproducible.
pub type SelectorGroup = BTreeMap<String, Params>;

/// Emulated workloads the synthesizer knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selector {
    Stress,
}

impl Selector {
    pub const ALL: &'static [Selector] = &[Selector::Stress];

    pub fn as_str(self) -> &'static str {
        match self {
            Selector::Stress => "stress",
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Selector {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::ALL
            .iter()
            .copied()
            .find(|sel| sel.as_str() == s)
            .ok_or_else(|| TransformError::UnknownSelector(s.to_string()))
    }
}

/// Group every label carrying the convention prefix by its selector token.
///
/// Keys whose selector is not a known [`Selector`], or that end before the
/// selector segment, are skipped. A key that ends right after the selector
/// (`gwEmu-stress`) requests that selector with no parameters.
pub fn extract<I, K, V>(labels: I, prefix: &LabelPrefix) -> SelectorGroup
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut group = SelectorGroup::new();
    let at = prefix.segments();
    for (key, value) in labels {
        let key = key.as_ref();
        if !key.starts_with(prefix.as_str()) {
            continue;
        }
        let parts: Vec<&str> = key.split('-').collect();
        let Some(token) = parts.get(at) else {
            debug!(key, "label matches prefix but has no selector segment; skipping");
            continue;
        };
        if token.parse::<Selector>().is_err() {
            trace!(key, selector = *token, "unknown selector; skipping");
            continue;
        }
        let params = group.entry((*token).to_string()).or_default();
        let param = parts[at + 1..].join("-");
        if param.is_empty() {
            debug!(key, "selector label without parameter name");
            continue;
        }
        params.insert(param, value.as_ref().to_string());
    }
    group
}
