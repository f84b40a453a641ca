//! Run settings. Passed explicitly into the label decoder instead of living
//! in a process-wide store.

use std::env::VarError;

use tracing::{debug, warn};

/// Label prefix used when no suffix is configured.
pub const DEFAULT_LABEL_PREFIX: &str = "gwEmu";

/// Environment fallback for the `prefix-suffix` setting.
pub const PREFIX_SUFFIX_ENV: &str = "GWEMU_PREFIX_SUFFIX";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Extra suffix appended to the label prefix as `gwEmu-<suffix>`.
    pub prefix_suffix: Option<String>,
}

impl Settings {
    /// Load settings from `GWEMU_*` environment variables.
    pub fn from_env() -> Self {
        let prefix_suffix = match std::env::var(PREFIX_SUFFIX_ENV) {
            Ok(v) => Some(v),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(raw)) => {
                warn!(var = PREFIX_SUFFIX_ENV, value = ?raw, "prefix-suffix is not valid UTF-8; ignoring");
                None
            }
        };
        Self { prefix_suffix }
    }

    pub fn with_prefix_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.prefix_suffix = Some(suffix.into());
        self
    }

    /// Resolve the label convention prefix.
    pub fn label_prefix(&self) -> LabelPrefix {
        match self.prefix_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => {
                LabelPrefix::new(format!("{}-{}", DEFAULT_LABEL_PREFIX, suffix))
            }
            _ => {
                debug!("prefix-suffix not set; using {}", DEFAULT_LABEL_PREFIX);
                LabelPrefix::new(DEFAULT_LABEL_PREFIX)
            }
        }
    }
}

/// Resolved label prefix and the number of hyphen-delimited segments it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPrefix {
    text: String,
    segments: usize,
}

impl LabelPrefix {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = text.split('-').count();
        Self { text, segments }
    }

    pub fn as_str(&self) -> &str { &self.text }

    /// Index of the selector segment in a hyphen-split label key.
    pub fn segments(&self) -> usize { self.segments }
}

impl Default for LabelPrefix {
    fn default() -> Self { Self::new(DEFAULT_LABEL_PREFIX) }
}
