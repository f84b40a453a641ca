//! Container synthesis: one selector's parameters into candidate containers.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvVar, HTTPGetAction, Probe, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;

use crate::labels::{Params, Selector, SelectorGroup};
use crate::TransformError;

/// Parameter controlling how many copies of a container are synthesized.
pub const REPEATS_KEY: &str = "repeats";

pub const STRESS_IMAGE: &str = "ghcr.io/abraham2512/fedora-stress-ng:master";
pub const STRESS_PORT: i32 = 8080;
pub const HEALTH_PATH: &str = "/healthz";
pub const STRESS_CPU: &str = "1000m";
pub const STRESS_MEMORY: &str = "1024Mi";

fn env_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar { name: name.into(), value: Some(value.into()), ..Default::default() }
}

fn stress_container(mut env: Vec<EnvVar>) -> Container {
    env.push(env_var("LISTEN_PORT", STRESS_PORT.to_string()));
    env.push(env_var("LISTEN", "1"));

    let resources = || {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(STRESS_CPU.to_string())),
            ("memory".to_string(), Quantity(STRESS_MEMORY.to_string())),
        ])
    };
    Container {
        name: Selector::Stress.as_str().to_string(),
        image: Some(STRESS_IMAGE.to_string()),
        image_pull_policy: Some("Always".to_string()),
        liveness_probe: Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some(HEALTH_PATH.to_string()),
                port: IntOrString::Int(STRESS_PORT),
                ..Default::default()
            }),
            ..Default::default()
        }),
        resources: Some(ResourceRequirements {
            limits: Some(resources()),
            requests: Some(resources()),
            ..Default::default()
        }),
        env: Some(env),
        ..Default::default()
    }
}

/// One selector's container template and how many copies of it are wanted.
///
/// Nothing is allocated for the copies until [`Candidates::expand`], so the
/// count can be checked against the Deployment first.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidates {
    pub selector: String,
    pub template: Container,
    pub repeats: usize,
}

impl Candidates {
    pub fn expand(self) -> Result<Vec<Container>, TransformError> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.repeats).map_err(|_| TransformError::TooManyRepeats {
            selector: self.selector.clone(),
            repeats: self.repeats,
        })?;
        out.extend(std::iter::repeat(self.template).take(self.repeats));
        Ok(out)
    }
}

/// Resolve `selector` and its parameters into a template plus repeat count.
///
/// Every parameter except `repeats` becomes an environment variable, in
/// parameter-name order. `repeats` defaults to 1.
pub fn plan(selector: &str, params: &Params) -> Result<Candidates, TransformError> {
    let repeats = match params.get(REPEATS_KEY) {
        Some(raw) => raw.parse::<usize>().map_err(|source| TransformError::Parse {
            selector: selector.to_string(),
            value: raw.clone(),
            source,
        })?,
        None => 1,
    };

    let env: Vec<EnvVar> = params
        .iter()
        .filter(|(name, _)| name.as_str() != REPEATS_KEY)
        .map(|(name, value)| env_var(name.as_str(), value.as_str()))
        .collect();

    let template = match selector.parse::<Selector>()? {
        Selector::Stress => stress_container(env),
    };
    debug!(selector, repeats, "planned container");
    Ok(Candidates { selector: selector.to_string(), template, repeats })
}

/// Build the candidate containers for `selector`: the template cloned
/// `repeats` times.
pub fn synthesize(selector: &str, params: &Params) -> Result<Vec<Container>, TransformError> {
    plan(selector, params)?.expand()
}

/// Plan every selector of a group in selector order.
///
/// Failures do not stop the remaining selectors; they are returned alongside
/// whatever was planned.
pub fn plan_group(group: &SelectorGroup) -> (Vec<Candidates>, Vec<TransformError>) {
    let mut planned = Vec::new();
    let mut errors = Vec::new();
    for (selector, params) in group {
        match plan(selector, params) {
            Ok(c) => planned.push(c),
            Err(e) => errors.push(e),
        }
    }
    (planned, errors)
}

/// Total containers wanted by `planned`, saturating instead of overflowing.
pub fn wanted_count(planned: &[Candidates]) -> usize {
    planned.iter().fold(0usize, |n, c| n.saturating_add(c.repeats))
}

/// Synthesize every selector of a group in selector order.
pub fn synthesize_group(group: &SelectorGroup) -> (Vec<Container>, Vec<TransformError>) {
    let (planned, mut errors) = plan_group(group);
    let mut wanted = Vec::new();
    for candidates in planned {
        match candidates.expand() {
            Ok(containers) => wanted.extend(containers),
            Err(e) => errors.push(e),
        }
    }
    (wanted, errors)
}
