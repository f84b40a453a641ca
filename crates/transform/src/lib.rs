//! gwemu transform: rewrite Deployments so that containers requested through
//! `gwEmu-<selector>-<param>` labels replace existing containers that have
//! room for them.
//!
//! Pipeline per Deployment: [`labels::extract`] -> [`synth::plan_group`]
//! -> capacity check -> [`synth::Candidates::expand`] -> [`reconcile::reconcile`].
//! Other kinds pass through.

#![forbid(unsafe_code)]

use gwemu_core::{LabelPrefix, Resource, Settings};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use metrics::counter;
use tracing::{debug, info, warn};

pub mod error;
pub mod labels;
pub mod quantity;
pub mod reconcile;
pub mod synth;

pub use error::{BatchError, ResourceFailure, TransformError};
pub use labels::{extract, Params, Selector, SelectorGroup};
pub use reconcile::{fits, reconcile};
pub use synth::{plan, plan_group, synthesize, synthesize_group, Candidates};

/// Output of a batch transform: one resource per input, plus every failure.
#[derive(Debug, Default)]
pub struct Transformed {
    pub resources: Vec<Resource>,
    pub failures: Vec<ResourceFailure>,
}

impl Transformed {
    pub fn is_clean(&self) -> bool { self.failures.is_empty() }

    /// Split into the output resources and the combined error, if any.
    pub fn into_result(self) -> (Vec<Resource>, Option<BatchError>) {
        let err = (!self.failures.is_empty()).then_some(BatchError { failures: self.failures });
        (self.resources, err)
    }
}

pub struct Transformer {
    prefix: LabelPrefix,
}

impl Transformer {
    pub fn new(settings: &Settings) -> Self {
        Self { prefix: settings.label_prefix() }
    }

    pub fn prefix(&self) -> &LabelPrefix { &self.prefix }

    /// Transform every resource. Output order and length match the input;
    /// resources that fail are still emitted (original or partially rewritten).
    pub fn transform(&self, resources: Vec<Resource>) -> Transformed {
        let mut out = Transformed { resources: Vec::with_capacity(resources.len()), failures: Vec::new() };
        for res in resources {
            counter!("transform_resources_total", 1u64);
            let key = res.key();
            let (res, errors) = match res {
                Resource::Deployment(d) => {
                    let (d, errors) = self.transform_deployment(&d);
                    (Resource::Deployment(Box::new(d)), errors)
                }
                other => (other, vec![TransformError::UnknownKind { gvk: key.gvk_key() }]),
            };
            if errors.is_empty() {
                debug!(resource = %key, "transformed");
            }
            for error in errors {
                warn!(resource = %key, error = %error, "resource not fully transformed");
                counter!("transform_failures_total", 1u64);
                out.failures.push(ResourceFailure { key: key.clone(), error });
            }
            out.resources.push(res);
        }
        info!(resources = out.resources.len(), failures = out.failures.len(), "transform finished");
        out
    }

    /// Rewrite one Deployment. The input is left untouched; the returned
    /// Deployment is the original when nothing could be applied.
    pub fn transform_deployment(&self, deployment: &Deployment) -> (Deployment, Vec<TransformError>) {
        let group = match deployment.metadata.labels.as_ref() {
            Some(labels) => extract(labels, &self.prefix),
            None => SelectorGroup::new(),
        };
        let (planned, errors) = synth::plan_group(&group);
        if !errors.is_empty() {
            return (deployment.clone(), errors);
        }
        let count = synth::wanted_count(&planned);
        if count == 0 {
            return (deployment.clone(), Vec::new());
        }

        let existing = pod_containers(deployment).map_or(0, |c| c.len());
        if existing < count {
            return (
                deployment.clone(),
                vec![TransformError::InsufficientContainers { existing, wanted: count }],
            );
        }

        let mut wanted = Vec::with_capacity(count);
        for candidates in planned {
            match candidates.expand() {
                Ok(containers) => wanted.extend(containers),
                Err(e) => return (deployment.clone(), vec![e]),
            }
        }

        let mut result = deployment.clone();
        let Some(containers) = pod_containers_mut(&mut result) else {
            return (deployment.clone(), Vec::new());
        };
        match reconcile(containers, &wanted) {
            Ok(slots) => {
                counter!("transform_containers_replaced_total", slots.len() as u64);
                (result, Vec::new())
            }
            Err(e) => (result, vec![e]),
        }
    }
}

fn pod_containers(d: &Deployment) -> Option<&Vec<Container>> {
    d.spec.as_ref()?.template.spec.as_ref().map(|p| &p.containers)
}

fn pod_containers_mut(d: &mut Deployment) -> Option<&mut Vec<Container>> {
    d.spec.as_mut()?.template.spec.as_mut().map(|p| &mut p.containers)
}

/// Transform a batch with the given settings.
pub fn transform(resources: Vec<Resource>, settings: &Settings) -> Transformed {
    Transformer::new(settings).transform(resources)
}
