//! Fitting candidates into existing container slots.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::Container;
use tracing::{debug, warn};

use crate::quantity::{NanoQuantity, QuantityError};
use crate::TransformError;

/// Resource axes compared when fitting; requests are not considered.
pub const FIT_AXES: [&str; 2] = ["cpu", "memory"];

fn limit(c: &Container, axis: &str) -> Result<NanoQuantity, QuantityError> {
    c.resources
        .as_ref()
        .and_then(|r| r.limits.as_ref())
        .and_then(|l| l.get(axis))
        .map_or(Ok(NanoQuantity::ZERO), NanoQuantity::parse)
}

/// Whether `candidate` fits within the limits of `existing`.
///
/// Missing limits count as zero. A limit that cannot be parsed never fits.
pub fn fits(existing: &Container, candidate: &Container) -> bool {
    FIT_AXES.iter().all(|axis| match (limit(existing, axis), limit(candidate, axis)) {
        (Ok(have), Ok(need)) => {
            debug!(axis, existing = %existing.name, %have, %need, "compare limits");
            have >= need
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(axis, existing = %existing.name, error = %e, "unparseable limit; treating as no fit");
            false
        }
    })
}

/// Greedy first-fit: overwrite the first unclaimed slot in `current` that each
/// `wanted` container fits into.
///
/// Only image, pull policy, liveness probe and env are replaced; the slot keeps
/// its name, resources and everything else. On failure the slots replaced so far
/// stay replaced. Returns the claimed slot indices in `wanted` order.
pub fn reconcile(current: &mut [Container], wanted: &[Container]) -> Result<Vec<usize>, TransformError> {
    let mut claimed: HashSet<usize> = HashSet::with_capacity(wanted.len());
    let mut order = Vec::with_capacity(wanted.len());
    for (index, want) in wanted.iter().enumerate() {
        let slot = (0..current.len()).find(|i| !claimed.contains(i) && fits(&current[*i], want));
        let Some(i) = slot else {
            return Err(TransformError::NoFittingSlot { index, name: want.name.clone() });
        };
        let target = &mut current[i];
        target.image = want.image.clone();
        target.image_pull_policy = want.image_pull_policy.clone();
        target.liveness_probe = want.liveness_probe.clone();
        target.env = want.env.clone();
        debug!(slot = i, container = %target.name, wanted = index, "replaced container");
        claimed.insert(i);
        order.push(i);
    }
    Ok(order)
}
