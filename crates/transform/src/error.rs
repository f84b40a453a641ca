use std::num::ParseIntError;

use gwemu_core::ResourceKey;
use thiserror::Error;

/// Why a single resource was not (fully) transformed.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid repeats value '{value}' for selector '{selector}': {source}")]
    Parse {
        selector: String,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("cannot allocate {repeats} containers for selector '{selector}'")]
    TooManyRepeats { selector: String, repeats: usize },
    #[error("missing container def for selector '{0}'")]
    UnknownSelector(String),
    #[error("not enough containers in spec {existing} < {wanted}")]
    InsufficientContainers { existing: usize, wanted: usize },
    #[error("failed to find container to replace for wanted container #{index} ({name})")]
    NoFittingSlot { index: usize, name: String },
    #[error("do not know how to handle {gvk}")]
    UnknownKind { gvk: String },
}

/// A transform error attributed to the resource it occurred on.
#[derive(Debug, Error)]
#[error("{key}: {error}")]
pub struct ResourceFailure {
    pub key: ResourceKey,
    #[source]
    pub error: TransformError,
}

/// All per-resource failures of one batch, reported together.
#[derive(Debug, Error)]
#[error("some manifests were not fully transformed: {}", join(.failures))]
pub struct BatchError {
    pub failures: Vec<ResourceFailure>,
}

fn join(failures: &[ResourceFailure]) -> String {
    failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", ")
}
