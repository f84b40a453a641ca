//! gwemu core types: the decoded resource model and run settings.

#![forbid(unsafe_code)]

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::Resource as K8sResource;
use kube::core::{DynamicObject, GroupVersionKind};
use serde::{Serialize, Serializer};

pub mod settings;

pub use settings::{LabelPrefix, Settings};

pub mod prelude {
    pub use super::{LabelPrefix, Resource, ResourceKey, Settings};
}

/// Kind triple of the only workload the transformer rewrites.
pub fn deployment_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(
        <Deployment as K8sResource>::GROUP,
        <Deployment as K8sResource>::VERSION,
        <Deployment as K8sResource>::KIND,
    )
}

/// A decoded manifest document.
///
/// The kind is resolved once at decode time; supported kinds carry their
/// typed object, everything else stays dynamic and passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Deployment(Box<Deployment>),
    Other { gvk: GroupVersionKind, object: Box<DynamicObject> },
}

impl Resource {
    pub fn gvk(&self) -> GroupVersionKind {
        match self {
            Resource::Deployment(_) => deployment_gvk(),
            Resource::Other { gvk, .. } => gvk.clone(),
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Deployment(d) => &d.metadata,
            Resource::Other { object, .. } => &object.metadata,
        }
    }

    pub fn key(&self) -> ResourceKey {
        let meta = self.metadata();
        ResourceKey {
            gvk: self.gvk(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Resource::Deployment(d) => d.serialize(serializer),
            Resource::Other { object, .. } => object.serialize(serializer),
        }
    }
}

/// Printable identity of a resource, used to attribute errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    pub gvk: GroupVersionKind,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl ResourceKey {
    pub fn gvk_key(&self) -> String {
        if self.gvk.group.is_empty() {
            format!("{}/{}", self.gvk.version, self.gvk.kind)
        } else {
            format!("{}/{}/{}", self.gvk.group, self.gvk.version, self.gvk.kind)
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("<unnamed>");
        match self.namespace.as_deref() {
            Some(ns) => write!(f, "{} {}/{}", self.gvk_key(), ns, name),
            None => write!(f, "{} {}", self.gvk_key(), name),
        }
    }
}
