//! gwemu manifest IO: split a YAML document stream, decode each document into
//! a [`Resource`], and print resources back out as a stream.

#![forbid(unsafe_code)]

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use gwemu_core::{deployment_gvk, Resource};
use k8s_openapi::api::apps::v1::Deployment;
use kube::core::{DynamicObject, GroupVersionKind};
use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, error};

/// Read a numeric guard from the environment, falling back to `default`.
fn limit(var: &str, default: usize) -> usize {
    std::env::var(var).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

const MAX_BYTES_ENV: &str = "GWEMU_MAX_YAML_BYTES";
const MAX_NODES_ENV: &str = "GWEMU_MAX_YAML_NODES";
const DEFAULT_MAX_BYTES: usize = 1_000_000;
const DEFAULT_MAX_NODES: usize = 100_000;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("YAML payload too large (>{0} bytes)")]
    TooLarge(usize),
    #[error("YAML document too complex (>{0} nodes)")]
    TooComplex(usize),
    #[error("parsing YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("YAML document is not a mapping")]
    NotAMapping,
    #[error("YAML missing {0}")]
    Missing(&'static str),
    #[error("decoding {kind}: {source}")]
    Typed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Count nodes depth-first, stopping as soon as `max` is reached.
fn json_node_budget_exceeded(v: &Json, max: usize) -> bool {
    let mut pending = vec![v];
    let mut seen = 0usize;
    while let Some(node) = pending.pop() {
        seen += 1;
        if seen >= max {
            return true;
        }
        match node {
            Json::Object(map) => pending.extend(map.values()),
            Json::Array(items) => pending.extend(items.iter()),
            _ => {}
        }
    }
    false
}

const CONTAINER_LISTS: [&str; 3] = ["containers", "initContainers", "ephemeralContainers"];

/// Quantities written as bare YAML numbers (`cpu: 2`) arrive as JSON numbers,
/// but the typed model only accepts strings. Rewrite them in place under every
/// container's `resources.limits` / `resources.requests`.
fn stringify_container_quantities(deployment: &mut Json) {
    let Some(pod) = deployment.pointer_mut("/spec/template/spec") else { return };
    for list in CONTAINER_LISTS {
        let Some(containers) = pod.get_mut(list).and_then(Json::as_array_mut) else { continue };
        for container in containers {
            for section in ["limits", "requests"] {
                let Some(quantities) = container
                    .get_mut("resources")
                    .and_then(|r| r.get_mut(section))
                    .and_then(Json::as_object_mut)
                else {
                    continue;
                };
                for value in quantities.values_mut() {
                    if let Json::Number(n) = value {
                        *value = Json::String(n.to_string());
                    }
                }
            }
        }
    }
}

fn is_separator(line: &str) -> bool {
    let l = line.trim_end();
    l == "---" || l.starts_with("--- #")
}

fn is_blank(doc: &str) -> bool {
    doc.lines().all(|l| {
        let t = l.trim();
        t.is_empty() || t.starts_with('#')
    })
}

/// Split a stream on `---` lines. Empty and comment-only documents are dropped.
pub fn split_documents(text: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut cur = String::new();
    for line in text.lines() {
        if is_separator(line) {
            let doc = std::mem::take(&mut cur);
            if !is_blank(&doc) { docs.push(doc); }
            continue;
        }
        cur.push_str(line);
        cur.push('\n');
    }
    if !is_blank(&cur) { docs.push(cur); }
    docs
}

fn parse_gvk(json: &Json) -> Result<GroupVersionKind, DecodeError> {
    let api_version = json.get("apiVersion").and_then(|v| v.as_str()).ok_or(DecodeError::Missing("apiVersion"))?;
    let kind = json.get("kind").and_then(|v| v.as_str()).ok_or(DecodeError::Missing("kind"))?;
    let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
    Ok(GroupVersionKind::gvk(group, version, kind))
}

/// Decode a single YAML document into a typed resource.
pub fn decode_document(yaml: &str) -> Result<Resource, DecodeError> {
    let max_bytes = limit(MAX_BYTES_ENV, DEFAULT_MAX_BYTES);
    if yaml.len() > max_bytes {
        return Err(DecodeError::TooLarge(max_bytes));
    }
    let mut json: Json = serde_yaml::from_str(yaml)?;
    if !json.is_object() {
        return Err(DecodeError::NotAMapping);
    }
    let max_nodes = limit(MAX_NODES_ENV, DEFAULT_MAX_NODES);
    if json_node_budget_exceeded(&json, max_nodes) {
        return Err(DecodeError::TooComplex(max_nodes));
    }
    let gvk = parse_gvk(&json)?;
    let typed = |source| DecodeError::Typed { kind: gvk.kind.clone(), source };
    if gvk == deployment_gvk() {
        stringify_container_quantities(&mut json);
        let d: Deployment = serde_json::from_value(json).map_err(typed)?;
        Ok(Resource::Deployment(Box::new(d)))
    } else {
        let object: DynamicObject = serde_json::from_value(json).map_err(typed)?;
        Ok(Resource::Other { gvk, object: Box::new(object) })
    }
}

/// Decode every document of a stream. Documents that fail to decode are
/// logged and skipped.
pub fn decode_stream(text: &str) -> Vec<Resource> {
    let docs = split_documents(text);
    let mut out = Vec::with_capacity(docs.len());
    for (i, doc) in docs.iter().enumerate() {
        match decode_document(doc) {
            Ok(r) => out.push(r),
            Err(e) => error!(document = i, error = %e, "failed to decode resource YAML; skipping"),
        }
    }
    debug!(documents = docs.len(), resources = out.len(), "decoded manifest stream");
    out
}

pub fn read_manifest_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading manifest file {}", path.display()))
}

pub fn load_manifest_file(path: &Path) -> Result<Vec<Resource>> {
    Ok(decode_stream(&read_manifest_file(path)?))
}

/// Write each resource as a YAML document preceded by a `---` line.
pub fn print_resources<W: Write>(mut w: W, resources: &[Resource]) -> Result<()> {
    for r in resources {
        let yaml = serde_yaml::to_string(r).with_context(|| format!("serializing {}", r.key()))?;
        writeln!(w, "---")?;
        w.write_all(yaml.as_bytes())?;
    }
    w.flush()?;
    Ok(())
}
