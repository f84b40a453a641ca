#![forbid(unsafe_code)]

use gwemu_core::{Resource, Settings};
use gwemu_transform::{transform, Transformer, TransformError};
use k8s_openapi::api::apps::v1::Deployment;
use kube::core::{DynamicObject, GroupVersionKind};
use serde_json::json;

fn container(name: &str, cpu: &str, mem: &str) -> serde_json::Value {
    json!({
        "name": name,
        "image": format!("{name}:1.0"),
        "resources": { "limits": { "cpu": cpu, "memory": mem } }
    })
}

fn deployment(name: &str, labels: serde_json::Value, containers: Vec<serde_json::Value>) -> Deployment {
    serde_json::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name, "namespace": "default", "labels": labels },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": { "containers": containers }
            }
        }
    }))
    .unwrap()
}

fn service(name: &str) -> Resource {
    let object: DynamicObject = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": name, "namespace": "default" },
        "spec": { "ports": [{ "port": 80 }] }
    }))
    .unwrap();
    Resource::Other { gvk: GroupVersionKind::gvk("", "v1", "Service"), object: Box::new(object) }
}

fn containers_of(r: &Resource) -> &Vec<k8s_openapi::api::core::v1::Container> {
    match r {
        Resource::Deployment(d) => &d.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers,
        other => panic!("expected deployment, got {:?}", other.gvk()),
    }
}

fn env_pairs(c: &k8s_openapi::api::core::v1::Container) -> Vec<(String, String)> {
    c.env
        .iter()
        .flatten()
        .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
        .collect()
}

#[test]
fn stress_labels_replace_both_containers() {
    let d = deployment(
        "web",
        json!({ "app": "web", "gwEmu-stress-repeats": "2", "gwEmu-stress-someflag": "x" }),
        vec![container("a", "2000m", "2048Mi"), container("b", "2000m", "2048Mi")],
    );
    let out = transform(vec![Resource::Deployment(Box::new(d))], &Settings::default());
    assert!(out.is_clean(), "{:?}", out.failures);
    assert_eq!(out.resources.len(), 1);

    let containers = containers_of(&out.resources[0]);
    assert_eq!(containers.len(), 2);
    for (c, name) in containers.iter().zip(["a", "b"]) {
        assert_eq!(c.name, name);
        assert_eq!(c.image.as_deref(), Some("ghcr.io/abraham2512/fedora-stress-ng:master"));
        assert_eq!(c.image_pull_policy.as_deref(), Some("Always"));
        let limits = c.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits["cpu"].0, "2000m");
        assert_eq!(limits["memory"].0, "2048Mi");
        let env = env_pairs(c);
        assert!(env.contains(&("someflag".into(), "x".into())));
        assert!(env.contains(&("LISTEN".into(), "1".into())));
        assert!(env.contains(&("LISTEN_PORT".into(), "8080".into())));
        assert!(!env.iter().any(|(n, _)| n == "repeats"));
    }
}

#[test]
fn batch_reports_every_failure_and_keeps_every_resource() {
    let good = deployment(
        "good",
        json!({ "gwEmu-stress-repeats": "1" }),
        vec![container("a", "2", "2Gi")],
    );
    let short = deployment(
        "short",
        json!({ "gwEmu-stress-repeats": "3" }),
        vec![container("a", "4", "8Gi")],
    );
    let input = vec![
        service("frontend"),
        Resource::Deployment(Box::new(good)),
        Resource::Deployment(Box::new(short.clone())),
    ];
    let out = transform(input, &Settings::default());
    assert_eq!(out.resources.len(), 3);
    assert_eq!(out.failures.len(), 2);
    assert!(matches!(out.failures[0].error, TransformError::UnknownKind { .. }));
    assert!(matches!(
        out.failures[1].error,
        TransformError::InsufficientContainers { existing: 1, wanted: 3 }
    ));

    // unsupported kinds and under-provisioned deployments pass through untouched
    assert_eq!(out.resources[0], service("frontend"));
    assert_eq!(out.resources[2], Resource::Deployment(Box::new(short)));
    assert_eq!(
        containers_of(&out.resources[1])[0].image.as_deref(),
        Some("ghcr.io/abraham2512/fedora-stress-ng:master")
    );

    let (resources, err) = out.into_result();
    assert_eq!(resources.len(), 3);
    let msg = err.expect("combined error").to_string();
    assert!(msg.starts_with("some manifests were not fully transformed: "), "{msg}");
    assert!(msg.contains("v1/Service default/frontend"), "{msg}");
    assert!(msg.contains("apps/v1/Deployment default/short"), "{msg}");
    assert!(msg.contains("not enough containers in spec 1 < 3"), "{msg}");
    assert!(!msg.contains("default/good"), "{msg}");
}

#[test]
fn no_fitting_slot_keeps_partial_rewrite() {
    let d = deployment(
        "mixed",
        json!({ "gwEmu-stress-repeats": "2" }),
        vec![container("big", "2", "2Gi"), container("tiny", "100m", "64Mi")],
    );
    let out = Transformer::new(&Settings::default()).transform(vec![Resource::Deployment(Box::new(d))]);
    assert_eq!(out.failures.len(), 1);
    assert!(matches!(out.failures[0].error, TransformError::NoFittingSlot { index: 1, .. }));
    let containers = containers_of(&out.resources[0]);
    assert_eq!(containers[0].image.as_deref(), Some("ghcr.io/abraham2512/fedora-stress-ng:master"));
    assert_eq!(containers[1].image.as_deref(), Some("tiny:1.0"));
}

#[test]
fn malformed_repeats_leaves_deployment_untouched() {
    let d = deployment("bad", json!({ "gwEmu-stress-repeats": "many" }), vec![container("a", "2", "2Gi")]);
    let out = transform(vec![Resource::Deployment(Box::new(d.clone()))], &Settings::default());
    assert_eq!(out.failures.len(), 1);
    assert!(matches!(out.failures[0].error, TransformError::Parse { .. }));
    assert_eq!(out.resources[0], Resource::Deployment(Box::new(d)));
}

#[test]
fn unlabelled_deployment_is_clean_passthrough() {
    let d = deployment("plain", json!({ "app": "plain" }), vec![container("a", "1", "1Gi")]);
    let out = transform(vec![Resource::Deployment(Box::new(d.clone()))], &Settings::default());
    assert!(out.is_clean());
    assert_eq!(out.resources[0], Resource::Deployment(Box::new(d)));
    assert!(out.into_result().1.is_none());
}

#[test]
fn prefix_suffix_selects_labels() {
    let d = deployment(
        "suffixed",
        json!({ "gwEmu-blue-stress-mode": "cpu", "gwEmu-stress-repeats": "5" }),
        vec![container("a", "1", "1Gi")],
    );
    let settings = Settings::default().with_prefix_suffix("blue");
    let out = transform(vec![Resource::Deployment(Box::new(d))], &settings);
    assert!(out.is_clean(), "{:?}", out.failures);
    let env = env_pairs(&containers_of(&out.resources[0])[0]);
    assert_eq!(env[0], ("mode".to_string(), "cpu".to_string()));
}

#[test]
fn empty_batch_is_clean() {
    let out = transform(Vec::new(), &Settings::default());
    assert!(out.resources.is_empty());
    assert!(out.is_clean());
}

#[test]
fn bare_selector_label_replaces_one_container() {
    let d = deployment("bare", json!({ "gwEmu-stress": "on" }), vec![container("a", "2", "2Gi")]);
    let out = transform(vec![Resource::Deployment(Box::new(d))], &Settings::default());
    assert!(out.is_clean(), "{:?}", out.failures);
    let containers = containers_of(&out.resources[0]);
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].image.as_deref(), Some("ghcr.io/abraham2512/fedora-stress-ng:master"));
    let env = env_pairs(&containers[0]);
    assert_eq!(
        env,
        vec![("LISTEN_PORT".to_string(), "8080".to_string()), ("LISTEN".to_string(), "1".to_string())]
    );
}

#[test]
fn huge_repeats_is_reported_as_insufficient() {
    let max = usize::MAX.to_string();
    let d = deployment("huge", json!({ "gwEmu-stress-repeats": max }), vec![container("a", "2", "2Gi")]);
    let out = transform(vec![Resource::Deployment(Box::new(d.clone()))], &Settings::default());
    assert_eq!(out.failures.len(), 1);
    assert!(matches!(
        out.failures[0].error,
        TransformError::InsufficientContainers { existing: 1, wanted: usize::MAX }
    ));
    assert_eq!(out.resources[0], Resource::Deployment(Box::new(d)));
}
