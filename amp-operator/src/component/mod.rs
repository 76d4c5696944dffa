//! Component assemblers: build the desired objects of a component from resolved options.
//!
//! Assemblers are pure. Every call returns a fresh object; nothing is cached
//! between reconcile passes.

pub mod high_availability;
pub mod system;

pub use high_availability::HighAvailabilityComponent;
pub use system::SystemComponent;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Labels shared by every object of a component element.
pub fn labels(app_label: &str, component: &str, element: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), app_label.to_string()),
        ("threescale_component".to_string(), component.to_string()),
        ("threescale_component_element".to_string(), element.to_string()),
    ])
}

pub fn object_meta(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

/// Opaque secret from string values.
pub fn opaque_secret<'a>(
    meta: ObjectMeta,
    entries: impl IntoIterator<Item = (&'a str, String)>,
) -> Secret {
    Secret {
        metadata: meta,
        string_data: Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}
