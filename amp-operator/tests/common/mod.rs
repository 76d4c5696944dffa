//! Test helpers for amp-operator integration tests.

#![allow(dead_code)]

use amp_operator::test_util::MemoryClient;
use amp_operator::{ApiManager, ImageProvider, ReconcileError, ReconcileReport, SystemReconciler};
use serde_json::{json, Value};

pub const NAMESPACE: &str = "amp";

/// Objects of the system component when neither file storage nor HA is configured.
pub const SYSTEM_OBJECTS: usize = 18;

/// APIManager in [`NAMESPACE`] with the fields of `extra` merged into its spec.
pub fn apimanager(extra: Value) -> ApiManager {
    let mut spec = json!({ "wildcardDomain": "apps.example.com" });
    if let (Some(spec), Some(extra)) = (spec.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            spec.insert(k.clone(), v.clone());
        }
    }
    let doc = json!({
        "metadata": { "name": "example", "namespace": NAMESPACE },
        "spec": spec,
    });
    ApiManager::from_json(&doc.to_string()).unwrap()
}

/// Run one system reconcile pass.
pub async fn reconcile(
    client: &MemoryClient,
    apimanager: &ApiManager,
) -> Result<ReconcileReport, ReconcileError> {
    let images = ImageProvider::default();
    SystemReconciler::new(client, apimanager, &images).reconcile().await
}
