//! Diff reporting for fields about to be changed.
//!
//! Rendering is for humans reading the operator log: the diff is a JSON patch
//! (RFC 6902) from the existing value to the desired one, computed on the raw
//! serialized values. Whether a change is needed at all is decided by the
//! representation-aware comparisons in this module, never by the rendering.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use tracing::info;

use crate::quantity;

/// Render the structural difference between two values.
pub fn render<T: Serialize>(old: &T, new: &T) -> String {
    let (old, new) = match (serde_json::to_value(old), serde_json::to_value(new)) {
        (Ok(old), Ok(new)) => (old, new),
        (Err(e), _) | (_, Err(e)) => return format!("<unable to render diff: {e}>"),
    };
    let patch = json_patch::diff(&old, &new);
    serde_json::to_string(&patch).unwrap_or_else(|e| format!("<unable to render diff: {e}>"))
}

/// Log that `field` of `object` changes from `old` to `new`.
pub fn report<T: Serialize>(object: &str, field: &str, old: &T, new: &T) {
    let diff = render(old, new);
    info!(object, field, %diff, "{} {} have changed", object, field);
}

fn quantity_maps_equal(
    a: Option<&BTreeMap<String, Quantity>>,
    b: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let a = a.unwrap_or(&empty);
    let b = b.unwrap_or(&empty);
    a.len() == b.len()
        && a.iter()
            .all(|(name, qa)| b.get(name).is_some_and(|qb| quantity::equal(qa, qb)))
}

/// Compare compute resource requirements by amount.
///
/// Absent requirements, absent maps and empty maps are all equal.
pub fn resources_equal(a: Option<&ResourceRequirements>, b: Option<&ResourceRequirements>) -> bool {
    let empty = ResourceRequirements::default();
    let a = a.unwrap_or(&empty);
    let b = b.unwrap_or(&empty);
    let claims_a = a.claims.as_deref().unwrap_or_default();
    let claims_b = b.claims.as_deref().unwrap_or_default();

    quantity_maps_equal(a.limits.as_ref(), b.limits.as_ref())
        && quantity_maps_equal(a.requests.as_ref(), b.requests.as_ref())
        && claims_a == claims_b
}
