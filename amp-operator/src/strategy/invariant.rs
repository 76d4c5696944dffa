//! Structural invariant on the container list of a workload.

use tracing::warn;

use super::{object_info, Strategy, Workload};
use crate::error::Defect;

/// Wraps a strategy with a fixed container count.
///
/// The desired object must have exactly `expected` containers; anything else is a
/// [`Defect`] in whatever built it. When the existing object has drifted to a
/// different count, per-index merging is unsafe, so its whole container list is
/// replaced with the desired one and a change is reported. The wrapped strategy
/// runs afterwards in both cases.
pub struct ContainerCountInvariant<S> {
    expected: usize,
    inner: S,
}

impl<S> ContainerCountInvariant<S> {
    pub fn new(expected: usize, inner: S) -> Self {
        Self { expected, inner }
    }
}

impl<K: Workload, S: Strategy<K>> Strategy<K> for ContainerCountInvariant<S> {
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect> {
        let object = object_info(desired);

        let desired_count = desired.containers().len();
        if desired_count != self.expected {
            return Err(Defect::ContainerCount {
                object,
                expected: self.expected,
                actual: desired_count,
            });
        }

        let mut update = false;
        let existing_count = existing.containers().len();
        if existing_count != self.expected {
            warn!(
                object = %object,
                expected = self.expected,
                actual = existing_count,
                "spec.template.spec.containers length changed, recreating container list"
            );
            *existing.containers_mut() = desired.containers().to_vec();
            update = true;
        }

        let inner = self.inner.is_update_needed(desired, existing)?;
        Ok(update || inner)
    }
}
