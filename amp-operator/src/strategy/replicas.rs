//! Replica count synchronization.

use tracing::info;

use super::{object_info, Strategy, Workload};
use crate::error::Defect;

/// Copies the desired replica count into the existing workload when they differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaSync;

impl<K: Workload> Strategy<K> for ReplicaSync {
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect> {
        let wanted = desired.replicas();
        let current = existing.replicas();
        if wanted == current {
            return Ok(false);
        }

        info!(
            object = %object_info(desired),
            ?current,
            ?wanted,
            "spec.replicas has changed"
        );
        existing.set_replicas(wanted);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::StatefulSet;

    use crate::strategy::fixtures::{container, deployment, stateful_set};
    use crate::strategy::{Composite, ContainerResourcesSync};

    #[test]
    fn test_replicas_synced() {
        let desired = deployment("system-sidekiq", 3, vec![container("a", "img", "1")]);
        let mut existing = deployment("system-sidekiq", 1, vec![container("a", "other", "1")]);

        assert!(ReplicaSync.is_update_needed(&desired, &mut existing).unwrap());
        assert_eq!(existing.replicas(), Some(3));
        // Only replicas are owned by this strategy
        assert_eq!(existing.containers()[0].image.as_deref(), Some("other"));

        assert!(!ReplicaSync.is_update_needed(&desired, &mut existing).unwrap());
    }

    #[test]
    fn test_stateful_set_replicas_and_resources() {
        let desired = stateful_set("system-redis", 2, vec![container("redis", "redis:6", "2")]);
        let mut existing =
            stateful_set("system-redis", 1, vec![container("redis", "redis:5", "1")]);
        let strategy = Composite::<StatefulSet>::new()
            .with(ReplicaSync)
            .with(ContainerResourcesSync);

        assert!(strategy.is_update_needed(&desired, &mut existing).unwrap());
        assert_eq!(existing.replicas(), Some(2));
        assert_eq!(existing.containers()[0].resources, desired.containers()[0].resources);
        assert_eq!(existing.containers()[0].image.as_deref(), Some("redis:5"));

        assert!(!strategy.is_update_needed(&desired, &mut existing).unwrap());
    }

    #[test]
    fn test_stateful_set_without_spec() {
        let desired = stateful_set("system-redis", 1, vec![]);
        let mut existing = StatefulSet::default();

        assert!(ReplicaSync.is_update_needed(&desired, &mut existing).unwrap());
        assert_eq!(existing.replicas(), Some(1));
        assert!(existing.template().is_some());
    }
}
