//! Container resource requirements synchronization.

use super::{object_info, Strategy, Workload};
use crate::diff;
use crate::error::Defect;

/// Compares compute resource requirements container by container, by index.
///
/// Only `resources` is owned: image, env and every other container field are left
/// as they are. A changed index gets desired's requirements and a diff in the log;
/// other indices are not touched. Indices present on one side only are ignored,
/// container count is the business of [`ContainerCountInvariant`](super::ContainerCountInvariant).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerResourcesSync;

impl<K: Workload> Strategy<K> for ContainerResourcesSync {
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect> {
        let object = object_info(desired);
        let mut update = false;

        for (idx, (wanted, current)) in desired
            .containers()
            .iter()
            .zip(existing.containers_mut().iter_mut())
            .enumerate()
        {
            if diff::resources_equal(current.resources.as_ref(), wanted.resources.as_ref()) {
                continue;
            }
            diff::report(
                &object,
                &format!("spec.template.spec.containers[{idx}].resources"),
                &current.resources,
                &wanted.resources,
            );
            current.resources = wanted.resources.clone();
            update = true;
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::capture;
    use crate::strategy::fixtures::{container, deployment, resources};

    #[test]
    fn test_only_changed_index_is_updated() {
        let desired = deployment(
            "system-app",
            1,
            vec![
                container("system-master", "porta:new", "1"),
                container("system-provider", "porta:new", "2"),
                container("system-developer", "porta:new", "1"),
            ],
        );
        let mut existing = deployment(
            "system-app",
            1,
            vec![
                container("system-master", "porta:old", "1000m"),
                container("system-provider", "porta:old", "1"),
                container("system-developer", "porta:old", "1.0"),
            ],
        );
        let before = existing.clone();

        assert!(ContainerResourcesSync
            .is_update_needed(&desired, &mut existing)
            .unwrap());

        let containers = existing.containers();
        assert_eq!(containers[0], before.containers()[0]);
        assert_eq!(containers[2], before.containers()[2]);
        assert_eq!(containers[1].resources, Some(resources("2", "512Mi")));
        // Image is not owned by this strategy
        assert_eq!(containers[1].image.as_deref(), Some("porta:old"));
    }

    #[test]
    fn test_equal_quantities_need_no_update() {
        let desired = deployment("system-sphinx", 1, vec![container("sphinx", "img", "1")]);
        let mut existing =
            deployment("system-sphinx", 1, vec![container("sphinx", "img", "1000m")]);

        assert!(!ContainerResourcesSync
            .is_update_needed(&desired, &mut existing)
            .unwrap());
        assert_eq!(
            existing.containers()[0].resources,
            Some(resources("1000m", "512Mi"))
        );
    }

    #[test]
    fn test_changed_index_reported_once() {
        let desired = deployment(
            "system-app",
            1,
            vec![
                container("system-master", "porta", "1"),
                container("system-provider", "porta", "2"),
            ],
        );
        let mut existing = deployment(
            "system-app",
            1,
            vec![
                container("system-master", "porta", "1000m"),
                container("system-provider", "porta", "1"),
            ],
        );

        let mut update = false;
        let reported = capture::reports(|| {
            update = ContainerResourcesSync
                .is_update_needed(&desired, &mut existing)
                .unwrap();
        });

        assert!(update);
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].object, object_info(&desired));
        assert_eq!(reported[0].field, "spec.template.spec.containers[1].resources");
        assert!(reported[0].diff.contains("/limits/cpu"));
        assert!(reported[0].diff.contains("\"2\""));

        let reported = capture::reports(|| {
            assert!(!ContainerResourcesSync
                .is_update_needed(&desired, &mut existing)
                .unwrap());
        });
        assert!(reported.is_empty());
    }
}
