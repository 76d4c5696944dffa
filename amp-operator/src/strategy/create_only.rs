//! Create-only strategy.

use super::Strategy;
use crate::error::Defect;

/// Never updates an object once it exists.
///
/// Used for objects seeded once and then owned by the user, e.g. credentials that
/// may be rotated manually, and for objects whose live form the API server fills in
/// (services, claims).
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOnly;

impl<K> Strategy<K> for CreateOnly {
    fn is_update_needed(&self, _desired: &K, _existing: &mut K) -> Result<bool, Defect> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::fixtures::{container, deployment};

    #[test]
    fn test_create_only_leaves_existing_untouched() {
        let desired = deployment("system-app", 3, vec![container("a", "new", "2")]);
        let mut existing = deployment("system-app", 1, vec![container("a", "old", "1")]);
        let before = existing.clone();

        assert!(!CreateOnly.is_update_needed(&desired, &mut existing).unwrap());
        assert_eq!(existing, before);
    }
}
