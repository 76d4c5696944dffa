//! Defaults-only strategy for keyed data (secrets, config maps).
//!
//! Desired values are defaults: they fill keys the existing object lacks, and
//! never replace a value someone has set. A key counts as missing when it is
//! absent (an absent map and an empty map are the same thing). A key present
//! with an empty value is filled only if the desired value is non-empty.

use tracing::info;

use super::{object_info, KeyedData, Strategy};
use crate::error::Defect;

/// Fills missing or empty keys from desired; preserves populated values.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsOnly;

impl<K: KeyedData> Strategy<K> for DefaultsOnly {
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect> {
        let mut defaulted = Vec::new();

        for (key, value) in desired.entries() {
            let fill = match existing.value(&key) {
                None => true,
                Some(current) => current.is_empty() && !value.is_empty(),
            };
            if fill {
                existing.set_value(&key, value);
                defaulted.push(key);
            }
        }

        if defaulted.is_empty() {
            return Ok(false);
        }

        // Values may be secret, only keys are logged
        info!(
            object = %object_info(desired),
            keys = ?defaulted,
            "Filling missing keys with defaults"
        );
        Ok(true)
    }
}
