//! Composition of strategies.

use super::Strategy;
use crate::error::Defect;

/// Logical OR of several strategies.
///
/// Every strategy is invoked, even after one has reported a change, so all owned
/// fields are merged into the existing object in a single pass.
pub struct Composite<K> {
    strategies: Vec<Box<dyn Strategy<K>>>,
}

impl<K> Composite<K> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Add a strategy.
    pub fn with(mut self, strategy: impl Strategy<K> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }
}

impl<K> Default for Composite<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Strategy<K> for Composite<K> {
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect> {
        let mut update = false;
        for strategy in &self.strategies {
            update |= strategy.is_update_needed(desired, existing)?;
        }
        Ok(update)
    }
}
