//! Reconcilers.
//!
//! [`ObjectReconciler`] converges one object: it fetches the live version,
//! creates it when missing, and otherwise lets a [`Strategy`] decide whether
//! (and what) to write back. Component reconcilers such as
//! [`SystemReconciler`](system::SystemReconciler) run many of those in order.

pub mod system;

use std::fmt;

use tracing::{debug, info};

use crate::clients::{Client, ManagedResource, ObjectKey};
use crate::error::{ReconcileError, Result};
use crate::strategy::Strategy;

/// Result of reconciling one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Failed,
}

impl Outcome {
    /// Whether a write was made.
    pub fn is_change(self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
            Outcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Get, then create or strategy-driven update, for a single object.
///
/// Makes at most one write per call. Client errors are returned with the
/// operation and object prepended and are never retried here.
pub struct ObjectReconciler<'a, C, S> {
    client: &'a C,
    strategy: S,
}

impl<'a, C: Client, S> ObjectReconciler<'a, C, S> {
    pub fn new(client: &'a C, strategy: S) -> Self {
        Self { client, strategy }
    }

    pub async fn reconcile<K>(&self, desired: &K) -> Result<Outcome>
    where
        K: ManagedResource,
        S: Strategy<K>,
    {
        let key = ObjectKey::of(desired)?;

        let existing = self
            .client
            .get::<K>(&key.namespace, &key.name)
            .await
            .map_err(|e| ReconcileError::client(format!("failed to get {key}"), e))?;

        let Some(mut existing) = existing else {
            self.client
                .create(desired)
                .await
                .map_err(|e| ReconcileError::client(format!("failed to create {key}"), e))?;
            info!(object = %key, outcome = %Outcome::Created, "Created object");
            return Ok(Outcome::Created);
        };

        if !self.strategy.is_update_needed(desired, &mut existing)? {
            debug!(object = %key, outcome = %Outcome::Unchanged, "Object up to date");
            return Ok(Outcome::Unchanged);
        }

        self.client
            .update(&existing)
            .await
            .map_err(|e| ReconcileError::client(format!("failed to update {key}"), e))?;
        info!(object = %key, outcome = %Outcome::Updated, "Updated object");
        Ok(Outcome::Updated)
    }
}
