//! Error types for reconciliation.
//!
//! Three families are kept apart:
//! - [`ClientError`]: whatever the cluster API client reports, passed through untouched.
//! - [`Defect`]: an upstream bug (desired objects built with a broken shape). Callers
//!   should crash and restart instead of requeueing.
//! - [`ReconcileError`]: what a reconcile pass returns, annotated with context.

use thiserror::Error;

/// Errors reported by a [`Client`](crate::clients::Client) implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Error from the Kubernetes API client.
    #[error("kubernetes api: {0}")]
    Kube(#[from] kube::Error),

    /// Object already exists or was modified concurrently.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rejected by the API server.
    #[error("api: {0}")]
    Api(String),

    /// Object could not be (de)serialized.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Unrecoverable defect in the desired state.
///
/// A defect means the component assembler produced an object that breaks an
/// assumption the strategies rely on. Reconciling anyway could corrupt live objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Defect {
    /// Desired workload does not have the fixed number of containers.
    #[error(
        "{object} desired spec.template.spec.containers length is {actual}, should be {expected}"
    )]
    ContainerCount {
        object: String,
        expected: usize,
        actual: usize,
    },

    /// Desired object lacks part of its identity.
    #[error("desired {kind} has no {field}")]
    MissingIdentity { kind: String, field: &'static str },
}

/// Error returned by a reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Desired-state inputs lack a mandatory alternative.
    #[error("configuration error: {0}")]
    Config(String),

    /// Options could not be resolved from the APIManager spec.
    #[error("options error: {0}")]
    Options(String),

    /// Call to the cluster API failed.
    #[error("{context}: {source}")]
    Client {
        context: String,
        #[source]
        source: ClientError,
    },

    /// Desired state violates a structural invariant.
    #[error("unrecoverable defect: {0}")]
    Defect(#[from] Defect),

    /// A named orchestration step failed.
    #[error("step {step} failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    /// Wrap a client error with a context message.
    pub fn client(context: impl Into<String>, source: ClientError) -> Self {
        ReconcileError::Client {
            context: context.into(),
            source,
        }
    }

    /// Innermost error, looking through step annotations.
    pub fn root(&self) -> &ReconcileError {
        match self {
            ReconcileError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error is an unrecoverable defect rather than a retryable failure.
    pub fn is_defect(&self) -> bool {
        matches!(self.root(), ReconcileError::Defect(_))
    }

    /// Name of the orchestration step that failed, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            ReconcileError::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defect_seen_through_step() {
        let err = ReconcileError::Step {
            step: "app-deployment".to_string(),
            source: Box::new(ReconcileError::Defect(Defect::ContainerCount {
                object: "Deployment/system-app".to_string(),
                expected: 3,
                actual: 2,
            })),
        };
        assert!(err.is_defect());
        assert_eq!(err.step(), Some("app-deployment"));
    }

    #[test]
    fn test_client_error_is_not_defect() {
        let err = ReconcileError::client(
            "failed to update Secret ns/system-seed",
            ClientError::Conflict("resource version changed".to_string()),
        );
        assert!(!err.is_defect());
        assert_eq!(
            err.to_string(),
            "failed to update Secret ns/system-seed: conflict: resource version changed"
        );
    }
}
