//! Clients for the cluster API.
//!
//! The reconciliation core only needs three calls per object: get, create and
//! update. Implementations:
//! - [`KubeClient`]: talks to a real cluster through `kube`
//! - [`MemoryClient`](crate::test_util::MemoryClient): in-memory store for tests

pub mod kube;

pub use self::kube::KubeClient;

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, Defect};

/// Namespaced Kubernetes object the operator can manage.
pub trait ManagedResource:
    ::kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedResource for K where
    K: ::kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Identity of a managed object: kind + namespace + name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key of a typed object. Missing name or namespace is a defect of whoever built it.
    pub fn of<K: ManagedResource>(obj: &K) -> Result<Self, Defect> {
        let kind = K::kind(&()).to_string();
        let meta = obj.meta();
        let name = meta.name.clone().ok_or_else(|| Defect::MissingIdentity {
            kind: kind.clone(),
            field: "metadata.name",
        })?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or_else(|| Defect::MissingIdentity {
                kind: kind.clone(),
                field: "metadata.namespace",
            })?;
        Ok(Self {
            kind,
            namespace,
            name,
        })
    }

    /// Key for a kind given namespace and name.
    pub fn for_kind<K: ManagedResource>(namespace: &str, name: &str) -> Self {
        Self::new(&K::kind(&()), namespace, name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Access to the cluster API.
///
/// Calls are awaited one at a time by the core; errors are opaque and are
/// propagated without retry.
#[async_trait]
pub trait Client: Send + Sync {
    /// Fetch an object by namespace and name. `Ok(None)` when it does not exist.
    async fn get<K: ManagedResource>(&self, namespace: &str, name: &str)
        -> Result<Option<K>, ClientError>;

    /// Create an object.
    async fn create<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError>;

    /// Replace an existing object.
    async fn update<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError>;
}
