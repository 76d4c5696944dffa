//! Client backed by the Kubernetes API server.

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::ResourceExt;
use tracing::debug;

use super::{Client, ManagedResource, ObjectKey};
use crate::error::ClientError;

/// Client for interacting with a Kubernetes cluster.
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
}

impl KubeClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Connect using the in-cluster config or the local kubeconfig.
    pub async fn try_default() -> Result<Self, ClientError> {
        Ok(Self::new(kube::Client::try_default().await?))
    }

    fn api<K: ManagedResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl Client for KubeClient {
    async fn get<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, ClientError> {
        debug!(object = %ObjectKey::for_kind::<K>(namespace, name), "Getting object");
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        let namespace = obj.namespace().unwrap_or_default();
        debug!(object = %ObjectKey::for_kind::<K>(&namespace, &obj.name_any()), "Creating object");
        self.api::<K>(&namespace)
            .create(&PostParams::default(), obj)
            .await?;
        Ok(())
    }

    async fn update<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        debug!(object = %ObjectKey::for_kind::<K>(&namespace, &name), "Replacing object");
        self.api::<K>(&namespace)
            .replace(&name, &PostParams::default(), obj)
            .await?;
        Ok(())
    }
}
