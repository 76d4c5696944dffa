//! System component reconciler.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use tracing::info;

use super::ObjectReconciler;
use crate::apimanager::ApiManager;
use crate::clients::{Client, ManagedResource};
use crate::component::system::APP_CONTAINERS;
use crate::component::{HighAvailabilityComponent, SystemComponent};
use crate::error::{ReconcileError, Result};
use crate::options::{FileStorage, HighAvailabilityOptions, ImageProvider, SystemOptions};
use crate::orchestrator::{Orchestrator, ReconcileReport, Step};
use crate::strategy::{
    Composite, ContainerCountInvariant, ContainerResourcesSync, CreateOnly, DefaultsOnly,
    ReplicaSync, Strategy,
};

pub const COMPONENT: &str = "system";

/// Replica count and per-container resources; `system-app` must keep its three containers.
pub fn app_strategy() -> Composite<Deployment> {
    Composite::new().with(ReplicaSync).with(ContainerCountInvariant::new(
        APP_CONTAINERS.len(),
        ContainerResourcesSync,
    ))
}

pub fn sidekiq_strategy() -> Composite<Deployment> {
    Composite::new()
        .with(ReplicaSync)
        .with(ContainerCountInvariant::new(1, ContainerResourcesSync))
}

/// Sphinx runs a single replica; only its resources are managed.
pub fn sphinx_strategy() -> ContainerCountInvariant<ContainerResourcesSync> {
    ContainerCountInvariant::new(1, ContainerResourcesSync)
}

/// Converges every object of the system component for one `APIManager`.
pub struct SystemReconciler<'a, C> {
    client: &'a C,
    apimanager: &'a ApiManager,
    images: &'a ImageProvider,
}

impl<'a, C: Client> SystemReconciler<'a, C> {
    pub fn new(client: &'a C, apimanager: &'a ApiManager, images: &'a ImageProvider) -> Self {
        Self {
            client,
            apimanager,
            images,
        }
    }

    /// Run one reconcile pass. An error means the pass should be retried later,
    /// unless [`ReconcileError::is_defect`] says otherwise.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        info!(
            apimanager = self.apimanager.name().unwrap_or_default(),
            "Reconciling {}", COMPONENT
        );
        self.orchestrator()?.run().await
    }

    /// Ordered steps of a pass.
    pub fn orchestrator(&self) -> Result<Orchestrator<'a>> {
        let options = SystemOptions::resolve(self.apimanager, self.images)?;
        let system = Arc::new(SystemComponent::new(options));

        Ok(Orchestrator::new(COMPONENT)
            .step(self.file_storage_step(&system))
            .step(self.object_step(
                "provider-service",
                &system,
                CreateOnly,
                SystemComponent::provider_service,
            ))
            .step(self.object_step(
                "master-service",
                &system,
                CreateOnly,
                SystemComponent::master_service,
            ))
            .step(self.object_step(
                "developer-service",
                &system,
                CreateOnly,
                SystemComponent::developer_service,
            ))
            .step(self.object_step(
                "sphinx-service",
                &system,
                CreateOnly,
                SystemComponent::sphinx_service,
            ))
            .step(self.object_step(
                "memcached-service",
                &system,
                CreateOnly,
                SystemComponent::memcached_service,
            ))
            .step(self.object_step(
                "app-deployment",
                &system,
                app_strategy(),
                SystemComponent::app_deployment,
            ))
            .step(self.object_step(
                "sidekiq-deployment",
                &system,
                sidekiq_strategy(),
                SystemComponent::sidekiq_deployment,
            ))
            .step(self.object_step(
                "sphinx-deployment",
                &system,
                sphinx_strategy(),
                SystemComponent::sphinx_deployment,
            ))
            .step(self.object_step(
                "system-configmap",
                &system,
                CreateOnly,
                SystemComponent::system_config_map,
            ))
            .step(self.object_step(
                "environment-configmap",
                &system,
                CreateOnly,
                SystemComponent::environment_config_map,
            ))
            .step(self.object_step(
                "smtp-configmap",
                &system,
                CreateOnly,
                SystemComponent::smtp_config_map,
            ))
            .step(self.object_step(
                "events-hook-secret",
                &system,
                DefaultsOnly,
                SystemComponent::events_hook_secret,
            ))
            .step(self.object_step(
                "redis-secret",
                &system,
                DefaultsOnly,
                SystemComponent::redis_secret,
            ))
            .step(self.object_step(
                "master-apicast-secret",
                &system,
                DefaultsOnly,
                SystemComponent::master_apicast_secret,
            ))
            .step(self.object_step(
                "seed-secret",
                &system,
                DefaultsOnly,
                SystemComponent::seed_secret,
            ))
            .step(self.object_step(
                "recaptcha-secret",
                &system,
                DefaultsOnly,
                SystemComponent::recaptcha_secret,
            ))
            .step(self.object_step(
                "app-secret",
                &system,
                DefaultsOnly,
                SystemComponent::app_secret,
            ))
            .step(self.object_step(
                "memcached-secret",
                &system,
                DefaultsOnly,
                SystemComponent::memcached_secret,
            ))
            .step(self.database_ha_secret_step()))
    }

    fn object_step<K, S, B>(
        &self,
        name: &'static str,
        system: &Arc<SystemComponent>,
        strategy: S,
        build: B,
    ) -> Step<'a>
    where
        K: ManagedResource,
        S: Strategy<K> + 'a,
        B: FnOnce(&SystemComponent) -> K + Send + 'a,
    {
        let client = self.client;
        let system = Arc::clone(system);
        Step::new(name, move || async move {
            let desired = build(&system);
            ObjectReconciler::new(client, strategy).reconcile(&desired).await
        })
    }

    /// Shared storage claim or S3 credentials, whichever backend is selected.
    fn file_storage_step(&self, system: &Arc<SystemComponent>) -> Step<'a> {
        let client = self.client;
        let present = system.options().file_storage.is_some();
        let system = Arc::clone(system);

        Step::new("file-storage", move || async move {
            match &system.options().file_storage {
                Some(FileStorage::Pvc(pvc)) => {
                    ObjectReconciler::new(client, CreateOnly)
                        .reconcile(&system.shared_storage(pvc))
                        .await
                }
                Some(FileStorage::S3(s3)) => {
                    ObjectReconciler::new(client, CreateOnly)
                        .reconcile(&system.s3_aws_secret(s3))
                        .await
                }
                Some(FileStorage::Unspecified) | None => Err(ReconcileError::Config(
                    "No FileStorage spec specified. FileStorage is mandatory".to_string(),
                )),
            }
        })
        .when(move || present)
    }

    /// External database secret, only with high availability.
    fn database_ha_secret_step(&self) -> Step<'a> {
        let client = self.client;
        let apimanager = self.apimanager;

        Step::new("database-ha-secret", move || async move {
            let ha = HighAvailabilityComponent::new(HighAvailabilityOptions::resolve(apimanager)?);
            ObjectReconciler::new(client, DefaultsOnly)
                .reconcile(&ha.system_database_secret())
                .await
        })
        .when(move || apimanager.spec.high_availability_enabled())
    }
}
