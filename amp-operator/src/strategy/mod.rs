//! Reconciliation strategies.
//!
//! A strategy answers one question for one resource role: given the desired
//! object and the existing one, is an update needed? While answering, it merges
//! the fields it owns from desired into the in-memory existing object, so the
//! caller can submit `existing` as-is. Fields a strategy does not own are never
//! touched, which leaves them to whoever else manages them.

pub mod composite;
pub mod create_only;
pub mod defaults_only;
pub mod invariant;
pub mod replicas;
pub mod resources;

pub use composite::Composite;
pub use create_only::CreateOnly;
pub use defaults_only::DefaultsOnly;
pub use invariant::ContainerCountInvariant;
pub use replicas::ReplicaSync;
pub use resources::ContainerResourcesSync;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Container, PodTemplateSpec, Secret};
use k8s_openapi::ByteString;
use kube::ResourceExt;

use crate::clients::ManagedResource;
use crate::error::Defect;

/// Policy deciding whether and how desired state is merged into an existing object.
pub trait Strategy<K>: Send + Sync {
    /// Returns `true` if `existing` must be written back. May mutate `existing`
    /// in place; returns a [`Defect`] if `desired` breaks an assumption.
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect>;
}

impl<K, S: Strategy<K> + ?Sized> Strategy<K> for Box<S> {
    fn is_update_needed(&self, desired: &K, existing: &mut K) -> Result<bool, Defect> {
        (**self).is_update_needed(desired, existing)
    }
}

/// Short description of an object for log messages, e.g. `Deployment/system-app`.
pub fn object_info<K: ManagedResource>(obj: &K) -> String {
    format!("{}/{}", K::kind(&()), obj.name_any())
}

/// Workload kinds: a replica count and a pod template.
pub trait Workload: ManagedResource {
    fn replicas(&self) -> Option<i32>;
    fn set_replicas(&mut self, replicas: Option<i32>);
    fn template(&self) -> Option<&PodTemplateSpec>;
    fn template_mut(&mut self) -> &mut PodTemplateSpec;

    fn containers(&self) -> &[Container] {
        self.template()
            .and_then(|t| t.spec.as_ref())
            .map(|s| s.containers.as_slice())
            .unwrap_or_default()
    }

    fn containers_mut(&mut self) -> &mut Vec<Container> {
        &mut self
            .template_mut()
            .spec
            .get_or_insert_with(Default::default)
            .containers
    }
}

impl Workload for Deployment {
    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn set_replicas(&mut self, replicas: Option<i32>) {
        self.spec.get_or_insert_with(Default::default).replicas = replicas;
    }

    fn template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl Workload for StatefulSet {
    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn set_replicas(&mut self, replicas: Option<i32>) {
        self.spec.get_or_insert_with(Default::default).replicas = replicas;
    }

    fn template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

/// Kinds holding a map of keyed values (secrets, config maps).
pub trait KeyedData: ManagedResource {
    /// All keys and values, as bytes.
    fn entries(&self) -> BTreeMap<String, Vec<u8>>;

    /// Stored value for `key`, if the key is present.
    fn value(&self, key: &str) -> Option<&[u8]>;

    fn set_value(&mut self, key: &str, value: Vec<u8>);
}

impl KeyedData for Secret {
    /// `stringData` wins over `data` for the same key, as on the API server.
    fn entries(&self) -> BTreeMap<String, Vec<u8>> {
        let mut entries: BTreeMap<String, Vec<u8>> = self
            .data
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.0.clone()))
            .collect();
        for (k, v) in self.string_data.iter().flatten() {
            entries.insert(k.clone(), v.clone().into_bytes());
        }
        entries
    }

    fn value(&self, key: &str) -> Option<&[u8]> {
        self.string_data
            .as_ref()
            .and_then(|d| d.get(key))
            .map(|v| v.as_bytes())
            .or_else(|| {
                self.data
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .map(|v| v.0.as_slice())
            })
    }

    fn set_value(&mut self, key: &str, value: Vec<u8>) {
        if let Some(string_data) = self.string_data.as_mut() {
            string_data.remove(key);
        }
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), ByteString(value));
    }
}

impl KeyedData for ConfigMap {
    fn entries(&self) -> BTreeMap<String, Vec<u8>> {
        self.data
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.clone().into_bytes()))
            .collect()
    }

    fn value(&self, key: &str) -> Option<&[u8]> {
        self.data
            .as_ref()
            .and_then(|d| d.get(key))
            .map(|v| v.as_bytes())
    }

    fn set_value(&mut self, key: &str, value: Vec<u8>) {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), String::from_utf8_lossy(&value).into_owned());
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Object builders shared by strategy tests.

    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    pub fn resources(cpu: &str, memory: &str) -> ResourceRequirements {
        let limits: BTreeMap<String, Quantity> = [
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ]
        .into_iter()
        .collect();
        ResourceRequirements {
            limits: Some(limits),
            ..Default::default()
        }
    }

    pub fn container(name: &str, image: &str, cpu: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            resources: Some(resources(cpu, "512Mi")),
            ..Default::default()
        }
    }

    pub fn deployment(name: &str, replicas: i32, containers: Vec<Container>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("amp".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn stateful_set(name: &str, replicas: i32, containers: Vec<Container>) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("amp".to_string()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
