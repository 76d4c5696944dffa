//! Options resolution.
//!
//! Turns an [`ApiManager`] into the plain values the component assemblers need.
//! Image defaults come from an [`ImageProvider`] handed in by the caller, so the
//! same inputs always resolve to the same images.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::apimanager::{
    ApiManager, ApiManagerSpec, DEFAULT_APP_REPLICAS, DEFAULT_SIDEKIQ_REPLICAS,
};
use crate::error::{ReconcileError, Result};

/// Product release the default images belong to.
pub const THREESCALE_RELEASE: &str = "2.8";

/// Default images, used where the `APIManager` does not override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProvider {
    pub system: String,
}

impl Default for ImageProvider {
    fn default() -> Self {
        Self {
            system: "quay.io/3scale/porta:nightly".to_string(),
        }
    }
}

/// Images to deploy: the `APIManager` override if set, else the provider default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmpImagesOptions {
    pub system_image: String,
}

impl AmpImagesOptions {
    pub fn resolve(spec: &ApiManagerSpec, images: &ImageProvider) -> Self {
        let system_image = spec
            .system
            .as_ref()
            .and_then(|s| s.image.clone())
            .unwrap_or_else(|| images.system.clone());
        Self { system_image }
    }
}

/// Shared storage claim settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvcOptions {
    pub storage_class_name: Option<String>,
    pub storage_request: String,
}

/// S3 storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    pub credentials_secret: String,
}

/// File storage selection. `Unspecified` means the section exists with no backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStorage {
    Pvc(PvcOptions),
    S3(S3Options),
    Unspecified,
}

/// Compute resources per system container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemResources {
    pub master: ResourceRequirements,
    pub provider: ResourceRequirements,
    pub developer: ResourceRequirements,
    pub sidekiq: ResourceRequirements,
    pub sphinx: ResourceRequirements,
}

fn requirements(limits: (&str, &str), requests: (&str, &str)) -> ResourceRequirements {
    let map = |(cpu, memory): (&str, &str)| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };
    ResourceRequirements {
        limits: Some(map(limits)),
        requests: Some(map(requests)),
        ..Default::default()
    }
}

impl SystemResources {
    /// Production sizing.
    pub fn production() -> Self {
        let app = requirements(("1", "800Mi"), ("50m", "600Mi"));
        Self {
            master: app.clone(),
            provider: app.clone(),
            developer: app,
            sidekiq: requirements(("1", "2Gi"), ("100m", "500Mi")),
            sphinx: requirements(("1000m", "512Mi"), ("80m", "250Mi")),
        }
    }

    /// No requests or limits anywhere.
    pub fn unrestricted() -> Self {
        Self::default()
    }
}

/// Default values of the system secrets. Passwords and tokens are freshly
/// generated each time; the defaults-only strategy keeps the live ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSecretDefaults {
    pub events_hook_password: String,
    pub master_apicast_access_token: String,
    pub master_access_token: String,
    pub master_password: String,
    pub admin_access_token: String,
    pub admin_password: String,
    pub app_secret_key_base: String,
}

pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

impl SystemSecretDefaults {
    pub fn generate() -> Self {
        Self {
            events_hook_password: random_string(8),
            master_apicast_access_token: random_string(8),
            master_access_token: random_string(8),
            master_password: random_string(8),
            admin_access_token: random_string(16),
            admin_password: random_string(8),
            app_secret_key_base: random_string(128),
        }
    }
}

/// Everything the system assembler needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemOptions {
    pub namespace: String,
    pub app_label: String,
    pub amp_release: String,
    pub tenant_name: String,
    pub wildcard_domain: String,
    pub images: AmpImagesOptions,
    pub app_replicas: i32,
    pub sidekiq_replicas: i32,
    pub resources: SystemResources,
    pub file_storage: Option<FileStorage>,
    pub secrets: SystemSecretDefaults,
}

const SHARED_STORAGE_REQUEST: &str = "100Mi";

impl SystemOptions {
    pub fn resolve(apimanager: &ApiManager, images: &ImageProvider) -> Result<Self> {
        let spec = &apimanager.spec;
        if spec.wildcard_domain.is_empty() {
            return Err(ReconcileError::Options(
                "wildcardDomain is mandatory".to_string(),
            ));
        }

        let replicas = |r: Option<i32>, default: i32| -> Result<i32> {
            match r {
                Some(r) if r < 0 => Err(ReconcileError::Options(format!(
                    "replicas must not be negative, got {r}"
                ))),
                Some(r) => Ok(r),
                None => Ok(default),
            }
        };
        let system = spec.system.as_ref();

        let resources = if spec.resource_requirements_enabled() {
            SystemResources::production()
        } else {
            SystemResources::unrestricted()
        };

        Ok(Self {
            namespace: apimanager.namespace()?.to_string(),
            app_label: spec.app_label().to_string(),
            amp_release: THREESCALE_RELEASE.to_string(),
            tenant_name: spec.tenant_name().to_string(),
            wildcard_domain: spec.wildcard_domain.clone(),
            images: AmpImagesOptions::resolve(spec, images),
            app_replicas: replicas(
                system.and_then(|s| s.app_spec.as_ref()).and_then(|a| a.replicas),
                DEFAULT_APP_REPLICAS,
            )?,
            sidekiq_replicas: replicas(
                system.and_then(|s| s.sidekiq_spec.as_ref()).and_then(|a| a.replicas),
                DEFAULT_SIDEKIQ_REPLICAS,
            )?,
            resources,
            file_storage: resolve_file_storage(spec),
            secrets: SystemSecretDefaults::generate(),
        })
    }
}

fn resolve_file_storage(spec: &ApiManagerSpec) -> Option<FileStorage> {
    let fs = spec.file_storage()?;
    let selected = if let Some(pvc) = &fs.persistent_volume_claim {
        FileStorage::Pvc(PvcOptions {
            storage_class_name: pvc.storage_class_name.clone(),
            storage_request: SHARED_STORAGE_REQUEST.to_string(),
        })
    } else if let Some(s3) = &fs.amazon_simple_storage_service {
        FileStorage::S3(S3Options {
            bucket: s3.aws_bucket.clone(),
            region: s3.aws_region.clone(),
            credentials_secret: s3.aws_credentials_secret.name.clone(),
        })
    } else {
        FileStorage::Unspecified
    };
    Some(selected)
}

/// Options for the high availability component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighAvailabilityOptions {
    pub namespace: String,
    pub app_label: String,
    /// External database URL. Empty until an administrator fills it in.
    pub system_database_url: String,
}

impl HighAvailabilityOptions {
    pub fn resolve(apimanager: &ApiManager) -> Result<Self> {
        if !apimanager.spec.high_availability_enabled() {
            return Err(ReconcileError::Options(
                "high availability is not enabled".to_string(),
            ));
        }
        Ok(Self {
            namespace: apimanager.namespace()?.to_string(),
            app_label: apimanager.spec.app_label().to_string(),
            system_database_url: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;
    use crate::apimanager::{
        HighAvailabilitySpec, ReplicasSpec, SystemFileStorageSpec, SystemPvcSpec, SystemSpec,
    };

    fn apimanager(spec: ApiManagerSpec) -> ApiManager {
        ApiManager {
            metadata: ObjectMeta {
                name: Some("example".to_string()),
                namespace: Some("amp".to_string()),
                ..Default::default()
            },
            spec: ApiManagerSpec {
                wildcard_domain: "apps.example.com".to_string(),
                ..spec
            },
        }
    }

    #[test]
    fn test_images_default_from_provider() {
        let images = ImageProvider::default();
        let opts = AmpImagesOptions::resolve(&ApiManagerSpec::default(), &images);
        assert_eq!(opts.system_image, images.system);

        let images = ImageProvider {
            system: "registry.local/porta:1".to_string(),
        };
        let opts = AmpImagesOptions::resolve(&ApiManagerSpec::default(), &images);
        assert_eq!(opts.system_image, "registry.local/porta:1");
    }

    #[test]
    fn test_images_override() {
        let spec = ApiManagerSpec {
            system: Some(SystemSpec {
                image: Some("porta:custom".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let opts = AmpImagesOptions::resolve(&spec, &ImageProvider::default());
        assert_eq!(opts.system_image, "porta:custom");
    }

    #[test]
    fn test_resource_requirements_disabled() {
        let opts = SystemOptions::resolve(
            &apimanager(ApiManagerSpec {
                resource_requirements_enabled: Some(false),
                ..Default::default()
            }),
            &ImageProvider::default(),
        )
        .unwrap();
        assert_eq!(opts.resources, SystemResources::unrestricted());

        let opts = SystemOptions::resolve(
            &apimanager(ApiManagerSpec::default()),
            &ImageProvider::default(),
        )
        .unwrap();
        assert_eq!(opts.resources, SystemResources::production());
    }

    #[test]
    fn test_file_storage_selection() {
        let with_storage = |fs: SystemFileStorageSpec| {
            let spec = ApiManagerSpec {
                system: Some(SystemSpec {
                    file_storage: Some(fs),
                    ..Default::default()
                }),
                ..Default::default()
            };
            SystemOptions::resolve(&apimanager(spec), &ImageProvider::default())
                .unwrap()
                .file_storage
        };

        assert!(matches!(
            with_storage(SystemFileStorageSpec {
                persistent_volume_claim: Some(SystemPvcSpec::default()),
                amazon_simple_storage_service: None,
            }),
            Some(FileStorage::Pvc(_))
        ));
        assert_eq!(
            with_storage(SystemFileStorageSpec::default()),
            Some(FileStorage::Unspecified)
        );

        let opts = SystemOptions::resolve(
            &apimanager(ApiManagerSpec::default()),
            &ImageProvider::default(),
        )
        .unwrap();
        assert_eq!(opts.file_storage, None);
    }

    #[test]
    fn test_replicas() {
        let spec = ApiManagerSpec {
            system: Some(SystemSpec {
                app_spec: Some(ReplicasSpec { replicas: Some(3) }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let opts = SystemOptions::resolve(&apimanager(spec), &ImageProvider::default()).unwrap();
        assert_eq!(opts.app_replicas, 3);
        assert_eq!(opts.sidekiq_replicas, DEFAULT_SIDEKIQ_REPLICAS);

        let spec = ApiManagerSpec {
            system: Some(SystemSpec {
                sidekiq_spec: Some(ReplicasSpec { replicas: Some(-1) }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            SystemOptions::resolve(&apimanager(spec), &ImageProvider::default()),
            Err(ReconcileError::Options(_))
        ));
    }

    #[test]
    fn test_generated_secrets() {
        let a = SystemSecretDefaults::generate();
        let b = SystemSecretDefaults::generate();
        assert_eq!(a.app_secret_key_base.len(), 128);
        assert_eq!(a.admin_access_token.len(), 16);
        assert!(a.admin_password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.app_secret_key_base, b.app_secret_key_base);
    }

    #[test]
    fn test_high_availability_requires_enabled() {
        let disabled = apimanager(ApiManagerSpec::default());
        assert!(HighAvailabilityOptions::resolve(&disabled).is_err());

        let opts = HighAvailabilityOptions::resolve(&apimanager(ApiManagerSpec {
            high_availability: Some(HighAvailabilitySpec { enabled: true }),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(opts.namespace, "amp");
    }
}
