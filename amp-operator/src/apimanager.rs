//! The `APIManager` application specification.
//!
//! Only the parts the system component consumes are modelled. Unknown fields in
//! the input are ignored.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

pub const DEFAULT_APP_LABEL: &str = "3scale-api-management";
pub const DEFAULT_TENANT_NAME: &str = "3scale";
pub const DEFAULT_APP_REPLICAS: i32 = 1;
pub const DEFAULT_SIDEKIQ_REPLICAS: i32 = 1;

/// An `APIManager` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiManager {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ApiManagerSpec,
}

impl ApiManager {
    /// Parse an `APIManager` from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReconcileError::Options(format!("invalid APIManager: {e}")))
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Namespace all managed objects live in.
    pub fn namespace(&self) -> Result<&str> {
        self.metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| ReconcileError::Options("APIManager has no namespace".to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiManagerSpec {
    pub wildcard_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<HighAvailabilitySpec>,
}

impl ApiManagerSpec {
    pub fn app_label(&self) -> &str {
        self.app_label.as_deref().unwrap_or(DEFAULT_APP_LABEL)
    }

    pub fn tenant_name(&self) -> &str {
        self.tenant_name.as_deref().unwrap_or(DEFAULT_TENANT_NAME)
    }

    /// Compute resource requirements are set on containers unless disabled.
    pub fn resource_requirements_enabled(&self) -> bool {
        self.resource_requirements_enabled.unwrap_or(true)
    }

    pub fn high_availability_enabled(&self) -> bool {
        self.high_availability.as_ref().is_some_and(|ha| ha.enabled)
    }

    pub fn file_storage(&self) -> Option<&SystemFileStorageSpec> {
        self.system.as_ref().and_then(|s| s.file_storage.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_storage: Option<SystemFileStorageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_spec: Option<ReplicasSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidekiq_spec: Option<ReplicasSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicasSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// Shared file storage for system. One of the backends must be selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFileStorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<SystemPvcSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_simple_storage_service: Option<SystemS3Spec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPvcSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemS3Spec {
    pub aws_bucket: String,
    pub aws_region: String,
    pub aws_credentials_secret: SecretReference,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretReference {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighAvailabilitySpec {
    #[serde(default)]
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let apimanager = ApiManager::from_json(
            r#"{
                "metadata": {"name": "example", "namespace": "amp"},
                "spec": {"wildcardDomain": "apps.example.com"}
            }"#,
        )
        .unwrap();

        assert_eq!(apimanager.namespace().unwrap(), "amp");
        assert_eq!(apimanager.spec.app_label(), DEFAULT_APP_LABEL);
        assert_eq!(apimanager.spec.tenant_name(), DEFAULT_TENANT_NAME);
        assert!(apimanager.spec.resource_requirements_enabled());
        assert!(!apimanager.spec.high_availability_enabled());
        assert!(apimanager.spec.file_storage().is_none());
    }

    #[test]
    fn test_parse_file_storage_and_ha() {
        let apimanager = ApiManager::from_json(
            r#"{
                "metadata": {"name": "example", "namespace": "amp"},
                "spec": {
                    "wildcardDomain": "apps.example.com",
                    "resourceRequirementsEnabled": false,
                    "highAvailability": {"enabled": true},
                    "zync": {"postgreSQLImage": "postgres:10"},
                    "system": {
                        "image": "registry.local/porta:2",
                        "appSpec": {"replicas": 2},
                        "fileStorage": {
                            "amazonSimpleStorageService": {
                                "awsBucket": "assets",
                                "awsRegion": "eu-west-1",
                                "awsCredentialsSecret": {"name": "aws-auth"}
                            }
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let spec = &apimanager.spec;
        assert!(spec.high_availability_enabled());
        assert!(!spec.resource_requirements_enabled());
        assert_eq!(
            spec.system.as_ref().and_then(|s| s.image.as_deref()),
            Some("registry.local/porta:2")
        );
        let s3 = spec
            .file_storage()
            .and_then(|fs| fs.amazon_simple_storage_service.as_ref())
            .unwrap();
        assert_eq!(s3.aws_credentials_secret.name, "aws-auth");
    }

    #[test]
    fn test_missing_namespace() {
        let apimanager =
            ApiManager::from_json(r#"{"spec": {"wildcardDomain": "example.com"}}"#).unwrap();
        assert!(matches!(apimanager.namespace(), Err(ReconcileError::Options(_))));
    }
}
