//! System component: the admin portal, developer portal and background workers.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerPort, EnvVar, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    ResourceRequirements, Secret, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{labels, object_meta, opaque_secret};
use crate::options::{FileStorage, PvcOptions, S3Options, SystemOptions};

pub const APP_DEPLOYMENT: &str = "system-app";
pub const SIDEKIQ_DEPLOYMENT: &str = "system-sidekiq";
pub const SPHINX_DEPLOYMENT: &str = "system-sphinx";
pub const SHARED_STORAGE: &str = "system-storage";

/// Containers of `system-app`, in pod order.
pub const APP_CONTAINERS: [&str; 3] = ["system-master", "system-provider", "system-developer"];

const SHARED_STORAGE_MOUNT: &str = "/opt/system/public/system";
const SPHINX_PORT: i32 = 9306;
const MEMCACHE_PORT: i32 = 11211;

const ZYNC_YML: &str = concat!(
    "production:\n",
    "  endpoint: 'http://zync:8080'\n",
    "  authentication:\n",
    "    token: \"<%= ENV.fetch('ZYNC_AUTHENTICATION_TOKEN') %>\"\n",
    "  connect_timeout: 5\n",
    "  send_timeout: 5\n",
    "  receive_timeout: 10\n",
    "  root_url:\n",
);

const ROLLING_UPDATES_YML: &str = concat!(
    "production:\n",
    "  old_charts: false\n",
    "  new_provider_documentation: false\n",
    "  proxy_pro: false\n",
    "  instant_bill_plan_change: false\n",
    "  service_permissions: true\n",
    "  async_apicast_deploy: false\n",
    "  duplicate_application_id: true\n",
    "  duplicate_user_key: true\n",
    "  plan_changes_wizard: false\n",
    "  require_cc_on_signup: false\n",
    "  apicast_per_service: true\n",
    "  new_notification_system: true\n",
    "  cms_api: false\n",
    "  apicast_v2: true\n",
    "  forum: false\n",
    "  published_service_plan_signup: true\n",
    "  apicast_oidc: true\n",
    "  policies: true\n",
    "  proxy_private_base_path: true\n",
);

const SERVICE_DISCOVERY_YML: &str = concat!(
    "production:\n",
    "  enabled: <%= cluster_token_file_exists = File.exist?(cluster_token_file_path",
    " = '/var/run/secrets/kubernetes.io/serviceaccount/token') %>\n",
    "  server_scheme: 'https'\n",
    "  server_host: 'kubernetes.default.svc.cluster.local'\n",
    "  server_port: 443\n",
    "  authentication_method: oauth\n",
    "  oauth_server_type: builtin\n",
    "  client_id: '3scale'\n",
    "  client_secret: '<%= cluster_token_file_exists ?",
    " File.read(cluster_token_file_path) : nil %>'\n",
    "  timeout: 1\n",
    "  open_timeout: 1\n",
    "  max_retry: 5\n",
    "  verify_ssl: <%= OpenSSL::SSL::VERIFY_NONE %>\n",
    "  bearer_token: \"\"\n",
);

/// Builds the desired objects of the system component.
pub struct SystemComponent {
    options: SystemOptions,
}

impl SystemComponent {
    pub fn new(options: SystemOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SystemOptions {
        &self.options
    }

    fn meta(&self, name: &str, element: &str) -> ObjectMeta {
        object_meta(
            name,
            &self.options.namespace,
            labels(&self.options.app_label, "system", element),
        )
    }

    // Storage

    pub fn shared_storage(&self, pvc: &PvcOptions) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: self.meta(SHARED_STORAGE, "app"),
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteMany".to_string()]),
                storage_class_name: pvc.storage_class_name.clone(),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(pvc.storage_request.clone()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// AWS credentials for S3 file storage. Keys are left empty for the
    /// administrator to fill in.
    pub fn s3_aws_secret(&self, s3: &S3Options) -> Secret {
        opaque_secret(
            self.meta(&s3.credentials_secret, "app"),
            [
                ("AWS_ACCESS_KEY_ID", String::new()),
                ("AWS_SECRET_ACCESS_KEY", String::new()),
                ("AWS_BUCKET", s3.bucket.clone()),
                ("AWS_REGION", s3.region.clone()),
            ],
        )
    }

    // Services

    fn service(
        &self,
        name: &str,
        element: &str,
        deployment: &str,
        ports: Vec<ServicePort>,
    ) -> Service {
        Service {
            metadata: self.meta(name, element),
            spec: Some(ServiceSpec {
                ports: Some(ports),
                selector: Some(BTreeMap::from([(
                    "deployment".to_string(),
                    deployment.to_string(),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn http_port(target: &str) -> ServicePort {
        ServicePort {
            name: Some("http".to_string()),
            port: 3000,
            protocol: Some("TCP".to_string()),
            target_port: Some(IntOrString::String(target.to_string())),
            ..Default::default()
        }
    }

    pub fn provider_service(&self) -> Service {
        self.service(
            "system-provider",
            "provider-ui",
            APP_DEPLOYMENT,
            vec![Self::http_port("provider")],
        )
    }

    pub fn master_service(&self) -> Service {
        self.service(
            "system-master",
            "master-ui",
            APP_DEPLOYMENT,
            vec![Self::http_port("master")],
        )
    }

    pub fn developer_service(&self) -> Service {
        self.service(
            "system-developer",
            "developer-ui",
            APP_DEPLOYMENT,
            vec![Self::http_port("developer")],
        )
    }

    pub fn sphinx_service(&self) -> Service {
        self.service(
            "system-sphinx",
            "sphinx",
            SPHINX_DEPLOYMENT,
            vec![ServicePort {
                name: Some("sphinx".to_string()),
                port: SPHINX_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(SPHINX_PORT)),
                ..Default::default()
            }],
        )
    }

    pub fn memcached_service(&self) -> Service {
        self.service(
            "system-memcache",
            "memcache",
            "system-memcache",
            vec![ServicePort {
                name: Some("memcache".to_string()),
                port: MEMCACHE_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(MEMCACHE_PORT)),
                ..Default::default()
            }],
        )
    }

    // Workloads

    fn shared_storage_selected(&self) -> bool {
        matches!(self.options.file_storage, Some(FileStorage::Pvc(_)))
    }

    fn common_env(&self) -> Vec<EnvVar> {
        let env = [
            ("AMP_RELEASE", self.options.amp_release.as_str()),
            ("RAILS_ENV", "production"),
            ("RAILS_LOG_TO_STDOUT", "true"),
            ("THREESCALE_SUPERDOMAIN", self.options.wildcard_domain.as_str()),
            ("TENANT_NAME", self.options.tenant_name.as_str()),
        ];
        env.into_iter().map(|(name, value)| env_var(name, value)).collect()
    }

    fn system_container(
        &self,
        name: &str,
        args: &[&str],
        port: Option<(&str, i32)>,
        resources: &ResourceRequirements,
    ) -> Container {
        let mut volume_mounts = Vec::new();
        if self.shared_storage_selected() {
            volume_mounts.push(VolumeMount {
                name: "system-storage".to_string(),
                mount_path: SHARED_STORAGE_MOUNT.to_string(),
                ..Default::default()
            });
        }

        Container {
            name: name.to_string(),
            image: Some(self.options.images.system_image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            args: Some(args.iter().map(|a| a.to_string()).collect()),
            env: Some(self.common_env()),
            ports: port.map(|(port_name, port)| {
                vec![ContainerPort {
                    name: Some(port_name.to_string()),
                    container_port: port,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]
            }),
            resources: Some(resources.clone()),
            volume_mounts: (!volume_mounts.is_empty()).then_some(volume_mounts),
            ..Default::default()
        }
    }

    fn app_container(
        &self,
        name: &str,
        mode: &str,
        port: i32,
        resources: &ResourceRequirements,
    ) -> Container {
        let tenant_mode = format!("TENANT_MODE={mode}");
        let port_arg = format!("PORT={port}");
        self.system_container(
            name,
            &[
                "env",
                tenant_mode.as_str(),
                port_arg.as_str(),
                "container-entrypoint",
                "bundle",
                "exec",
                "unicorn",
                "-c",
                "config/unicorn.rb",
            ],
            Some((mode, port)),
            resources,
        )
    }

    fn deployment(
        &self,
        name: &str,
        element: &str,
        replicas: i32,
        containers: Vec<Container>,
    ) -> Deployment {
        let selector = BTreeMap::from([("deployment".to_string(), name.to_string())]);
        let mut pod_labels = labels(&self.options.app_label, "system", element);
        pod_labels.extend(selector.clone());

        let volumes = self.shared_storage_selected().then(|| {
            vec![Volume {
                name: "system-storage".to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: SHARED_STORAGE.to_string(),
                    read_only: Some(false),
                }),
                ..Default::default()
            }]
        });

        Deployment {
            metadata: self.meta(name, element),
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(selector),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(pod_labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers,
                        volumes,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// `system-app`: master, provider and developer portals in one pod.
    pub fn app_deployment(&self) -> Deployment {
        let resources = &self.options.resources;
        let [master, provider, developer] = APP_CONTAINERS;
        self.deployment(
            APP_DEPLOYMENT,
            "app",
            self.options.app_replicas,
            vec![
                self.app_container(master, "master", 3002, &resources.master),
                self.app_container(provider, "provider", 3000, &resources.provider),
                self.app_container(developer, "developer", 3001, &resources.developer),
            ],
        )
    }

    pub fn sidekiq_deployment(&self) -> Deployment {
        self.deployment(
            SIDEKIQ_DEPLOYMENT,
            "sidekiq",
            self.options.sidekiq_replicas,
            vec![self.system_container(
                "system-sidekiq",
                &["rake", "sidekiq:worker", "RAILS_MAX_THREADS=25"],
                None,
                &self.options.resources.sidekiq,
            )],
        )
    }

    pub fn sphinx_deployment(&self) -> Deployment {
        let mut container = self.system_container(
            "system-sphinx",
            &["rake", "openshift:thinking_sphinx:start"],
            Some(("sphinx", SPHINX_PORT)),
            &self.options.resources.sphinx,
        );
        // Sphinx keeps its index on local disk
        container.volume_mounts = None;
        if let Some(env) = container.env.as_mut() {
            env.push(env_var("THINKING_SPHINX_ADDRESS", "0.0.0.0"));
            env.push(env_var("THINKING_SPHINX_PORT", &SPHINX_PORT.to_string()));
        }

        let mut deployment = self.deployment(SPHINX_DEPLOYMENT, "sphinx", 1, vec![container]);
        if let Some(pod) = deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
        {
            pod.volumes = None;
        }
        deployment
    }

    // Config maps

    fn config_map<'a>(
        &self,
        name: &str,
        entries: impl IntoIterator<Item = (&'a str, String)>,
    ) -> ConfigMap {
        ConfigMap {
            metadata: self.meta(name, "app"),
            data: Some(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn system_config_map(&self) -> ConfigMap {
        self.config_map(
            "system",
            [
                (
                    "zync.yml",
                    ZYNC_YML.to_string(),
                ),
                (
                    "rolling_updates.yml",
                    ROLLING_UPDATES_YML.to_string(),
                ),
                (
                    "service_discovery.yml",
                    SERVICE_DISCOVERY_YML.to_string(),
                ),
            ],
        )
    }

    pub fn environment_config_map(&self) -> ConfigMap {
        self.config_map(
            "system-environment",
            [
                ("AMP_RELEASE", self.options.amp_release.clone()),
                (
                    "APICAST_REGISTRY_URL",
                    "http://apicast-staging:8090/policies".to_string(),
                ),
                ("FORCE_SSL", "true".to_string()),
                ("PROVIDER_PLAN", "enterprise".to_string()),
                ("RAILS_ENV", "production".to_string()),
                ("RAILS_LOG_LEVEL", "info".to_string()),
                ("RAILS_LOG_TO_STDOUT", "true".to_string()),
                ("SSL_CERT_DIR", "/etc/pki/tls/certs".to_string()),
                ("THINKING_SPHINX_PORT", SPHINX_PORT.to_string()),
                (
                    "THREESCALE_SANDBOX_PROXY_OPENSSL_VERIFY_MODE",
                    "VERIFY_NONE".to_string(),
                ),
                ("THREESCALE_SUPERDOMAIN", self.options.wildcard_domain.clone()),
            ],
        )
    }

    pub fn smtp_config_map(&self) -> ConfigMap {
        self.config_map(
            "smtp",
            [
                "address",
                "authentication",
                "domain",
                "openssl.verify.mode",
                "password",
                "port",
                "username",
            ]
            .map(|k| (k, String::new())),
        )
    }

    // Secrets

    fn secret<'a>(
        &self,
        name: &str,
        entries: impl IntoIterator<Item = (&'a str, String)>,
    ) -> Secret {
        opaque_secret(self.meta(name, "app"), entries)
    }

    pub fn events_hook_secret(&self) -> Secret {
        self.secret(
            "system-events-hook",
            [
                (
                    "URL",
                    "http://system-master:3000/master/events/import".to_string(),
                ),
                ("PASSWORD", self.options.secrets.events_hook_password.clone()),
            ],
        )
    }

    pub fn redis_secret(&self) -> Secret {
        self.secret(
            "system-redis",
            [
                ("URL", "redis://system-redis:6379/1".to_string()),
                ("NAMESPACE", String::new()),
                ("MESSAGE_BUS_URL", String::new()),
                ("MESSAGE_BUS_NAMESPACE", String::new()),
            ],
        )
    }

    pub fn master_apicast_secret(&self) -> Secret {
        self.secret(
            "system-master-apicast",
            [
                (
                    "ACCESS_TOKEN",
                    self.options.secrets.master_apicast_access_token.clone(),
                ),
                (
                    "BASE_URL",
                    format!(
                        "http://{}@system-master:3000",
                        self.options.secrets.master_apicast_access_token
                    ),
                ),
                (
                    "PROXY_CONFIGS_ENDPOINT",
                    format!(
                        "http://{}@system-master:3000/master/api/proxy/configs",
                        self.options.secrets.master_apicast_access_token
                    ),
                ),
            ],
        )
    }

    pub fn seed_secret(&self) -> Secret {
        let secrets = &self.options.secrets;
        self.secret(
            "system-seed",
            [
                ("MASTER_DOMAIN", "master".to_string()),
                ("MASTER_ACCESS_TOKEN", secrets.master_access_token.clone()),
                ("MASTER_USER", "master".to_string()),
                ("MASTER_PASSWORD", secrets.master_password.clone()),
                ("ADMIN_ACCESS_TOKEN", secrets.admin_access_token.clone()),
                ("ADMIN_USER", "admin".to_string()),
                ("ADMIN_PASSWORD", secrets.admin_password.clone()),
                ("ADMIN_EMAIL", String::new()),
                ("TENANT_NAME", self.options.tenant_name.clone()),
            ],
        )
    }

    pub fn recaptcha_secret(&self) -> Secret {
        self.secret(
            "system-recaptcha",
            [("PUBLIC_KEY", String::new()), ("PRIVATE_KEY", String::new())],
        )
    }

    pub fn app_secret(&self) -> Secret {
        self.secret(
            "system-app",
            [(
                "SECRET_KEY_BASE",
                self.options.secrets.app_secret_key_base.clone(),
            )],
        )
    }

    pub fn memcached_secret(&self) -> Secret {
        self.secret(
            "system-memcache",
            [("SERVERS", format!("system-memcache:{MEMCACHE_PORT}"))],
        )
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}
