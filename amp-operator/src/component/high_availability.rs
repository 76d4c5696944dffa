//! High availability component: external database connection settings.

use k8s_openapi::api::core::v1::Secret;

use super::{labels, object_meta, opaque_secret};
use crate::options::HighAvailabilityOptions;

pub const SYSTEM_DATABASE_SECRET: &str = "system-database";

pub struct HighAvailabilityComponent {
    options: HighAvailabilityOptions,
}

impl HighAvailabilityComponent {
    pub fn new(options: HighAvailabilityOptions) -> Self {
        Self { options }
    }

    /// Connection URL of the external system database.
    pub fn system_database_secret(&self) -> Secret {
        opaque_secret(
            object_meta(
                SYSTEM_DATABASE_SECRET,
                &self.options.namespace,
                labels(&self.options.app_label, "system", "database"),
            ),
            [("URL", self.options.system_database_url.clone())],
        )
    }
}
