pub mod apimanager;
pub mod clients;
pub mod component;
pub mod diff;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod quantity;
pub mod reconciler;
pub mod strategy;
pub mod test_util;

pub use apimanager::ApiManager;
pub use clients::{Client, KubeClient, ManagedResource, ObjectKey};
pub use error::{ClientError, Defect, ReconcileError};
pub use options::ImageProvider;
pub use orchestrator::{Orchestrator, ReconcileReport, Step, StepStatus};
pub use reconciler::system::SystemReconciler;
pub use reconciler::{ObjectReconciler, Outcome};
