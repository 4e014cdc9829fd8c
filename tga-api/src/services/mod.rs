//! Domain services

pub mod classifier_client;
pub mod gateway;
pub mod lifecycle;
pub mod users;

pub use classifier_client::{ClassifierClient, DispatchError, HttpClassifierClient};
pub use gateway::{ClassificationGateway, DispatchJob, DispatchOutcome, DispatchWorker};
pub use lifecycle::{Actor, CallbackOutcome, LifecycleManager, ListParams};
pub use users::UserService;
