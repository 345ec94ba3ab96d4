pub mod error;
pub mod model;
pub mod service;
pub mod store;

pub use error::AlertError;
pub use model::{Alert, AlertDraft, AlertStatus, AlertType, Severity};
pub use service::AlertService;
pub use store::{AlertStore, SeaOrmAlertStore};
