pub mod api;
pub mod autosave;
pub mod calculations;
pub mod config;
pub mod form;
pub mod models;
pub mod session;
pub mod stepper;
pub mod validation;

pub use api::{ApiError, LeadRepository, PostalCodeLookup, SessionStore, SessionStoreError};
pub use autosave::SaveStatus;
pub use config::{ConfigError, WizardConfig};
pub use models::*;
pub use session::{SessionOrigin, SessionPolicy, SessionToken};
pub use stepper::{Notice, PaymentView, Step, Transition, Wizard, WizardError, WizardParts};
