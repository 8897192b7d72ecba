//! Ports to the wizard's remote collaborators and their in-memory adapters.

pub mod factory;
pub mod lookup;
pub mod memory;
pub mod repository;
pub mod session_store;

pub use factory::{BackendConfig, BackendRegistry, LeadRepositoryFactory};
pub use lookup::PostalCodeLookup;
pub use memory::{
    InMemoryLeadRepository, InMemorySessionStore, MemoryBackendFactory, Operation, RecordedCall,
    StaticPostalCodeLookup,
};
pub use repository::{ApiError, LeadRepository};
pub use session_store::{SessionStore, SessionStoreError};
