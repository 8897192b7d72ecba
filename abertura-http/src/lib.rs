//! HTTP adapters for the wizard: the lead API and ViaCEP.

pub mod client;
pub mod error;
pub mod factory;
pub mod leads;
pub mod viacep;

pub use client::JsonClient;
pub use error::HttpError;
pub use factory::{HttpBackendFactory, register};
pub use leads::HttpLeadRepository;
pub use viacep::{VIACEP_URL, ViaCepClient};
