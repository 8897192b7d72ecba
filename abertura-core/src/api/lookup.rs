use async_trait::async_trait;

use crate::api::repository::ApiError;
use crate::models::PostalAddress;

/// Postal-code (CEP) lookup.
#[async_trait]
pub trait PostalCodeLookup: Send + Sync {
    /// Resolves a CEP to an address. `Ok(None)` means the code does not exist.
    async fn lookup(&self, postal_code: &str) -> Result<Option<PostalAddress>, ApiError>;
}
