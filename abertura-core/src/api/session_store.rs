use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionToken;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Local persistence of the resumable session (the browser's local storage
/// in the web front-end).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<SessionToken>, SessionStoreError>;
    async fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError>;
    async fn clear(&self) -> Result<(), SessionStoreError>;
}
