//! SQLite-backed [`SessionStore`]: the desktop counterpart of the browser's
//! local storage. Holds at most one session row.

use std::str::FromStr;

use abertura_core::{LeadId, SessionOrigin, SessionStore, SessionStoreError, SessionToken};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tracing::debug;

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Connects to `database_url`, which may be a `sqlite:` URL or a plain
    /// file path. The file is created when missing.
    pub async fn new(database_url: &str) -> Result<Self, SessionStoreError> {
        let url = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| SessionStoreError::Connection(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| SessionStoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date.
    pub async fn open(database_url: &str) -> Result<Self, SessionStoreError> {
        let store = Self::new(database_url).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), SessionStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SessionStoreError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(FromRow)]
struct SessionRow {
    lead_id: String,
    created_at: String,
    origin: String,
}

impl TryFrom<SessionRow> for SessionToken {
    type Error = SessionStoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(SessionToken {
            lead_id: LeadId::new(row.lead_id),
            created_at: parse_datetime(&row.created_at)?,
            origin: parse_origin(&row.origin)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SessionStoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SessionStoreError::Storage(format!("Failed to parse datetime '{}': {}", s, e)))
}

fn parse_origin(s: &str) -> Result<SessionOrigin, SessionStoreError> {
    match s {
        "new" => Ok(SessionOrigin::New),
        "resumed" => Ok(SessionOrigin::Resumed),
        other => Err(SessionStoreError::Storage(format!(
            "Invalid session origin: {}",
            other
        ))),
    }
}

fn origin_str(origin: SessionOrigin) -> &'static str {
    match origin {
        SessionOrigin::New => "new",
        SessionOrigin::Resumed => "resumed",
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT lead_id, created_at, origin FROM wizard_session WHERE slot = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionStoreError::Storage(e.to_string()))?;

        row.map(SessionToken::try_from).transpose()
    }

    async fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        sqlx::query(
            "INSERT INTO wizard_session (slot, lead_id, created_at, origin)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET
                lead_id = excluded.lead_id,
                created_at = excluded.created_at,
                origin = excluded.origin",
        )
        .bind(token.lead_id.as_str())
        .bind(token.created_at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(origin_str(token.origin))
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::Storage(e.to_string()))?;

        debug!(lead_id = %token.lead_id, "session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        sqlx::query("DELETE FROM wizard_session")
            .execute(&self.pool)
            .await
            .map_err(|e| SessionStoreError::Storage(e.to_string()))?;
        Ok(())
    }
}
