use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LeadId;

/// How the current session got its lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
    /// The lead was created in this run.
    New,
    /// The lead was loaded from the session store.
    Resumed,
}

/// Expiry rule for stored sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub ttl: Duration,
}

impl SessionPolicy {
    pub const DEFAULT_TTL_DAYS: i64 = 7;

    /// Saturates at [`Duration::MAX`] for counts chrono cannot represent.
    pub fn from_days(days: i64) -> Self {
        Self {
            ttl: Duration::try_days(days).unwrap_or(Duration::MAX),
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_days(Self::DEFAULT_TTL_DAYS)
    }
}

/// The persisted link between a browser session and its remote lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub lead_id: LeadId,
    pub created_at: DateTime<Utc>,
    pub origin: SessionOrigin,
}

impl SessionToken {
    pub fn new(
        lead_id: LeadId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lead_id,
            created_at,
            origin: SessionOrigin::New,
        }
    }

    pub fn is_expired(
        &self,
        now: DateTime<Utc>,
        policy: &SessionPolicy,
    ) -> bool {
        now - self.created_at >= policy.ttl
    }

    /// Picks up a stored token. Returns `None` once it has outlived the policy.
    pub fn resume(
        stored: SessionToken,
        now: DateTime<Utc>,
        policy: &SessionPolicy,
    ) -> Option<SessionToken> {
        if stored.is_expired(now, policy) {
            return None;
        }
        Some(SessionToken {
            origin: SessionOrigin::Resumed,
            ..stored
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
    }

    fn token() -> SessionToken {
        SessionToken::new(LeadId::new("lead-42"), created())
    }

    #[test]
    fn default_ttl_is_seven_days() {
        assert_eq!(SessionPolicy::default().ttl, Duration::days(7));
    }

    #[test]
    fn huge_day_count_saturates() {
        assert_eq!(SessionPolicy::from_days(i64::MAX).ttl, Duration::MAX);
    }

    #[test]
    fn fresh_token_resumes() {
        let now = created() + Duration::days(6);

        let resumed = SessionToken::resume(token(), now, &SessionPolicy::default()).unwrap();

        assert_eq!(resumed.origin, SessionOrigin::Resumed);
        assert_eq!(resumed.lead_id, LeadId::new("lead-42"));
        assert_eq!(resumed.created_at, created());
    }

    #[test]
    fn token_expires_at_ttl() {
        let policy = SessionPolicy::default();

        assert!(!token().is_expired(created() + Duration::days(7) - Duration::seconds(1), &policy));
        assert!(token().is_expired(created() + Duration::days(7), &policy));
        assert_eq!(
            SessionToken::resume(token(), created() + Duration::days(8), &policy),
            None
        );
    }

    #[test]
    fn token_serializes_camel_case() {
        let json = serde_json::to_value(token()).unwrap();

        assert_eq!(json["leadId"], "lead-42");
        assert_eq!(json["origin"], "new");
        assert_eq!(json["createdAt"], "2026-03-02T09:30:00Z");
    }
}
