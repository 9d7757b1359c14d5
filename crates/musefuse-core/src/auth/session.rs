use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::claims;
use super::error::AuthError;

/// The persisted session record.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    /// Absolute expiry, when the backend told us the lifetime
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

impl SessionData {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
            saved_at: Utc::now(),
        }
    }

    /// Build a record from a login/refresh grant. The lifetime comes from
    /// `expires_in_secs` when present, otherwise from the token's `exp` claim.
    ///
    /// A lifetime that does not fit a timestamp is treated like an unreadable
    /// one. Non-positive lifetimes are kept; the session expires immediately.
    pub fn from_grant(token: &str, expires_in_secs: Option<i64>) -> Result<Self, AuthError> {
        let expires_at = match expires_in_secs {
            Some(secs) => Duration::try_seconds(secs)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or(AuthError::MalformedToken)?,
            None => claims::token_expiry(token)?,
        };
        Ok(Self::new(token, Some(expires_at)))
    }

    /// The deadline to enforce: the stored expiry, or else the token's claim.
    pub fn resolve_expiry(&self) -> Result<DateTime<Utc>, AuthError> {
        match self.expires_at {
            Some(at) => Ok(at),
            None => claims::token_expiry(&self.token),
        }
    }
}
