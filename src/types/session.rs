//! Session and snapshot types.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::Profile;

/// Authenticated identity token set.
///
/// Replaced wholesale on every auth event; never mutated in place.
#[derive(Clone)]
pub struct Session {
    /// Subject identifier of the signed-in user.
    pub subject: String,
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    /// Expiration time.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create new session.
    pub fn new(
        subject: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            subject: subject.into(),
            access_token: SecretString::new(access_token.into()),
            refresh_token: refresh_token.map(SecretString::new),
            expires_at,
        }
    }

    /// Get access token value.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Get refresh token value.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// Check if session is expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| exp <= Utc::now())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("subject", &self.subject)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Sign-up request passed to the auth provider.
#[derive(Clone)]
pub struct SignUpRequest {
    pub identifier: String,
    pub secret: SecretString,
    pub display_name: String,
}

impl std::fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// What consumers of the session layer observe.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Arc<Profile>>,
    /// True until the first coalesced event has been fully processed.
    pub loading: bool,
    pub is_demo_mode: bool,
}

impl SessionSnapshot {
    /// Snapshot before anything has been processed.
    pub fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
            is_demo_mode: false,
        }
    }

    /// Subject of the current session, if any.
    pub fn subject(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.subject.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_redacts_tokens() {
        let session = Session::new("user-1", "secret-access", Some("secret-refresh".into()), None);
        let debug = format!("{:?}", session);
        assert!(debug.contains("user-1"));
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert_eq!(session.access_token(), "secret-access");
        assert_eq!(session.refresh_token(), Some("secret-refresh"));
    }

    #[test]
    fn test_is_expired() {
        let live = Session::new("u", "t", None, Some(Utc::now() + Duration::minutes(5)));
        let dead = Session::new("u", "t", None, Some(Utc::now() - Duration::minutes(5)));
        assert!(!live.is_expired());
        assert!(dead.is_expired());
        assert!(!Session::new("u", "t", None, None).is_expired());
    }
}
