//! Auth provider boundary.
//!
//! # Architecture
//!
//! - [`IdentityBackend`] is the request side of the hosted auth provider:
//!   password sign-in, registration, profile updates, token refresh and
//!   sign-out. It is shared by every request and holds no user state.
//! - The per-browser "current user" and its change notifications live in
//!   [`crate::services::auth::AuthClient`], which wraps a backend.
//!
//! # Implementations
//!
//! - [`IdentityToolkitClient`] - Firebase Identity Toolkit and Secure Token REST APIs
//! - [`MemoryIdentity`] - in-process accounts with argon2 hashes (development, tests)

mod error;
pub mod memory;
pub mod toolkit;

pub use error::AuthError;
pub use memory::MemoryIdentity;
pub use toolkit::IdentityToolkitClient;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use waggle_core::{Email, Identity, IdentityPatch, UserUid};

/// Tokens are refreshed this long before their stated expiry.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Tokens proving a signed-in session with the provider.
///
/// Implements `Debug` manually to redact tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// User the tokens belong to.
    pub uid: UserUid,
    /// Short-lived id token sent with provider requests.
    #[serde(with = "secret_string")]
    pub id_token: SecretString,
    /// Long-lived token exchanged for a fresh id token.
    #[serde(with = "secret_string")]
    pub refresh_token: SecretString,
    /// When the id token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// Build credentials from a token response with a lifetime in seconds.
    #[must_use]
    pub fn issued(
        uid: UserUid,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
        lifetime_seconds: i64,
    ) -> Self {
        Self {
            uid,
            id_token: SecretString::from(id_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            expires_at: Utc::now() + Duration::seconds(lifetime_seconds),
        }
    }

    /// Whether the id token should be refreshed before use at `now`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= self.expires_at
    }

    /// Whether two credentials carry the same id token.
    #[must_use]
    pub fn same_token(&self, other: &Self) -> bool {
        self.id_token.expose_secret() == other.id_token.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful sign-in or registration.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: Identity,
    pub credentials: Credentials,
}

/// Request operations against the hosted auth provider.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the provider rejects the pair.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<SignedIn, AuthError>;

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` or `AuthError::WeakPassword`
    /// when the provider refuses the registration.
    async fn sign_up(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError>;

    /// Update the provider-held display name and photo URL.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the id token is no longer valid.
    async fn update_profile(
        &self,
        credentials: &Credentials,
        patch: &IdentityPatch,
    ) -> Result<(), AuthError>;

    /// Exchange the refresh token for a new id token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the refresh token was revoked.
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials, AuthError>;

    /// End the provider session.
    ///
    /// # Errors
    ///
    /// Returns an `AuthError` if the provider could not be reached.
    async fn sign_out(&self, credentials: &Credentials) -> Result<(), AuthError>;
}

/// Serde helpers for storing secrets in the server-side session.
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_refresh_with_skew() {
        let credentials = Credentials::issued(UserUid::new("u1"), "id", "refresh", 3600);
        assert!(!credentials.needs_refresh(Utc::now()));
        assert!(credentials.needs_refresh(Utc::now() + Duration::seconds(3560)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credentials = Credentials::issued(UserUid::new("u1"), "id-abc", "refresh-xyz", 3600);
        let debug_output = format!("{credentials:?}");
        assert!(debug_output.contains("u1"));
        assert!(!debug_output.contains("id-abc"));
        assert!(!debug_output.contains("refresh-xyz"));
    }

    #[test]
    fn test_session_serialization_keeps_tokens() {
        let credentials = Credentials::issued(UserUid::new("u1"), "id-abc", "refresh-xyz", 3600);
        let json = serde_json::to_string(&credentials).unwrap();
        let restored: Credentials = serde_json::from_str(&json).unwrap();
        assert!(restored.same_token(&credentials));
        assert_eq!(restored.refresh_token.expose_secret(), "refresh-xyz");
    }
}
