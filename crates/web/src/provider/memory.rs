//! In-process identity backend.
//!
//! Accounts live in a `HashMap` for the lifetime of the process. Passwords
//! are hashed with Argon2id and tokens are random base64 strings, so the
//! session and refresh paths behave like the hosted provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use secrecy::ExposeSecret;

use waggle_core::{Email, Identity, IdentityPatch, UserUid};

use super::{AuthError, Credentials, IdentityBackend, SignedIn};

/// Minimum password length, matching the hosted provider's policy.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Default id token lifetime in seconds.
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;

struct Account {
    identity: Identity,
    password_hash: String,
}

#[derive(Default)]
struct Accounts {
    by_uid: HashMap<UserUid, Account>,
    /// Lowercased email to uid.
    emails: HashMap<String, UserUid>,
    /// Live id tokens with their expiry.
    id_tokens: HashMap<String, (UserUid, DateTime<Utc>)>,
    /// Live refresh tokens.
    refresh_tokens: HashMap<String, UserUid>,
}

/// Identity backend holding accounts in memory.
#[derive(Clone)]
pub struct MemoryIdentity {
    accounts: Arc<Mutex<Accounts>>,
    token_lifetime_seconds: i64,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(Mutex::new(Accounts::default())),
            token_lifetime_seconds: DEFAULT_TOKEN_LIFETIME_SECONDS,
        }
    }

    /// Issue id tokens valid for `seconds` instead of an hour.
    #[must_use]
    pub const fn with_token_lifetime(mut self, seconds: i64) -> Self {
        self.token_lifetime_seconds = seconds;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Accounts> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account without signing it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is taken, or
    /// `AuthError::WeakPassword` if the password is too short.
    pub fn add_account(
        &self,
        email: &Email,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;
        let key = email.as_str().to_lowercase();

        let mut accounts = self.lock();
        if accounts.emails.contains_key(&key) {
            return Err(AuthError::UserAlreadyExists);
        }

        let mut identity = Identity::new(UserUid::new(uuid::Uuid::new_v4().simple().to_string()));
        identity.email = Some(email.as_str().to_string());
        identity.display_name = display_name.map(String::from);

        accounts.emails.insert(key, identity.uid.clone());
        accounts.by_uid.insert(
            identity.uid.clone(),
            Account {
                identity: identity.clone(),
                password_hash,
            },
        );

        Ok(identity)
    }

    /// Set the site admin claim on an account.
    pub fn set_site_admin(&self, uid: &UserUid, is_site_admin: bool) {
        if let Some(account) = self.lock().by_uid.get_mut(uid) {
            account.identity.is_site_admin = is_site_admin;
        }
    }

    /// Invalidate every token issued to `uid`, as if the account's
    /// sessions were revoked.
    pub fn revoke_sessions(&self, uid: &UserUid) {
        let mut accounts = self.lock();
        accounts.id_tokens.retain(|_, (owner, _)| owner != uid);
        accounts.refresh_tokens.retain(|_, owner| owner != uid);
    }

    /// Current stored identity for `uid`.
    #[must_use]
    pub fn account(&self, uid: &UserUid) -> Option<Identity> {
        self.lock()
            .by_uid
            .get(uid)
            .map(|account| account.identity.clone())
    }

    fn issue(&self, accounts: &mut Accounts, uid: &UserUid) -> Credentials {
        let credentials = Credentials::issued(
            uid.clone(),
            random_token(),
            random_token(),
            self.token_lifetime_seconds,
        );
        accounts.id_tokens.insert(
            credentials.id_token.expose_secret().to_string(),
            (uid.clone(), credentials.expires_at),
        );
        accounts.refresh_tokens.insert(
            credentials.refresh_token.expose_secret().to_string(),
            uid.clone(),
        );
        credentials
    }
}

#[async_trait]
impl IdentityBackend for MemoryIdentity {
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        let key = email.as_str().to_lowercase();
        let (uid, password_hash) = {
            let accounts = self.lock();
            let uid = accounts
                .emails
                .get(&key)
                .ok_or(AuthError::InvalidCredentials)?;
            let account = accounts
                .by_uid
                .get(uid)
                .ok_or(AuthError::InvalidCredentials)?;
            (uid.clone(), account.password_hash.clone())
        };

        verify_password(password, &password_hash)?;

        let mut accounts = self.lock();
        let identity = accounts
            .by_uid
            .get(&uid)
            .map(|account| account.identity.clone())
            .ok_or(AuthError::InvalidCredentials)?;
        let credentials = self.issue(&mut accounts, &uid);

        Ok(SignedIn {
            identity,
            credentials,
        })
    }

    async fn sign_up(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError> {
        let identity = self.add_account(email, password, None)?;
        let credentials = self.issue(&mut self.lock(), &identity.uid);

        Ok(SignedIn {
            identity,
            credentials,
        })
    }

    async fn update_profile(
        &self,
        credentials: &Credentials,
        patch: &IdentityPatch,
    ) -> Result<(), AuthError> {
        let mut accounts = self.lock();

        let valid = accounts
            .id_tokens
            .get(credentials.id_token.expose_secret())
            .is_some_and(|(uid, expires_at)| *uid == credentials.uid && *expires_at > Utc::now());
        if !valid {
            return Err(AuthError::SessionExpired);
        }

        let account = accounts
            .by_uid
            .get_mut(&credentials.uid)
            .ok_or(AuthError::SessionExpired)?;
        if let Some(name) = &patch.display_name {
            account.identity.display_name = Some(name.clone());
        }
        if let Some(url) = &patch.photo_url {
            account.identity.photo_url = Some(url.clone());
        }

        Ok(())
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials, AuthError> {
        let mut accounts = self.lock();

        let uid = accounts
            .refresh_tokens
            .remove(credentials.refresh_token.expose_secret())
            .ok_or(AuthError::SessionExpired)?;
        if !accounts.by_uid.contains_key(&uid) {
            return Err(AuthError::SessionExpired);
        }
        accounts
            .id_tokens
            .remove(credentials.id_token.expose_secret());

        Ok(self.issue(&mut accounts, &uid))
    }

    async fn sign_out(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let mut accounts = self.lock();
        accounts
            .id_tokens
            .remove(credentials.id_token.expose_secret());
        accounts
            .refresh_tokens
            .remove(credentials.refresh_token.expose_secret());
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password should be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let backend = MemoryIdentity::new();
        let signed_up = backend
            .sign_up(&email("jane@waggle.dog"), "hunter22")
            .await
            .unwrap();

        let signed_in = backend
            .sign_in_with_password(&email("JANE@waggle.dog"), "hunter22")
            .await
            .unwrap();

        assert_eq!(signed_up.identity.uid, signed_in.identity.uid);
        assert_eq!(signed_in.identity.email.as_deref(), Some("jane@waggle.dog"));
        assert!(!signed_in.credentials.same_token(&signed_up.credentials));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let backend = MemoryIdentity::new();
        backend
            .add_account(&email("jane@waggle.dog"), "hunter22", None)
            .unwrap();

        let result = backend
            .sign_in_with_password(&email("jane@waggle.dog"), "hunter23")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let result = backend
            .sign_in_with_password(&email("nobody@waggle.dog"), "hunter22")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_duplicate_and_weak_sign_up() {
        let backend = MemoryIdentity::new();
        backend
            .sign_up(&email("jane@waggle.dog"), "hunter22")
            .await
            .unwrap();

        let duplicate = backend.sign_up(&email("jane@waggle.dog"), "hunter22").await;
        assert!(matches!(duplicate, Err(AuthError::UserAlreadyExists)));

        let weak = backend.sign_up(&email("max@waggle.dog"), "abc").await;
        assert!(matches!(weak, Err(AuthError::WeakPassword(_))));
    }

    #[tokio::test]
    async fn test_update_profile_needs_live_token() {
        let backend = MemoryIdentity::new();
        let signed_in = backend
            .sign_up(&email("jane@waggle.dog"), "hunter22")
            .await
            .unwrap();

        let patch = IdentityPatch {
            display_name: Some("Jane".to_string()),
            ..IdentityPatch::default()
        };
        backend
            .update_profile(&signed_in.credentials, &patch)
            .await
            .unwrap();
        assert_eq!(
            backend
                .account(&signed_in.identity.uid)
                .unwrap()
                .display_name
                .as_deref(),
            Some("Jane")
        );

        backend.sign_out(&signed_in.credentials).await.unwrap();
        let result = backend.update_profile(&signed_in.credentials, &patch).await;
        assert!(matches!(result, Err(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let backend = MemoryIdentity::new();
        let signed_in = backend
            .sign_up(&email("jane@waggle.dog"), "hunter22")
            .await
            .unwrap();

        let refreshed = backend.refresh(&signed_in.credentials).await.unwrap();
        assert_eq!(refreshed.uid, signed_in.identity.uid);
        assert!(!refreshed.same_token(&signed_in.credentials));

        // The old refresh token is spent.
        let reused = backend.refresh(&signed_in.credentials).await;
        assert!(matches!(reused, Err(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_revoked_sessions_cannot_refresh() {
        let backend = MemoryIdentity::new();
        let signed_in = backend
            .sign_up(&email("jane@waggle.dog"), "hunter22")
            .await
            .unwrap();

        backend.revoke_sessions(&signed_in.identity.uid);
        let result = backend.refresh(&signed_in.credentials).await;
        assert!(matches!(result, Err(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_short_token_lifetime_needs_refresh() {
        let backend = MemoryIdentity::new().with_token_lifetime(0);
        let signed_in = backend
            .sign_up(&email("jane@waggle.dog"), "hunter22")
            .await
            .unwrap();
        assert!(signed_in.credentials.needs_refresh(Utc::now()));
    }
}
