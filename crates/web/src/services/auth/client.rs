//! Per-session auth client.
//!
//! Holds the provider credentials for one browser session and publishes an
//! [`AuthNotification`] every time the signed-in user changes, the way the
//! provider's client SDK reports auth state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use waggle_core::{Email, Identity, IdentityPatch};

use crate::models::PersistedAuth;
use crate::provider::{AuthError, Credentials, IdentityBackend};

/// A change in who is signed in.
///
/// `seq` starts at 0 ("nothing delivered yet") and increases by one per
/// notification. Receivers may skip intermediate values but never see the
/// same `seq` twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthNotification {
    pub seq: u64,
    pub user: Option<Identity>,
}

/// Auth client for one browser session.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    backend: Arc<dyn IdentityBackend>,
    credentials: Mutex<Option<Credentials>>,
    notifications: watch::Sender<AuthNotification>,
}

impl AuthClient {
    /// Create a client with no user and no notification delivered yet.
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        let (notifications, _) = watch::channel(AuthNotification::default());

        Self {
            inner: Arc::new(AuthClientInner {
                backend,
                credentials: Mutex::new(None),
                notifications,
            }),
        }
    }

    /// Subscribe to auth state notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthNotification> {
        self.inner.notifications.subscribe()
    }

    /// Sequence number of the most recent notification.
    #[must_use]
    pub fn latest_seq(&self) -> u64 {
        self.inner.notifications.borrow().seq
    }

    /// Credentials of the signed-in user, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credentials>> {
        self.inner
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, user: Option<Identity>, credentials: Option<Credentials>) {
        *self.lock() = credentials;
        self.inner.notifications.send_modify(|notification| {
            notification.seq += 1;
            notification.user = user;
        });
    }

    /// Restore the state saved by a previous request and deliver the first
    /// notification.
    ///
    /// Expired id tokens are refreshed first. If the refresh fails the
    /// session has expired and an absent user is delivered.
    #[instrument(skip_all)]
    pub async fn resume(&self, persisted: Option<PersistedAuth>) {
        let Some(PersistedAuth {
            identity,
            credentials,
        }) = persisted
        else {
            self.publish(None, None);
            return;
        };

        if !credentials.needs_refresh(Utc::now()) {
            self.publish(Some(identity), Some(credentials));
            return;
        }

        match self.inner.backend.refresh(&credentials).await {
            Ok(fresh) if fresh.uid == identity.uid => {
                debug!(uid = %identity.uid, "Refreshed expired id token");
                self.publish(Some(identity), Some(fresh));
            }
            Ok(fresh) => {
                warn!(expected = %identity.uid, got = %fresh.uid, "Refresh returned a different user");
                self.publish(None, None);
            }
            Err(e) => {
                warn!(uid = %identity.uid, error = %e, "Session expired, token refresh failed");
                self.publish(None, None);
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email is malformed, or the
    /// provider's error if it rejects the credentials.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let signed_in = self
            .inner
            .backend
            .sign_in_with_password(&email, password)
            .await?;

        self.publish(Some(signed_in.identity), Some(signed_in.credentials));
        Ok(())
    }

    /// Register a new account, set its display name and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email is malformed, or the
    /// provider's error if it refuses the registration.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let mut signed_in = self.inner.backend.sign_up(&email, password).await?;

        if let Some(name) = display_name {
            let patch = IdentityPatch {
                display_name: Some(name.to_string()),
                ..IdentityPatch::default()
            };
            self.inner
                .backend
                .update_profile(&signed_in.credentials, &patch)
                .await?;
            patch.apply_to(&mut signed_in.identity);
        }

        self.publish(Some(signed_in.identity), Some(signed_in.credentials));
        Ok(())
    }

    /// End the provider session and deliver an absent user.
    ///
    /// Does nothing when no user is signed in.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; the user stays signed in.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(credentials) = self.credentials() else {
            return Ok(());
        };

        self.inner.backend.sign_out(&credentials).await?;
        self.publish(None, None);
        Ok(())
    }

    /// Send the provider-held fields of `patch` to the provider.
    ///
    /// Does not deliver a notification.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a user, or the provider's error.
    pub async fn update_profile(&self, patch: &IdentityPatch) -> Result<(), AuthError> {
        let mut credentials = self.credentials().ok_or(AuthError::NotSignedIn)?;

        if !patch.touches_provider() {
            return Ok(());
        }

        if credentials.needs_refresh(Utc::now()) {
            credentials = self.inner.backend.refresh(&credentials).await?;
            *self.lock() = Some(credentials.clone());
        }

        self.inner.backend.update_profile(&credentials, patch).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::MemoryIdentity;

    fn client_with(backend: &MemoryIdentity) -> AuthClient {
        AuthClient::new(Arc::new(backend.clone()))
    }

    #[tokio::test]
    async fn test_nothing_delivered_before_resume() {
        let client = client_with(&MemoryIdentity::new());
        assert_eq!(client.latest_seq(), 0);

        client.resume(None).await;
        let notification = client.subscribe().borrow().clone();
        assert_eq!(notification.seq, 1);
        assert!(notification.user.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_publishes_user() {
        let backend = MemoryIdentity::new();
        backend
            .add_account(&Email::parse("jane@waggle.dog").unwrap(), "hunter22", Some("Jane"))
            .unwrap();
        let client = client_with(&backend);
        let mut notifications = client.subscribe();

        client
            .sign_in_with_password("jane@waggle.dog", "hunter22")
            .await
            .unwrap();

        assert!(notifications.has_changed().unwrap());
        let notification = notifications.borrow_and_update().clone();
        assert_eq!(notification.seq, 1);
        assert_eq!(notification.user.unwrap().display_name.as_deref(), Some("Jane"));
        assert!(client.credentials().is_some());
    }

    #[tokio::test]
    async fn test_rejected_sign_in_publishes_nothing() {
        let client = client_with(&MemoryIdentity::new());
        let result = client.sign_in_with_password("jane@waggle.dog", "nope").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert_eq!(client.latest_seq(), 0);

        let result = client.sign_in_with_password("not-an-email", "nope").await;
        assert!(matches!(result, Err(AuthError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_create_user_sets_display_name() {
        let backend = MemoryIdentity::new();
        let client = client_with(&backend);

        client
            .create_user("max@waggle.dog", "hunter22", Some("Max"))
            .await
            .unwrap();

        let user = client.subscribe().borrow().user.clone().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Max"));
        assert_eq!(
            backend.account(&user.uid).unwrap().display_name.as_deref(),
            Some("Max")
        );
    }

    #[tokio::test]
    async fn test_sign_out_publishes_absent_user() {
        let client = client_with(&MemoryIdentity::new());
        client.create_user("max@waggle.dog", "hunter22", None).await.unwrap();

        client.sign_out().await.unwrap();
        let notification = client.subscribe().borrow().clone();
        assert_eq!(notification.seq, 2);
        assert!(notification.user.is_none());
        assert!(client.credentials().is_none());
    }

    #[tokio::test]
    async fn test_resume_refreshes_expired_token() {
        let backend = MemoryIdentity::new().with_token_lifetime(0);
        let signed_in = backend
            .sign_up(&Email::parse("jane@waggle.dog").unwrap(), "hunter22")
            .await
            .unwrap();
        let client = client_with(&backend);

        client
            .resume(Some(PersistedAuth {
                identity: signed_in.identity.clone(),
                credentials: signed_in.credentials.clone(),
            }))
            .await;

        assert_eq!(client.subscribe().borrow().user, Some(signed_in.identity));
        assert!(!client.credentials().unwrap().same_token(&signed_in.credentials));
    }

    #[tokio::test]
    async fn test_update_profile_requires_user() {
        let client = client_with(&MemoryIdentity::new());
        let patch = IdentityPatch {
            display_name: Some("Jane".to_string()),
            ..IdentityPatch::default()
        };
        assert!(matches!(
            client.update_profile(&patch).await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
