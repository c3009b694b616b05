//! Session Store: who is signed in for one browser session.
//!
//! The store mirrors the [`AuthClient`] notification stream into a
//! [`SessionState`] held in a `watch` channel. A background task is the
//! only writer of identity transitions:
//!
//! ```text
//! Initializing --notification(user)--> Authenticated
//!      |                                   ^   |
//!      +----notification(none)--> Anonymous +---+ login / logout
//! ```
//!
//! Operations call the provider through the client and only touch the
//! error message and the local profile merge; the identity changes when
//! the resulting notification is mirrored. Call [`SessionStore::settle`] to
//! wait for that.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use waggle_core::{Identity, IdentityPatch};

use super::client::{AuthClient, AuthNotification};
use crate::documents::Caller;
use crate::provider::AuthError;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No notification mirrored yet.
    #[default]
    Initializing,
    /// The last notification carried no user.
    Anonymous,
    /// The last notification carried a user.
    Authenticated,
}

/// Snapshot of the Session Store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    /// Human-readable message from the last failed operation.
    pub error: Option<String>,
    observed_seq: u64,
}

impl SessionState {
    /// True until the first notification has been mirrored.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Initializing
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// Sequence number of the last mirrored notification.
    #[must_use]
    pub const fn observed_seq(&self) -> u64 {
        self.observed_seq
    }

    fn mirror(&mut self, notification: AuthNotification) -> bool {
        if notification.seq <= self.observed_seq {
            return false;
        }

        self.observed_seq = notification.seq;
        self.phase = if notification.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        };
        self.identity = notification.user;
        true
    }
}

/// Session Store for one browser session.
///
/// Cheap to clone; dropping the last clone stops the mirroring task.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    client: AuthClient,
    state: Arc<watch::Sender<SessionState>>,
    mirror: JoinHandle<()>,
}

impl Drop for SessionStoreInner {
    fn drop(&mut self) {
        self.mirror.abort();
    }
}

impl SessionStore {
    /// Create a store in the `Initializing` phase and start mirroring
    /// `client`'s notifications.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let state = Arc::new(state);
        let mirror = tokio::spawn(mirror_notifications(client.subscribe(), Arc::clone(&state)));

        Self {
            inner: Arc::new(SessionStoreInner {
                client,
                state,
                mirror,
            }),
        }
    }

    /// The auth client this store mirrors.
    #[must_use]
    pub fn client(&self) -> &AuthClient {
        &self.inner.client
    }

    /// Document store caller for the signed-in user, anonymous otherwise.
    #[must_use]
    pub fn caller(&self) -> Caller {
        self.inner
            .client
            .credentials()
            .map_or_else(Caller::anonymous, |credentials| Caller::user(credentials.id_token))
    }

    /// Current state, which may lag the latest notification.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait until every notification published so far has been mirrored.
    pub async fn settle(&self) -> SessionState {
        let target = self.inner.client.latest_seq();
        let mut state = self.inner.state.subscribe();

        state
            .wait_for(|s| s.observed_seq >= target)
            .await
            .map_or_else(|_| self.state(), |s| s.clone())
    }

    /// Sign in. The identity is set once the resulting notification is
    /// mirrored.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError`; its message is kept in the state.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.clear_error();
        let result = self.inner.client.sign_in_with_password(email, password).await;
        self.record(result)
    }

    /// Register, set the display name and sign in.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError`; its message is kept in the state.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), AuthError> {
        self.clear_error();
        let display_name = Some(display_name.trim()).filter(|name| !name.is_empty());
        let result = self
            .inner
            .client
            .create_user(email, password, display_name)
            .await;
        self.record(result)
    }

    /// Sign out. The identity clears once the resulting notification is
    /// mirrored.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError`; its message is kept in the state.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.clear_error();
        let result = self.inner.client.sign_out().await;
        self.record(result)
    }

    /// Update the provider profile and merge `patch` into the local
    /// identity. Does nothing when no one is signed in.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError`; its message is kept in the state.
    pub async fn update_profile(&self, patch: &IdentityPatch) -> Result<(), AuthError> {
        if self.settle().await.identity.is_none() {
            return Ok(());
        }

        self.clear_error();
        let result = self.inner.client.update_profile(patch).await;
        self.record(result)?;

        self.inner.state.send_modify(|state| {
            if let Some(identity) = state.identity.as_mut() {
                patch.apply_to(identity);
            }
        });
        Ok(())
    }

    /// Keep a message for inline display, e.g. a form validation failure.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner.state.send_modify(|state| state.error = Some(message));
    }

    fn clear_error(&self) {
        self.inner.state.send_if_modified(|state| state.error.take().is_some());
    }

    fn record(&self, result: Result<(), AuthError>) -> Result<(), AuthError> {
        if let Err(e) = &result {
            warn!(error = %e, "Auth operation failed");
            self.report_error(e.user_message());
        }
        result
    }
}

/// Copy notifications into the session state until the client goes away.
async fn mirror_notifications(
    mut notifications: watch::Receiver<AuthNotification>,
    state: Arc<watch::Sender<SessionState>>,
) {
    loop {
        let notification = notifications.borrow_and_update().clone();
        if notification.seq > 0 {
            let seq = notification.seq;
            if state.send_if_modified(|s| s.mirror(notification)) {
                debug!(seq, "Mirrored auth notification");
            }
        }

        if notifications.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use waggle_core::Email;

    use super::*;
    use crate::models::PersistedAuth;
    use crate::provider::{Credentials, IdentityBackend, MemoryIdentity, SignedIn};

    const PASSWORD: &str = "hunter22";

    fn backend_with_jane() -> MemoryIdentity {
        let backend = MemoryIdentity::new();
        backend
            .add_account(&Email::parse("jane@waggle.dog").unwrap(), PASSWORD, Some("Jane Doe"))
            .unwrap();
        backend
    }

    async fn anonymous_store(backend: Arc<dyn IdentityBackend>) -> SessionStore {
        let store = SessionStore::new(AuthClient::new(backend));
        store.client().resume(None).await;
        store
    }

    #[tokio::test]
    async fn test_starts_initializing() {
        let store = SessionStore::new(AuthClient::new(Arc::new(MemoryIdentity::new())));
        let state = store.settle().await;
        assert!(state.is_loading());
        assert!(state.identity.is_none());
    }

    #[tokio::test]
    async fn test_first_empty_notification_is_anonymous() {
        let store = anonymous_store(Arc::new(MemoryIdentity::new())).await;
        let state = store.settle().await;
        assert_eq!(state.phase, SessionPhase::Anonymous);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let store = anonymous_store(Arc::new(backend_with_jane())).await;

        store.login("jane@waggle.dog", PASSWORD).await.unwrap();
        let state = store.settle().await;
        assert!(state.is_authenticated());
        assert_eq!(
            state.identity.as_ref().unwrap().email.as_deref(),
            Some("jane@waggle.dog")
        );

        store.logout().await.unwrap();
        let state = store.settle().await;
        assert_eq!(state.phase, SessionPhase::Anonymous);
        assert!(state.identity.is_none());
    }

    #[tokio::test]
    async fn test_caller_carries_id_token_while_signed_in() {
        use secrecy::ExposeSecret;

        let store = anonymous_store(Arc::new(backend_with_jane())).await;
        assert!(store.caller().id_token().is_none());

        store.login("jane@waggle.dog", PASSWORD).await.unwrap();
        let credentials = store.client().credentials().unwrap();
        assert_eq!(
            store.caller().id_token().map(|t| t.expose_secret().to_string()),
            Some(credentials.id_token.expose_secret().to_string())
        );

        store.logout().await.unwrap();
        store.settle().await;
        assert!(store.caller().id_token().is_none());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_message() {
        let store = anonymous_store(Arc::new(backend_with_jane())).await;

        let result = store.login("jane@waggle.dog", "wrong-password").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let state = store.settle().await;
        assert_eq!(state.phase, SessionPhase::Anonymous);
        assert_eq!(state.error.as_deref(), Some("Invalid email or password."));

        // The next operation clears the message.
        store.login("jane@waggle.dog", PASSWORD).await.unwrap();
        assert!(store.settle().await.error.is_none());
    }

    #[tokio::test]
    async fn test_settled_phase_follows_last_operation() {
        let store = anonymous_store(Arc::new(backend_with_jane())).await;
        let operations = [true, true, false, true, false, false, true];

        for login in operations {
            if login {
                store.login("jane@waggle.dog", PASSWORD).await.unwrap();
            } else {
                store.logout().await.unwrap();
            }
            let state = store.settle().await;
            assert_eq!(state.is_authenticated(), login);
            assert_eq!(state.identity.is_some(), login);
            assert_eq!(state.observed_seq(), store.client().latest_seq());
        }
    }

    #[tokio::test]
    async fn test_sign_up_authenticates_with_display_name() {
        let store = anonymous_store(Arc::new(MemoryIdentity::new())).await;

        store
            .sign_up("max@waggle.dog", PASSWORD, "  Max Power ")
            .await
            .unwrap();

        let identity = store.settle().await.identity.unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("Max Power"));
        assert_eq!(identity.initials(), "MP");
    }

    #[tokio::test]
    async fn test_update_profile_without_user_is_noop() {
        let store = anonymous_store(Arc::new(MemoryIdentity::new())).await;
        let patch = IdentityPatch {
            display_name: Some("Ghost".to_string()),
            ..IdentityPatch::default()
        };

        store.update_profile(&patch).await.unwrap();
        let state = store.settle().await;
        assert!(state.identity.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_update_profile_merges_without_notification() {
        let backend = backend_with_jane();
        let store = anonymous_store(Arc::new(backend.clone())).await;
        store.login("jane@waggle.dog", PASSWORD).await.unwrap();
        store.settle().await;
        let seq_before = store.client().latest_seq();

        let patch = IdentityPatch {
            display_name: Some("Jane Smith".to_string()),
            photo_url: Some("https://img.example/jane.png".to_string()),
            ..IdentityPatch::default()
        };
        store.update_profile(&patch).await.unwrap();

        let identity = store.state().identity.unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("Jane Smith"));
        assert_eq!(identity.photo_url.as_deref(), Some("https://img.example/jane.png"));
        assert_eq!(store.client().latest_seq(), seq_before);
        assert_eq!(
            backend.account(&identity.uid).unwrap().display_name.as_deref(),
            Some("Jane Smith")
        );
    }

    #[tokio::test]
    async fn test_resume_with_revoked_session_is_anonymous() {
        let backend = MemoryIdentity::new().with_token_lifetime(0);
        let signed_in = backend
            .sign_up(&Email::parse("jane@waggle.dog").unwrap(), PASSWORD)
            .await
            .unwrap();
        backend.revoke_sessions(&signed_in.identity.uid);

        let store = SessionStore::new(AuthClient::new(Arc::new(backend)));
        store
            .client()
            .resume(Some(PersistedAuth {
                identity: signed_in.identity,
                credentials: signed_in.credentials,
            }))
            .await;

        assert_eq!(store.settle().await.phase, SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let store = anonymous_store(Arc::new(backend_with_jane())).await;
        store.settle().await;
        let mut states = store.subscribe();

        store.login("jane@waggle.dog", PASSWORD).await.unwrap();
        let state = states
            .wait_for(SessionState::is_authenticated)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.identity.unwrap().label(), "Jane Doe");
    }

    /// Backend whose sign-out always fails.
    struct StuckSignOut(MemoryIdentity);

    #[async_trait]
    impl IdentityBackend for StuckSignOut {
        async fn sign_in_with_password(
            &self,
            email: &Email,
            password: &str,
        ) -> Result<SignedIn, AuthError> {
            self.0.sign_in_with_password(email, password).await
        }

        async fn sign_up(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError> {
            self.0.sign_up(email, password).await
        }

        async fn update_profile(
            &self,
            credentials: &Credentials,
            patch: &IdentityPatch,
        ) -> Result<(), AuthError> {
            self.0.update_profile(credentials, patch).await
        }

        async fn refresh(&self, credentials: &Credentials) -> Result<Credentials, AuthError> {
            self.0.refresh(credentials).await
        }

        async fn sign_out(&self, _credentials: &Credentials) -> Result<(), AuthError> {
            Err(AuthError::Provider("UNAVAILABLE".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_logout_stays_authenticated() {
        let store = anonymous_store(Arc::new(StuckSignOut(backend_with_jane()))).await;
        store.login("jane@waggle.dog", PASSWORD).await.unwrap();

        assert!(store.logout().await.is_err());
        let state = store.settle().await;
        assert!(state.is_authenticated());
        assert_eq!(
            state.error.as_deref(),
            Some("Something went wrong. Please try again.")
        );
    }
}
