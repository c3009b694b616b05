//! Session Store middleware and authentication extractors.
//!
//! [`session_store_middleware`] builds a [`SessionStore`] for every request
//! from the state saved in the browser's session, hands it to the handler
//! through request extensions, and saves the settled state afterwards.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, error, warn};

use waggle_core::Identity;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::documents::Caller;
use crate::models::{PersistedAuth, keys};
use crate::services::auth::{AuthClient, SessionState, SessionStore};
use crate::state::AppState;

/// Restore the Session Store before the handler and persist it after.
///
/// Requires the session layer to run first.
pub async fn session_store_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let persisted = session
        .get::<PersistedAuth>(keys::AUTH)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable auth session");
            None
        });
    let was_signed_in = persisted.is_some();

    let client = AuthClient::new(state.identity());
    let store = SessionStore::new(client.clone());
    client.resume(persisted).await;

    match store.settle().await.identity {
        Some(identity) => set_sentry_user(&identity.uid, identity.email.as_deref()),
        None => clear_sentry_user(),
    }

    request.extensions_mut().insert(store.clone());
    let response = next.run(request).await;

    let settled = store.settle().await;
    if let Err(e) = persist(&session, &store, &settled, was_signed_in).await {
        error!(error = %e, "Failed to save auth session");
    }

    response
}

async fn persist(
    session: &Session,
    store: &SessionStore,
    settled: &SessionState,
    was_signed_in: bool,
) -> Result<(), tower_sessions::session::Error> {
    match (&settled.identity, store.client().credentials()) {
        (Some(identity), Some(credentials)) => {
            if !was_signed_in {
                // New sign-in: issue a fresh session id
                session.cycle_id().await?;
            }
            session
                .insert(
                    keys::AUTH,
                    PersistedAuth {
                        identity: identity.clone(),
                        credentials,
                    },
                )
                .await?;
        }
        _ if was_signed_in => {
            debug!("Clearing auth session");
            session.remove::<PersistedAuth>(keys::AUTH).await?;
        }
        _ => {}
    }

    if let Some(message) = &settled.error {
        session.insert(keys::FLASH_ERROR, message).await?;
    }

    Ok(())
}

/// Take the error flashed by a previous request, if any.
pub async fn take_flash_error(session: &Session) -> Option<String> {
    session
        .remove::<String>(keys::FLASH_ERROR)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read flashed error");
            None
        })
}

// =============================================================================
// Extractors
// =============================================================================

/// Rejection when the Session Store middleware did not run.
pub struct MissingSessionStore;

impl IntoResponse for MissingSessionStore {
    fn into_response(self) -> Response {
        error!("Session store not found in request extensions - middleware may be misconfigured");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Extractor for the request's Session Store.
///
/// # Example
///
/// ```rust,ignore
/// async fn logout(CurrentSession(store): CurrentSession) -> Redirect {
///     let _ = store.logout().await;
///     Redirect::to("/auth/login")
/// }
/// ```
pub struct CurrentSession(pub SessionStore);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = MissingSessionStore;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionStore>()
            .cloned()
            .map(Self)
            .ok_or(MissingSessionStore)
    }
}

/// Extractor that requires a signed-in user.
///
/// If no one is signed in, redirects to the login page.
pub struct RequireAuth(pub Identity);

/// Error returned when authentication is required but no one is signed in.
pub enum AuthRejection {
    /// Redirect to login page.
    RedirectToLogin,
    /// The middleware did not run.
    MissingStore,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::MissingStore => MissingSessionStore.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(store) = CurrentSession::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection::MissingStore)?;

        store
            .settle()
            .await
            .identity
            .map(Self)
            .ok_or(AuthRejection::RedirectToLogin)
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject the request if no one is signed in.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<SessionStore>() {
            Some(store) => store.settle().await.identity,
            None => None,
        };

        Ok(Self(identity))
    }
}

/// Extractor for the document store caller of this request.
///
/// Carries the signed-in user's id token, or is anonymous.
pub struct DocumentCaller(pub Caller);

impl<S> FromRequestParts<S> for DocumentCaller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = match parts.extensions.get::<SessionStore>() {
            Some(store) => {
                store.settle().await;
                store.caller()
            }
            None => Caller::anonymous(),
        };

        Ok(Self(caller))
    }
}
