//! HTTP route handlers for Waggle.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (hero, featured dogs, testimonials)
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (document store reachable)
//!
//! # Auth (rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/signup            - Sign-up page
//! POST /auth/signup            - Sign-up action
//! POST /auth/logout            - Logout action
//!
//! # Dogs
//! GET  /dogs                   - My dogs (requires auth)
//! POST /dogs                   - Create a dog profile (requires auth)
//! GET  /dogs/new               - New dog form (requires auth)
//! GET  /dogs/{id}              - Dog detail
//!
//! # Account
//! GET  /profile                - Profile form (requires auth)
//! POST /profile                - Update display name and photo
//! POST /theme                  - Toggle light/dark theme
//!
//! GET  /static/*               - Static assets
//! ```

pub mod auth;
pub mod dogs;
pub mod health;
pub mod home;
pub mod profile;
pub mod theme;

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{FromRequestParts, Request},
    http::{HeaderName, HeaderValue, StatusCode, header::CACHE_CONTROL, request::Parts},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tower_sessions::Session;

use waggle_core::{Identity, Theme};

use crate::filters;
use crate::middleware::{
    OptionalAuth, auth_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware, session_store_middleware,
};
use crate::models::keys;
use crate::state::AppState;

/// Directory served under `/static`, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/web/static";

// =============================================================================
// Layout
// =============================================================================

/// Data shared by every page layout: header navigation, theme and footer.
#[derive(Debug, Clone, Default)]
pub struct Chrome {
    /// Signed-in user, if any.
    pub user: Option<Identity>,
    /// Theme chosen with the toggle. Without one the page follows the
    /// browser's color scheme.
    pub preference: Option<Theme>,
    /// Color scheme reported by the browser's client hint.
    pub system: Option<Theme>,
    /// Path of the current page, used as the theme toggle's return address.
    pub path: String,
}

impl Chrome {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Theme the page is shown in.
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.preference.or(self.system).unwrap_or_default()
    }

    /// Whether the Admin link belongs in the header.
    #[must_use]
    pub fn is_site_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.is_site_admin)
    }
}

impl<S> FromRequestParts<S> for Chrome
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;

        let preference = match parts.extensions.get::<Session>() {
            Some(session) => session.get::<Theme>(keys::THEME).await.ok().flatten(),
            None => None,
        };

        Ok(Self {
            user,
            preference,
            system: theme::system_theme(&parts.headers),
            path: parts.uri.path().to_string(),
        })
    }
}

/// Not found page template.
#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub chrome: Chrome,
}

/// Render the 404 page.
pub async fn not_found(chrome: Chrome) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate { chrome })
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the dog routes router.
pub fn dog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dogs::index).post(dogs::create))
        .route("/new", get(dogs::new_dog))
        .route("/{id}", get(dogs::show))
}

/// Create all page routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/dogs", dog_routes())
        .route("/profile", get(profile::show).post(profile::update))
        .route("/theme", post(theme::toggle))
}

/// Build the full application with its middleware stack.
///
/// The session layer must wrap the Session Store middleware, which reads
/// the browser session from request extensions.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    // Stylesheet URLs carry a content hash, so assets can be cached for good
    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        ))
        .service(ServeDir::new(STATIC_DIR));

    Router::new()
        .merge(routes())
        .nest_service("/static", static_files)
        .fallback(not_found)
        // Ask browsers for their color scheme so pages without a chosen theme can match it
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("accept-ch"),
            HeaderValue::from_static("Sec-CH-Prefers-Color-Scheme"),
        ))
        .layer(from_fn_with_state(state.clone(), session_store_middleware))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
