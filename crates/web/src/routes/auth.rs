//! Authentication route handlers.
//!
//! Login, sign-up and logout go through the request's Session Store.
//! Failures are kept in the store's state, flashed through the session by
//! the middleware, and shown once on the page the user is redirected to.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{CurrentSession, take_flash_error};
use crate::routes::Chrome;

/// Shown when the login form is submitted with an empty field.
pub const LOGIN_FIELDS_REQUIRED: &str = "Please enter both email and password.";

/// Shown when the sign-up form is submitted with an empty field.
pub const SIGNUP_FIELDS_REQUIRED: &str = "Please fill in all required fields.";

/// Where users land after signing in.
const SIGNED_IN_HOME: &str = "/dogs";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Sign-up form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
}

/// Sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(chrome: Chrome, session: Session) -> impl IntoResponse {
    LoginTemplate {
        chrome,
        error: take_flash_error(&session).await,
    }
}

/// Handle login form submission.
#[instrument(skip(store, form))]
pub async fn login(CurrentSession(store): CurrentSession, Form(form): Form<LoginForm>) -> Redirect {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        store.report_error(LOGIN_FIELDS_REQUIRED);
        return Redirect::to("/auth/login");
    }

    match store.login(email, &form.password).await {
        Ok(()) => Redirect::to(SIGNED_IN_HOME),
        Err(_) => Redirect::to("/auth/login"),
    }
}

// =============================================================================
// Sign-up Routes
// =============================================================================

/// Display the sign-up page.
pub async fn signup_page(chrome: Chrome, session: Session) -> impl IntoResponse {
    SignupTemplate {
        chrome,
        error: take_flash_error(&session).await,
    }
}

/// Handle sign-up form submission.
#[instrument(skip(store, form))]
pub async fn signup(
    CurrentSession(store): CurrentSession,
    Form(form): Form<SignupForm>,
) -> Redirect {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() || form.display_name.trim().is_empty() {
        store.report_error(SIGNUP_FIELDS_REQUIRED);
        return Redirect::to("/auth/signup");
    }

    match store.sign_up(email, &form.password, &form.display_name).await {
        Ok(()) => Redirect::to(SIGNED_IN_HOME),
        Err(_) => Redirect::to("/auth/signup"),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// If the provider refuses, the user stays signed in and the login page
/// shows the error.
#[instrument(skip(store))]
pub async fn logout(CurrentSession(store): CurrentSession) -> Redirect {
    // Failures are recorded in the store state
    let _ = store.logout().await;
    Redirect::to("/auth/login")
}
