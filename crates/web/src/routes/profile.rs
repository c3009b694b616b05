//! Profile route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::Query,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use waggle_core::{Identity, IdentityPatch};

use crate::filters;
use crate::middleware::{CurrentSession, RequireAuth, take_flash_error};
use crate::routes::Chrome;

/// Profile form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileForm {
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
}

impl ProfileForm {
    /// Fields left blank are not changed.
    #[must_use]
    pub fn patch(&self) -> IdentityPatch {
        let keep = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());
        IdentityPatch {
            display_name: keep(&self.display_name),
            photo_url: keep(&self.photo_url),
            ..IdentityPatch::default()
        }
    }
}

/// Query parameters after a save.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub saved: Option<bool>,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub chrome: Chrome,
    pub identity: Identity,
    pub error: Option<String>,
    pub saved: bool,
}

/// Display the profile form.
pub async fn show(
    RequireAuth(identity): RequireAuth,
    chrome: Chrome,
    session: Session,
    Query(query): Query<ProfileQuery>,
) -> impl IntoResponse {
    let error = take_flash_error(&session).await;
    ProfileTemplate {
        chrome,
        identity,
        saved: error.is_none() && query.saved.unwrap_or(false),
        error,
    }
}

/// Update the display name and avatar.
#[instrument(skip(store, form))]
pub async fn update(
    RequireAuth(_): RequireAuth,
    CurrentSession(store): CurrentSession,
    Form(form): Form<ProfileForm>,
) -> Redirect {
    match store.update_profile(&form.patch()).await {
        Ok(()) => Redirect::to("/profile?saved=true"),
        Err(_) => Redirect::to("/profile"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_left_alone() {
        let form = ProfileForm {
            display_name: "  Sam  ".to_string(),
            photo_url: "   ".to_string(),
        };
        let patch = form.patch();
        assert_eq!(patch.display_name.as_deref(), Some("Sam"));
        assert!(patch.photo_url.is_none());
        assert!(patch.email.is_none());
    }
}
