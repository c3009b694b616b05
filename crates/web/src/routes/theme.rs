//! Theme toggle route handler.

use axum::{Form, http::HeaderMap, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use waggle_core::Theme;

use crate::error::Result;
use crate::models::keys;

/// Theme toggle form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ThemeForm {
    /// Page to return to.
    pub redirect_to: String,
}

/// Client hint carrying the browser's preferred color scheme, sent once a
/// response has listed it in `Accept-CH`.
pub const COLOR_SCHEME_HINT: &str = "sec-ch-prefers-color-scheme";

/// The browser's color scheme from [`COLOR_SCHEME_HINT`], if it sent one.
#[must_use]
pub fn system_theme(headers: &HeaderMap) -> Option<Theme> {
    headers
        .get(COLOR_SCHEME_HINT)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Theme::from_preference(value.trim().trim_matches('"')))
}

/// Only same-site paths are followed; anything else goes home.
fn local_path(target: &str) -> &str {
    if target.starts_with('/') && !target.starts_with("//") && !target.contains('\\') {
        target
    } else {
        "/"
    }
}

/// Switch away from the theme the page was shown in and go back.
///
/// The first toggle starts from the browser's color scheme.
pub async fn toggle(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ThemeForm>,
) -> Result<Redirect> {
    let current = session
        .get::<Theme>(keys::THEME)
        .await?
        .or_else(|| system_theme(&headers))
        .unwrap_or_default();
    let next = current.toggled();
    session.insert(keys::THEME, next).await?;
    tracing::debug!(theme = %next, "Theme toggled");

    Ok(Redirect::to(local_path(&form.redirect_to)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_local_paths_are_kept() {
        assert_eq!(local_path("/dogs/d1"), "/dogs/d1");
        assert_eq!(local_path("/"), "/");
    }

    #[test]
    fn test_system_theme_from_client_hint() {
        let mut headers = HeaderMap::new();
        assert_eq!(system_theme(&headers), None);

        headers.insert(COLOR_SCHEME_HINT, "\"dark\"".parse().unwrap());
        assert_eq!(system_theme(&headers), Some(Theme::Dark));

        headers.insert(COLOR_SCHEME_HINT, "light".parse().unwrap());
        assert_eq!(system_theme(&headers), Some(Theme::Light));

        headers.insert(COLOR_SCHEME_HINT, "\"sepia\"".parse().unwrap());
        assert_eq!(system_theme(&headers), None);
    }

    #[test]
    fn test_foreign_targets_go_home() {
        assert_eq!(local_path("https://evil.example"), "/");
        assert_eq!(local_path("//evil.example/path"), "/");
        assert_eq!(local_path("/\\evil.example"), "/");
        assert_eq!(local_path(""), "/");
    }
}
