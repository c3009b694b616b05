//! Authenticated user identity.
//!
//! An [`Identity`] is the profile the auth provider reports for a signed-in
//! user. It is created when the user registers, changed only through
//! explicit profile updates, and discarded on logout or session expiry.

use serde::{Deserialize, Serialize};

use super::id::UserUid;

/// The signed-in user's profile as mirrored from the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-assigned unique user id.
    pub uid: UserUid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar URL.
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Grants access to the admin entry in the navigation.
    #[serde(default)]
    pub is_site_admin: bool,
}

impl Identity {
    /// Create an identity with only the user id set.
    #[must_use]
    pub fn new(uid: impl Into<UserUid>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            is_site_admin: false,
        }
    }

    /// Name to show in the navigation: display name, then email, then "User".
    #[must_use]
    pub fn label(&self) -> &str {
        non_blank(self.display_name.as_deref())
            .or_else(|| non_blank(self.email.as_deref()))
            .unwrap_or("User")
    }

    /// Up to two uppercase initials for the avatar fallback.
    ///
    /// Taken from the display name, else the email, else `"U"`.
    #[must_use]
    pub fn initials(&self) -> String {
        let source = non_blank(self.display_name.as_deref())
            .or_else(|| non_blank(self.email.as_deref()))
            .unwrap_or("U");

        source
            .split(' ')
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A partial identity used for profile updates.
///
/// Only `display_name` and `photo_url` are sent to the auth provider; every
/// set field is merged into the locally mirrored identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_site_admin: Option<bool>,
}

impl IdentityPatch {
    /// Whether the patch carries fields the auth provider stores.
    #[must_use]
    pub const fn touches_provider(&self) -> bool {
        self.display_name.is_some() || self.photo_url.is_some()
    }

    /// Merge the set fields into `identity`. The user id never changes.
    pub fn apply_to(&self, identity: &mut Identity) {
        if let Some(email) = &self.email {
            identity.email = Some(email.clone());
        }
        if let Some(name) = &self.display_name {
            identity.display_name = Some(name.clone());
        }
        if let Some(url) = &self.photo_url {
            identity.photo_url = Some(url.clone());
        }
        if let Some(admin) = self.is_site_admin {
            identity.is_site_admin = admin;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jane() -> Identity {
        Identity {
            uid: UserUid::new("u1"),
            email: Some("jane@waggle.dog".to_string()),
            display_name: Some("Jane Doglover".to_string()),
            photo_url: None,
            is_site_admin: false,
        }
    }

    #[test]
    fn test_initials_from_display_name() {
        assert_eq!(jane().initials(), "JD");
    }

    #[test]
    fn test_initials_take_two_words() {
        let mut identity = jane();
        identity.display_name = Some("mary  ann smith".to_string());
        assert_eq!(identity.initials(), "MA");
    }

    #[test]
    fn test_initials_fall_back_to_email_then_u() {
        let mut identity = jane();
        identity.display_name = None;
        assert_eq!(identity.initials(), "J");

        identity.email = None;
        assert_eq!(identity.initials(), "U");
    }

    #[test]
    fn test_label_fallbacks() {
        let mut identity = jane();
        assert_eq!(identity.label(), "Jane Doglover");
        identity.display_name = Some("  ".to_string());
        assert_eq!(identity.label(), "jane@waggle.dog");
        identity.email = None;
        assert_eq!(identity.label(), "User");
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut identity = jane();
        let patch = IdentityPatch {
            photo_url: Some("https://img.example/jane.png".to_string()),
            is_site_admin: Some(true),
            ..IdentityPatch::default()
        };
        patch.apply_to(&mut identity);

        assert_eq!(identity.display_name.as_deref(), Some("Jane Doglover"));
        assert_eq!(identity.photo_url.as_deref(), Some("https://img.example/jane.png"));
        assert!(identity.is_site_admin);
        assert_eq!(identity.uid.as_str(), "u1");
    }

    #[test]
    fn test_touches_provider() {
        assert!(!IdentityPatch::default().touches_provider());
        let patch = IdentityPatch {
            is_site_admin: Some(true),
            ..IdentityPatch::default()
        };
        assert!(!patch.touches_provider());
        let patch = IdentityPatch {
            display_name: Some("Jane".to_string()),
            ..IdentityPatch::default()
        };
        assert!(patch.touches_provider());
    }

    #[test]
    fn test_wire_names() {
        let mut identity = jane();
        identity.photo_url = Some("p".to_string());
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["displayName"], "Jane Doglover");
        assert_eq!(json["photoURL"], "p");
        assert_eq!(json["isSiteAdmin"], false);
    }
}
