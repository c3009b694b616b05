//! Session-related types.
//!
//! Types stored in the server-side session between requests.

use serde::{Deserialize, Serialize};

use waggle_core::Identity;

use crate::provider::Credentials;

/// Signed-in state carried from one request to the next.
///
/// Rebuilds the auth client at the start of each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAuth {
    /// Identity as last mirrored from the provider.
    pub identity: Identity,
    /// Provider tokens for the session.
    pub credentials: Credentials,
}

/// Session keys.
pub mod keys {
    /// Key for the persisted signed-in state.
    pub const AUTH: &str = "auth";

    /// Key for the last auth error, shown once on the next page.
    pub const FLASH_ERROR: &str = "flash_error";

    /// Key for the light/dark theme preference.
    pub const THEME: &str = "theme";
}
