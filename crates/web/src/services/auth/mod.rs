//! Authentication session services.
//!
//! - [`AuthClient`] - provider credentials for one browser session and the
//!   auth state notification stream
//! - [`SessionStore`] - mirrors that stream into the state pages render

mod client;
mod store;

pub use client::{AuthClient, AuthNotification};
pub use store::{SessionPhase, SessionState, SessionStore};
