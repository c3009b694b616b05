//! Web-layer models.
//!
//! Domain types live in `waggle-core`; this module holds what only the web
//! server needs, such as the shapes kept in the session.

pub mod session;

pub use session::{PersistedAuth, keys};
