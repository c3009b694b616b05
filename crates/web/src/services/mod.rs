//! Services used by route handlers.
//!
//! # Services
//!
//! - `auth` - Session Store and the per-session auth client

pub mod auth;
