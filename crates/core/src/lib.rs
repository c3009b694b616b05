//! Waggle Core - Shared types library.
//!
//! This crate provides the domain types used across all Waggle components:
//! - `web` - The server-rendered matchmaking site
//! - `cli` - Command-line tools for seeding and inspecting dog profiles
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Records read from the hosted document store and
//! identities mirrored from the auth provider are expressed here.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, identities, dog profiles, and themes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
