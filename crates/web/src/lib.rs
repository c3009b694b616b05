//! Waggle web library.
//!
//! The server-rendered matchmaking site as a library, so the router can be
//! driven by integration tests and the CLI can reuse the data access layer.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod provider;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
