//! Hosted document store boundary.
//!
//! # Architecture
//!
//! - Documents are schemaless JSON maps keyed by a store-assigned id
//! - The store is the source of truth; no local caching or sync
//! - Repositories in [`crate::db`] decode documents into domain types
//!
//! # Implementations
//!
//! - [`FirestoreClient`] - Cloud Firestore REST v1 (or the emulator)
//! - [`MemoryDocuments`] - in-process collections (development, tests)

mod firestore;
mod memory;
mod value;

pub use firestore::FirestoreClient;
pub use memory::MemoryDocuments;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, Value};
use thiserror::Error;

/// Who a store request is made for.
///
/// Hosted stores send the signed-in user's id token with the request so
/// security rules can evaluate `request.auth`.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    id_token: Option<SecretString>,
}

impl Caller {
    /// A request without a signed-in user.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { id_token: None }
    }

    /// A request on behalf of the user holding `id_token`.
    #[must_use]
    pub const fn user(id_token: SecretString) -> Self {
        Self {
            id_token: Some(id_token),
        }
    }

    #[must_use]
    pub const fn id_token(&self) -> Option<&SecretString> {
        self.id_token.as_ref()
    }
}

/// A stored document: its id plus its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Errors that can occur when talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A typed value could not be converted to or from JSON.
    #[error("value codec error: {0}")]
    Codec(String),

    /// The request could not be built (bad collection or id).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Operations against a hosted document collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `limit` documents from `collection`, in store order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be queried.
    async fn list(
        &self,
        caller: &Caller,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// A single document, or `None` if no document has that id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be queried.
    async fn get(
        &self,
        caller: &Caller,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Every document whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be queried.
    async fn query_eq(
        &self,
        caller: &Caller,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert a new document and return the id the store assigned.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the write.
    async fn insert(
        &self,
        caller: &Caller,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError>;
}
