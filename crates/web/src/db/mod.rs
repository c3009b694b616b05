//! Repositories over the hosted document store.
//!
//! # Collections
//!
//! - `dogs` (name configurable via `WAGGLE_DOGS_COLLECTION`) - dog profiles
//!   with `name`, `description`, `photoURL`, `birthDate`, `breed`,
//!   `gender`, `ownerId`
//!
//! Repositories translate domain queries into [`DocumentStore`] calls and
//! decode the results. They hold no state and add no caching or retries.
//!
//! [`DocumentStore`]: crate::documents::DocumentStore

pub mod dogs;

pub use dogs::{DogRepository, FEATURED_LIMIT};

use thiserror::Error;

use crate::documents::StoreError;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The store could not be read.
    #[error("read failed: {0}")]
    Read(#[source] StoreError),

    /// The store rejected a write.
    #[error("write failed: {0}")]
    Write(#[source] StoreError),

    /// A stored document does not match the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}
