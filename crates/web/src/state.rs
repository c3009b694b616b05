//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{BackendKind, WaggleConfig};
use crate::db::DogRepository;
use crate::documents::{Caller, DocumentStore, FirestoreClient, MemoryDocuments};
use crate::provider::{IdentityBackend, IdentityToolkitClient, MemoryIdentity};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("the firebase backend needs FIREBASE_PROJECT_ID and FIREBASE_API_KEY")]
    MissingFirebaseConfig,
    #[error("invalid Firebase endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and gives handlers the
/// configuration plus the two hosted backends.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WaggleConfig,
    identity: Arc<dyn IdentityBackend>,
    documents: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Create the application state for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the firebase backend is selected without its
    /// settings, or the settings produce invalid endpoint URLs.
    pub fn new(config: WaggleConfig) -> Result<Self, StateError> {
        let (identity, documents): (Arc<dyn IdentityBackend>, Arc<dyn DocumentStore>) =
            match config.backend {
                BackendKind::Firebase => {
                    let firebase = config
                        .firebase
                        .as_ref()
                        .ok_or(StateError::MissingFirebaseConfig)?;
                    (
                        Arc::new(IdentityToolkitClient::new(firebase)?),
                        Arc::new(FirestoreClient::new(firebase)?),
                    )
                }
                BackendKind::Memory => {
                    tracing::warn!("Using in-memory backends; accounts and dogs are lost on restart");
                    (Arc::new(MemoryIdentity::new()), Arc::new(MemoryDocuments::new()))
                }
            };

        Ok(Self::with_backends(config, identity, documents))
    }

    /// Create the application state over explicit backends.
    #[must_use]
    pub fn with_backends(
        config: WaggleConfig,
        identity: Arc<dyn IdentityBackend>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                documents,
            }),
        }
    }

    /// Get a reference to the web configuration.
    #[must_use]
    pub fn config(&self) -> &WaggleConfig {
        &self.inner.config
    }

    /// Handle to the auth provider backend.
    #[must_use]
    pub fn identity(&self) -> Arc<dyn IdentityBackend> {
        Arc::clone(&self.inner.identity)
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn documents(&self) -> &dyn DocumentStore {
        self.inner.documents.as_ref()
    }

    /// Repository over the dog profile collection.
    #[must_use]
    pub fn dogs(&self) -> DogRepository<'_> {
        DogRepository::new(self.documents(), &self.inner.config.dogs_collection)
    }

    /// Repository over the dog profile collection, acting as `caller`.
    #[must_use]
    pub fn dogs_for(&self, caller: Caller) -> DogRepository<'_> {
        self.dogs().on_behalf_of(caller)
    }
}
