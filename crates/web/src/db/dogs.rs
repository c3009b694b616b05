//! Dog profile repository.

use serde_json::Value;
use tracing::{instrument, warn};

use waggle_core::{DogId, DogProfile, NewDogProfile, UserUid};

use super::RepositoryError;
use crate::documents::{Caller, Document, DocumentStore};

/// How many profiles the home page features.
///
/// Selection is the first records the store returns; no ranking yet.
pub const FEATURED_LIMIT: usize = 3;

/// Repository for dog profile documents.
///
/// Requests are anonymous unless a caller is attached with
/// [`DogRepository::on_behalf_of`].
pub struct DogRepository<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
    caller: Caller,
}

impl<'a> DogRepository<'a> {
    /// Create a new dog repository over `collection`.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, collection: &'a str) -> Self {
        Self {
            store,
            collection,
            caller: Caller::anonymous(),
        }
    }

    /// Make requests on behalf of `caller`.
    #[must_use]
    pub fn on_behalf_of(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    /// Up to [`FEATURED_LIMIT`] profiles, in no particular order.
    ///
    /// Documents that do not decode as dog profiles are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Read` if the store cannot be queried.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn list_featured(&self) -> Result<Vec<DogProfile>, RepositoryError> {
        let documents = self
            .store
            .list(&self.caller, self.collection, FEATURED_LIMIT)
            .await
            .map_err(RepositoryError::Read)?;

        let mut dogs = self.decode_all(documents);
        dogs.truncate(FEATURED_LIMIT);
        Ok(dogs)
    }

    /// Get a profile by id.
    ///
    /// Ids that cannot address a document (empty, containing `/`) yield
    /// `None` without a store round trip.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Read` if the store cannot be queried.
    /// Returns `RepositoryError::DataCorruption` if the document is not a dog profile.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn get_by_id(&self, id: &DogId) -> Result<Option<DogProfile>, RepositoryError> {
        if !id.is_addressable() {
            return Ok(None);
        }

        let document = self
            .store
            .get(&self.caller, self.collection, id.as_str())
            .await
            .map_err(RepositoryError::Read)?;

        document
            .map(|document| {
                decode(document).map_err(|e| {
                    RepositoryError::DataCorruption(format!("dog {id} is malformed: {e}"))
                })
            })
            .transpose()
    }

    /// Every profile owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Read` if the store cannot be queried.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn list_by_owner(&self, owner: &UserUid) -> Result<Vec<DogProfile>, RepositoryError> {
        let documents = self
            .store
            .query_eq(
                &self.caller,
                self.collection,
                "ownerId",
                &Value::String(owner.as_str().to_string()),
            )
            .await
            .map_err(RepositoryError::Read)?;

        Ok(self
            .decode_all(documents)
            .into_iter()
            .filter(|dog| dog.is_owned_by(owner))
            .collect())
    }

    /// Insert a new profile and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Write` if the store rejects the write.
    /// Returns `RepositoryError::DataCorruption` if the record cannot be encoded.
    #[instrument(skip(self, record), fields(collection = %self.collection, name = %record.name))]
    pub async fn create(&self, record: &NewDogProfile) -> Result<DogId, RepositoryError> {
        let Value::Object(fields) = serde_json::to_value(record)
            .map_err(|e| RepositoryError::DataCorruption(format!("cannot encode dog: {e}")))?
        else {
            return Err(RepositoryError::DataCorruption(
                "dog record did not encode as a map".to_string(),
            ));
        };

        let id = self
            .store
            .insert(&self.caller, self.collection, fields)
            .await
            .map_err(RepositoryError::Write)?;

        tracing::info!(id = %id, "Created dog profile");
        Ok(DogId::new(id))
    }

    /// Whether the store answers queries. Used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Read` if the store cannot be queried.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.store
            .list(&self.caller, self.collection, 1)
            .await
            .map(|_| ())
            .map_err(RepositoryError::Read)
    }

    fn decode_all(&self, documents: Vec<Document>) -> Vec<DogProfile> {
        documents
            .into_iter()
            .filter_map(|document| {
                let id = document.id.clone();
                decode(document)
                    .map_err(|e| {
                        warn!(collection = %self.collection, id = %id, error = %e, "Skipping malformed dog document");
                    })
                    .ok()
            })
            .collect()
    }
}

fn decode(document: Document) -> Result<DogProfile, serde_json::Error> {
    let record: NewDogProfile = serde_json::from_value(Value::Object(document.fields))?;
    Ok(record.with_id(DogId::new(document.id)))
}
