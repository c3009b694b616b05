//! Cloud Firestore REST v1 client.
//!
//! Reads use `documents:runQuery` with a structured query; single documents
//! are fetched with `GET documents/{collection}/{id}` and created with
//! `POST documents/{collection}` so Firestore assigns the id. Requests are
//! sent with the project's Web API key plus the caller's id token, and are
//! subject to the project's security rules.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use super::value::{decode_fields, encode_fields, encode_value};
use super::{Caller, Document, DocumentStore, StoreError};
use crate::config::FirebaseConfig;

/// Client for the Cloud Firestore REST API.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    client: reqwest::Client,
    /// `.../projects/{project}/databases/{database}/documents`
    documents: Url,
    run_query: Url,
    api_key: SecretString,
}

/// A document as returned by the REST API.
#[derive(Deserialize)]
struct RawDocument {
    /// Full resource name ending in `/{collection}/{id}`.
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn into_document(self) -> Result<Document, StoreError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::Codec(format!("document name without id: {}", self.name)))?
            .to_string();

        Ok(Document {
            id,
            fields: decode_fields(&self.fields)?,
        })
    }
}

/// One element of a `runQuery` response stream.
#[derive(Deserialize)]
struct RunQueryItem {
    /// Absent on the trailing progress element and for empty results.
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the project, database or emulator host
    /// produce an invalid URL.
    pub fn new(config: &FirebaseConfig) -> Result<Self, url::ParseError> {
        let origin = config.firestore_emulator_host.as_deref().map_or_else(
            || "https://firestore.googleapis.com".to_string(),
            |host| format!("http://{host}"),
        );
        let documents = format!(
            "{origin}/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database
        );

        Ok(Self {
            inner: Arc::new(FirestoreClientInner {
                client: reqwest::Client::new(),
                run_query: Url::parse(&format!("{documents}:runQuery"))?,
                documents: Url::parse(&documents)?,
                api_key: config.api_key.clone(),
            }),
        })
    }

    fn keyed(&self, mut url: Url) -> Url {
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        url
    }

    /// Attach the caller's id token, if any.
    fn authorized(request: reqwest::RequestBuilder, caller: &Caller) -> reqwest::RequestBuilder {
        match caller.id_token() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// `documents/{segments...}` with each segment percent-encoded.
    fn document_url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.inner.documents.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidRequest("documents URL cannot be a base".to_string()))?
            .extend(segments);
        Ok(self.keyed(url))
    }

    /// Read a response body, mapping error statuses to `StoreError::Api`.
    async fn read_body(response: reqwest::Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorEnvelope>(&body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |envelope| envelope.error.message,
        );
        tracing::error!(status = %status, message = %message, "Firestore returned non-success status");
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn run_query(
        &self,
        caller: &Caller,
        structured_query: Value,
    ) -> Result<Vec<Document>, StoreError> {
        let request = self
            .inner
            .client
            .post(self.keyed(self.inner.run_query.clone()))
            .json(&json!({ "structuredQuery": structured_query }));
        let response = Self::authorized(request, caller).send().await?;

        let body = Self::read_body(response).await?;
        let items: Vec<RunQueryItem> = serde_json::from_str(&body)?;
        Ok(decode_items(items))
    }
}

/// Documents from a `runQuery` response. Documents that fail to decode are
/// skipped so one bad record does not hide the rest.
fn decode_items(items: Vec<RunQueryItem>) -> Vec<Document> {
    items
        .into_iter()
        .filter_map(|item| item.document)
        .filter_map(|raw| {
            let name = raw.name.clone();
            raw.into_document()
                .map_err(|e| warn!(document = %name, error = %e, "Skipping undecodable document"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self, caller))]
    async fn list(
        &self,
        caller: &Caller,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self
            .run_query(caller, json!({
                "from": [{ "collectionId": collection }],
                "limit": limit,
            }))
            .await?;
        debug!(count = documents.len(), "Listed documents");
        Ok(documents)
    }

    #[instrument(skip(self, caller))]
    async fn get(
        &self,
        caller: &Caller,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let request = self.inner.client.get(self.document_url(&[collection, id])?);
        let response = Self::authorized(request, caller).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::read_body(response).await?;
        let raw: RawDocument = serde_json::from_str(&body)?;
        raw.into_document().map(Some)
    }

    #[instrument(skip(self, caller, value))]
    async fn query_eq(
        &self,
        caller: &Caller,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.run_query(caller, json!({
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": encode_value(value),
                }
            },
        }))
        .await
    }

    #[instrument(skip(self, caller, fields))]
    async fn insert(
        &self,
        caller: &Caller,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let request = self
            .inner
            .client
            .post(self.document_url(&[collection])?)
            .json(&json!({ "fields": encode_fields(&fields) }));
        let response = Self::authorized(request, caller).send().await?;

        let body = Self::read_body(response).await?;
        let raw: RawDocument = serde_json::from_str(&body)?;
        let document = raw.into_document()?;
        debug!(id = %document.id, "Inserted document");
        Ok(document.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(emulator: Option<&str>) -> FirebaseConfig {
        FirebaseConfig {
            project_id: "waggle-test".to_string(),
            api_key: SecretString::from("test-key"),
            database: "(default)".to_string(),
            auth_emulator_host: None,
            firestore_emulator_host: emulator.map(String::from),
        }
    }

    #[test]
    fn test_production_urls() {
        let client = FirestoreClient::new(&config(None)).unwrap();
        assert_eq!(
            client.inner.run_query.as_str(),
            "https://firestore.googleapis.com/v1/projects/waggle-test/databases/(default)/documents:runQuery"
        );
    }

    #[test]
    fn test_document_url_encodes_segments() {
        let client = FirestoreClient::new(&config(Some("localhost:8080"))).unwrap();
        let url = client.document_url(&["dogs", "a b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/projects/waggle-test/databases/(default)/documents/dogs/a%20b?key=test-key"
        );
    }

    #[test]
    fn test_raw_document_id_from_name() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/waggle-test/databases/(default)/documents/dogs/Xy12",
            "fields": { "name": { "stringValue": "Bella" } },
            "createTime": "2024-01-04T10:00:00Z"
        }))
        .unwrap();

        let document = raw.into_document().unwrap();
        assert_eq!(document.id, "Xy12");
        assert_eq!(document.fields["name"], json!("Bella"));
    }

    #[test]
    fn test_run_query_items_skip_read_time_only_entries() {
        let items: Vec<RunQueryItem> = serde_json::from_value(json!([
            { "readTime": "2024-01-04T10:00:00Z" }
        ]))
        .unwrap();
        assert!(items.into_iter().all(|item| item.document.is_none()));
    }

    #[test]
    fn test_undecodable_documents_are_skipped() {
        let items: Vec<RunQueryItem> = serde_json::from_value(json!([
            {
                "document": {
                    "name": "projects/waggle-test/databases/(default)/documents/dogs/good",
                    "fields": { "name": { "stringValue": "Bella" } }
                }
            },
            {
                "document": {
                    "name": "projects/waggle-test/databases/(default)/documents/dogs/embedded",
                    "fields": { "embedding": { "vectorValue": { "values": [0.1, 0.2] } } }
                }
            },
            { "readTime": "2024-01-04T10:00:00Z" }
        ]))
        .unwrap();

        let documents = decode_items(items);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "good");
    }

    #[test]
    fn test_signed_in_caller_sends_bearer_token() {
        let client = FirestoreClient::new(&config(None)).unwrap();
        let url = client.document_url(&["dogs"]).unwrap();

        let user = Caller::user(SecretString::from("id-token-123"));
        let request = FirestoreClient::authorized(client.inner.client.post(url.clone()), &user)
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer id-token-123");
        assert_eq!(request.url().query(), Some("key=test-key"));

        let anonymous = FirestoreClient::authorized(client.inner.client.post(url), &Caller::anonymous())
            .build()
            .unwrap();
        assert!(anonymous.headers().get("authorization").is_none());
    }
}
