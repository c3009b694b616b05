//! Integration test harness for Waggle.
//!
//! [`TestApp`] drives the full router (every middleware layer included)
//! over in-memory backends with `tower::ServiceExt::oneshot`, carrying the
//! session cookie between requests like a browser would.
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! app.add_user("jane@waggle.dog", "hunter22", Some("Jane Doglover"));
//! let response = app.login("jane@waggle.dog", "hunter22").await;
//! assert_eq!(response.location(), Some("/dogs"));
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    Router,
    body::Body,
    http::{
        HeaderMap, Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use serde_json::{Map, Value};
use tower::ServiceExt;

use waggle_core::{Email, Identity};
use waggle_web::config::WaggleConfig;
use waggle_web::documents::MemoryDocuments;
use waggle_web::middleware::session::SESSION_COOKIE_NAME;
use waggle_web::provider::MemoryIdentity;
use waggle_web::state::AppState;

/// A response with its body read into a string.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Redirect target, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

/// The site over in-memory backends, with one browser's cookie jar.
pub struct TestApp {
    router: Router,
    pub identity: MemoryIdentity,
    pub documents: MemoryDocuments,
    cookie: Mutex<Option<String>>,
    next_client: AtomicU32,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_identity(MemoryIdentity::new())
    }

    /// Build the app over a pre-configured identity backend.
    #[must_use]
    pub fn with_identity(identity: MemoryIdentity) -> Self {
        let documents = MemoryDocuments::new();
        let state = AppState::with_backends(
            WaggleConfig::in_memory("http://localhost:3000"),
            Arc::new(identity.clone()),
            Arc::new(documents.clone()),
        );

        Self {
            router: waggle_web::app(state),
            identity,
            documents,
            cookie: Mutex::new(None),
            next_client: AtomicU32::new(1),
        }
    }

    /// Register an account directly with the identity backend.
    pub fn add_user(&self, email: &str, password: &str, display_name: Option<&str>) -> Identity {
        self.identity
            .add_account(&Email::parse(email).unwrap(), password, display_name)
            .unwrap()
    }

    /// Store a dog document under a fixed id.
    pub fn put_dog(&self, id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("dog fields must be a JSON object");
        };
        self.documents.put("dogs", id, fields);
    }

    /// Store `count` minimal dog documents with ids `seed1`, `seed2`, ...
    pub fn put_dogs(&self, count: usize) {
        for n in 1..=count {
            let mut fields = Map::new();
            fields.insert("name".to_string(), Value::String(format!("Dog {n}")));
            self.documents.put("dogs", format!("seed{n}"), fields);
        }
    }

    /// Current session cookie value, if the server has set one.
    #[must_use]
    pub fn session_cookie(&self) -> Option<String> {
        self.cookie.lock().unwrap().clone()
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        self.send(
            Request::post(path)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_form("/auth/login", &[("email", email), ("password", password)])
            .await
    }

    /// Send a request with the session cookie attached.
    ///
    /// Requests without an `x-forwarded-for` header get a distinct client
    /// address each, so tests are not throttled by the auth rate limiter.
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = self.session_cookie() {
            request.headers_mut().insert(
                COOKIE,
                format!("{SESSION_COOKIE_NAME}={cookie}").parse().unwrap(),
            );
        }
        if !request.headers().contains_key("x-forwarded-for") {
            let n = self.next_client.fetch_add(1, Ordering::Relaxed);
            let address = format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff);
            request
                .headers_mut()
                .insert("x-forwarded-for", address.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        self.store_cookie(&headers);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    fn store_cookie(&self, headers: &HeaderMap) {
        let prefix = format!("{SESSION_COOKIE_NAME}=");
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let Some(rest) = value.strip_prefix(&prefix) else {
                continue;
            };

            let cookie = rest.split(';').next().unwrap_or_default().to_string();
            let expired = value.contains("Max-Age=0") || cookie.is_empty();
            *self.cookie.lock().unwrap() = (!expired).then_some(cookie);
        }
    }
}
