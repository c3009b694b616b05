//! Firebase Identity Toolkit client.
//!
//! Talks to the REST endpoints behind the Firebase Auth web SDK:
//!
//! - `accounts:signInWithPassword`, `accounts:signUp`, `accounts:update`,
//!   `accounts:lookup` on `identitytoolkit.googleapis.com/v1`
//! - `token` on `securetoken.googleapis.com/v1` for refreshing id tokens
//!
//! When `FIREBASE_AUTH_EMULATOR_HOST` is set, both hosts are replaced by
//! the emulator (`http://{host}/identitytoolkit.googleapis.com/v1/...`).

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use waggle_core::{Email, Identity, IdentityPatch, UserUid};

use super::{AuthError, Credentials, IdentityBackend, SignedIn};
use crate::config::FirebaseConfig;

/// Lifetime assumed when the provider omits or garbles `expiresIn`.
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// Client for the Firebase Identity Toolkit REST API.
#[derive(Clone)]
pub struct IdentityToolkitClient {
    inner: Arc<IdentityToolkitClientInner>,
}

struct IdentityToolkitClientInner {
    client: reqwest::Client,
    endpoints: Endpoints,
    api_key: SecretString,
}

struct Endpoints {
    sign_in: Url,
    sign_up: Url,
    update: Url,
    lookup: Url,
    token: Url,
}

impl Endpoints {
    fn new(emulator_host: Option<&str>) -> Result<Self, url::ParseError> {
        let (accounts, token) = emulator_host.map_or_else(
            || {
                (
                    "https://identitytoolkit.googleapis.com/v1".to_string(),
                    "https://securetoken.googleapis.com/v1/token".to_string(),
                )
            },
            |host| {
                (
                    format!("http://{host}/identitytoolkit.googleapis.com/v1"),
                    format!("http://{host}/securetoken.googleapis.com/v1/token"),
                )
            },
        );

        Ok(Self {
            sign_in: Url::parse(&format!("{accounts}/accounts:signInWithPassword"))?,
            sign_up: Url::parse(&format!("{accounts}/accounts:signUp"))?,
            update: Url::parse(&format!("{accounts}/accounts:update"))?,
            lookup: Url::parse(&format!("{accounts}/accounts:lookup"))?,
            token: Url::parse(&token)?,
        })
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    /// JSON-encoded custom claims, e.g. `{"isSiteAdmin":true}`.
    #[serde(default)]
    custom_attributes: Option<String>,
}

impl AccountInfo {
    fn into_identity(self) -> Identity {
        let is_site_admin = self
            .custom_attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .and_then(|claims| claims.get("isSiteAdmin").and_then(serde_json::Value::as_bool))
            .unwrap_or(false);

        Identity {
            uid: UserUid::new(self.local_id),
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            is_site_admin,
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn parse_lifetime(expires_in: Option<&str>) -> i64 {
    expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS)
}

// =============================================================================
// IdentityToolkitClient
// =============================================================================

impl IdentityToolkitClient {
    /// Create a new Identity Toolkit client.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the emulator host produces an invalid URL.
    pub fn new(config: &FirebaseConfig) -> Result<Self, url::ParseError> {
        let endpoints = Endpoints::new(config.auth_emulator_host.as_deref())?;

        Ok(Self {
            inner: Arc::new(IdentityToolkitClientInner {
                client: reqwest::Client::new(),
                endpoints,
                api_key: config.api_key.clone(),
            }),
        })
    }

    fn keyed(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        url
    }

    /// Decode a provider response, mapping error envelopes to `AuthError`.
    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, AuthError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = serde_json::from_str::<ErrorEnvelope>(&body).map_or_else(
                |_| AuthError::Provider(format!("HTTP {status}")),
                |envelope| AuthError::from_provider_message(&envelope.error.message),
            );
            debug!(status = %status, error = %err, "Identity Toolkit request rejected");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(200).collect::<String>(),
                "Failed to parse Identity Toolkit response"
            );
            AuthError::Provider("unreadable response".to_string())
        })
    }

    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        endpoint: &Url,
        body: &B,
    ) -> Result<R, AuthError> {
        let response = self
            .inner
            .client
            .post(self.keyed(endpoint))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetch the full account record for an id token.
    async fn lookup(&self, id_token: &str) -> Result<Identity, AuthError> {
        let response: LookupResponse = self
            .post_json(&self.inner.endpoints.lookup, &LookupRequest { id_token })
            .await?;

        response
            .users
            .into_iter()
            .next()
            .map(AccountInfo::into_identity)
            .ok_or(AuthError::SessionExpired)
    }

    async fn password_flow(
        &self,
        endpoint: &Url,
        email: &Email,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        let tokens: TokenResponse = self
            .post_json(
                endpoint,
                &PasswordRequest {
                    email: email.as_str(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        let credentials = Credentials::issued(
            UserUid::new(tokens.local_id),
            tokens.id_token,
            tokens.refresh_token,
            parse_lifetime(tokens.expires_in.as_deref()),
        );
        let identity = self.lookup(credentials.id_token.expose_secret()).await?;

        Ok(SignedIn {
            identity,
            credentials,
        })
    }
}

#[async_trait]
impl IdentityBackend for IdentityToolkitClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        self.password_flow(&self.inner.endpoints.sign_in, email, password)
            .await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError> {
        self.password_flow(&self.inner.endpoints.sign_up, email, password)
            .await
    }

    #[instrument(skip(self, credentials, patch), fields(uid = %credentials.uid))]
    async fn update_profile(
        &self,
        credentials: &Credentials,
        patch: &IdentityPatch,
    ) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .post_json(
                &self.inner.endpoints.update,
                &UpdateRequest {
                    id_token: credentials.id_token.expose_secret(),
                    display_name: patch.display_name.as_deref(),
                    photo_url: patch.photo_url.as_deref(),
                    return_secure_token: false,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(uid = %credentials.uid))]
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials, AuthError> {
        let response = self
            .inner
            .client
            .post(self.keyed(&self.inner.endpoints.token))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.expose_secret()),
            ])
            .send()
            .await?;
        let tokens: RefreshResponse = Self::decode(response).await?;

        Ok(Credentials::issued(
            UserUid::new(tokens.user_id),
            tokens.id_token,
            tokens.refresh_token,
            parse_lifetime(tokens.expires_in.as_deref()),
        ))
    }

    async fn sign_out(&self, credentials: &Credentials) -> Result<(), AuthError> {
        // Web API keys cannot revoke refresh tokens; the session is dropped locally.
        debug!(uid = %credentials.uid, "Signed out of Identity Toolkit session");
        Ok(())
    }
}
