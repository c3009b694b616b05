//! Web configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WAGGLE_BASE_URL` - Public URL for the site
//! - `FIREBASE_PROJECT_ID` - Firebase project hosting auth and Firestore (firebase backend)
//! - `FIREBASE_API_KEY` - Firebase Web API key (firebase backend)
//!
//! ## Optional
//! - `WAGGLE_HOST` - Bind address (default: 127.0.0.1)
//! - `WAGGLE_PORT` - Listen port (default: 3000)
//! - `WAGGLE_BACKEND` - `firebase` or `memory` (default: firebase)
//! - `WAGGLE_DOGS_COLLECTION` - Firestore collection holding dog profiles (default: dogs)
//! - `FIRESTORE_DATABASE` - Firestore database id (default: `(default)`)
//! - `FIREBASE_AUTH_EMULATOR_HOST` - `host:port` of the Auth emulator
//! - `FIRESTORE_EMULATOR_HOST` - `host:port` of the Firestore emulator
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which implementation backs auth and document storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Firebase Identity Toolkit and Cloud Firestore.
    Firebase,
    /// In-process accounts and documents, lost on restart.
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firebase" => Ok(Self::Firebase),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected \"firebase\" or \"memory\", got {other:?}")),
        }
    }
}

/// Waggle web application configuration.
#[derive(Debug, Clone)]
pub struct WaggleConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the site
    pub base_url: String,
    /// Backend selection
    pub backend: BackendKind,
    /// Collection holding dog profile documents
    pub dogs_collection: String,
    /// Firebase connection settings (present for the firebase backend)
    pub firebase: Option<FirebaseConfig>,
    /// Sentry error tracking settings
    pub sentry: SentryConfig,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Firebase project id
    pub project_id: String,
    /// Web API key used for Identity Toolkit requests
    pub api_key: SecretString,
    /// Firestore database id
    pub database: String,
    /// Auth emulator `host:port`, replaces the Google endpoints when set
    pub auth_emulator_host: Option<String>,
    /// Firestore emulator `host:port`, replaces the Google endpoint when set
    pub firestore_emulator_host: Option<String>,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("database", &self.database)
            .field("auth_emulator_host", &self.auth_emulator_host)
            .field("firestore_emulator_host", &self.firestore_emulator_host)
            .finish()
    }
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl WaggleConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the Firebase API key fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("WAGGLE_HOST", "127.0.0.1")?;
        let port = parse_env("WAGGLE_PORT", "3000")?;
        let base_url = get_required_env("WAGGLE_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("WAGGLE_BASE_URL".to_string(), e.to_string()))?;
        let backend = parse_env("WAGGLE_BACKEND", "firebase")?;
        let dogs_collection = get_env_or_default("WAGGLE_DOGS_COLLECTION", "dogs");

        let firebase = match backend {
            BackendKind::Firebase => Some(FirebaseConfig::from_env()?),
            BackendKind::Memory => None,
        };

        let sentry = SentryConfig {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            dogs_collection,
            firebase,
            sentry,
        })
    }

    /// Configuration for local development and tests: memory backend,
    /// loopback address, no Sentry.
    #[must_use]
    pub fn in_memory(base_url: impl Into<String>) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: base_url.into(),
            backend: BackendKind::Memory,
            dogs_collection: "dogs".to_string(),
            firebase: None,
            sentry: SentryConfig::default(),
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS (controls secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl FirebaseConfig {
    /// Load the Firebase settings.
    ///
    /// The API key check is skipped when an emulator is configured, since
    /// the emulators accept any key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the project id or API key is missing or the
    /// key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_emulator_host = get_optional_env("FIREBASE_AUTH_EMULATOR_HOST");
        let firestore_emulator_host = get_optional_env("FIRESTORE_EMULATOR_HOST");

        let api_key = if auth_emulator_host.is_some() {
            SecretString::from(get_env_or_default("FIREBASE_API_KEY", "emulator"))
        } else {
            get_validated_secret("FIREBASE_API_KEY")?
        };

        Ok(Self {
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            api_key,
            database: get_env_or_default("FIRESTORE_DATABASE", "(default)"),
            auth_emulator_host,
            firestore_emulator_host,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the Firebase console."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
