//! CLI command implementations.

pub mod dogs;
pub mod seed;

use thiserror::Error;

use waggle_web::config::{ConfigError, FirebaseConfig};
use waggle_web::db::RepositoryError;
use waggle_web::documents::FirestoreClient;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Firebase settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The document store endpoint could not be built.
    #[error("Invalid document store URL: {0}")]
    Url(#[from] url::ParseError),

    /// Reading or writing dog profiles failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The seed file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The seed file is not a list of dog profiles.
    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Output could not be encoded.
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the configured Firestore database.
///
/// # Errors
///
/// Returns an error if the Firebase settings are missing or invalid.
pub fn connect() -> Result<FirestoreClient, CliError> {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    let config = FirebaseConfig::from_env()?;
    tracing::info!(project = %config.project_id, "Connecting to document store");
    Ok(FirestoreClient::new(&config)?)
}
