//! Seed the document store with dog profiles.
//!
//! The seed file is a YAML list of records in their stored shape:
//!
//! ```yaml
//! - name: Bella
//!   breed: Beagle
//!   gender: female
//!   birthDate: 2024-01-04
//!   ownerId: u1
//! ```

use tracing::info;

use waggle_core::NewDogProfile;
use waggle_web::db::DogRepository;

use super::CliError;

/// Parse a seed file's contents.
///
/// # Errors
///
/// Returns an error if the YAML is not a list of dog profiles.
pub fn parse(content: &str) -> Result<Vec<NewDogProfile>, CliError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Insert every profile in `file_path`.
///
/// Profiles are inserted in file order and the run stops at the first
/// rejected write.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a write fails.
pub async fn dogs(repository: &DogRepository<'_>, file_path: &str) -> Result<(), CliError> {
    info!(path = %file_path, "Loading dog profiles from file");

    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_string(),
            source,
        })?;
    let records = parse(&content)?;
    info!(count = records.len(), "Parsed seed file");

    for record in &records {
        let id = repository.create(record).await?;
        info!(id = %id, name = %record.name, "Inserted dog profile");
    }

    info!("Seeding complete! {} profiles inserted", records.len());
    Ok(())
}
