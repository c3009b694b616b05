//! Dog profile inspection commands.
//!
//! Records are printed to stdout as pretty JSON in their stored shape.

use serde::Serialize;

use waggle_core::{DogId, UserUid};
use waggle_web::db::DogRepository;

use super::CliError;

#[allow(clippy::print_stdout)]
fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the dogs featured on the home page.
///
/// # Errors
///
/// Returns an error if the document store cannot be read.
pub async fn featured(repository: &DogRepository<'_>) -> Result<(), CliError> {
    let dogs = repository.list_featured().await?;
    tracing::info!(count = dogs.len(), "Fetched featured dogs");
    print_json(&dogs)
}

/// Print one dog, or `null` when it does not exist.
///
/// # Errors
///
/// Returns an error if the document store cannot be read.
pub async fn get(repository: &DogRepository<'_>, id: &str) -> Result<(), CliError> {
    let dog = repository.get_by_id(&DogId::new(id)).await?;
    if dog.is_none() {
        tracing::warn!(id, "No dog with this id");
    }
    print_json(&dog)
}

/// Print every dog owned by `uid`.
///
/// # Errors
///
/// Returns an error if the document store cannot be read.
pub async fn owner(repository: &DogRepository<'_>, uid: &str) -> Result<(), CliError> {
    let dogs = repository.list_by_owner(&UserUid::new(uid)).await?;
    tracing::info!(count = dogs.len(), uid, "Fetched dogs by owner");
    print_json(&dogs)
}
