//! Waggle CLI - Seeding and inspection tools for dog profiles.
//!
//! # Usage
//!
//! ```bash
//! # Insert dog profiles from a YAML file
//! waggle-cli seed --file dogs.yaml
//!
//! # Print the dogs shown on the home page
//! waggle-cli dogs featured
//!
//! # Print one dog, or every dog owned by a user
//! waggle-cli dogs get d1
//! waggle-cli dogs owner u1
//! ```
//!
//! # Environment Variables
//!
//! - `FIREBASE_PROJECT_ID` - Firebase project holding the document store
//! - `FIREBASE_API_KEY` - Web API key (not required with the emulator)
//! - `FIRESTORE_EMULATOR_HOST` - Talk to a local emulator instead
//! - `WAGGLE_DOGS_COLLECTION` - Collection name (default `dogs`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "waggle-cli")]
#[command(author, version, about = "Waggle CLI tools")]
struct Cli {
    /// Document collection holding dog profiles
    #[arg(long, global = true, env = "WAGGLE_DOGS_COLLECTION", default_value = "dogs")]
    collection: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert dog profiles from a YAML file
    Seed {
        /// Path to a YAML list of dog profiles
        #[arg(short, long)]
        file: String,
    },
    /// Inspect dog profiles
    Dogs {
        #[command(subcommand)]
        query: DogQuery,
    },
}

#[derive(Subcommand)]
enum DogQuery {
    /// Dogs featured on the home page
    Featured,
    /// One dog by id
    Get {
        /// Document id
        id: String,
    },
    /// Every dog owned by a user
    Owner {
        /// Owner's user id
        uid: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let documents = commands::connect()?;
    let repository = waggle_web::db::DogRepository::new(&documents, &cli.collection);

    match cli.command {
        Commands::Seed { file } => {
            commands::seed::dogs(&repository, &file).await?;
        }
        Commands::Dogs { query } => match query {
            DogQuery::Featured => commands::dogs::featured(&repository).await?,
            DogQuery::Get { id } => commands::dogs::get(&repository, &id).await?,
            DogQuery::Owner { uid } => commands::dogs::owner(&repository, &uid).await?,
        },
    }
    Ok(())
}
