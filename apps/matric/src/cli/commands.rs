//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Cli, Commands};
use crate::api;
use matric_core::{Marketplace, MatricError};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), MatricError> {
    match &cli.command {
        Some(Commands::Server { host, port }) => {
            let addr = format!("{host}:{port}");
            let market = open_marketplace(&cli)?;
            api::run_server(&addr, market).await
        }
        Some(Commands::Init { force }) => init_database(&cli, *force),
        Some(Commands::Status) | None => show_status(&cli),
    }
}

/// Open the marketplace with the backend selected on the command line.
fn open_marketplace(cli: &Cli) -> Result<Marketplace, MatricError> {
    match cli.backend.as_str() {
        "memory" => {
            tracing::warn!("Using volatile in-memory storage; all data is lost on exit");
            Ok(Marketplace::new())
        }
        "redb" => {
            tracing::info!(database = %cli.database.display(), "Opening redb database");
            Marketplace::with_redb(&cli.database)
        }
        other => Err(MatricError::Validation(format!(
            "unknown backend '{other}' (expected 'redb' or 'memory')"
        ))),
    }
}

/// Initialize a new empty database file.
fn init_database(cli: &Cli, force: bool) -> Result<(), MatricError> {
    if cli.database.exists() {
        if !force {
            return Err(MatricError::Validation(format!(
                "database '{}' already exists (use --force to overwrite)",
                cli.database.display()
            )));
        }
        std::fs::remove_file(&cli.database)
            .map_err(|e| MatricError::Storage(e.to_string()))?;
    }

    let market = Marketplace::with_redb(&cli.database)?;
    println!(
        "Initialized database at {} ({} users, {} profiles)",
        cli.database.display(),
        market.user_count()?,
        market.profile_count()?
    );
    Ok(())
}

/// Print user and profile counts for the selected database.
fn show_status(cli: &Cli) -> Result<(), MatricError> {
    let market = open_marketplace(cli)?;
    println!("Database:  {}", cli.database.display());
    println!(
        "Backend:   {}",
        if market.is_persistent() { "redb" } else { "memory" }
    );
    println!("Users:     {}", market.user_count()?);
    println!("Profiles:  {}", market.profile_count()?);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
