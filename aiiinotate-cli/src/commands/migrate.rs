//! Migrate command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use aiiinotate_core::PostgresStore;

/// Connect to the database and apply pending migrations.
pub async fn execute(database_url: &str) -> Result<()> {
    let store = PostgresStore::connect(database_url, 1)
        .await
        .context("Failed to connect to database")?;
    store
        .migrate()
        .await
        .context("Failed to apply database migrations")?;

    info!("Migrations applied");
    println!("{}", "Database schema is up to date".green());
    Ok(())
}
