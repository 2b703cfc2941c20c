//! aiiinotate CLI - import IIIF annotations and manifests, manage the database.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "aiiinotate")]
#[command(author, version, about = "IIIF annotation server tooling", long_about = None)]
#[command(after_help = "Exit codes:\n  0   success\n  1   general error\n  65  malformed input data\n  66  input file not found\n  69  database or manifest host unavailable")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Shape of the documents held by the imported files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportType {
    /// One IIIF 2.1 annotation per file
    Annotation,
    /// One `sc:AnnotationList` per file
    AnnotationList,
    /// A JSON array of annotations per file
    AnnotationArray,
    /// One IIIF 2.1 manifest per file
    Manifest,
    /// A JSON array of manifests or manifest URIs per file
    ManifestArray,
}

#[derive(Subcommand)]
enum Commands {
    /// Import annotations or manifests from JSON files
    Import {
        /// Kind of document held by each file
        #[arg(short = 't', long = "type", value_enum)]
        kind: ImportType,

        /// JSON files to import
        #[arg(short, long = "file", value_name = "FILE", num_args = 1.., required = true)]
        files: Vec<PathBuf>,

        /// Treat each --file as a newline-separated list of JSON paths
        #[arg(long)]
        list_file: bool,

        /// Do not fetch manifests referenced by annotations
        #[arg(long)]
        offline: bool,

        /// PostgreSQL URL; without it the import runs against an in-memory store
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,

        /// Public base URL used to mint annotation identifiers
        #[arg(long, env = "AIIINOTATE_BASE_URL", default_value = "http://localhost:3000")]
        base_url: String,

        /// Upper bound in seconds for fetching one manifest
        #[arg(long, default_value_t = 10)]
        fetch_timeout_secs: u64,

        /// Print the insert result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the PostgreSQL migrations
    Migrate {
        /// PostgreSQL URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            kind,
            files,
            list_file,
            offline,
            database_url,
            base_url,
            fetch_timeout_secs,
            json,
        } => {
            let args = commands::import::ImportArgs {
                kind,
                files,
                list_file,
                offline,
                database_url,
                base_url,
                fetch_timeout_secs,
                json,
            };
            commands::import::execute(args).await
        }
        Commands::Migrate { database_url } => commands::migrate::execute(&database_url).await,
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
