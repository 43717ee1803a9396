#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use schoolsync::lens::utils::OutputFormat;
use schoolsync::*;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::export::ExportArgs;
use commands::import::ImportArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.schoolsync/schoolsync.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Summary output format: table, markdown, json, json-pretty
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a JSON document of student records into the database
    Import(ImportArgs),

    /// Write every table of the database into one JSON document
    Export(ExportArgs),

    /// Show configuration and SQLite database status
    Config(ConfigArgs),
}

/// Open the store for `backend`
pub(crate) fn open_store(
    config: &SchoolSyncConfig,
    backend: Backend,
    sqlite_path: &str,
) -> Result<Box<dyn SchoolStore>> {
    match backend {
        Backend::Sqlite => {
            if let Some(parent) = std::path::Path::new(sqlite_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        anyhow!("Unable to create directory {}: {}", parent.display(), e)
                    })?;
                }
            }
            Ok(Box::new(SchoolDatabase::open(sqlite_path)?))
        }
        #[cfg(feature = "mysql")]
        Backend::Mysql => Ok(Box::new(MySqlSchoolStore::connect(&config.mysql)?)),
        #[cfg(not(feature = "mysql"))]
        Backend::Mysql => {
            let _ = config;
            Err(anyhow!(
                "MySQL backend is not available; rebuild schoolsync with the `mysql` feature"
            ))
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match SchoolSyncConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    // Commands close their store before returning, so exiting here skips no cleanup
    let result = match cli.command {
        Commands::Import(args) => commands::import::run(&config, args, cli.format),
        Commands::Export(args) => commands::export::run(&config, args, cli.format),
        Commands::Config(args) => commands::config::run(&config, args, cli.format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
