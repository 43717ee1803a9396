use anyhow::{anyhow, Result};
use clap::Args;
use schoolsync::lens::export::{ExportLens, ExportSummary};
use schoolsync::lens::utils::OutputFormat;
use schoolsync::{Backend, SchoolSyncConfig};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{close_after, print_json};
use crate::open_store;

/// Arguments for the Export command
#[derive(Args)]
pub struct ExportArgs {
    /// Output file, defaults to `output_path` from the config
    #[clap(short, long)]
    pub output: Option<String>,

    /// Backend to read from: sqlite or mysql
    #[clap(short, long)]
    pub backend: Option<Backend>,

    /// SQLite database file, overrides `sqlite_path` from the config
    #[clap(long)]
    pub sqlite_path: Option<String>,

    /// Print the document to stdout instead of writing a file
    #[clap(long)]
    pub stdout: bool,
}

#[derive(Tabled)]
struct ExportRow {
    table: String,
    rows: usize,
    error: String,
}

pub fn run(config: &SchoolSyncConfig, args: ExportArgs, output_format: OutputFormat) -> Result<()> {
    let ExportArgs {
        output,
        backend,
        sqlite_path,
        stdout,
    } = args;

    let output = output.unwrap_or_else(|| config.output_path.clone());
    let backend = backend.unwrap_or(config.backend);
    let sqlite_path = sqlite_path.unwrap_or_else(|| config.sqlite_path.clone());

    let mut store = open_store(config, backend, &sqlite_path)?;

    if stdout {
        // The document is the only thing on stdout in this mode
        let (document, _) = ExportLens::new(store.as_mut()).run();
        close_after(store, Ok(()))?;
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| anyhow!("Failed to serialize to JSON: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    let result = ExportLens::new(store.as_mut()).export_to(&output);
    let summary = close_after(store, result)?;

    print_summary(&summary, output_format);
    Ok(())
}

fn print_summary(summary: &ExportSummary, output_format: OutputFormat) {
    if output_format.is_json() {
        print_json(summary, output_format);
        return;
    }

    let rows: Vec<ExportRow> = summary
        .tables
        .iter()
        .map(|s| ExportRow {
            table: s.table.clone(),
            rows: s.rows,
            error: s.error.clone().unwrap_or_default(),
        })
        .collect();

    match output_format {
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
        _ => println!("{}", Table::new(rows).with(Style::rounded())),
    }
    if let Some(output) = &summary.output {
        eprintln!("Exported to {}", output);
    }
}
