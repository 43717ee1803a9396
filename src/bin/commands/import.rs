use anyhow::Result;
use clap::Args;
use schoolsync::lens::import::{ImportDocument, ImportLens, ImportSummary};
use schoolsync::lens::utils::OutputFormat;
use schoolsync::{Backend, SchoolSyncConfig};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{close_after, print_json};
use crate::open_store;

/// Arguments for the Import command
#[derive(Args)]
pub struct ImportArgs {
    /// JSON document to import, defaults to `input_path` from the config
    #[clap(short, long)]
    pub input: Option<String>,

    /// Backend to write to: sqlite or mysql
    #[clap(short, long)]
    pub backend: Option<Backend>,

    /// SQLite database file, overrides `sqlite_path` from the config
    #[clap(long)]
    pub sqlite_path: Option<String>,
}

#[derive(Tabled)]
struct ImportRow {
    table: String,
    written: usize,
    skipped: usize,
}

pub fn run(config: &SchoolSyncConfig, args: ImportArgs, output_format: OutputFormat) -> Result<()> {
    let ImportArgs {
        input,
        backend,
        sqlite_path,
    } = args;

    let input = input.unwrap_or_else(|| config.input_path.clone());
    let backend = backend.unwrap_or(config.backend);
    let sqlite_path = sqlite_path.unwrap_or_else(|| config.sqlite_path.clone());

    // Read the document before touching the database
    let document = ImportDocument::from_path(&input)?;

    let mut store = open_store(config, backend, &sqlite_path)?;
    let result = ImportLens::new(store.as_mut()).run(&document);
    let summary = close_after(store, result)?;

    print_summary(&summary, output_format);
    Ok(())
}

fn print_summary(summary: &ImportSummary, output_format: OutputFormat) {
    if output_format.is_json() {
        print_json(summary, output_format);
        return;
    }

    let rows: Vec<ImportRow> = summary
        .tables
        .iter()
        .map(|s| ImportRow {
            table: s.table.clone(),
            written: s.written,
            skipped: s.skipped,
        })
        .collect();

    match output_format {
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
        _ => println!("{}", Table::new(rows).with(Style::rounded())),
    }
}
