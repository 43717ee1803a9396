use anyhow::Result;
use clap::Args;
use schoolsync::lens::utils::OutputFormat;
use schoolsync::{format_size, get_sqlite_info, SchoolSyncConfig, SqliteDatabaseInfo};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::print_json;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Show row counts of every table in the SQLite database
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    backend: String,
    input_path: String,
    output_path: String,
    mysql: MySqlInfo,
    sqlite: SqliteDatabaseInfo,
}

#[derive(Debug, Serialize)]
struct MySqlInfo {
    host: String,
    port: u16,
    user: String,
    database: String,
    password_set: bool,
}

#[derive(Tabled)]
struct TableRow {
    table: String,
    rows: String,
}

pub fn run(config: &SchoolSyncConfig, args: ConfigArgs, output_format: OutputFormat) -> Result<()> {
    let ConfigArgs { verbose } = args;

    let info = ConfigInfo {
        config_file: SchoolSyncConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        backend: config.backend.to_string(),
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        mysql: MySqlInfo {
            host: config.mysql.host.clone(),
            port: config.mysql.port,
            user: config.mysql.user.clone(),
            database: config.mysql.database.clone(),
            password_set: config.mysql.password.is_some(),
        },
        sqlite: get_sqlite_info(config),
    };

    if output_format.is_json() {
        print_json(&info, output_format);
        return Ok(());
    }

    print_config_table(&info, verbose, output_format);
    Ok(())
}

fn print_config_table(info: &ConfigInfo, verbose: bool, output_format: OutputFormat) {
    println!("schoolsync Configuration");
    println!("========================\n");

    println!("General:");
    println!("  Config file:    {}", info.config_file);
    println!("  Data dir:       {}", info.data_dir);
    println!("  Backend:        {}", info.backend);
    println!("  Input:          {}", info.input_path);
    println!("  Output:         {}", info.output_path);
    println!();

    println!("MySQL:");
    println!(
        "  Server:         {}@{}:{}",
        info.mysql.user, info.mysql.host, info.mysql.port
    );
    println!("  Database:       {}", info.mysql.database);
    println!(
        "  Password:       {}",
        if info.mysql.password_set {
            "set"
        } else {
            "not set"
        }
    );
    println!();

    println!("SQLite Database:");
    println!("  Path:           {}", info.sqlite.path);
    println!(
        "  Status:         {}",
        if info.sqlite.exists {
            "exists"
        } else {
            "not created"
        }
    );
    if let Some(size) = info.sqlite.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    println!("  Schema:         {}", info.sqlite.schema_status);

    if verbose && !info.sqlite.tables.is_empty() {
        let rows: Vec<TableRow> = info
            .sqlite
            .tables
            .iter()
            .map(|t| TableRow {
                table: t.table.clone(),
                rows: t
                    .rows
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "missing".to_string()),
            })
            .collect();
        println!();
        match output_format {
            OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
            _ => println!("{}", Table::new(rows).with(Style::rounded())),
        }
    }

    eprintln!();
    eprintln!("Tips:");
    eprintln!("  Use --verbose (-v) to see row counts of every table");
    eprintln!("  Use --format json for machine-readable output");
    eprintln!("  Edit ~/.schoolsync/schoolsync.toml to customize settings");
}
