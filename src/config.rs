use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which relational store to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded SQLite database file (default)
    #[default]
    Sqlite,
    /// MySQL server (requires the `mysql` feature)
    Mysql,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            "mysql" => Ok(Backend::Mysql),
            _ => Err(format!(
                "Unknown backend '{}'. Valid backends: sqlite, mysql",
                s
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::Mysql => write!(f, "mysql"),
        }
    }
}

/// Connection parameters for the MySQL backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
            database: "school_management".to_string(),
        }
    }
}

/// Runtime configuration of schoolsync
#[derive(Debug, Clone)]
pub struct SchoolSyncConfig {
    /// Path to the directory holding schoolsync's data
    pub data_dir: String,

    /// Default backend for import and export
    pub backend: Backend,

    /// JSON document read by `import`
    pub input_path: String,

    /// JSON document written by `export`
    pub output_path: String,

    /// SQLite database file
    pub sqlite_path: String,

    pub mysql: MySqlSettings,
}

const EMPTY_CONFIG: &str = r#"### schoolsync configuration file

### directory for data used by schoolsync
# data_dir = "~/.schoolsync"

### backend used by import and export: sqlite or mysql
# backend = "sqlite"

### documents read by import and written by export
# input_path = "~/.schoolsync/student_data.json"
# output_path = "~/.schoolsync/school_database.json"

### SQLite database file
# sqlite_path = "~/.schoolsync/school.sqlite3"

### MySQL connection (password via SCHOOLSYNC_MYSQL_PASSWORD or PASSWORD)
# mysql_host = "localhost"
# mysql_port = 3306
# mysql_user = "root"
# mysql_database = "school_management"
"#;

impl Default for SchoolSyncConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self::with_data_dir(format!("{}/.schoolsync", home_dir))
    }
}

impl SchoolSyncConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Reads the TOML file at `path` (or `$HOME/.schoolsync/schoolsync.toml`),
    /// writing a commented template when it does not exist, then applies
    /// `SCHOOLSYNC_*` environment overrides.
    pub fn new(path: &Option<String>) -> Result<SchoolSyncConfig> {
        let mut builder = Config::builder();

        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let schoolsync_dir = format!("{}/.schoolsync", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(schoolsync_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create schoolsync directory: {}", e))?;
                let p = format!("{}/schoolsync.toml", schoolsync_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `SCHOOLSYNC_BACKEND=mysql schoolsync import` selects the MySQL backend
        builder = builder.add_source(config::Environment::with_prefix("SCHOOLSYNC"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let mut config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        if !config.contains_key("mysql_password") {
            if let Ok(password) = std::env::var("PASSWORD") {
                config.insert("mysql_password".to_string(), password);
            }
        }

        if !config.contains_key("data_dir") {
            config.insert("data_dir".to_string(), schoolsync_dir);
        }

        Self::from_map(&config)
    }

    /// Build a configuration from flat key-value settings
    ///
    /// Missing keys fall back to defaults derived from `data_dir`.
    pub fn from_map(config: &HashMap<String, String>) -> Result<SchoolSyncConfig> {
        let mut result = match config.get("data_dir") {
            Some(dir) => Self::with_data_dir(expand_home(dir)),
            None => Self::default(),
        };

        if let Some(backend) = config.get("backend") {
            result.backend = backend.parse::<Backend>().map_err(|e| anyhow!(e))?;
        }
        if let Some(p) = config.get("input_path") {
            result.input_path = expand_home(p);
        }
        if let Some(p) = config.get("output_path") {
            result.output_path = expand_home(p);
        }
        if let Some(p) = config.get("sqlite_path") {
            result.sqlite_path = expand_home(p);
        }

        if let Some(host) = config.get("mysql_host") {
            result.mysql.host = host.clone();
        }
        if let Some(port) = config.get("mysql_port") {
            result.mysql.port = port
                .parse()
                .map_err(|e| anyhow!("Invalid mysql_port '{}': {}", port, e))?;
        }
        if let Some(user) = config.get("mysql_user") {
            result.mysql.user = user.clone();
        }
        if let Some(database) = config.get("mysql_database") {
            result.mysql.database = database.clone();
        }
        if let Some(password) = config.get("mysql_password") {
            result.mysql.password = Some(password.clone());
        }

        Ok(result)
    }

    fn with_data_dir(data_dir: String) -> Self {
        let dir = data_dir.trim_end_matches('/').to_string();
        Self {
            input_path: format!("{}/student_data.json", dir),
            output_path: format!("{}/school_database.json", dir),
            sqlite_path: format!("{}/school.sqlite3", dir),
            data_dir,
            backend: Backend::default(),
            mysql: MySqlSettings::default(),
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let password = if self.mysql.password.is_some() {
            "(set)"
        } else {
            "(not set)"
        };

        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Backend:            {}", self.backend),
            format!("Input Path:         {}", self.input_path),
            format!("Output Path:        {}", self.output_path),
            format!("SQLite Path:        {}", self.sqlite_path),
            format!(
                "MySQL:              {}@{}:{}/{}",
                self.mysql.user, self.mysql.host, self.mysql.port, self.mysql.database
            ),
            format!("MySQL Password:     {}", password),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.schoolsync/schoolsync.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

// =============================================================================
// SQLite database info (used by the config command)
// =============================================================================

/// Row count of one table
#[derive(Debug, Serialize, Clone)]
pub struct TableInfo {
    pub table: String,
    /// `None` when the table does not exist
    pub rows: Option<u64>,
}

/// Information about the SQLite database
#[derive(Debug, Serialize, Clone)]
pub struct SqliteDatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub schema_status: String,
    pub tables: Vec<TableInfo>,
}

/// Get SQLite database information
pub fn get_sqlite_info(config: &SchoolSyncConfig) -> SqliteDatabaseInfo {
    use crate::database::SchoolDatabase;

    let sqlite_path = config.sqlite_path.clone();
    let sqlite_exists = Path::new(&sqlite_path).exists();
    let size_bytes = if sqlite_exists {
        std::fs::metadata(&sqlite_path).ok().map(|m| m.len())
    } else {
        None
    };

    let (schema_status, tables) = if sqlite_exists {
        match SchoolDatabase::open(&sqlite_path) {
            Ok(db) => {
                let status = db
                    .schema_status()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| format!("error: {}", e));
                let tables = db
                    .table_counts()
                    .into_iter()
                    .map(|(table, rows)| TableInfo {
                        table: table.to_string(),
                        rows,
                    })
                    .collect();
                (status, tables)
            }
            Err(e) => (format!("error: {}", e), Vec::new()),
        }
    } else {
        ("not created".to_string(), Vec::new())
    };

    SqliteDatabaseInfo {
        path: sqlite_path,
        exists: sqlite_exists,
        size_bytes,
        schema_status,
        tables,
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
