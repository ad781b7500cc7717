use crate::database::{DbConnection, DEFAULT_BATCH_SIZE, DEFAULT_DELETE_BATCH_SIZE};
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct ErdbConfig {
    /// Path to the SQLite database file
    pub db_path: String,

    /// Rows per insert or update batch (default: 100)
    pub batch_size: usize,

    /// Keys per DELETE statement when deleting many records (default: 100)
    pub delete_batch_size: usize,
}

const EMPTY_CONFIG: &str = r#"### erdb configuration file

### path to the SQLite database
# db_path = "~/.erdb/erdb.sqlite3"

### batching
# batch_size = 100            # rows per insert/update batch
# delete_batch_size = 100     # keys per DELETE statement
"#;

fn home_dir() -> Result<String> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .to_str()
        .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
        .to_owned())
}

impl Default for ErdbConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            db_path: format!("{}/.erdb/erdb.sqlite3", home_dir),
            batch_size: DEFAULT_BATCH_SIZE,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
        }
    }
}

impl ErdbConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<ErdbConfig> {
        let mut builder = Config::builder();

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    builder = builder.add_source(
                        config::File::from(path).format(config::FileFormat::Toml),
                    );
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                // By default use $HOME/.erdb/erdb.toml as the configuration file path
                let erdb_dir = format!("{}/.erdb", home_dir()?);
                std::fs::create_dir_all(erdb_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create erdb directory: {}", e))?;
                let p = format!("{}/erdb.toml", erdb_dir);
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of ERDB)
        // E.g., `ERDB_DB_PATH=/tmp/x.sqlite3 ./erdb tables` would use another database
        builder = builder.add_source(config::Environment::with_prefix("ERDB"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_settings(&config)
    }

    fn from_settings(config: &HashMap<String, String>) -> Result<ErdbConfig> {
        let defaults = ErdbConfig::default();

        let db_path = match config.get("db_path") {
            Some(p) => match p.strip_prefix("~/") {
                Some(rest) => format!("{}/{}", home_dir()?, rest),
                None => p.clone(),
            },
            None => defaults.db_path,
        };

        let batch_size = parse_size(config, "batch_size", defaults.batch_size)?;
        let delete_batch_size =
            parse_size(config, "delete_batch_size", defaults.delete_batch_size)?;

        Ok(ErdbConfig {
            db_path,
            batch_size,
            delete_batch_size,
        })
    }

    /// Open the configured database, creating its directory if needed.
    pub fn open_database(&self) -> Result<DbConnection> {
        if let Some(parent) = Path::new(&self.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow!("Failed to create directory '{}': {}", parent.display(), e)
                })?;
            }
        }
        let db = DbConnection::open_path(&self.db_path)?
            .with_batch_sizes(self.batch_size, self.delete_batch_size);
        Ok(db)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Database Path:      {}", self.db_path),
            format!("Batch Size:         {}", self.batch_size),
            format!("Delete Batch Size:  {}", self.delete_batch_size),
        ];
        if let Ok(meta) = std::fs::metadata(&self.db_path) {
            lines.push(format!("Database Size:      {} bytes", meta.len()));
        }
        lines.join("\n")
    }

    /// Get the default config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.erdb/erdb.toml", home_dir)
    }
}

fn parse_size(config: &HashMap<String, String>, key: &str, default: usize) -> Result<usize> {
    match config.get(key) {
        None => Ok(default),
        Some(s) => {
            let value: usize = s
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", key, s, e))?;
            if value == 0 {
                return Err(anyhow!("{} must be at least 1", key));
            }
            Ok(value)
        }
    }
}
