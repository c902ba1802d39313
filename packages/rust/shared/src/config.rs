//! Application configuration for fieldcheck.
//!
//! User config lives at `~/.fieldcheck/fieldcheck.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::columns::ColumnAliases;
use crate::error::{FieldcheckError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "fieldcheck.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".fieldcheck";

// ---------------------------------------------------------------------------
// Config structs (matching fieldcheck.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Spreadsheet location and credentials.
    #[serde(default)]
    pub spreadsheet: SpreadsheetConfig,

    /// Cache behaviour.
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Header aliases for the assignment sheet.
    #[serde(default)]
    pub columns: ColumnAliases,
}

/// `[spreadsheet]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    /// Google spreadsheet key (the long id in the sheet URL).
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Path to the service-account JSON key.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,

    /// Name of an env var holding a ready bearer token. When set and
    /// non-empty it is used instead of the service-account key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_env: Option<String>,

    /// Sheets API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// HTTP timeout for source requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Logical name of the assignment sheet.
    #[serde(default = "default_selection_sheet")]
    pub selection_sheet: String,

    /// Logical name of the instruction-text sheet.
    #[serde(default = "default_texts_sheet")]
    pub texts_sheet: String,
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials_file: default_credentials_file(),
            access_token_env: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            selection_sheet: default_selection_sheet(),
            texts_sheet: default_texts_sheet(),
        }
    }
}

fn default_credentials_file() -> String {
    "service-account.json".into()
}
fn default_api_base() -> String {
    "https://sheets.googleapis.com/v4".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_selection_sheet() -> String {
    "Выборка".into()
}
fn default_texts_sheet() -> String {
    "Тексты".into()
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime and background refresh period, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    120
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port (the `PORT` env var wins over this).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the static front-end, served at `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,

    /// Page served for `/` when `static_dir` is set.
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            index_file: default_index_file(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_index_file() -> String {
    "new_index.html".into()
}

// ---------------------------------------------------------------------------
// Service config (runtime, derived from the file)
// ---------------------------------------------------------------------------

/// Runtime settings for the sheet service: the subset of [`AppConfig`]
/// the data-access layer needs.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Logical name of the assignment sheet.
    pub selection_sheet: String,
    /// Logical name of the instruction-text sheet.
    pub texts_sheet: String,
    /// Cache entry lifetime and refresh period.
    pub ttl: Duration,
    /// Header aliases, read-only after startup.
    pub columns: ColumnAliases,
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            selection_sheet: config.spreadsheet.selection_sheet.clone(),
            texts_sheet: config.spreadsheet.texts_sheet.clone(),
            ttl: Duration::from_secs(config.cache.ttl_secs),
            columns: config.columns.clone(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.fieldcheck/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FieldcheckError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.fieldcheck/fieldcheck.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FieldcheckError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FieldcheckError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_cache(&config)?;
    Ok(config)
}

/// Reject a zero TTL. The TTL is also the background refresh period.
pub fn validate_cache(config: &AppConfig) -> Result<()> {
    if config.cache.ttl_secs == 0 {
        return Err(FieldcheckError::config(
            "cache.ttl_secs must be at least 1 second",
        ));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FieldcheckError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FieldcheckError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FieldcheckError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the spreadsheet id is set and that some credential is reachable.
pub fn validate_spreadsheet(config: &AppConfig) -> Result<()> {
    let sheet = &config.spreadsheet;
    if sheet.spreadsheet_id.trim().is_empty() {
        return Err(FieldcheckError::config(
            "spreadsheet.spreadsheet_id is empty. Copy the id from the spreadsheet URL.",
        ));
    }

    if let Some(var_name) = &sheet.access_token_env {
        if matches!(std::env::var(var_name), Ok(val) if !val.is_empty()) {
            return Ok(());
        }
    }

    if !Path::new(&sheet.credentials_file).exists() {
        return Err(FieldcheckError::config(format!(
            "service account file not found: {}. Put the JSON key there or set \
             spreadsheet.credentials_file.",
            sheet.credentials_file
        )));
    }
    Ok(())
}
