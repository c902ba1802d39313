//! Shared types, error model, and configuration for fieldcheck.
//!
//! This crate is the foundation depended on by all other fieldcheck crates.
//! It provides:
//! - [`FieldcheckError`] — the unified error type
//! - Output types ([`Assignment`], [`MatchDiagnostics`], [`TextLookup`])
//! - [`normalize()`] — the fuzzy-comparison key for cells and headers
//! - The column alias table ([`ColumnField`], [`ColumnAliases`])
//! - Configuration ([`AppConfig`], [`ServiceConfig`], config loading)

pub mod columns;
pub mod config;
pub mod error;
pub mod normalize;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use columns::{ColumnAliases, ColumnField};
pub use config::{
    AppConfig, CacheConfig, ServerConfig, ServiceConfig, SpreadsheetConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_cache, validate_spreadsheet,
};
pub use error::{FieldcheckError, Result};
pub use normalize::{normalize, normalize_opt};
pub use types::{Assignment, AssignmentReport, MatchDiagnostics, TextLookup, WaveCheck};
