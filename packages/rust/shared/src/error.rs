//! Error types for fieldcheck.
//!
//! Library crates use [`FieldcheckError`] via `thiserror`.
//! The server binary wraps this with `color-eyre` at the CLI edge and maps
//! it onto JSON error bodies at the HTTP edge.

use std::path::PathBuf;

/// Top-level error type for all fieldcheck operations.
#[derive(Debug, thiserror::Error)]
pub enum FieldcheckError {
    /// The named worksheet does not exist in the spreadsheet.
    #[error("sheet '{sheet}' not found in the spreadsheet")]
    SheetNotFound { sheet: String },

    /// Authentication or network failure while reaching the spreadsheet backend.
    #[error("spreadsheet source unavailable: {0}")]
    SourceUnavailable(String),

    /// A sheet does not have the fixed shape the lookup expects.
    #[error("sheet structure invalid: {message}")]
    StructureInvalid { message: String },

    /// A read from the source failed; carries an actionable hint for the operator.
    #[error("{hint} Details: {source}")]
    SourceRead {
        hint: String,
        #[source]
        source: Box<FieldcheckError>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed payload from the source (unexpected JSON, bad key file, ...).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FieldcheckError>;

impl FieldcheckError {
    /// Create a sheet-not-found error for the given logical sheet name.
    pub fn sheet_not_found(sheet: impl Into<String>) -> Self {
        Self::SheetNotFound {
            sheet: sheet.into(),
        }
    }

    /// Create a structure error from any displayable message.
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::StructureInvalid {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a failed source read with an operator-facing hint.
    pub fn source_read(hint: impl Into<String>, source: FieldcheckError) -> Self {
        Self::SourceRead {
            hint: hint.into(),
            source: Box::new(source),
        }
    }

    /// Short machine-readable kind, used as the `error` field of HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SheetNotFound { .. } => "sheet_not_found",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::StructureInvalid { .. } => "structure_invalid",
            Self::SourceRead { .. } => "read_failed",
            Self::Config { .. } => "config",
            Self::Parse { .. } => "parse",
            Self::Io { .. } => "io",
        }
    }

    /// The innermost cause, skipping `SourceRead` wrappers.
    pub fn root(&self) -> &FieldcheckError {
        match self {
            Self::SourceRead { source, .. } => source.root(),
            other => other,
        }
    }
}
