//! Spreadsheet backend access.
//!
//! The rest of fieldcheck only sees the narrow [`SheetSource`] trait: fetch the
//! header row or the whole grid of a worksheet by its logical name. This crate
//! provides:
//! - [`GoogleSheetsSource`] — Google Sheets API v4 over `reqwest`
//! - [`MemorySource`] — in-memory worksheets for headless and test usage
//! - [`resolve_worksheet`] — the fuzzy title lookup both sources share

mod auth;
mod google;
mod memory;

use async_trait::async_trait;
use fieldcheck_shared::{Result, normalize};

pub use auth::{Credentials, ServiceAccountKey, TokenProvider};
pub use google::{GoogleSheetsSource, SourceOptions};
pub use memory::MemorySource;

/// Raw cell grid of a worksheet: first row is the header. Rows may be ragged.
pub type Grid = Vec<Vec<String>>;

/// Read-only access to the worksheets of one spreadsheet.
///
/// Worksheet names are matched with [`resolve_worksheet`]; an unmatched name
/// fails with `FieldcheckError::SheetNotFound`. Transport and auth failures
/// surface as `FieldcheckError::SourceUnavailable`.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Title of the spreadsheet itself.
    async fn spreadsheet_title(&self) -> Result<String>;

    /// Titles of all worksheets, in tab order.
    async fn worksheet_titles(&self) -> Result<Vec<String>>;

    /// First row of the worksheet matching `sheet`.
    async fn fetch_header(&self, sheet: &str) -> Result<Vec<String>>;

    /// All rows of the worksheet matching `sheet`, header included.
    async fn fetch_grid(&self, sheet: &str) -> Result<Grid>;

    /// Non-secret identity of the credential in use, for diagnostics.
    fn describe(&self) -> String;
}

/// Find the worksheet title that `wanted` refers to.
///
/// Tries, in order: the exact title, a title equal after [`normalize`], and
/// a title whose normalized form contains the normalized `wanted`.
pub fn resolve_worksheet<'a>(titles: &'a [String], wanted: &str) -> Option<&'a str> {
    if let Some(exact) = titles.iter().find(|t| t.as_str() == wanted) {
        return Some(exact);
    }

    let target = normalize(wanted);
    if let Some(equal) = titles.iter().find(|t| normalize(t) == target) {
        return Some(equal);
    }

    titles
        .iter()
        .find(|t| normalize(t).contains(&target))
        .map(String::as_str)
}
