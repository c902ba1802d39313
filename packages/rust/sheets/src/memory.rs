//! In-memory [`SheetSource`] for headless and test usage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use fieldcheck_shared::{FieldcheckError, Result};

use crate::{Grid, SheetSource, resolve_worksheet};

/// Fixed worksheets held in memory.
///
/// Counts every fetch so callers can observe cache hits, and can be switched
/// into an "unavailable" state to simulate a backend outage.
pub struct MemorySource {
    title: String,
    titles: Vec<String>,
    grids: Vec<Grid>,
    fetches: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemorySource {
    /// Create an empty spreadsheet with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            titles: Vec::new(),
            grids: Vec::new(),
            fetches: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Add a worksheet. The first row of `grid` is its header.
    pub fn with_sheet(mut self, title: impl Into<String>, grid: Vec<Vec<&str>>) -> Self {
        self.titles.push(title.into());
        self.grids.push(
            grid.into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
        );
        self
    }

    /// Number of `fetch_header` + `fetch_grid` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with `SourceUnavailable` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FieldcheckError::SourceUnavailable(
                "memory source switched off".into(),
            ));
        }
        Ok(())
    }

    fn grid(&self, sheet: &str) -> Result<&Grid> {
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let title = resolve_worksheet(&self.titles, sheet)
            .ok_or_else(|| FieldcheckError::sheet_not_found(sheet))?;
        let idx = self
            .titles
            .iter()
            .position(|t| t == title)
            .ok_or_else(|| FieldcheckError::sheet_not_found(sheet))?;
        Ok(&self.grids[idx])
    }
}

#[async_trait]
impl SheetSource for MemorySource {
    async fn spreadsheet_title(&self) -> Result<String> {
        self.check_available()?;
        Ok(self.title.clone())
    }

    async fn worksheet_titles(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.titles.clone())
    }

    async fn fetch_header(&self, sheet: &str) -> Result<Vec<String>> {
        Ok(self.grid(sheet)?.first().cloned().unwrap_or_default())
    }

    async fn fetch_grid(&self, sheet: &str) -> Result<Grid> {
        Ok(self.grid(sheet)?.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory spreadsheet '{}'", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        MemorySource::new("Test book")
            .with_sheet("Выборка", vec![vec!["ФИО", "Город"], vec!["Иван", "Москва"]])
            .with_sheet("Тексты", vec![vec!["", "c1"]])
    }

    #[tokio::test]
    async fn serves_header_and_grid() {
        let src = source();
        assert_eq!(src.fetch_header("выборка").await.unwrap(), vec!["ФИО", "Город"]);
        assert_eq!(src.fetch_grid("Выборка").await.unwrap().len(), 2);
        assert_eq!(src.fetch_count(), 2);
    }

    #[tokio::test]
    async fn unknown_sheet_is_not_found() {
        let err = source().fetch_grid("Нет такого").await.unwrap_err();
        assert!(matches!(err, FieldcheckError::SheetNotFound { .. }));
    }

    #[tokio::test]
    async fn outage_switch() {
        let src = source();
        src.set_unavailable(true);
        assert!(matches!(
            src.worksheet_titles().await,
            Err(FieldcheckError::SourceUnavailable(_))
        ));
        src.set_unavailable(false);
        assert_eq!(src.worksheet_titles().await.unwrap().len(), 2);
    }
}
