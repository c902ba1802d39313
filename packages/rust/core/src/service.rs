//! The service facade: cached reads of the two source sheets and the
//! operations the request layer calls.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldcheck_sheets::{SheetSource, resolve_worksheet};
use fieldcheck_shared::{
    AssignmentReport, FieldcheckError, Result, ServiceConfig, TextLookup,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::assignments::{AssignmentProbe, match_assignments, probe_assignments};
use crate::cache::{CacheKind, RefreshHandle, TtlCache, cache_key};
use crate::columns::{ColumnMapping, ResolvedColumns};
use crate::rows::{Row, build_rows};
use crate::texts::resolve_text;

/// A cached snapshot of one sheet: its header or its parsed rows.
#[derive(Debug, Clone)]
enum CachedSheet {
    Header(Arc<Vec<String>>),
    Rows(Arc<Vec<Row>>),
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of one warm-up load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Loaded,
    Failed { error: String },
    /// Not attempted because an earlier step failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmupStep {
    /// Cache key the step fills.
    pub key: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Result of clearing and re-warming the cache.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub timestamp: DateTime<Utc>,
    pub steps: Vec<WarmupStep>,
}

impl RefreshReport {
    /// Whether every warm-up step loaded.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.outcome == StepOutcome::Loaded)
    }

    pub fn first_failure(&self) -> Option<&WarmupStep> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }
}

/// Stage of [`SheetService::debug_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStep {
    SpreadsheetTitle,
    WorksheetTitles,
    SelectionHeader,
    TextsHeader,
}

impl fmt::Display for ConnectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SpreadsheetTitle => "open spreadsheet",
            Self::WorksheetTitles => "list worksheets",
            Self::SelectionHeader => "read selection header",
            Self::TextsHeader => "read texts header",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionFailure {
    pub step: ConnectionStep,
    pub error: String,
    pub hint: Option<String>,
}

/// Everything learned while exercising each source call once.
///
/// Fields after the failed step keep their empty defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub source: String,
    pub spreadsheet_title: Option<String>,
    pub worksheets: Vec<String>,
    pub selection_sheet_title: Option<String>,
    pub selection_header: Vec<String>,
    pub texts_sheet_title: Option<String>,
    pub texts_header: Vec<String>,
    pub column_mapping: ColumnMapping,
    pub failure: Option<ConnectionFailure>,
}

impl ConnectionReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

// ---------------------------------------------------------------------------
// SheetService
// ---------------------------------------------------------------------------

/// Read-only access to assignments and instruction texts, cached per sheet.
pub struct SheetService {
    source: Arc<dyn SheetSource>,
    config: ServiceConfig,
    cache: TtlCache<CachedSheet>,
}

impl fmt::Debug for SheetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetService")
            .field("source", &self.source.describe())
            .field("selection_sheet", &self.config.selection_sheet)
            .field("texts_sheet", &self.config.texts_sheet)
            .field("ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

impl SheetService {
    pub fn new(source: Arc<dyn SheetSource>, config: ServiceConfig) -> Self {
        let cache = TtlCache::new(config.ttl);
        Self {
            source,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Keys currently held by the cache, expired ones included.
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    // -- Cached reads -------------------------------------------------------

    /// Header row of `sheet`, from cache or the source.
    pub async fn read_header(&self, sheet: &str) -> Result<Arc<Vec<String>>> {
        let key = cache_key(CacheKind::SheetHeader, sheet);
        if let Some(CachedSheet::Header(header)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(header);
        }

        let header = Arc::new(self.source.fetch_header(sheet).await?);
        self.cache.set(key, CachedSheet::Header(Arc::clone(&header)));
        Ok(header)
    }

    /// Data rows of `sheet`, from cache or the source.
    pub async fn read_rows(&self, sheet: &str) -> Result<Arc<Vec<Row>>> {
        let key = cache_key(CacheKind::Sheet, sheet);
        if let Some(CachedSheet::Rows(rows)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(rows);
        }

        let grid = self.source.fetch_grid(sheet).await?;
        let rows = Arc::new(build_rows(&grid));
        debug!(%key, rows = rows.len(), "fetched sheet");
        self.cache.set(key, CachedSheet::Rows(Arc::clone(&rows)));
        Ok(rows)
    }

    async fn read_sheet(&self, sheet: &str) -> Result<(Arc<Vec<String>>, Arc<Vec<Row>>)> {
        let header = self.read_header(sheet).await?;
        let rows = self.read_rows(sheet).await?;
        Ok((header, rows))
    }

    fn selection_hint(&self) -> String {
        format!(
            "The service account has no access to the spreadsheet or the sheet '{}' was not found. \
             Share the spreadsheet with the client_email from the key file and check the sheet name.",
            self.config.selection_sheet
        )
    }

    async fn read_selection(&self) -> Result<(Arc<Vec<String>>, Arc<Vec<Row>>)> {
        let sheet = &self.config.selection_sheet;
        self.read_sheet(sheet)
            .await
            .map_err(|e| FieldcheckError::source_read(self.selection_hint(), e))
    }

    // -- Operations ---------------------------------------------------------

    /// Wave-1 assignments of the person named `fio`.
    #[instrument(skip_all, fields(fio = %fio))]
    pub async fn get_assignments(&self, fio: &str) -> Result<AssignmentReport> {
        let (header, rows) = self.read_selection().await?;
        let columns = ResolvedColumns::resolve(&header, &self.config.columns);
        let report = match_assignments(fio, &columns, &rows);

        info!(
            rows = report.diagnostics.total_rows,
            name_matches = report.diagnostics.total_fio_matches,
            items = report.items.len(),
            "assignments lookup"
        );
        Ok(report)
    }

    /// Instruction text for a partner + method pair.
    #[instrument(skip_all, fields(partner = %partner, method = %method))]
    pub async fn get_text(&self, partner: &str, method: &str) -> Result<TextLookup> {
        let sheet = &self.config.texts_sheet;
        let (header, rows) = self.read_sheet(sheet).await.map_err(|e| {
            FieldcheckError::source_read(
                format!("Could not read the sheet '{sheet}' with instruction texts."),
                e,
            )
        })?;

        let lookup = resolve_text(partner, method, &header, &rows)?;
        debug!(column = ?lookup.column, found = !lookup.found.is_empty(), "text lookup");
        Ok(lookup)
    }

    /// How `fio` compares against the assignment sheet, ignoring the wave filter.
    #[instrument(skip_all, fields(fio = %fio))]
    pub async fn debug_assignments(&self, fio: &str) -> Result<AssignmentProbe> {
        let (header, rows) = self.read_selection().await?;
        let columns = ResolvedColumns::resolve(&header, &self.config.columns);
        Ok(probe_assignments(fio, &header, &columns, &rows))
    }

    /// Clear the cache, then reload both sheets.
    ///
    /// Warm-up stops at the first failed load; the remaining steps are
    /// reported as skipped and the cache keeps whatever loaded. Failures are
    /// logged and reported, never returned as errors.
    #[instrument(skip_all)]
    pub async fn force_refresh(&self) -> RefreshReport {
        self.cache.clear();

        let sheets = [
            self.config.selection_sheet.as_str(),
            self.config.texts_sheet.as_str(),
        ];
        let mut steps = Vec::with_capacity(sheets.len() * 2);
        let mut failed = false;

        for sheet in sheets {
            for kind in [CacheKind::SheetHeader, CacheKind::Sheet] {
                let key = cache_key(kind, sheet);
                if failed {
                    steps.push(WarmupStep {
                        key,
                        outcome: StepOutcome::Skipped,
                    });
                    continue;
                }

                let loaded = match kind {
                    CacheKind::SheetHeader => self.read_header(sheet).await.map(drop),
                    CacheKind::Sheet => self.read_rows(sheet).await.map(drop),
                };
                let outcome = match loaded {
                    Ok(()) => StepOutcome::Loaded,
                    Err(e) => {
                        warn!(%key, error = %e, "cache warm-up failed");
                        failed = true;
                        StepOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                steps.push(WarmupStep { key, outcome });
            }
        }

        let report = RefreshReport {
            timestamp: Utc::now(),
            steps,
        };
        if report.is_complete() {
            info!(timestamp = %report.timestamp, "cache refreshed");
        }
        report
    }

    /// Request-layer name for [`force_refresh`](Self::force_refresh).
    pub async fn refresh_cache(&self) -> RefreshReport {
        self.force_refresh().await
    }

    /// Exercise every source call once, uncached, and report where it fails.
    #[instrument(skip_all)]
    pub async fn debug_connection(&self) -> ConnectionReport {
        let mut report = ConnectionReport {
            source: self.source.describe(),
            ..Default::default()
        };
        if let Err(failure) = self.probe_connection(&mut report).await {
            warn!(step = %failure.step, error = %failure.error, "connection check failed");
            report.failure = Some(failure);
        }
        report
    }

    async fn probe_connection(&self, report: &mut ConnectionReport) -> std::result::Result<(), ConnectionFailure> {
        let fail = |step: ConnectionStep, error: FieldcheckError, hint: Option<&str>| ConnectionFailure {
            step,
            error: error.to_string(),
            hint: hint.map(String::from),
        };

        let title = self.source.spreadsheet_title().await.map_err(|e| {
            fail(
                ConnectionStep::SpreadsheetTitle,
                e,
                Some("check that the service account email has access to the spreadsheet"),
            )
        })?;
        report.spreadsheet_title = Some(title);

        report.worksheets = self
            .source
            .worksheet_titles()
            .await
            .map_err(|e| fail(ConnectionStep::WorksheetTitles, e, None))?;

        report.selection_sheet_title =
            resolve_worksheet(&report.worksheets, &self.config.selection_sheet).map(String::from);
        report.texts_sheet_title =
            resolve_worksheet(&report.worksheets, &self.config.texts_sheet).map(String::from);

        if let Some(title) = &report.selection_sheet_title {
            report.selection_header = self
                .source
                .fetch_header(title)
                .await
                .map_err(|e| fail(ConnectionStep::SelectionHeader, e, None))?;
        }
        if let Some(title) = &report.texts_sheet_title {
            report.texts_header = self
                .source
                .fetch_header(title)
                .await
                .map_err(|e| fail(ConnectionStep::TextsHeader, e, None))?;
        }

        report.column_mapping = ColumnMapping::resolve(&report.selection_header, &self.config.columns);
        Ok(())
    }

    /// Start the background loop that re-warms the cache every `ttl`.
    ///
    /// The loop holds only a weak reference and ends once the service is
    /// dropped. Dropping the returned handle stops it as well.
    pub fn start_refresher(self: &Arc<Self>) -> RefreshHandle {
        let weak = Arc::downgrade(self);
        info!(period = ?self.config.ttl, "starting cache refresher");
        RefreshHandle::spawn(self.config.ttl, move || {
            let weak = weak.clone();
            async move {
                let Some(service) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                service.force_refresh().await;
                ControlFlow::Continue(())
            }
        })
    }
}
