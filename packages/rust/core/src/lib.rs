//! Data access and matching layer for fieldcheck.
//!
//! [`SheetService`] ties the pieces together: it reads the assignment and
//! texts sheets through a [`TtlCache`], resolves header columns by alias,
//! builds keyed rows and runs the name and text lookups on them.

pub mod assignments;
pub mod cache;
pub mod columns;
pub mod rows;
pub mod service;
pub mod texts;

pub use assignments::{AssignmentProbe, is_wave_one, match_assignments, probe_assignments};
pub use cache::{CacheKind, MIN_REFRESH_PERIOD, RefreshHandle, TtlCache, cache_key};
pub use columns::{ColumnMapping, ResolvedColumns, find_column};
pub use fieldcheck_shared::normalize;
pub use rows::{Row, build_rows, disambiguate_header};
pub use service::{
    ConnectionFailure, ConnectionReport, ConnectionStep, RefreshReport, SheetService, StepOutcome,
    WarmupStep,
};
pub use texts::resolve_text;
