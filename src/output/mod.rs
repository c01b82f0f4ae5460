//! Output module for run reports and summaries
//!
//! This module handles:
//! - Recording one outcome row per job (and per upload)
//! - Exporting full and failures-only reports
//! - Summarizing a run on the console

mod export;
mod report;
mod summary;

pub use export::{export_report, uploads_path, write_rows, ExportError, REPORT_COLUMNS};
pub use report::{OutcomeRow, OutcomeStatus, ReportBuilder};
pub use summary::{print_summary, RunOutcome, RunSummary};
