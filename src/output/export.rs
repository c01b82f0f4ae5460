//! Tabular report export
//!
//! Rows are written with a fixed column order. The `csv` format quotes fields
//! that contain delimiters, quotes or newlines; the `flat` format never
//! quotes and instead rewrites those characters so a row always stays on one
//! line with a fixed number of fields.

use crate::config::ReportFormat;
use crate::output::report::OutcomeRow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column order for download reports
pub const REPORT_COLUMNS: [&str; 8] = [
    "code",
    "url",
    "status",
    "httpStatus",
    "size",
    "filename",
    "archiveIndex",
    "error",
];

/// Extra trailing column for upload reports
pub const REMOTE_REF_COLUMN: &str = "remoteRef";

/// Placeholder for commas in flattened text
const FLAT_COMMA: &str = ";";

/// Errors raised while writing a report
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode report: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes rows to any writer
///
/// # Arguments
///
/// * `writer` - Destination
/// * `rows` - Rows in the order they should appear
/// * `format` - Quoting strategy
/// * `with_remote_ref` - Append the `remoteRef` column (upload reports)
pub fn write_rows<W: Write>(
    writer: W,
    rows: &[OutcomeRow],
    format: ReportFormat,
    with_remote_ref: bool,
) -> Result<(), ExportError> {
    let quote_style = match format {
        ReportFormat::Csv => csv::QuoteStyle::Necessary,
        ReportFormat::Flat => csv::QuoteStyle::Never,
    };
    let mut out = csv::WriterBuilder::new()
        .quote_style(quote_style)
        .from_writer(writer);

    let mut header: Vec<&str> = REPORT_COLUMNS.to_vec();
    if with_remote_ref {
        header.push(REMOTE_REF_COLUMN);
    }
    out.write_record(&header)?;

    for row in rows {
        let mut fields = row_fields(row);
        if with_remote_ref {
            fields.push(row.remote_ref.clone().unwrap_or_default());
        }
        if format == ReportFormat::Flat {
            fields = fields.iter().map(|f| flatten(f)).collect();
        }
        out.write_record(&fields)?;
    }

    out.flush()?;
    Ok(())
}

/// Writes rows to a file, creating parent directories as needed
pub fn export_report(
    path: &Path,
    rows: &[OutcomeRow],
    format: ReportFormat,
    with_remote_ref: bool,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(path)?);
    write_rows(file, rows, format, with_remote_ref)?;
    tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Path of the upload report that sits next to the main report
///
/// `out/report.csv` becomes `out/report_uploads.csv`.
pub fn uploads_path(report_path: &Path) -> PathBuf {
    let stem = report_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let name = match report_path.extension() {
        Some(ext) => format!("{}_uploads.{}", stem, ext.to_string_lossy()),
        None => format!("{}_uploads", stem),
    };
    report_path.with_file_name(name)
}

fn row_fields(row: &OutcomeRow) -> Vec<String> {
    vec![
        row.code.clone(),
        row.url.clone(),
        row.status.as_str().to_string(),
        row.http_status.map(|s| s.to_string()).unwrap_or_default(),
        row.byte_size.map(|s| s.to_string()).unwrap_or_default(),
        row.final_path.clone().unwrap_or_default(),
        row.archive_index.map(|i| i.to_string()).unwrap_or_default(),
        row.error_message.clone().unwrap_or_default(),
    ]
}

/// Rewrites text so it can't break an unquoted row
fn flatten(field: &str) -> String {
    field
        .replace(',', FLAT_COMMA)
        .replace(['\r', '\n'], " ")
        .replace('"', "'")
}
