use crate::input::columns::{detect_columns, looks_like_header, ColumnLayout};
use crate::input::ProductRecord;
use crate::InputError;
use std::path::Path;

/// Products extracted from one sheet
#[derive(Debug, Clone)]
pub struct ExtractedSheet {
    /// Products that have at least one link, in sheet order
    pub records: Vec<ProductRecord>,

    /// Data rows in the sheet, including products without links
    pub total_rows: usize,

    /// Columns the records were read from
    pub layout: ColumnLayout,
}

impl ExtractedSheet {
    /// Total number of links across all records
    pub fn total_links(&self) -> usize {
        self.records.iter().map(|r| r.links.len()).sum()
    }
}

/// Reads a CSV sheet and extracts product records
///
/// # Returns
///
/// * `Ok(ExtractedSheet)` - At least one product with links was found
/// * `Err(InputError)` - The file could not be read, is empty, or has no
///   products with links
pub fn read_csv(path: &Path) -> Result<ExtractedSheet, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    tracing::debug!("Read {} raw rows from {}", rows.len(), path.display());
    extract_records(rows)
}

/// Extracts product records from raw rows
///
/// The first row is treated as a header when it contains code or link
/// keywords. Rows with an empty code or no links are skipped.
pub fn extract_records(rows: Vec<Vec<String>>) -> Result<ExtractedSheet, InputError> {
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(InputError::Empty);
    }

    let has_header = looks_like_header(&rows[0]);
    let (header, body) = if has_header {
        (Some(rows[0].as_slice()), &rows[1..])
    } else {
        (None, &rows[..])
    };

    if body.is_empty() {
        return Err(InputError::Empty);
    }

    let layout = detect_columns(header, body);
    tracing::debug!(
        "Using column {} for codes and column {} for links (header: {})",
        layout.code,
        layout.links,
        has_header
    );

    let records: Vec<ProductRecord> = body
        .iter()
        .filter_map(|row| {
            let code = row.get(layout.code).map(String::as_str).unwrap_or("");
            let links = row.get(layout.links).map(String::as_str).unwrap_or("");
            ProductRecord::from_cells(code, links)
        })
        .collect();

    if records.is_empty() {
        return Err(InputError::NoProducts { rows: body.len() });
    }

    Ok(ExtractedSheet {
        records,
        total_rows: body.len(),
        layout,
    })
}
