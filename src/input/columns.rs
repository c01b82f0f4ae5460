//! Column detection for product sheets
//!
//! Header keywords cover both English and Arabic sheets.

/// Keywords marking the product code column
const CODE_KEYWORDS: [&str; 7] = ["code", "sku", "product", "كود", "رمز", "الصنف", "المنتج"];

/// Keywords marking the image links column
const LINK_KEYWORDS: [&str; 10] = [
    "links", "images", "image", "url", "الرابط", "الروابط", "الصور", "لينكات", "لينك", "link",
];

/// Rows inspected when inferring columns without a header
const INFERENCE_ROWS: usize = 200;

/// Indices of the code and links columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub code: usize,
    pub links: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self { code: 0, links: 1 }
    }
}

fn matches_any_keyword(cell: &str, keywords: &[&str]) -> bool {
    let cell = cell.trim().to_lowercase();
    keywords.iter().any(|k| cell.contains(k))
}

fn is_url(cell: &str) -> bool {
    let lower = cell.to_ascii_lowercase();
    lower.contains("http://") || lower.contains("https://")
}

/// Checks whether the first row is a header row
pub fn looks_like_header(row: &[String]) -> bool {
    row.iter().any(|cell| {
        !is_url(cell)
            && (matches_any_keyword(cell, &CODE_KEYWORDS)
                || matches_any_keyword(cell, &LINK_KEYWORDS))
    })
}

/// Detects the code and links columns
///
/// With a header row, the first header matching each keyword set wins
/// (defaulting to columns 0 and 1). Without one, the first rows are scored:
/// the links column is the one with the most URL cells, and the code column
/// is the remaining column with the most distinct non-URL values.
pub fn detect_columns(header: Option<&[String]>, rows: &[Vec<String>]) -> ColumnLayout {
    if let Some(header) = header {
        return detect_from_header(header);
    }
    infer_from_rows(rows)
}

fn detect_from_header(header: &[String]) -> ColumnLayout {
    let defaults = ColumnLayout::default();
    let code = header
        .iter()
        .position(|h| matches_any_keyword(h, &CODE_KEYWORDS))
        .unwrap_or(defaults.code);
    let links = header
        .iter()
        .enumerate()
        .position(|(i, h)| i != code && matches_any_keyword(h, &LINK_KEYWORDS))
        .unwrap_or(defaults.links);
    ColumnLayout { code, links }
}

fn infer_from_rows(rows: &[Vec<String>]) -> ColumnLayout {
    let sample = &rows[..rows.len().min(INFERENCE_ROWS)];
    let columns = sample.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return ColumnLayout::default();
    }

    let mut url_scores = vec![0usize; columns];
    let mut code_scores = vec![0usize; columns];
    let mut distinct: Vec<std::collections::HashSet<&str>> = vec![Default::default(); columns];

    for row in sample {
        for (c, cell) in row.iter().enumerate() {
            let value = cell.trim();
            if value.is_empty() {
                continue;
            }
            if is_url(value) {
                url_scores[c] += 1;
            } else {
                code_scores[c] += 1;
            }
            distinct[c].insert(value);
        }
    }

    let max_urls = url_scores.iter().copied().max().unwrap_or(0);
    let links = if max_urls == 0 {
        ColumnLayout::default().links
    } else {
        url_scores
            .iter()
            .position(|&s| s == max_urls)
            .unwrap_or(ColumnLayout::default().links)
    };

    let code = (0..columns)
        .filter(|&c| c != links)
        .map(|c| (c, distinct[c].len() + code_scores[c]))
        .fold(None::<(usize, usize)>, |best, (c, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((c, score)),
        })
        .map(|(c, _)| c)
        .unwrap_or(0);

    ColumnLayout { code, links }
}
