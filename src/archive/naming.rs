use chrono::{DateTime, Local};

/// Zero-pads a 1-based sequence number to at least two digits
pub fn pad_sequence(seq: usize) -> String {
    format!("{:02}", seq)
}

/// Builds the path of an entry inside an archive
///
/// `pattern` may use `{code}`, `{seq}` and `{ext}` (extension with its leading
/// dot). With `group_by_code`, the entry is nested under `<code>/`.
///
/// # Examples
///
/// ```
/// use image_harvest::archive::entry_name;
///
/// assert_eq!(entry_name("{code}_{seq}{ext}", "A1", "03", ".jpg", false), "A1_03.jpg");
/// assert_eq!(entry_name("{seq}{ext}", "A1", "03", ".jpg", true), "A1/03.jpg");
/// ```
pub fn entry_name(pattern: &str, code: &str, seq: &str, ext: &str, group_by_code: bool) -> String {
    let base = pattern
        .replace("{code}", code)
        .replace("{seq}", seq)
        .replace("{ext}", ext);
    if group_by_code {
        format!("{}/{}", code, base)
    } else {
        base
    }
}

/// Builds an archive file name: `<prefix>_part<NN>_<YYYYMMDD_HHMM>.<extension>`
pub fn archive_name(prefix: &str, part: u32, at: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_part{:02}_{}.{}",
        prefix,
        part,
        at.format("%Y%m%d_%H%M"),
        extension
    )
}

/// Makes `name` unique by appending `_<n>` before its extension
pub fn numbered_variant(name: &str, n: usize) -> String {
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, name),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", file, n),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}
