/// Image extensions recognised in URL paths
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];

/// Fallback extension when neither the content type nor the URL tells
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Infers a file extension (with leading dot) for a fetched resource
///
/// The response content type wins; otherwise the URL path is inspected.
/// Returns None when neither source identifies an image type.
pub fn infer_extension(url: &str, content_type: Option<&str>) -> Option<String> {
    if let Some(ext) = content_type.and_then(extension_from_content_type) {
        return Some(ext.to_string());
    }
    extension_from_url(url)
}

/// Like [`infer_extension`] but falls back to `.bin`
pub fn extension_or_fallback(url: &str, content_type: Option<&str>) -> String {
    infer_extension(url, content_type).unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("jpeg") {
        Some(".jpg")
    } else if ct.contains("png") {
        Some(".png")
    } else if ct.contains("gif") {
        Some(".gif")
    } else if ct.contains("webp") {
        Some(".webp")
    } else if ct.contains("bmp") {
        Some(".bmp")
    } else if ct.contains("svg") {
        Some(".svg")
    } else {
        None
    }
}

fn extension_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let path = parsed.path().to_ascii_lowercase();
    let (_, ext) = path.rsplit_once('.')?;
    IMAGE_EXTENSIONS
        .contains(&ext)
        .then(|| format!(".{}", ext))
}
