//! Format classification: filename → canonical format identifier →
//! engine category, plus the response-side MIME and filename helpers.

use crate::types::{ConversionError, EngineCategory};

pub const STRUCTURED_DATA_FORMATS: &[&str] = &["csv", "json", "toml", "yaml", "ini", "xml", "ndjson"];
pub const IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const DOCUMENT_FORMATS: &[&str] = &["markdown", "html", "pdf"];

/// Formats that are only ever produced, never accepted as input.
pub const OUTPUT_ONLY_DATA_FORMATS: &[&str] = &["xlsx"];

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("csv", "text/csv"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("toml", "application/toml"),
    ("yaml", "application/x-yaml"),
    ("ini", "text/plain"),
    ("xml", "application/xml"),
    ("ndjson", "application/x-ndjson"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

/// Canonical format identifier for an uploaded file name.
pub fn classify(filename: &str) -> Result<String, ConversionError> {
    let (_, extension) = filename
        .rsplit_once('.')
        .ok_or(ConversionError::InputFormatUndetermined)?;

    if extension.is_empty() {
        return Err(ConversionError::InputFormatUndetermined);
    }

    let format = extension.to_lowercase();
    Ok(match format.as_str() {
        "md" => "markdown".to_string(),
        _ => format,
    })
}

pub fn category_of(format: &str) -> Option<EngineCategory> {
    if STRUCTURED_DATA_FORMATS.contains(&format) {
        Some(EngineCategory::StructuredData)
    } else if IMAGE_FORMATS.contains(&format) {
        Some(EngineCategory::Image)
    } else if DOCUMENT_FORMATS.contains(&format) {
        Some(EngineCategory::Document)
    } else {
        None
    }
}

pub fn categorize(format: &str) -> Result<EngineCategory, ConversionError> {
    category_of(format).ok_or_else(|| ConversionError::UnsupportedInputFormat {
        format: format.to_string(),
    })
}

pub fn content_type_for(target: &str) -> &'static str {
    CONTENT_TYPES
        .iter()
        .find(|(format, _)| *format == target)
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Replaces the last extension of `original` with `target`.
pub fn output_filename(original: &str, target: &str) -> String {
    let base = match original.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() && !ext.contains('/') => base,
        _ => original,
    };
    format!("{}.{}", base, target)
}
