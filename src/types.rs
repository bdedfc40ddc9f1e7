use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Engine family an input format is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCategory {
    StructuredData,
    Image,
    Document,
}

impl EngineCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineCategory::StructuredData => "structured-data",
            EngineCategory::Image => "image",
            EngineCategory::Document => "document",
        }
    }
}

impl std::fmt::Display for EngineCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("File and target format are required")]
    MissingParameter,

    #[error("Could not determine input format")]
    InputFormatUndetermined,

    #[error("Conversion from {from} to {to} is not allowed.")]
    ConversionNotAllowed { from: String, to: String },

    #[error("Unsupported input format: {format}")]
    UnsupportedInputFormat { format: String },

    #[error("Unsupported {category} conversion: {from} → {to}")]
    UnsupportedConversion {
        category: EngineCategory,
        from: String,
        to: String,
    },

    #[error("{message}")]
    ShapeMismatch { message: String },

    #[error("{message}")]
    ConversionFailed { message: String },

    #[error("File size {actual} exceeds limit {limit}")]
    SizeLimit { actual: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization failed: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid INI: {0}")]
    Ini(#[from] ini::ParseError),

    #[error("Invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("PDF processing error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF rendering timed out after {secs}s")]
    RenderTimeout { secs: u64 },

    #[error("PDF rendering failed: {message}")]
    RenderFailed { message: String },

    #[error("Internal server error")]
    Internal { message: String },
}

impl ConversionError {
    pub fn shape(message: impl Into<String>) -> Self {
        ConversionError::ShapeMismatch {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ConversionError::Internal {
            message: message.into(),
        }
    }

    /// Collapses an engine-level failure into the client-facing variant,
    /// keeping the engine's message verbatim.
    pub fn into_conversion_failed(self) -> Self {
        match self {
            failed @ ConversionError::ConversionFailed { .. } => failed,
            other => ConversionError::ConversionFailed {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ResponseError for ConversionError {
    fn status_code(&self) -> StatusCode {
        match self {
            ConversionError::SizeLimit { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ConversionError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ConversionError::Internal { message } = self {
            log::error!("Internal error: {}", message);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Converted payload ready to be streamed back to the caller.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub content: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

impl ConversionResult {
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"{}\"",
            self.filename.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompressionSettings {
    pub quality: u8, // 1-100 for JPEG and WebP
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_collapse_into_conversion_failed() {
        let err = ConversionError::shape("JSON input must be an array to convert to NDJSON")
            .into_conversion_failed();
        assert!(matches!(err, ConversionError::ConversionFailed { .. }));
        assert_eq!(err.to_string(), "JSON input must be an array to convert to NDJSON");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ConversionError::internal("multipart stream broke");
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn content_disposition_quotes_filename() {
        let result = ConversionResult {
            content: vec![1],
            content_type: "application/json",
            filename: "report.v2.json".to_string(),
        };
        assert_eq!(
            result.content_disposition(),
            "attachment; filename=\"report.v2.json\""
        );
    }
}
