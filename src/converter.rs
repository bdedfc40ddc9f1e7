use crate::config::ServerConfig;
use crate::document_processor::DocumentProcessor;
use crate::formats;
use crate::image_processor::ImageProcessor;
use crate::pdf_processor::PdfProcessor;
use crate::rules;
use crate::text_processor::TextProcessor;
use crate::types::*;
use uuid::Uuid;

/// Routes one upload through classification, the rule table and the
/// matching engine. Holds no per-request state.
pub struct DocumentConverter {
    text_processor: TextProcessor,
    image_processor: ImageProcessor,
    document_processor: DocumentProcessor,
}

impl DocumentConverter {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            text_processor: TextProcessor::new(),
            image_processor: ImageProcessor::new(),
            document_processor: DocumentProcessor::new(PdfProcessor::new(
                config.chrome_path.clone(),
                config.render_timeout,
            )),
        }
    }

    pub async fn handle_convert(
        &self,
        content: &[u8],
        original_name: &str,
        target: &str,
    ) -> Result<ConversionResult, ConversionError> {
        if content.is_empty() || target.is_empty() {
            return Err(ConversionError::MissingParameter);
        }

        let request_id = Uuid::new_v4();
        let from = formats::classify(original_name)?;

        log::info!(
            "[{}] Converting {} ({} bytes): {} -> {}",
            request_id,
            original_name,
            content.len(),
            from,
            target
        );

        if !rules::permits(&from, target) {
            log::warn!("[{}] Rejected by rule table: {} -> {}", request_id, from, target);
            return Err(ConversionError::ConversionNotAllowed {
                from,
                to: target.to_string(),
            });
        }

        let category = formats::categorize(&from).map_err(|e| {
            log::warn!("[{}] {}", request_id, e);
            e
        })?;

        let converted = match category {
            EngineCategory::StructuredData => self.text_processor.convert(content, &from, target),
            EngineCategory::Image => self.image_processor.convert(content, &from, target),
            EngineCategory::Document => self.document_processor.convert(content, &from, target).await,
        }
        .map_err(|e| {
            log::warn!("[{}] {} engine failed: {}", request_id, category, e);
            e.into_conversion_failed()
        })?;

        let result = ConversionResult {
            content: converted,
            content_type: formats::content_type_for(target),
            filename: formats::output_filename(original_name, target),
        };

        log::info!(
            "[{}] ✅ Converted {} -> {} ({} bytes, {})",
            request_id,
            original_name,
            result.filename,
            result.content.len(),
            result.content_type
        );

        Ok(result)
    }

    /// Whether the engine for `from` implements the pair, independent of the rule table.
    pub fn engine_supports(&self, from: &str, to: &str) -> bool {
        match formats::category_of(from) {
            Some(EngineCategory::StructuredData) => self.text_processor.supports(from, to),
            Some(EngineCategory::Image) => self.image_processor.supports(from, to),
            Some(EngineCategory::Document) => self.document_processor.supports(from, to),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn converter() -> DocumentConverter {
        DocumentConverter::new(&ServerConfig {
            chrome_path: "/nonexistent/chromium".into(),
            render_timeout: Duration::from_secs(5),
            ..ServerConfig::default()
        })
    }

    #[test]
    fn every_rule_pair_has_an_engine() {
        let converter = converter();
        for (from, targets) in rules::CONVERSION_RULES {
            for to in *targets {
                assert!(converter.engine_supports(from, to), "{} -> {} has no engine", from, to);
            }
        }
    }

    #[tokio::test]
    async fn csv_to_json_end_to_end() {
        let result = converter()
            .handle_convert(b"a,b\n1,2\n", "data.csv", "json")
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&result.content).unwrap();
        assert_eq!(value, serde_json::json!([{"a": "1", "b": "2"}]));
        assert_eq!(result.content_type, "application/json");
        assert_eq!(result.filename, "data.json");
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let converter = converter();
        assert!(matches!(
            converter.handle_convert(b"", "data.csv", "json").await,
            Err(ConversionError::MissingParameter)
        ));
        assert!(matches!(
            converter.handle_convert(b"a,b", "data.csv", "").await,
            Err(ConversionError::MissingParameter)
        ));
    }

    #[tokio::test]
    async fn disallowed_pair_never_reaches_engine() {
        // Malformed input would fail in the engine; the rule check fires first.
        let err = converter()
            .handle_convert(b"\xff\xfe not csv", "data.csv", "yaml")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Conversion from csv to yaml is not allowed.");
    }

    #[tokio::test]
    async fn unknown_extension_is_unsupported_input() {
        let err = converter().handle_convert(b"abc", "file.xyz", "json").await.unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedInputFormat { .. }));
    }

    #[tokio::test]
    async fn unruled_inputs_defer_to_engine() {
        let converter = converter();

        let result = converter
            .handle_convert(b"title = \"x\"\n", "conf.toml", "json")
            .await
            .unwrap();
        assert_eq!(result.filename, "conf.json");

        let err = converter.handle_convert(b"\x89PNG", "photo.jpeg", "csv").await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported image conversion: jpeg → csv");
    }

    #[tokio::test]
    async fn engine_errors_become_conversion_failed() {
        let err = converter()
            .handle_convert(br#"{"a":1}"#, "data.json", "ndjson")
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::ConversionFailed { .. }));
        assert_eq!(err.to_string(), "JSON input must be an array to convert to NDJSON");
    }
}
