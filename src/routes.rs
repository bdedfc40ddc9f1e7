//! HTTP surface: `POST /convert`, `GET /formats`, `GET /health`.

use crate::converter::DocumentConverter;
use crate::formats::{DOCUMENT_FORMATS, IMAGE_FORMATS, OUTPUT_ONLY_DATA_FORMATS, STRUCTURED_DATA_FORMATS};
use crate::rules::CONVERSION_RULES;
use crate::types::*;
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpResponse, Result};
use bytes::BytesMut;
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;

/// Largest upload accepted by `POST /convert`.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub u64);

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/formats", web::get().to(list_formats))
        .route("/convert", web::post().to(convert_file));
}

async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "format-converter",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

#[derive(Debug, Serialize)]
struct FormatCategories {
    document: Vec<&'static str>,
    data: Vec<&'static str>,
    image: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct FormatsResponse {
    categories: FormatCategories,
    rules: BTreeMap<&'static str, &'static [&'static str]>,
}

async fn list_formats() -> Result<HttpResponse> {
    let data = STRUCTURED_DATA_FORMATS
        .iter()
        .chain(OUTPUT_ONLY_DATA_FORMATS)
        .copied()
        .collect();

    Ok(HttpResponse::Ok().json(FormatsResponse {
        categories: FormatCategories {
            document: DOCUMENT_FORMATS.to_vec(),
            data,
            image: IMAGE_FORMATS.to_vec(),
        },
        rules: CONVERSION_RULES.iter().copied().collect(),
    }))
}

#[derive(Debug, Default)]
struct ConvertForm {
    file: Option<(String, Vec<u8>)>,
    target: Option<String>,
}

/// Drain the multipart body into the `file` and `to` fields; other fields are ignored.
async fn read_form(mut payload: Multipart, limit: u64) -> Result<ConvertForm, ConversionError> {
    let mut form = ConvertForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ConversionError::internal(format!("Multipart error: {}", e)))?;
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ConversionError::internal(format!("Read error: {}", e)))?;
            let actual = (data.len() + chunk.len()) as u64;
            if actual > limit {
                return Err(ConversionError::SizeLimit { actual, limit });
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => form.file = Some((filename.unwrap_or_default(), data.to_vec())),
            "to" => form.target = Some(String::from_utf8_lossy(&data).into_owned()),
            other => log::debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(form)
}

async fn convert_file(
    payload: Multipart,
    converter: web::Data<DocumentConverter>,
    limit: web::Data<UploadLimit>,
) -> Result<HttpResponse, ConversionError> {
    let form = read_form(payload, limit.0).await?;

    let (original_name, content) = form.file.unwrap_or_default();
    let target = form.target.unwrap_or_default();

    let result = converter
        .handle_convert(&content, &original_name, &target)
        .await?;

    Ok(HttpResponse::Ok()
        .content_type(result.content_type)
        .insert_header((header::CONTENT_DISPOSITION, result.content_disposition()))
        .body(result.content))
}
