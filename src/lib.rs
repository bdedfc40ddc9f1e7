//! Format Converter Library
//!
//! Converts uploaded files between structured-data, image and document
//! formats. The input format is inferred from the file name, checked against
//! a fixed rule table, and routed to the engine for its category.

pub mod config;
pub mod converter;
pub mod document_processor;
pub mod formats;
pub mod image_processor;
pub mod pdf_processor;
pub mod routes;
pub mod rules;
pub mod text_processor;
pub mod types;

pub use config::ServerConfig;
pub use converter::DocumentConverter;
pub use types::*;
