//! Document engine: Markdown, HTML and PDF.

use crate::pdf_processor::{PdfProcessor, PrintOptions};
use crate::types::{ConversionError, EngineCategory};
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use std::collections::HashMap;

/// Stylesheet wrapped around rendered Markdown before printing.
const PRINT_STYLESHEET: &str = r#"
      body { font-family: sans-serif; line-height: 1.6; padding: 20px; max-width: 800px; margin: 0 auto; }
      h1, h2, h3 { color: #333; }
      code { background: #f4f4f4; padding: 2px 5px; border-radius: 3px; }
      pre { background: #f4f4f4; padding: 15px; border-radius: 5px; overflow-x: auto; }
      blockquote { border-left: 4px solid #ddd; margin: 0; padding-left: 20px; color: #666; }
      img { max-width: 100%; height: auto; }
      table { border-collapse: collapse; width: 100%; margin-bottom: 1em; }
      th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
      th { background-color: #f2f2f2; }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentOp {
    MarkdownToHtml,
    HtmlToMarkdown,
    HtmlToPdf,
    MarkdownToPdf,
    PdfToText,
    PdfToHtml,
    PdfToMarkdown,
}

static CONVERSIONS: Lazy<HashMap<(&'static str, &'static str), DocumentOp>> = Lazy::new(|| {
    HashMap::from([
        (("markdown", "html"), DocumentOp::MarkdownToHtml),
        (("html", "markdown"), DocumentOp::HtmlToMarkdown),
        (("html", "pdf"), DocumentOp::HtmlToPdf),
        (("markdown", "pdf"), DocumentOp::MarkdownToPdf),
        (("pdf", "text"), DocumentOp::PdfToText),
        (("pdf", "html"), DocumentOp::PdfToHtml),
        (("pdf", "markdown"), DocumentOp::PdfToMarkdown),
    ])
});

pub struct DocumentProcessor {
    pdf_processor: PdfProcessor,
    print_options: PrintOptions,
}

impl DocumentProcessor {
    pub fn new(pdf_processor: PdfProcessor) -> Self {
        Self {
            pdf_processor,
            print_options: PrintOptions::default(),
        }
    }

    pub fn supports(&self, from: &str, to: &str) -> bool {
        CONVERSIONS.contains_key(&(from, to))
    }

    pub async fn convert(&self, content: &[u8], from: &str, to: &str) -> Result<Vec<u8>, ConversionError> {
        let op = CONVERSIONS
            .get(&(from, to))
            .copied()
            .ok_or_else(|| ConversionError::UnsupportedConversion {
                category: EngineCategory::Document,
                from: from.to_string(),
                to: to.to_string(),
            })?;

        log::debug!("Document conversion {:?} ({} bytes)", op, content.len());

        match op {
            DocumentOp::MarkdownToHtml => Ok(markdown_to_html(&as_text(content)).into_bytes()),
            DocumentOp::HtmlToMarkdown => Ok(html2md::parse_html(&as_text(content)).into_bytes()),
            DocumentOp::HtmlToPdf => self.pdf_processor.render(&as_text(content), &self.print_options).await,
            DocumentOp::MarkdownToPdf => {
                let page = styled_page(&markdown_to_html(&as_text(content)));
                self.pdf_processor.render(&page, &self.print_options).await
            }
            DocumentOp::PdfToText => Ok(self.pdf_processor.extract_text(content)?.into_bytes()),
            DocumentOp::PdfToHtml => {
                let text = self.pdf_processor.extract_text(content)?;
                Ok(styled_page(&paragraphs_to_html(&text)).into_bytes())
            }
            DocumentOp::PdfToMarkdown => {
                let text = self.pdf_processor.extract_text(content)?;
                Ok(paragraphs_to_markdown(&text).into_bytes())
            }
        }
    }
}

fn as_text(content: &[u8]) -> String {
    String::from_utf8_lossy(content).into_owned()
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

fn styled_page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        PRINT_STYLESHEET, body
    )
}

/// Blank-line separated blocks of extracted text; lines inside a block are joined.
fn paragraphs(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join(" "));
    }
    blocks
}

fn paragraphs_to_html(text: &str) -> String {
    paragraphs(text)
        .iter()
        .map(|block| format!("<p>{}</p>\n", escape_html(block)))
        .collect()
}

fn paragraphs_to_markdown(text: &str) -> String {
    let mut markdown = paragraphs(text).join("\n\n");
    markdown.push('\n');
    markdown
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
