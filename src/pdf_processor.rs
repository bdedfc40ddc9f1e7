use crate::types::*;
use lopdf::{Document as PdfDocument, Object};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Page setup handed to the renderer.
#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub page_format: &'static str,
    pub print_background: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            page_format: "A4",
            print_background: true,
        }
    }
}

pub struct PdfProcessor {
    chrome_path: PathBuf,
    timeout: Duration,
}

impl PdfProcessor {
    pub fn new(chrome_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            chrome_path: chrome_path.into(),
            timeout,
        }
    }

    /// Raw text of every page, in page order, without layout reconstruction.
    ///
    /// Fails on the first page whose content cannot be read; no partial text
    /// is returned.
    pub fn extract_text(&self, content: &[u8]) -> Result<String, ConversionError> {
        let doc = PdfDocument::load_mem(content)?;
        let pages = doc.get_pages();

        let mut text = String::new();
        for (&number, &page_id) in &pages {
            // lopdf skips content streams it cannot resolve, so check them first.
            for stream_id in doc.get_page_contents(page_id) {
                doc.get_object(stream_id).and_then(Object::as_stream)?;
            }
            text.push_str(&doc.extract_text(&[number])?);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }

        log::debug!("Extracted {} characters from {} PDF pages", text.len(), pages.len());
        Ok(text)
    }

    /// Render an HTML page to PDF with a headless browser.
    ///
    /// Each call gets its own scratch directory and browser profile; the
    /// browser process is killed and the directory removed on every exit
    /// path, including timeouts.
    pub async fn render(&self, html: &str, options: &PrintOptions) -> Result<Vec<u8>, ConversionError> {
        let workspace = tempfile::tempdir()?;
        let input_path = workspace.path().join("page.html");
        let output_path = workspace.path().join("page.pdf");
        let profile_path = workspace.path().join("profile");

        tokio::fs::write(&input_path, with_print_style(html, options)).await?;

        let mut cmd = Command::new(&self.chrome_path);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--user-data-dir={}", profile_path.display()))
            .arg(format!("--print-to-pdf={}", output_path.display()))
            .arg(format!("file://{}", input_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("Launching renderer {}", self.chrome_path.display());

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ConversionError::RenderFailed {
                    message: format!("could not start {}: {}", self.chrome_path.display(), e),
                })
            }
            Err(_) => {
                log::error!("PDF rendering timed out after {:?}", self.timeout);
                return Err(ConversionError::RenderTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::RenderFailed {
                message: format!(
                    "renderer exited with {}: {}",
                    output.status,
                    stderr.chars().take(500).collect::<String>()
                ),
            });
        }

        let pdf = tokio::fs::read(&output_path)
            .await
            .map_err(|e| ConversionError::RenderFailed {
                message: format!("renderer produced no PDF: {}", e),
            })?;

        if pdf.is_empty() {
            return Err(ConversionError::RenderFailed {
                message: "renderer produced an empty PDF".to_string(),
            });
        }

        log::debug!("Rendered PDF: {} bytes", pdf.len());
        Ok(pdf)
    }
}

/// Inject the page size and background printing rules into `html`.
fn with_print_style(html: &str, options: &PrintOptions) -> String {
    let mut style = format!("<style>@page {{ size: {}; }}", options.page_format);
    if options.print_background {
        style.push_str(" html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }");
    }
    style.push_str("</style>");

    match html.to_ascii_lowercase().find("<head>") {
        Some(index) => {
            let split = index + "<head>".len();
            format!("{}{}{}", &html[..split], style, &html[split..])
        }
        None => format!("{}{}", style, html),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};
    use std::os::unix::fs::PermissionsExt;

    pub(crate) fn sample_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap();
        output
    }

    /// Single page whose `Contents` points at an object that does not exist.
    fn pdf_with_missing_contents() -> Vec<u8> {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => Object::Reference((999, 0)),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap();
        output
    }

    /// Executable stand-in for the browser, written into `dir`.
    fn fake_renderer(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("fake-chromium");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Gone, or a zombie waiting to be reaped.
    fn process_exited(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with(['Z', 'X']))
                .unwrap_or(false),
        }
    }

    fn processor() -> PdfProcessor {
        PdfProcessor::new("/nonexistent/chromium", Duration::from_secs(5))
    }

    #[test]
    fn extracts_text_from_pages() {
        let text = processor().extract_text(&sample_pdf(&["Hello World"])).unwrap();
        assert!(text.contains("Hello World"));
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = processor().extract_text(b"plain text").unwrap_err();
        assert!(matches!(err, ConversionError::Pdf(_)));
    }

    #[test]
    fn unreadable_page_fails_extraction() {
        let err = processor().extract_text(&pdf_with_missing_contents()).unwrap_err();
        assert!(matches!(err, ConversionError::Pdf(_)));
    }

    #[test]
    fn print_style_goes_into_head() {
        let html = with_print_style("<html><HEAD><title>x</title></HEAD></html>", &PrintOptions::default());
        assert!(html.starts_with("<html><HEAD><style>@page { size: A4; }"));
        assert!(html.contains("print-color-adjust: exact"));

        let fragment = with_print_style("<p>hi</p>", &PrintOptions::default());
        assert!(fragment.starts_with("<style>"));
        assert!(fragment.ends_with("<p>hi</p>"));
    }

    #[tokio::test]
    async fn missing_renderer_is_a_render_failure() {
        let err = processor().render("<p>hi</p>", &PrintOptions::default()).await.unwrap_err();
        assert!(matches!(err, ConversionError::RenderFailed { .. }));
    }

    #[tokio::test]
    async fn renderer_output_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = fake_renderer(
            dir.path(),
            r#"for arg in "$@"; do
  case "$arg" in
    --print-to-pdf=*) printf '%%PDF-1.4 fake' > "${arg#--print-to-pdf=}" ;;
  esac
done"#,
        );

        let pdf = PdfProcessor::new(renderer, Duration::from_secs(10))
            .render("<p>hi</p>", &PrintOptions::default())
            .await
            .unwrap();
        assert_eq!(pdf, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn renderer_without_output_is_a_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = fake_renderer(dir.path(), "exit 0");

        let err = PdfProcessor::new(renderer, Duration::from_secs(10))
            .render("<p>hi</p>", &PrintOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("renderer produced no PDF"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn hung_renderer_is_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("renderer.pid");
        let renderer = fake_renderer(
            dir.path(),
            &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
        );

        let err = PdfProcessor::new(renderer, Duration::from_millis(750))
            .render("<p>hi</p>", &PrintOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::RenderTimeout { .. }));

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let mut exited = false;
        for _ in 0..40 {
            if process_exited(pid) {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(exited, "renderer {} still running after timeout", pid);
    }
}
