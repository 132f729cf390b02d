use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{info, warn};

/// How the uploaded bytes are to be decoded. Chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    PlainText,
}

impl SourceFormat {
    /// Format implied by a file extension: `.txt`/`.md` are plain text, anything else is PDF.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => SourceFormat::PlainText,
            _ => SourceFormat::Pdf,
        }
    }
}

/// Text recovered from a document. `degraded` marks placeholder text that
/// stands in for content that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub page_count: u32,
    pub degraded: bool,
}

impl Extraction {
    fn degraded(text: String) -> Self {
        Self {
            text,
            page_count: 1,
            degraded: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    /// Skip decoding entirely and return a placeholder.
    pub fast_mode: bool,
}

impl Extractor {
    pub fn new(fast_mode: bool) -> Self {
        Self { fast_mode }
    }

    /// Always produces non-empty text; decoding failures become placeholders.
    pub fn extract(&self, bytes: &[u8], format: SourceFormat, original_name: &str) -> Extraction {
        if self.fast_mode {
            info!(name = original_name, "fast extraction mode, skipping decode");
            return Extraction::degraded(fast_mode_text(original_name));
        }

        match format {
            SourceFormat::PlainText => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                if text.trim().is_empty() {
                    return Extraction::degraded(empty_text(original_name));
                }
                info!(name = original_name, chars = text.len(), "decoded plain text document");
                Extraction {
                    text,
                    page_count: 1,
                    degraded: false,
                }
            }
            SourceFormat::Pdf => extract_pdf(bytes, original_name),
        }
    }
}

fn extract_pdf(bytes: &[u8], original_name: &str) -> Extraction {
    match decode_pdf_pages(bytes) {
        Ok(pages) => assemble_pages(pages, original_name),
        Err(e) => {
            warn!(name = original_name, error = %e, "PDF decode failed, using fallback text");
            Extraction::degraded(decode_failure_text(original_name))
        }
    }
}

/// Join decoded pages with blank lines. A PDF without any text layer gets a placeholder.
fn assemble_pages(pages: Vec<String>, original_name: &str) -> Extraction {
    let text = pages.join("\n\n").trim().to_string();
    if text.is_empty() {
        warn!(name = original_name, pages = pages.len(), "PDF has no extractable text");
        return Extraction::degraded(image_only_text(original_name));
    }

    let page_count = (pages.len() as u32).max(1);
    info!(name = original_name, chars = text.len(), page_count, "extracted PDF text");
    Extraction {
        text,
        page_count,
        degraded: false,
    }
}

/// Per-page text layer. pdf-extract can panic on malformed input, so panics
/// are reported as decode errors.
fn decode_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(format!("PDF parse error: {}", e)),
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(format!("PDF decoder panicked: {}", msg))
        }
    }
}

/// Words from the file name, e.g. `NHAI-AI-Engineer_2025.pdf` -> `NHAI AI Engineer 2025`.
fn filename_hint(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(original_name);
    stem.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fast_mode_text(original_name: &str) -> String {
    format!(
        "PDF Document: {original_name}\n\n\
         Text extraction is disabled on this deployment, so the document content is not available. \
         Questions can still be asked, but answers will not be grounded in the document."
    )
}

fn empty_text(original_name: &str) -> String {
    format!("Document: {original_name}\n\nThis document does not contain any text.")
}

fn image_only_text(original_name: &str) -> String {
    format!(
        "PDF Document: {original_name}\n\n\
         This PDF appears to be image-based or contains no extractable text. \
         Please try uploading a text-based PDF or use the sample document to test the chat functionality."
    )
}

fn decode_failure_text(original_name: &str) -> String {
    let mut text = format!(
        "PDF Document Analysis: {original_name}\n\n\
         This appears to be a PDF document, but its text could not be extracted automatically."
    );
    let hint = filename_hint(original_name);
    if !hint.is_empty() {
        text.push_str(&format!(
            "\n\nBased on the file name \"{original_name}\", this document appears to relate to: {hint}."
        ));
    }
    text.push_str(
        "\n\nTo get the best results, you could:\n\
         1. Try uploading the document again\n\
         2. Use the sample document to test the chat functionality\n\
         3. Paste the relevant text directly into the chat\n\n\
         Questions about the topic suggested by the file name can still be answered in general terms.",
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_decoded_directly() {
        let extraction = Extractor::default().extract(
            "Hello\n\nWorld".as_bytes(),
            SourceFormat::PlainText,
            "ChatPDF Demo Document",
        );
        assert_eq!(extraction.text, "Hello\n\nWorld");
        assert_eq!(extraction.page_count, 1);
        assert!(!extraction.degraded);
    }

    #[test]
    fn test_empty_plain_text_substituted() {
        let extraction = Extractor::default().extract(b"   \n", SourceFormat::PlainText, "notes.txt");
        assert!(extraction.degraded);
        assert!(!extraction.text.trim().is_empty());
    }

    #[test]
    fn test_fast_mode_skips_decode() {
        let extraction = Extractor::new(true).extract(b"%PDF-1.7 ...", SourceFormat::Pdf, "big.pdf");
        assert!(extraction.degraded);
        assert_eq!(extraction.page_count, 1);
        assert!(extraction.text.contains("big.pdf"));
    }

    #[test]
    fn test_corrupt_pdf_absorbed_into_fallback() {
        let extraction = Extractor::default().extract(
            b"definitely not a pdf",
            SourceFormat::Pdf,
            "NHAI-AI-Engineer-Notification-2025.pdf",
        );
        assert!(extraction.degraded);
        assert_eq!(extraction.page_count, 1);
        assert!(extraction
            .text
            .contains("NHAI AI Engineer Notification 2025"));
    }

    #[test]
    fn test_pages_joined_with_blank_lines() {
        let pages = vec![
            "Expressway budget.".to_string(),
            "Bridge inspections.".to_string(),
            "Toll revenue.".to_string(),
        ];
        let extraction = assemble_pages(pages, "report.pdf");
        assert_eq!(
            extraction.text,
            "Expressway budget.\n\nBridge inspections.\n\nToll revenue."
        );
        assert_eq!(extraction.page_count, 3);
        assert!(!extraction.degraded);
    }

    #[test]
    fn test_blank_pages_become_image_placeholder() {
        let pages = vec!["  \n".to_string(), String::new(), "\t".to_string()];
        let extraction = assemble_pages(pages, "scan.pdf");
        assert!(extraction.degraded);
        assert_eq!(extraction.page_count, 1);
        assert_eq!(extraction.text, image_only_text("scan.pdf"));

        let extraction = assemble_pages(Vec::new(), "empty.pdf");
        assert!(extraction.degraded);
        assert_eq!(extraction.page_count, 1);
    }

    /// Minimal PDF with one line of Courier text per page.
    fn text_pdf(lines: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_real_pdf_pages_decoded() {
        let bytes = text_pdf(&["Expressway budget", "Bridge inspections"]);
        let extraction = Extractor::default().extract(&bytes, SourceFormat::Pdf, "roads.pdf");

        assert!(!extraction.degraded);
        assert_eq!(extraction.page_count, 2);
        assert!(extraction.text.contains("Expressway"));
        assert!(extraction.text.contains("Bridge"));
        let first = extraction.text.find("Expressway").unwrap();
        let second = extraction.text.find("Bridge").unwrap();
        assert!(first < second);
        assert!(extraction.text[first..second].contains("\n\n"));
    }

    #[test]
    fn test_filename_hint() {
        assert_eq!(filename_hint("annual_report-2024.pdf"), "annual report 2024");
        assert_eq!(filename_hint("---.pdf"), "");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("a/b.TXT")), SourceFormat::PlainText);
        assert_eq!(SourceFormat::from_path(Path::new("paper.pdf")), SourceFormat::Pdf);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), SourceFormat::Pdf);
    }
}
