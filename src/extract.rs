//! Document loading: turns a file on disk into [`SourcePage`]s.
//!
//! PDFs yield one page per PDF page (0-based `page` numbers); DOCX and
//! plain-text files yield a single page 0. Every page carries `source`,
//! `page`, `total_pages` and `content_type` metadata.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::error::{RagError, Result};
use crate::models::{Metadata, SourcePage};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure for a byte buffer; converted to an ingest error with
/// the file path attached by [`load_document`].
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("file is not valid UTF-8 text")]
    NotUtf8,
}

/// Guess the content type from the extension, falling back to magic bytes.
pub fn detect_content_type(path: &Path, bytes: &[u8]) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => MIME_PDF,
        Some("docx") => MIME_DOCX,
        _ if bytes.starts_with(b"%PDF") => MIME_PDF,
        _ => MIME_TEXT,
    }
}

/// Read and parse `path`. Runs on the blocking pool; PDF parsing is CPU-bound.
pub async fn load_document(path: &Path) -> Result<Vec<SourcePage>> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || load_document_blocking(&owned))
        .await
        .map_err(|e| RagError::ingest(path, e))?
}

fn load_document_blocking(path: &Path) -> Result<Vec<SourcePage>> {
    let bytes = std::fs::read(path).map_err(|e| RagError::ingest(path, e))?;
    let content_type = detect_content_type(path, &bytes);
    let texts = extract_pages(&bytes, content_type).map_err(|e| RagError::ingest(path, e))?;

    let source = path.display().to_string();
    let total = texts.len();
    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(page, text)| SourcePage {
            text,
            metadata: page_metadata(&source, page, total, content_type),
        })
        .collect())
}

pub(crate) fn page_metadata(
    source: &str,
    page: usize,
    total_pages: usize,
    content_type: &str,
) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("source".into(), Value::from(source));
    meta.insert("page".into(), Value::from(page));
    meta.insert("total_pages".into(), Value::from(total_pages));
    meta.insert("content_type".into(), Value::from(content_type));
    meta
}

/// Extract per-page text from an in-memory document.
pub fn extract_pages(bytes: &[u8], content_type: &str) -> Result<Vec<String>, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes).map(|t| vec![t]),
        _ => String::from_utf8(bytes.to_vec())
            .map(|t| vec![t])
            .map_err(|_| ExtractError::NotUtf8),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraph_text(&xml)
}

/// Collect `<w:t>` runs, ending each `<w:p>` paragraph with a blank line so
/// the chunker can cut on paragraph boundaries.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", opts).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_pages(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn docx_paragraphs_become_blank_line_separated() {
        let bytes = minimal_docx(&["Refund policy", "Refunds are processed within 30 days."]);
        let pages = extract_pages(&bytes, MIME_DOCX).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(
            pages[0],
            "Refund policy\n\nRefunds are processed within 30 days."
        );
    }

    #[test]
    fn plain_text_must_be_utf8() {
        assert_eq!(
            extract_pages("héllo".as_bytes(), MIME_TEXT).unwrap(),
            vec!["héllo".to_string()]
        );
        assert!(matches!(
            extract_pages(&[0xff, 0xfe, 0x00], MIME_TEXT),
            Err(ExtractError::NotUtf8)
        ));
    }

    #[test]
    fn content_type_detection() {
        assert_eq!(detect_content_type(Path::new("a.PDF"), b""), MIME_PDF);
        assert_eq!(detect_content_type(Path::new("upload.tmp"), b"%PDF-1.7"), MIME_PDF);
        assert_eq!(detect_content_type(Path::new("notes.docx"), b"PK"), MIME_DOCX);
        assert_eq!(detect_content_type(Path::new("notes.md"), b"# hi"), MIME_TEXT);
    }

    #[tokio::test]
    async fn load_document_attaches_metadata() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("policy.txt");
        std::fs::write(&path, "Refunds are processed within 30 days.").unwrap();

        let pages = load_document(&path).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].metadata["page"], 0);
        assert_eq!(pages[0].metadata["total_pages"], 1);
        assert_eq!(pages[0].metadata["content_type"], MIME_TEXT);
        assert_eq!(pages[0].metadata["source"], path.display().to_string());
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_ingest_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage without xref").unwrap();

        let err = load_document(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Ingest { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn missing_file_is_an_ingest_error() {
        let err = load_document(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Ingest { .. }));
    }
}
