//! Document loading through the public API: PDF pages, DOCX, plain text.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use async_trait::async_trait;
use pdf_chat::config::Config;
use pdf_chat::embedding::HashProvider;
use pdf_chat::extract::{self, MIME_DOCX, MIME_PDF, MIME_TEXT};
use pdf_chat::llm::{ChatModel, LanguageBackend};
use pdf_chat::models::ChatMessage;
use pdf_chat::registry::ModelRegistry;
use pdf_chat::{Pipeline, RagError};

/// PDF with one page per entry of `pages`, each drawing its text in
/// Helvetica. Offsets in the xref table are computed from the body.
fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
    for (i, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            5 + 2 * i
        ));
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >> stream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

struct NoModels;

#[async_trait]
impl ModelRegistry for NoModels {
    async fn list_available(&self) -> Vec<String> {
        Vec::new()
    }
}

struct Capture(Arc<Mutex<Vec<String>>>);

struct CaptureModel(Arc<Mutex<Vec<String>>>);

impl LanguageBackend for Capture {
    fn bind(&self, _name: &str) -> pdf_chat::Result<Box<dyn ChatModel>> {
        Ok(Box::new(CaptureModel(Arc::clone(&self.0))))
    }
}

#[async_trait]
impl ChatModel for CaptureModel {
    fn name(&self) -> &str {
        "capture"
    }
    async fn invoke(&self, messages: &[ChatMessage]) -> pdf_chat::Result<String> {
        self.0.lock().unwrap().push(messages[1].content.clone());
        Ok("ok".to_string())
    }
}

fn pipeline(storage: &Path) -> (Pipeline, Arc<Mutex<Vec<String>>>) {
    let mut config = Config::default();
    config.store.path = storage.to_path_buf();
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let p = Pipeline::new(
        &config,
        Arc::new(HashProvider::with_dims(128)),
        Box::new(NoModels),
        Box::new(Capture(Arc::clone(&prompts))),
    )
    .unwrap();
    (p, prompts)
}

#[tokio::test]
async fn pdf_pages_carry_zero_based_page_numbers() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("manual.pdf");
    std::fs::write(&path, minimal_pdf(&["first page phrase", "second page phrase"])).unwrap();

    let pages = extract::load_document(&path).await.unwrap();

    assert_eq!(pages.len(), 2);
    assert!(pages[0].text.contains("first page phrase"), "{:?}", pages[0].text);
    assert!(pages[1].text.contains("second page phrase"), "{:?}", pages[1].text);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.metadata["page"], i);
        assert_eq!(page.metadata["total_pages"], 2);
        assert_eq!(page.metadata["content_type"], MIME_PDF);
        assert_eq!(page.metadata["source"], path.display().to_string());
    }
}

#[tokio::test]
async fn pdf_ingest_feeds_retrieval() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("policy.pdf");
    std::fs::write(&path, minimal_pdf(&["Refunds are processed within 30 days"])).unwrap();

    let (mut p, prompts) = pipeline(&tmp.path().join("chroma_db"));
    let report = p.ingest(&path).await.unwrap();
    assert_eq!(report.pages, 1);
    assert_eq!(report.chunks, 1);

    p.ask("How long do refunds take?").await.unwrap();
    assert!(prompts.lock().unwrap()[0].contains("30 days"));
}

#[tokio::test]
async fn docx_paragraphs_become_one_page() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("handbook.docx");
    std::fs::write(&path, minimal_docx(&["Office test phrase.", "Second paragraph."])).unwrap();

    let pages = extract::load_document(&path).await.unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].text, "Office test phrase.\n\nSecond paragraph.");
    assert_eq!(pages[0].metadata["content_type"], MIME_DOCX);
    assert_eq!(pages[0].metadata["page"], 0);
}

#[tokio::test]
async fn text_files_load_whole() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.md");
    std::fs::write(&path, "# Notes\n\nClosed on Sundays.").unwrap();

    let pages = extract::load_document(&path).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].metadata["content_type"], MIME_TEXT);
    assert_eq!(pages[0].metadata["total_pages"], 1);
}

#[tokio::test]
async fn corrupt_inputs_are_ingest_errors() {
    let tmp = TempDir::new().unwrap();
    let (mut p, _) = pipeline(&tmp.path().join("chroma_db"));

    let bad_docx = tmp.path().join("bad.docx");
    std::fs::write(&bad_docx, b"not a zip archive").unwrap();
    let binary = tmp.path().join("blob.bin");
    std::fs::write(&binary, [0xff, 0xfe, 0x00, 0x80]).unwrap();

    for path in [&bad_docx, &binary] {
        let err = p.ingest(path).await.unwrap_err();
        match err {
            RagError::Ingest { path: reported, .. } => assert_eq!(&reported, path),
            other => panic!("expected ingest error, got {:?}", other),
        }
    }
    assert_eq!(p.indexed_chunks().await.unwrap(), None);
}
