//! PDF text extraction for the PDF agent.
//!
//! This module handles:
//! - Page-by-page extraction with `pdf-extract` (good font encoding support)
//! - A `lopdf` content-stream fallback for PDFs that make `pdf-extract` fail or panic
//! - PDF string decoding (UTF-8, UTF-16BE/LE, Latin-1)
//! - Turning pages into ordered, chunked `PageRecord`s

use async_trait::async_trait;
use std::path::Path;

use super::text_splitter::TextSplitter;
use crate::error::ExtractionError;
use crate::protocol::PageRecord;

/// Turns a document path into ordered page records.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document_path: &str) -> Result<Vec<PageRecord>, ExtractionError>;
}

/// Extracts a PDF from the local filesystem on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    splitter: TextSplitter,
}

impl PdfExtractor {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, document_path: &str) -> Result<Vec<PageRecord>, ExtractionError> {
        let path = document_path.to_string();
        let splitter = self.splitter;
        tokio::task::spawn_blocking(move || {
            let pages = extract_pages(Path::new(&path))?;
            Ok(pages_to_records(&path, &pages, &splitter))
        })
        .await
        .map_err(|e| ExtractionError::Unreadable {
            path: document_path.to_string(),
            reason: format!("extraction task failed: {}", e),
        })?
    }
}

/// Extract the text of every page, in page order.
pub fn extract_pages(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let display_path = path.display().to_string();
    if !path.is_file() {
        return Err(ExtractionError::NotFound { path: display_path });
    }

    let pages_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    let primary_failure = match pages_result {
        Ok(Ok(pages)) => return Ok(pages),
        Ok(Err(e)) => e.to_string(),
        Err(panic_payload) => {
            if let Some(s) = panic_payload.downcast_ref::<&str>() {
                format!("panic: {}", s)
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                format!("panic: {}", s)
            } else {
                "panic: unknown".to_string()
            }
        }
    };

    tracing::warn!(
        "PdfActor: pdf-extract failed for {} ({}), trying lopdf fallback",
        display_path,
        primary_failure
    );
    match extract_pages_via_lopdf(path) {
        Ok(pages) => {
            tracing::info!("PdfActor: lopdf fallback extracted {} pages", pages.len());
            Ok(pages)
        }
        Err(fallback_failure) => Err(ExtractionError::Unreadable {
            path: display_path,
            reason: format!("{}; fallback: {}", primary_failure, fallback_failure),
        }),
    }
}

/// Fallback extraction that reads Tj/TJ operators straight from the content streams.
/// Less accurate for complex fonts but more tolerant of malformed PDFs.
pub fn extract_pages_via_lopdf(path: &Path) -> Result<Vec<String>, String> {
    use lopdf::{Document, Object};

    let doc = Document::load(path).map_err(|e| format!("Failed to load PDF: {}", e))?;
    let mut pages = Vec::new();

    for (_page_num, page_id) in doc.get_pages() {
        let mut text = String::new();
        if let Ok(content) = doc.get_page_content(page_id) {
            let operations = lopdf::content::Content::decode(&content)
                .map(|c| c.operations)
                .unwrap_or_default();

            for op in operations {
                match op.operator.as_str() {
                    "Tj" | "'" | "\"" => {
                        if let Some(Object::String(bytes, _)) = op.operands.last() {
                            if let Some(decoded) = decode_pdf_bytes_to_string(bytes) {
                                text.push_str(&decoded);
                            }
                        }
                    }
                    "TJ" => {
                        if let Some(Object::Array(arr)) = op.operands.first() {
                            for item in arr {
                                if let Object::String(bytes, _) = item {
                                    if let Some(decoded) = decode_pdf_bytes_to_string(bytes) {
                                        text.push_str(&decoded);
                                    }
                                }
                            }
                        }
                    }
                    "Td" | "TD" | "T*" => {
                        if !text.is_empty() && !text.ends_with('\n') && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                    "ET" => {
                        if !text.is_empty() && !text.ends_with('\n') {
                            text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
        }
        pages.push(text);
    }

    Ok(pages)
}

/// Decode PDF string bytes to a Rust String.
/// PDF strings can be UTF-16BE (with BOM 0xFEFF), UTF-16 without BOM, UTF-8, or PDFDocEncoding.
pub fn decode_pdf_bytes_to_string(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        return decode_utf16(&bytes[2..], u16::from_be_bytes);
    }

    // Alternating null bytes around ASCII usually means BOM-less UTF-16
    if bytes.len() >= 4 {
        let head = bytes.chunks(2).take(4);
        if head.clone().all(|c| c.len() == 2 && c[1] == 0 && c[0] < 128) {
            if let Some(s) = decode_utf16(bytes, u16::from_le_bytes) {
                return Some(s);
            }
        }
        if head.clone().all(|c| c.len() == 2 && c[0] == 0 && c[1] < 128) {
            if let Some(s) = decode_utf16(bytes, u16::from_be_bytes) {
                return Some(s);
            }
        }
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        let cleaned = strip_control(s.chars());
        if !cleaned.is_empty() {
            return Some(cleaned);
        }
    }

    // Latin-1: each byte is its own code point
    let s = strip_control(bytes.iter().map(|&b| b as char));
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    let decoded = String::from_utf16(&units).ok()?;
    let cleaned = strip_control(decoded.chars());
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn strip_control(chars: impl Iterator<Item = char>) -> String {
    chars.filter(|c| !c.is_control() || *c == ' ').collect()
}

/// Build ordered records from raw page text.
///
/// Blank pages are skipped. Every record carries `source` and the zero-based
/// `page`; pages that had to be split also carry a zero-based `chunk`.
pub fn pages_to_records(source: &str, pages: &[String], splitter: &TextSplitter) -> Vec<PageRecord> {
    let mut records = Vec::new();
    for (page_index, page_text) in pages.iter().enumerate() {
        let chunks = splitter.split(page_text);
        let split = chunks.len() > 1;
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let mut record = PageRecord::new(chunk)
                .with_metadata("source", source)
                .with_metadata("page", page_index);
            if split {
                record = record.with_metadata("chunk", chunk_index);
            }
            records.push(record);
        }
    }
    records
}
