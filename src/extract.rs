//! Text extraction for source documents (PDF, plain text).
//!
//! Extraction is a pure read: the file is loaded into memory, dispatched on
//! its content type, and returned as UTF-8 text in reading order. Whitespace
//! normalization is a separate step ([`normalize_whitespace`]) so the raw
//! text can still be inspected when a document chunks badly.

use std::path::Path;

use crate::error::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Map a file extension to one of the supported content types.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Read a document from disk and return its raw text.
///
/// Fails with [`RagError::Extraction`] if the file cannot be read, has an
/// unsupported extension, or cannot be parsed.
pub fn extract_file(path: &Path) -> Result<String> {
    let content_type = content_type_for(path)
        .ok_or_else(|| RagError::extraction(path, "unsupported file extension"))?;
    let bytes = std::fs::read(path).map_err(|e| RagError::extraction(path, e))?;
    let text = extract_text(&bytes, content_type).map_err(|e| RagError::extraction(path, e))?;
    tracing::debug!(path = %path.display(), chars = text.len(), "extracted document");
    Ok(text)
}

/// Extract text from in-memory content of the given content type.
///
/// PDF pages are concatenated in page order.
pub fn extract_text(bytes: &[u8], content_type: &str) -> std::result::Result<String, String> {
    match content_type {
        MIME_PDF => pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string()),
        MIME_TEXT | MIME_MARKDOWN => String::from_utf8(bytes.to_vec())
            .map_err(|e| format!("not valid UTF-8: {}", e)),
        other => Err(format!("unsupported content-type: {}", other)),
    }
}

/// Collapse every run of whitespace (spaces, tabs, line and page breaks) to a
/// single space and trim both ends.
///
/// Blank-line runs disappear along with every other break, so the result is a
/// single line of space-separated words.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
