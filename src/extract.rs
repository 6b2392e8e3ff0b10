//! Text extraction for uploaded reference documents.
//!
//! Converts raw upload bytes into one plain-text string per document.
//! Upload size ceilings and storage are the web layer's concern; this module
//! only cares about turning supported formats into text the chunker can use.

use std::path::Path;

use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;

use crate::error::IngestError;

/// Declared format of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    PlainText,
    Markdown,
}

impl FileKind {
    /// Resolve the declared kind from the file name extension, falling back
    /// to the declared MIME type.
    pub fn from_name_or_mime(name: &str, mime: Option<&str>) -> Result<Self, IngestError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => return Ok(FileKind::Pdf),
            Some("txt") => return Ok(FileKind::PlainText),
            Some("md") | Some("markdown") => return Ok(FileKind::Markdown),
            _ => {}
        }

        match mime {
            Some("application/pdf") => Ok(FileKind::Pdf),
            Some("text/plain") => Ok(FileKind::PlainText),
            Some("text/markdown") => Ok(FileKind::Markdown),
            _ => Err(IngestError::UnsupportedFileKind(format!(
                "{} ({})",
                name,
                mime.unwrap_or("no declared MIME type")
            ))),
        }
    }
}

/// Convert raw upload bytes into plain text according to the declared kind.
pub fn extract(bytes: &[u8], kind: FileKind) -> Result<String, IngestError> {
    match kind {
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::PlainText => utf8(bytes).map(|text| text.to_string()),
        FileKind::Markdown => utf8(bytes).map(strip_markdown),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, IngestError> {
    std::str::from_utf8(bytes)
        .map_err(|err| IngestError::ExtractionFailed(format!("invalid UTF-8: {err}")))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IngestError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| IngestError::ExtractionFailed(format!("PDF parse: {err}")))
}

/// Render markdown to HTML, then drop the tags and collapse whitespace.
fn strip_markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::empty());
    let mut rendered = String::new();
    html::push_html(&mut rendered, parser);

    let mut text = String::with_capacity(rendered.len());
    let mut in_tag = false;
    for ch in rendered.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if in_tag => {}
            _ => text.push(ch),
        }
    }

    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
