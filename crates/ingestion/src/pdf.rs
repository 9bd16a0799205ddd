//! PDF text extraction
//!
//! Walks each page's content stream with lopdf and collects the strings
//! shown by text operators. Layout is not reconstructed; every text object
//! becomes one line.

use crate::errors::IngestionError;
use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::{debug, warn};

/// Kerning adjustment in a TJ array treated as a word gap
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Extract text content from PDF bytes
pub fn extract_text_from_pdf(bytes: &[u8], filename: &str) -> Result<String, IngestionError> {
    let doc = Document::load_mem(bytes).map_err(|e| IngestionError::PdfParse {
        filename: filename.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        match doc
            .get_page_content(page_id)
            .and_then(|content| Content::decode(&content))
        {
            Ok(content) => {
                text.push_str(&text_from_operations(&content));
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        return Err(IngestionError::EmptyText {
            filename: filename.to_string(),
        });
    }

    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );

    Ok(cleaned)
}

fn text_from_operations(content: &Content) -> String {
    let mut text = String::new();

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = operation.operands.last() {
                    text.push_str(&decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                            Object::Integer(n) if (*n as f32) < TJ_SPACE_THRESHOLD => text.push(' '),
                            Object::Real(n) if *n < TJ_SPACE_THRESHOLD => text.push(' '),
                            _ => {}
                        }
                    }
                }
            }
            "ET" | "T*" => text.push('\n'),
            _ => {}
        }
    }

    text
}

/// Decode a single-byte PDF string; bytes outside ASCII follow WinAnsi
fn decode_pdf_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x91 | 0x92 => '\'',
            0x93 | 0x94 => '"',
            0x95 => '*',
            0x96 | 0x97 => '-',
            0x80..=0x9f => ' ',
            _ => b as char,
        })
        .collect()
}

/// Collapse runs of whitespace inside lines and drop blank lines
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.replace('\u{FEFF}', "")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
