//! Plain-text helpers shared by the exporters

use regex_lite::Regex;
use std::sync::LazyLock;

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid image regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid link regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid code regex"));
static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\*|__)(.+?)(\*\*|__)").expect("valid strong regex"));
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*|_)([^*_\s][^*_]*?)(\*|_)").expect("valid emphasis regex"));
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("valid header regex"));
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+").expect("valid list regex"));

/// Reduce markdown to plain text: emphasis, links, images, inline code,
/// header hashes and list markers are removed, their text kept.
pub fn strip_markdown(text: &str) -> String {
    let text = IMAGE.replace_all(text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = STRONG.replace_all(&text, "$2");
    let text = EMPHASIS.replace_all(&text, "$2");
    let text = HEADER.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    text.trim().to_string()
}

/// Attachment filename from the facility name and a descriptive suffix,
/// e.g. `Corner_Market_Emergency_Contacts.pdf`
pub fn export_filename(facility_name: &str, suffix: &str) -> String {
    let parts: Vec<String> = [facility_name, suffix]
        .iter()
        .map(|p| filename_part(p))
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        "Emergency_Plan.pdf".to_string()
    } else {
        format!("{}.pdf", parts.join("_"))
    }
}

fn filename_part(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Bytes for a PDF string in WinAnsiEncoding; unmappable characters become `?`
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            '\u{2022}' => 0x95,
            '\u{2026}' => 0x85,
            '\u{2610}' | '\u{2611}' => b'[',
            '\t' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) <= 0xFF => c as u8,
            _ => b'?',
        })
        .collect()
}
