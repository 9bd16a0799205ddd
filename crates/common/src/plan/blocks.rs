//! Structured view of section markdown
//!
//! Tables, lists and paragraphs are recognised once here and consumed by the
//! exporters and document merge instead of each re-detecting pipe tables.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:([-*+])|(\d+)[.)])\s+(.*)$").expect("valid list item regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { text: String },
    Paragraph { text: String },
    Table { headers: Vec<String>, rows: Vec<Vec<String>> },
    List { ordered: bool, items: Vec<String> },
}

/// A table line contains a pipe
pub fn is_table_line(line: &str) -> bool {
    line.contains('|')
}

/// Rows such as `|---|:---:|` that only separate header from body
pub fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Split `| a | b |` into trimmed cells
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|c| c.trim().to_string()).collect()
}

fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Parse markdown into blocks
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut list: Option<(bool, Vec<String>)> = None;

    fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph {
                text: paragraph.join("\n"),
            });
            paragraph.clear();
        }
    }

    fn flush_table(table: &mut Vec<Vec<String>>, blocks: &mut Vec<Block>) {
        if !table.is_empty() {
            let mut rows = std::mem::take(table);
            let headers = rows.remove(0);
            blocks.push(Block::Table { headers, rows });
        }
    }

    fn flush_list(list: &mut Option<(bool, Vec<String>)>, blocks: &mut Vec<Block>) {
        if let Some((ordered, items)) = list.take() {
            blocks.push(Block::List { ordered, items });
        }
    }

    for line in markdown.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_table(&mut table, &mut blocks);
            flush_list(&mut list, &mut blocks);
            continue;
        }

        if is_table_line(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_list(&mut list, &mut blocks);
            if !is_separator_row(line) {
                table.push(split_cells(line));
            }
            continue;
        }
        flush_table(&mut table, &mut blocks);

        if let Some(text) = heading_text(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_list(&mut list, &mut blocks);
            blocks.push(Block::Heading {
                text: text.to_string(),
            });
            continue;
        }

        if let Some(caps) = LIST_ITEM.captures(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let ordered = caps.get(2).is_some();
            let item = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("").to_string();

            match list.as_mut() {
                Some((kind, items)) if *kind == ordered => items.push(item),
                _ => {
                    flush_list(&mut list, &mut blocks);
                    list = Some((ordered, vec![item]));
                }
            }
            continue;
        }

        // Indented continuation of a list item
        if let Some((_, items)) = list.as_mut() {
            if line.starts_with("  ") || line.starts_with('\t') {
                if let Some(last) = items.last_mut() {
                    last.push(' ');
                    last.push_str(line.trim());
                }
                continue;
            }
        }

        flush_list(&mut list, &mut blocks);
        paragraph.push(line.trim_end());
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    flush_table(&mut table, &mut blocks);
    flush_list(&mut list, &mut blocks);

    blocks
}

/// All list items in order
pub fn list_items(blocks: &[Block]) -> Vec<&str> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::List { items, .. } => Some(items),
            _ => None,
        })
        .flatten()
        .map(String::as_str)
        .collect()
}

/// All table body rows in order
pub fn table_rows(blocks: &[Block]) -> Vec<&[String]> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Table { rows, .. } => Some(rows),
            _ => None,
        })
        .flatten()
        .map(Vec::as_slice)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_with_separator() {
        let md = "| Role | Name | Phone |\n|:-----|------|------:|\n| Fire | City FD | 911 |\n| Owner | **Dana** | 555-0100 |";
        let blocks = parse_blocks(md);

        assert_eq!(
            blocks,
            vec![Block::Table {
                headers: vec!["Role".into(), "Name".into(), "Phone".into()],
                rows: vec![
                    vec!["Fire".into(), "City FD".into(), "911".into()],
                    vec!["Owner".into(), "**Dana**".into(), "555-0100".into()],
                ],
            }]
        );
    }

    #[test]
    fn test_mixed_content() {
        let md = "Intro line one\nintro line two\n\n- first\n- second\n  continued\n1. step one\n2) step two\n\n### Heading\nClosing.";
        let blocks = parse_blocks(md);

        assert_eq!(blocks.len(), 5);
        assert_eq!(
            blocks[0],
            Block::Paragraph {
                text: "Intro line one\nintro line two".into()
            }
        );
        assert_eq!(
            blocks[1],
            Block::List {
                ordered: false,
                items: vec!["first".into(), "second continued".into()]
            }
        );
        assert_eq!(
            blocks[2],
            Block::List {
                ordered: true,
                items: vec!["step one".into(), "step two".into()]
            }
        );
        assert_eq!(blocks[3], Block::Heading { text: "Heading".into() });
        assert_eq!(blocks[4], Block::Paragraph { text: "Closing.".into() });
    }

    #[test]
    fn test_helpers_flatten_in_order() {
        let md = "- a\n\n| h |\n|---|\n| r1 |\n\n* b";
        let blocks = parse_blocks(md);
        assert_eq!(list_items(&blocks), vec!["a", "b"]);
        assert_eq!(table_rows(&blocks), vec![&["r1".to_string()][..]]);
    }

    #[test]
    fn test_separator_detection() {
        assert!(is_separator_row("|---|---|"));
        assert!(is_separator_row(" :--- | ---: "));
        assert!(!is_separator_row("| a | b |"));
        assert!(!is_separator_row("|   |"));
    }
}
