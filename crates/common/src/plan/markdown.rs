//! Markdown plan parser
//!
//! Turns the free-form markdown returned by the model into an ordered list of
//! sections. `#`/`##` headings open sections, `###`/`####` headings open
//! subsections of the current section, everything else is body text.
//!
//! Fenced code blocks are not tracked: a `## ` line inside a fence still
//! opens a section.

use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::confidence::{score_sections, ConfidenceReport};
use super::model::{Section, Subsection};
use super::slug::slugify;

static SECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,2}\s+(.+)$").expect("valid section heading regex"));

static SUBSECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{3,4}\s+(.+)$").expect("valid subsection heading regex"));

/// Parsed plan body
#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub sections: Vec<Section>,
    pub confidence: u8,
    pub warnings: Vec<String>,
}

/// Parse the model's markdown and score its structure
pub fn parse_erp_response(markdown: &str) -> ParsedPlan {
    let sections = parse_sections(markdown);
    let ConfidenceReport { score, warnings } = score_sections(&sections, markdown);

    debug!(
        sections = sections.len(),
        confidence = score,
        warnings = warnings.len(),
        "Parsed plan markdown"
    );

    ParsedPlan {
        sections,
        confidence: score,
        warnings,
    }
}

/// Split markdown into sections and one level of subsections
pub fn parse_sections(markdown: &str) -> Vec<Section> {
    let mut builder = SectionBuilder::default();

    for line in markdown.lines() {
        if let Some(caps) = SECTION_HEADING.captures(line) {
            builder.open_section(caps[1].trim());
        } else if let Some(caps) = SUBSECTION_HEADING
            .captures(line)
            .filter(|_| builder.has_section())
        {
            builder.open_subsection(caps[1].trim());
        } else {
            builder.push_line(line);
        }
    }

    builder.finish()
}

#[derive(Default)]
struct SectionBuilder {
    sections: Vec<Section>,
    section: Option<Section>,
    subsection: Option<Subsection>,
    buffer: Vec<String>,
}

impl SectionBuilder {
    fn has_section(&self) -> bool {
        self.section.is_some()
    }

    fn take_buffer(&mut self) -> String {
        let text = self.buffer.join("\n");
        self.buffer.clear();
        text.trim().to_string()
    }

    /// Move buffered text into whichever node is open
    fn flush_subsection(&mut self) {
        let content = self.take_buffer();
        match (self.subsection.take(), self.section.as_mut()) {
            (Some(mut sub), Some(section)) => {
                sub.content = content;
                section.subsections.push(sub);
            }
            (None, Some(section)) => {
                if !content.is_empty() {
                    if section.content.is_empty() {
                        section.content = content;
                    } else {
                        section.content.push_str("\n\n");
                        section.content.push_str(&content);
                    }
                }
            }
            // Text before the first heading has no owner
            _ => {}
        }
    }

    fn flush_section(&mut self) {
        self.flush_subsection();
        if let Some(section) = self.section.take() {
            self.sections.push(section);
        }
    }

    fn open_section(&mut self, title: &str) {
        self.flush_section();
        self.section = Some(Section::new(title, String::new()));
    }

    fn open_subsection(&mut self, title: &str) {
        self.flush_subsection();
        self.subsection = Some(Subsection {
            id: slugify(title),
            title: title.to_string(),
            content: String::new(),
        });
    }

    fn push_line(&mut self, line: &str) {
        if self.section.is_some() {
            self.buffer.push(line.to_string());
        }
    }

    fn finish(mut self) -> Vec<Section> {
        self.flush_section();
        self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Preamble that belongs to nothing.

# Emergency Response Plan

## Executive Summary
This plan covers the store.

## Emergency Contacts
| Role | Phone |
|------|-------|
| Fire | 911 |

### After Hours
Call the owner.

#### Escalation
Manager, then owner.

## Evacuation Procedures
Exit through the front.
";

    #[test]
    fn test_sections_in_source_order() {
        let sections = parse_sections(SAMPLE);
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Emergency Response Plan",
                "Executive Summary",
                "Emergency Contacts",
                "Evacuation Procedures"
            ]
        );
        assert_eq!(sections[1].id, "executive-summary");
        assert_eq!(sections[0].content, "");
    }

    #[test]
    fn test_subsections_attach_to_parent() {
        let sections = parse_sections(SAMPLE);
        let contacts = &sections[2];

        assert!(contacts.content.starts_with("| Role | Phone |"));
        assert_eq!(contacts.subsections.len(), 2);
        assert_eq!(contacts.subsections[0].title, "After Hours");
        assert_eq!(contacts.subsections[0].content, "Call the owner.");
        assert_eq!(contacts.subsections[1].id, "escalation");
        assert_eq!(contacts.subsections[1].content, "Manager, then owner.");
    }

    #[test]
    fn test_subsection_heading_before_any_section_is_dropped() {
        let sections = parse_sections("### Orphan\ntext\n## Real\nbody");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Real");
        assert_eq!(sections[0].content, "body");
    }

    #[test]
    fn test_five_hashes_is_body_text() {
        let sections = parse_sections("## Real\n##### Not a heading\nbody");
        assert_eq!(sections[0].content, "##### Not a heading\nbody");
        assert!(sections[0].subsections.is_empty());
    }

    #[test]
    fn test_heading_needs_whitespace() {
        let sections = parse_sections("## Real\n#hashtag\n##also-not");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "#hashtag\n##also-not");
    }

    #[test]
    fn test_headings_inside_fences_are_structural() {
        let md = "## Notes\n```\n## inside fence\n```\n";
        let sections = parse_sections(md);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].title, "inside fence");
        assert_eq!(sections[1].content, "```");
    }

    #[test]
    fn test_reserialization_reproduces_sections() {
        let md = "## Purpose\nKeep people safe.\n\n#### Scope\nAll staff.\n\n## Communication\nUse radios.";
        let sections = parse_sections(md);

        let rebuilt: Vec<String> = sections
            .iter()
            .map(|s| {
                let mut out = format!("## {}\n{}", s.title, s.content);
                for sub in &s.subsections {
                    out.push_str(&format!("\n\n#### {}\n{}", sub.title, sub.content));
                }
                out
            })
            .collect();

        assert_eq!(rebuilt.join("\n\n"), md);
    }

    #[test]
    fn test_empty_document() {
        let parsed = parse_erp_response("");
        assert!(parsed.sections.is_empty());
        assert_eq!(parsed.confidence, 0);
    }
}
