//! Business-card sized emergency contact summary

use super::layout::{build_pdf, text_width, wrap_text, Canvas, Font, WALLET_CARD};
use super::text::strip_markdown;
use super::ExportError;
use crate::plan::{Block, PlanContent, Section};

const CONTACT_KEYWORDS: &[&str] = &["fire", "police", "medical", "911", "ambulance", "ems"];
const CARD_MARGIN: f32 = 10.0;
const ROW_SIZE: f32 = 7.0;
const LABEL_WIDTH: f32 = 78.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLine {
    pub label: String,
    pub detail: String,
}

fn is_emergency_label(cell: &str) -> bool {
    cell.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| CONTACT_KEYWORDS.contains(&word))
}

/// Table rows across all sections whose first cell names an emergency service
pub fn emergency_contacts(sections: &[Section]) -> Vec<ContactLine> {
    let mut lines: Vec<ContactLine> = Vec::new();

    for section in sections {
        for block in section.blocks() {
            let Block::Table { rows, .. } = block else {
                continue;
            };

            for row in rows {
                let Some((first, rest)) = row.split_first() else {
                    continue;
                };
                let label = strip_markdown(first);
                if !is_emergency_label(&label) {
                    continue;
                }

                let detail = rest
                    .iter()
                    .map(|c| strip_markdown(c))
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join("  ");

                let line = ContactLine { label, detail };
                if !lines.contains(&line) {
                    lines.push(line);
                }
            }
        }
    }

    lines
}

/// One 3.5 x 2 in card; rows that do not fit are dropped
pub fn render_wallet_card(content: &PlanContent) -> Result<Vec<u8>, ExportError> {
    let mut contacts = emergency_contacts(&content.sections);
    if contacts.is_empty() {
        contacts.push(ContactLine {
            label: "Emergency".to_string(),
            detail: "911".to_string(),
        });
    }

    let mut canvas = Canvas::new(WALLET_CARD, CARD_MARGIN);
    let left = canvas.left();
    let right = left + canvas.content_width();

    canvas.line(left, Font::Bold, 10.0, "EMERGENCY CONTACTS");
    let facility = wrap_text(&content.facility_name, Font::Regular, 7.0, canvas.content_width())
        .into_iter()
        .next()
        .unwrap_or_default();
    canvas.line(left, Font::Regular, 7.0, &facility);
    let rule_y = canvas.y() + 2.0;
    canvas.stroke_line(left, rule_y, right, rule_y);
    canvas.gap(3.0);

    let leading = ROW_SIZE * 1.35;
    let detail_width = canvas.content_width() - LABEL_WIDTH;
    for contact in &contacts {
        if canvas.y() - leading < CARD_MARGIN {
            break;
        }
        let baseline = canvas.y() - ROW_SIZE;
        canvas.text_at(left, baseline, Font::Bold, ROW_SIZE, &fit(&contact.label, Font::Bold, LABEL_WIDTH - 4.0));
        canvas.text_at(
            left + LABEL_WIDTH,
            baseline,
            Font::Regular,
            ROW_SIZE,
            &fit(&contact.detail, Font::Regular, detail_width),
        );
        canvas.gap(leading);
    }

    build_pdf(WALLET_CARD, canvas.into_pages())
}

/// Truncate to the width with a trailing ellipsis
fn fit(text: &str, font: Font, width: f32) -> String {
    if text_width(text, font, ROW_SIZE) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        out.push(c);
        if text_width(&out, font, ROW_SIZE) + text_width("...", font, ROW_SIZE) > width {
            out.pop();
            break;
        }
    }
    format!("{}...", out.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_content;
    use lopdf::Document;

    #[test]
    fn test_emergency_contacts_from_tables() {
        let content = sample_content();
        let contacts = emergency_contacts(&content.sections);

        let labels: Vec<&str> = contacts.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Fire", "Police (non-emergency)", "Medical"]);
        assert_eq!(contacts[0].detail, "Seattle FD  911");
    }

    #[test]
    fn test_keyword_matches_whole_words() {
        assert!(is_emergency_label("EMS"));
        assert!(is_emergency_label("Call 911"));
        assert!(!is_emergency_label("Building Systems"));
        assert!(!is_emergency_label("Fireplace vendor"));
    }

    #[test]
    fn test_fallback_to_911() {
        let mut content = sample_content();
        content.sections.retain(|s| !s.title.contains("Contacts"));
        assert!(emergency_contacts(&content.sections).is_empty());

        let bytes = render_wallet_card(&content).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_card_is_single_business_card_page() {
        let bytes = render_wallet_card(&sample_content()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let pages = doc.get_pages();
        let page_id = pages.values().next().copied().unwrap();
        let media_box = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"MediaBox").ok().cloned())
            .or_else(|| {
                let page = doc.get_dictionary(page_id).ok()?;
                let parent = page.get(b"Parent").ok()?.as_reference().ok()?;
                doc.get_dictionary(parent).ok()?.get(b"MediaBox").ok().cloned()
            })
            .unwrap();
        let values: Vec<i64> = media_box
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![0, 0, 252, 144]);
    }

    #[test]
    fn test_fit_truncates() {
        let long = "Harborview Medical Center Emergency Department Main Line";
        let fitted = fit(long, Font::Regular, 60.0);
        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, Font::Regular, ROW_SIZE) <= 60.0 + 0.01);
        assert_eq!(fit("911", Font::Regular, 60.0), "911");
    }
}
