//! Action checklist built from the list items of a procedure section

use super::layout::{build_pdf, centered_text_ops, wrap_text, Canvas, Font, LETTER};
use super::text::strip_markdown;
use super::ExportError;
use crate::plan::{find_section, Block, PlanContent, Section};

const MARGIN: f32 = 54.0;
const ITEM_SIZE: f32 = 10.5;
const BOX_SIZE: f32 = 9.0;
const ITEM_INDENT: f32 = 18.0;

/// Items under one heading; `heading` is `None` for items before the first one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistGroup {
    pub heading: Option<String>,
    pub items: Vec<String>,
}

/// The named section, or the first whose title mentions a scenario or procedure
pub fn checklist_section<'a>(sections: &'a [Section], name: Option<&str>) -> Result<&'a Section, ExportError> {
    match name.filter(|n| !n.trim().is_empty()) {
        Some(name) => find_section(sections, name)
            .map(|i| &sections[i])
            .ok_or_else(|| ExportError::SectionNotFound(name.to_string())),
        None => sections
            .iter()
            .find(|s| {
                let title = s.title.to_lowercase();
                title.contains("scenario") || title.contains("procedure")
            })
            .ok_or(ExportError::NoChecklistSection),
    }
}

/// List items of a section grouped by the heading they appear under
pub fn checklist_groups(section: &Section) -> Vec<ChecklistGroup> {
    let mut groups = vec![ChecklistGroup {
        heading: None,
        items: Vec::new(),
    }];

    for block in section.blocks() {
        match block {
            Block::Heading { text } => groups.push(ChecklistGroup {
                heading: Some(strip_markdown(&text)),
                items: Vec::new(),
            }),
            Block::List { items, .. } => {
                if let Some(group) = groups.last_mut() {
                    group.items.extend(
                        items
                            .iter()
                            .map(|i| strip_markdown(i))
                            .filter(|i| !i.is_empty()),
                    );
                }
            }
            _ => {}
        }
    }

    groups.retain(|g| !g.items.is_empty());
    groups
}

/// Render the checklist; returns the section title with the bytes
pub fn render_checklist(content: &PlanContent, name: Option<&str>) -> Result<(String, Vec<u8>), ExportError> {
    let section = checklist_section(&content.sections, name)?;
    let groups = checklist_groups(section);
    if groups.is_empty() {
        return Err(ExportError::EmptyChecklist(section.title.clone()));
    }

    let title = strip_markdown(&section.title);
    let mut canvas = Canvas::new(LETTER, MARGIN);
    let left = canvas.left();

    canvas.paragraph(&format!("{} Checklist", title), Font::Bold, 16.0, 0.0);
    canvas.line(left, Font::Regular, 11.0, &content.facility_name);
    canvas.gap(4.0);
    canvas.line(
        left,
        Font::Regular,
        10.0,
        "Date: ____________________    Time started: __________    Time completed: __________",
    );
    canvas.gap(10.0);

    for group in &groups {
        if let Some(heading) = &group.heading {
            canvas.ensure_space(40.0);
            canvas.gap(4.0);
            canvas.line(left, Font::Bold, 12.0, heading);
            canvas.gap(2.0);
        }
        for item in &group.items {
            draw_item(&mut canvas, item);
        }
    }

    draw_signature_block(&mut canvas);

    let mut pages = canvas.into_pages();
    let total = pages.len();
    if total > 1 {
        for (index, page) in pages.iter_mut().enumerate() {
            page.extend(centered_text_ops(
                LETTER,
                MARGIN / 2.0,
                Font::Regular,
                8.0,
                &format!("Page {} of {}", index + 1, total),
            ));
        }
    }

    Ok((section.title.clone(), build_pdf(LETTER, pages)?))
}

fn draw_item(canvas: &mut Canvas, item: &str) {
    let leading = ITEM_SIZE * 1.5;
    let lines = wrap_text(item, Font::Regular, ITEM_SIZE, canvas.content_width() - ITEM_INDENT);

    canvas.ensure_space(leading * lines.len().min(3) as f32);
    for (i, line) in lines.iter().enumerate() {
        canvas.ensure_space(leading);
        let baseline = canvas.y() - ITEM_SIZE;
        if i == 0 {
            canvas.stroke_rect(canvas.left(), baseline - 1.0, BOX_SIZE, BOX_SIZE);
        }
        canvas.text_at(canvas.left() + ITEM_INDENT, baseline, Font::Regular, ITEM_SIZE, line);
        canvas.gap(leading);
    }
}

fn draw_signature_block(canvas: &mut Canvas) {
    canvas.ensure_space(110.0);
    canvas.gap(24.0);

    let left = canvas.left();
    let right = left + canvas.content_width();
    for label in ["Completed by (print):", "Signature:", "Date:"] {
        canvas.gap(26.0);
        let y = canvas.y();
        canvas.text_at(left, y, Font::Regular, 10.0, label);
        canvas.stroke_line(left + 120.0, y - 2.0, right, y - 2.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_content;
    use lopdf::Document;

    #[test]
    fn test_default_section_is_procedures() {
        let content = sample_content();
        let section = checklist_section(&content.sections, None).unwrap();
        assert_eq!(section.title, "Emergency Scenarios and Procedures");

        let named = checklist_section(&content.sections, Some("contacts")).unwrap();
        assert_eq!(named.title, "Emergency Contacts");

        assert!(matches!(
            checklist_section(&content.sections, Some("hazmat")),
            Err(ExportError::SectionNotFound(_))
        ));
        assert!(matches!(
            checklist_section(&content.sections[..2], None),
            Err(ExportError::NoChecklistSection)
        ));
    }

    #[test]
    fn test_groups_follow_headings() {
        let content = sample_content();
        let groups = checklist_groups(&content.sections[2]);

        assert_eq!(
            groups,
            vec![
                ChecklistGroup {
                    heading: Some("Fire".into()),
                    items: vec![
                        "Pull the nearest alarm".into(),
                        "Evacuate via marked exits".into(),
                        "Call 911".into(),
                    ],
                },
                ChecklistGroup {
                    heading: Some("Power Outage".into()),
                    items: vec!["Check the generator".into(), "Notify the store manager".into()],
                },
            ]
        );
    }

    #[test]
    fn test_render_checklist() {
        let content = sample_content();
        let (title, bytes) = render_checklist(&content, None).unwrap();
        assert_eq!(title, "Emergency Scenarios and Procedures");
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_section_without_items() {
        let content = sample_content();
        assert!(matches!(
            render_checklist(&content, Some("executive")),
            Err(ExportError::EmptyChecklist(_))
        ));
    }
}
