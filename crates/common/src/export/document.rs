//! Full plan and single section documents on letter pages

use lopdf::content::Operation;

use super::layout::{
    build_pdf, centered_text_ops, line_ops, text_ops, text_width, wrap_text, Canvas, Font,
    PageSize, LETTER,
};
use super::text::strip_markdown;
use super::ExportError;
use crate::plan::{find_section, Block, PlanContent, Section};

const MARGIN: f32 = 54.0;
const HEADER_SPACE: f32 = 24.0;
const BODY_SIZE: f32 = 10.5;
const TABLE_SIZE: f32 = 9.0;
const CELL_PADDING: f32 = 3.0;
const TOC_ENTRIES_PER_PAGE: usize = 30;
const TOC_LEADING: f32 = 20.0;

/// Cover, table of contents, then one page run per section
pub fn render_full_plan(content: &PlanContent, version: Option<&str>) -> Result<Vec<u8>, ExportError> {
    let sections = &content.sections;

    let mut body = Canvas::with_header_space(LETTER, MARGIN, HEADER_SPACE);
    let mut starts = Vec::with_capacity(sections.len());
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            body.new_page();
        }
        starts.push(body.page_number());
        draw_section(&mut body, section);
    }
    if sections.is_empty() {
        body.paragraph("This plan has no sections yet.", Font::Regular, BODY_SIZE, 0.0);
    }

    let toc_pages = toc_page_count(sections.len());
    let front_pages = 1 + toc_pages;

    let mut pages = vec![cover_page(content, version)];
    pages.extend(toc(sections, &starts, front_pages));
    let body_pages = body.into_pages();
    pages.extend(body_pages);

    let total = pages.len();
    for (index, page) in pages.iter_mut().enumerate() {
        if index >= front_pages {
            page.extend(running_header(LETTER, &content.facility_name));
        }
        if index > 0 {
            page.extend(footer(LETTER, index + 1, total));
        }
    }

    build_pdf(LETTER, pages)
}

/// One section on its own pages; returns the matched title with the bytes
pub fn render_section(content: &PlanContent, title: &str) -> Result<(String, Vec<u8>), ExportError> {
    let index = find_section(&content.sections, title)
        .ok_or_else(|| ExportError::SectionNotFound(title.to_string()))?;
    let section = &content.sections[index];

    let mut canvas = Canvas::with_header_space(LETTER, MARGIN, HEADER_SPACE);
    draw_section(&mut canvas, section);

    let mut pages = canvas.into_pages();
    let total = pages.len();
    for (index, page) in pages.iter_mut().enumerate() {
        page.extend(running_header(LETTER, &content.facility_name));
        page.extend(footer(LETTER, index + 1, total));
    }

    Ok((section.title.clone(), build_pdf(LETTER, pages)?))
}

pub(crate) fn toc_page_count(sections: usize) -> usize {
    sections.div_ceil(TOC_ENTRIES_PER_PAGE).max(1)
}

fn cover_page(content: &PlanContent, version: Option<&str>) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut y = LETTER.height * 0.62;

    ops.extend(centered_text_ops(LETTER, y, Font::Bold, 26.0, "Emergency Response Plan"));
    y -= 44.0;

    for line in wrap_text(&content.facility_name, Font::Bold, 20.0, LETTER.width - 2.0 * MARGIN) {
        ops.extend(centered_text_ops(LETTER, y, Font::Bold, 20.0, &line));
        y -= 26.0;
    }

    y -= 8.0;
    ops.extend(centered_text_ops(LETTER, y, Font::Regular, 14.0, &content.facility_type));
    y -= 22.0;

    let location = &content.facility_profile.location;
    ops.extend(centered_text_ops(
        LETTER,
        y,
        Font::Regular,
        12.0,
        &format!("{}, {}", location.city, location.state),
    ));

    let mut y = MARGIN + 60.0;
    if let Some(version) = version {
        ops.extend(centered_text_ops(LETTER, y, Font::Regular, 11.0, &format!("Version {}", version)));
        y -= 16.0;
    }
    ops.extend(centered_text_ops(
        LETTER,
        y,
        Font::Regular,
        11.0,
        &format!("Generated {}", content.generated_at.format("%B %-d, %Y")),
    ));

    ops
}

fn toc(sections: &[Section], starts: &[usize], offset: usize) -> Vec<Vec<Operation>> {
    let right = LETTER.width - MARGIN;
    let entries: Vec<(usize, &Section)> = sections.iter().enumerate().collect();

    let mut pages = Vec::new();
    for (page_index, chunk) in entries.chunks(TOC_ENTRIES_PER_PAGE).enumerate() {
        let mut ops = Vec::new();
        let mut y = LETTER.height - MARGIN - 18.0;
        if page_index == 0 {
            ops.extend(text_ops(MARGIN, y, Font::Bold, 18.0, "Table of Contents"));
        }
        y -= 36.0;

        for (i, section) in chunk {
            let page = starts.get(*i).copied().unwrap_or(1) + offset;
            let number = page.to_string();
            let number_x = right - text_width(&number, Font::Regular, 11.0);

            let label = format!("{}. {}", i + 1, strip_markdown(&section.title));
            let label = wrap_text(&label, Font::Regular, 11.0, number_x - MARGIN - 24.0)
                .into_iter()
                .next()
                .unwrap_or_default();
            let label_end = MARGIN + text_width(&label, Font::Regular, 11.0);

            ops.extend(text_ops(MARGIN, y, Font::Regular, 11.0, &label));
            ops.extend(leader_dots(label_end + 6.0, number_x - 6.0, y));
            ops.extend(text_ops(number_x, y, Font::Regular, 11.0, &number));
            y -= TOC_LEADING;
        }
        pages.push(ops);
    }

    if pages.is_empty() {
        pages.push(text_ops(
            MARGIN,
            LETTER.height - MARGIN - 18.0,
            Font::Bold,
            18.0,
            "Table of Contents",
        ));
    }
    pages
}

fn leader_dots(from: f32, to: f32, y: f32) -> Vec<Operation> {
    let dot = text_width(".", Font::Regular, 11.0);
    if to <= from {
        return Vec::new();
    }
    let count = ((to - from) / dot) as usize;
    text_ops(from, y, Font::Regular, 11.0, &".".repeat(count))
}

fn running_header(size: PageSize, facility_name: &str) -> Vec<Operation> {
    let y = size.height - MARGIN + 4.0;
    let label = "Emergency Response Plan";
    let label_x = size.width - MARGIN - text_width(label, Font::Regular, 8.0);

    let mut ops = text_ops(MARGIN, y, Font::Bold, 8.0, facility_name);
    ops.extend(text_ops(label_x, y, Font::Regular, 8.0, label));
    ops.extend(line_ops(MARGIN, y - 5.0, size.width - MARGIN, y - 5.0));
    ops
}

fn footer(size: PageSize, page: usize, total: usize) -> Vec<Operation> {
    centered_text_ops(size, MARGIN / 2.0, Font::Regular, 8.0, &format!("Page {} of {}", page, total))
}

/// Title, rule and body blocks of a section at the cursor
pub(crate) fn draw_section(canvas: &mut Canvas, section: &Section) {
    canvas.paragraph(&strip_markdown(&section.title), Font::Bold, 16.0, 0.0);
    let y = canvas.y() + 2.0;
    let left = canvas.left();
    let right = left + canvas.content_width();
    canvas.stroke_line(left, y, right, y);
    canvas.gap(10.0);

    for block in section.blocks() {
        draw_block(canvas, &block);
    }
}

fn draw_block(canvas: &mut Canvas, block: &Block) {
    match block {
        Block::Heading { text } => {
            canvas.gap(4.0);
            canvas.ensure_space(40.0);
            canvas.paragraph(&strip_markdown(text), Font::Bold, 12.0, 0.0);
            canvas.gap(2.0);
        }
        Block::Paragraph { text } => {
            canvas.paragraph(&strip_markdown(text), Font::Regular, BODY_SIZE, 0.0);
            canvas.gap(6.0);
        }
        Block::List { ordered, items } => {
            for (i, item) in items.iter().enumerate() {
                let marker = if *ordered {
                    format!("{}.", i + 1)
                } else {
                    "\u{2022}".to_string()
                };
                draw_list_item(canvas, &marker, &strip_markdown(item));
            }
            canvas.gap(6.0);
        }
        Block::Table { headers, rows } => {
            draw_table(canvas, headers, rows);
            canvas.gap(8.0);
        }
    }
}

fn draw_list_item(canvas: &mut Canvas, marker: &str, text: &str) {
    let indent = 22.0;
    let lines = wrap_text(text, Font::Regular, BODY_SIZE, canvas.content_width() - indent);
    for (i, line) in lines.iter().enumerate() {
        let leading = BODY_SIZE * 1.35;
        canvas.ensure_space(leading);
        let baseline = canvas.y() - BODY_SIZE;
        if i == 0 {
            canvas.text_at(canvas.left() + 6.0, baseline, Font::Regular, BODY_SIZE, marker);
        }
        canvas.text_at(canvas.left() + indent, baseline, Font::Regular, BODY_SIZE, line);
        canvas.gap(leading);
    }
}

fn draw_table(canvas: &mut Canvas, headers: &[String], rows: &[Vec<String>]) {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return;
    }

    let column_width = canvas.content_width() / columns as f32;
    draw_row(canvas, headers, columns, column_width, Font::Bold);
    for row in rows {
        draw_row(canvas, row, columns, column_width, Font::Regular);
    }
}

fn draw_row(canvas: &mut Canvas, cells: &[String], columns: usize, column_width: f32, font: Font) {
    let leading = TABLE_SIZE * 1.3;
    let wrapped: Vec<Vec<String>> = (0..columns)
        .map(|i| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            wrap_text(&strip_markdown(cell), font, TABLE_SIZE, column_width - 2.0 * CELL_PADDING)
        })
        .collect();
    let line_count = wrapped.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let height = line_count as f32 * leading + 2.0 * CELL_PADDING;

    canvas.ensure_space(height);
    let top = canvas.y();
    let left = canvas.left();

    if font == Font::Bold {
        canvas.fill_rect(left, top - height, column_width * columns as f32, height, 0.9);
    }

    for (i, lines) in wrapped.iter().enumerate() {
        let x = left + i as f32 * column_width;
        for (j, line) in lines.iter().enumerate() {
            let baseline = top - CELL_PADDING - TABLE_SIZE - j as f32 * leading;
            canvas.text_at(x + CELL_PADDING, baseline, font, TABLE_SIZE, line);
        }
        canvas.stroke_rect(x, top - height, column_width, height);
    }

    canvas.gap(height);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_content;
    use lopdf::Document;

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_full_plan_page_layout() {
        let content = sample_content();
        let bytes = render_full_plan(&content, Some("2.1")).unwrap();

        assert!(bytes.starts_with(b"%PDF"));
        // Cover, one contents page, one page per short section
        assert_eq!(page_count(&bytes), 1 + 1 + content.sections.len());
    }

    #[test]
    fn test_long_section_spans_pages() {
        let mut content = sample_content();
        let body = (1..=120)
            .map(|i| format!("{}. Step number {} of the drill", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        content.sections = vec![Section::new("Training and Drills", body)];

        let bytes = render_full_plan(&content, None).unwrap();
        assert!(page_count(&bytes) > 3);
    }

    #[test]
    fn test_toc_page_count() {
        assert_eq!(toc_page_count(0), 1);
        assert_eq!(toc_page_count(10), 1);
        assert_eq!(toc_page_count(30), 1);
        assert_eq!(toc_page_count(31), 2);
    }

    #[test]
    fn test_many_sections_get_more_contents_pages() {
        let mut content = sample_content();
        content.sections = (1..=35)
            .map(|i| Section::new(format!("Section {}", i), "Short."))
            .collect();

        let bytes = render_full_plan(&content, None).unwrap();
        assert_eq!(page_count(&bytes), 1 + 2 + 35);
    }

    #[test]
    fn test_single_section() {
        let content = sample_content();
        let (title, bytes) = render_section(&content, "emergency contacts").unwrap();
        assert_eq!(title, "Emergency Contacts");
        assert_eq!(page_count(&bytes), 1);
    }
}
