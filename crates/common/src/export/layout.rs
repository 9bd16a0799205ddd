//! Manual page layout on top of lopdf content streams
//!
//! A [`Canvas`] tracks a cursor on fixed page geometry and collects
//! operations per page. [`build_pdf`] turns the pages into a document using
//! the standard Helvetica fonts.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use super::text::win_ansi;
use super::ExportError;

/// Page geometry in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// US letter, 8.5 x 11 in
pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

/// Business card, 3.5 x 2 in
pub const WALLET_CARD: PageSize = PageSize {
    width: 252.0,
    height: 144.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Approximate Helvetica advance width in thousandths of the font size
fn char_width(c: char, font: Font) -> f32 {
    let base = match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 278.0,
        'f' | 't' | 'r' | 'I' | ' ' | '(' | ')' | '-' | '/' => 333.0,
        'm' | 'M' | 'W' => 833.0,
        'w' | '@' => 778.0,
        c if c.is_ascii_uppercase() => 667.0,
        c if c.is_ascii_digit() => 556.0,
        _ => 556.0,
    };
    match font {
        Font::Regular => base,
        Font::Bold => base * 1.06,
    }
}

pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, font)).sum::<f32>() * size / 1000.0
}

/// Greedy word wrap; words longer than a line are split by character
pub fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };

            if text_width(&candidate, font, size) <= max_width {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }

            if text_width(word, font, size) <= max_width {
                line = word.to_string();
            } else {
                for c in word.chars() {
                    line.push(c);
                    if text_width(&line, font, size) > max_width {
                        line.pop();
                        lines.push(std::mem::replace(&mut line, c.to_string()));
                    }
                }
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines
}

/// Text placement operations
pub fn text_ops(x: f32, y: f32, font: Font, size: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.resource().into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Thin horizontal or vertical rule
pub fn line_ops(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<Operation> {
    vec![
        Operation::new("w", vec![0.5_f32.into()]),
        Operation::new("m", vec![x1.into(), y1.into()]),
        Operation::new("l", vec![x2.into(), y2.into()]),
        Operation::new("S", vec![]),
    ]
}

/// Text horizontally centered on the page
pub fn centered_text_ops(size: PageSize, y: f32, font: Font, font_size: f32, text: &str) -> Vec<Operation> {
    let x = ((size.width - text_width(text, font, font_size)) / 2.0).max(0.0);
    text_ops(x, y, font, font_size, text)
}

/// A cursor over a growing list of pages
pub struct Canvas {
    size: PageSize,
    margin: f32,
    top_reserve: f32,
    pages: Vec<Vec<Operation>>,
    y: f32,
}

impl Canvas {
    pub fn new(size: PageSize, margin: f32) -> Self {
        Self::with_header_space(size, margin, 0.0)
    }

    /// `top_reserve` points below the top margin are left free for a running header
    pub fn with_header_space(size: PageSize, margin: f32, top_reserve: f32) -> Self {
        Self {
            size,
            margin,
            top_reserve,
            pages: vec![Vec::new()],
            y: size.height - margin - top_reserve,
        }
    }

    pub fn size(&self) -> PageSize {
        self.size
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn left(&self) -> f32 {
        self.margin
    }

    pub fn content_width(&self) -> f32 {
        self.size.width - 2.0 * self.margin
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    /// 1-based number of the page being written
    pub fn page_number(&self) -> usize {
        self.pages.len()
    }

    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = self.size.height - self.margin - self.top_reserve;
    }

    /// Break the page unless `height` more points fit above the bottom margin
    pub fn ensure_space(&mut self, height: f32) {
        if self.y - height < self.margin && !self.page_is_empty() {
            self.new_page();
        }
    }

    fn page_is_empty(&self) -> bool {
        self.y >= self.size.height - self.margin - self.top_reserve
    }

    pub fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn push(&mut self, ops: Vec<Operation>) {
        if let Some(page) = self.pages.last_mut() {
            page.extend(ops);
        }
    }

    /// Text at an absolute position on the current page; the cursor is untouched
    pub fn text_at(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        self.push(text_ops(x, y, font, size, text));
    }

    /// One line at the cursor, then advance
    pub fn line(&mut self, x: f32, font: Font, size: f32, text: &str) {
        let leading = size * 1.35;
        self.ensure_space(leading);
        self.y -= size;
        self.text_at(x, self.y, font, size, text);
        self.y -= leading - size;
    }

    /// Wrapped text at the cursor with an optional indent
    pub fn paragraph(&mut self, text: &str, font: Font, size: f32, indent: f32) {
        let width = self.content_width() - indent;
        let x = self.left() + indent;
        for line in wrap_text(text, font, size, width) {
            self.line(x, font, size, &line);
        }
    }

    pub fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.push(line_ops(x1, y1, x2, y2));
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.push(vec![
            Operation::new("w", vec![0.75_f32.into()]),
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    /// Gray-filled rectangle, used behind table headers
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, gray: f32) {
        self.push(vec![
            Operation::new("g", vec![gray.into()]),
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("f", vec![]),
            Operation::new("g", vec![0.0_f32.into()]),
        ]);
    }

    pub fn into_pages(self) -> Vec<Vec<Operation>> {
        self.pages
    }
}

/// Assemble pages into a PDF file
pub fn build_pdf(size: PageSize, pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (size.width as i64).into(),
                (size.height as i64).into(),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_respects_width() {
        let text = "Evacuate through the nearest marked exit and report to the assembly point";
        let lines = wrap_text(text, Font::Regular, 10.0, 120.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, Font::Regular, 10.0) <= 120.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap_text(&"x".repeat(100), Font::Regular, 10.0, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 100);
    }

    #[test]
    fn test_canvas_breaks_pages() {
        let mut canvas = Canvas::new(WALLET_CARD, 10.0);
        for i in 0..20 {
            canvas.line(10.0, Font::Regular, 10.0, &format!("row {}", i));
        }
        assert!(canvas.page_number() > 1);
    }

    #[test]
    fn test_build_pdf() {
        let mut canvas = Canvas::new(LETTER, 72.0);
        canvas.line(72.0, Font::Bold, 14.0, "Hello");
        canvas.new_page();
        canvas.line(72.0, Font::Regular, 10.0, "World");

        let bytes = build_pdf(LETTER, canvas.into_pages()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
