//! Export of recognized text as plain text or a paginated PDF.
//!
//! Both are pure functions of the input string.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{OcrDeskError, Result};

/// A4 in PostScript points.
pub const PAGE_WIDTH: i64 = 595;
pub const PAGE_HEIGHT: i64 = 842;
pub const MARGIN: i64 = 50;
pub const FONT_SIZE: i64 = 12;
pub const LINE_HEIGHT: i64 = 14;
/// Helvetica at 12pt averages about 6pt per glyph across the printable width.
pub const CHARS_PER_LINE: usize = 80;
pub const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Txt => "text/plain; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = OcrDeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "pdf" => Ok(Self::Pdf),
            other => Err(OcrDeskError::validation(format!(
                "Unsupported export format '{}', expected txt or pdf",
                other
            ))),
        }
    }
}

pub fn export(text: &str, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Txt => Ok(export_txt(text)),
        ExportFormat::Pdf => export_pdf(text),
    }
}

/// UTF-8 bytes of `text`.
pub fn export_txt(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if current_len > 0 {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            out.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width && current_len > 0 {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    out.push(current);
}

/// Word-wrap `text` to `chars_per_line` and split it into pages of `lines_per_page`.
///
/// Blank lines are kept. Words longer than a line are split. Always returns
/// at least one page.
pub fn paginate(text: &str, chars_per_line: usize, lines_per_page: usize) -> Vec<Vec<String>> {
    let chars_per_line = chars_per_line.max(1);
    let lines_per_page = lines_per_page.max(1);

    let mut lines = Vec::new();
    for line in text.lines() {
        wrap_line(line, chars_per_line, &mut lines);
    }

    if lines.is_empty() {
        return vec![Vec::new()];
    }

    lines.chunks(lines_per_page).map(|chunk| chunk.to_vec()).collect()
}

fn win_ansi_bytes(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

fn page_content(lines: &[String]) -> Result<Vec<u8>> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(FONT_SIZE)]),
        Operation::new("TL", vec![Object::Integer(LINE_HEIGHT)]),
        Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN - FONT_SIZE)],
        ),
    ];

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("Tj", vec![Object::string_literal(win_ansi_bytes(line))]));
    }
    operations.push(Operation::new("ET", vec![]));

    Content { operations }
        .encode()
        .map_err(|e| OcrDeskError::serialization_with_source("Failed to encode PDF page", e))
}

/// Lay out `text` on A4 pages in 12pt Helvetica.
///
/// Characters outside WinAnsi are rendered as `?`.
pub fn export_pdf(text: &str) -> Result<Vec<u8>> {
    let pages = paginate(text, CHARS_PER_LINE, LINES_PER_PAGE);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for lines in &pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(lines)?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| OcrDeskError::serialization_with_source("Failed to write PDF", e))?;
    Ok(out)
}
