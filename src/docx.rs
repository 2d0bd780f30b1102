//! Minimal WordprocessingML (`.docx`) support: plain paragraph text in,
//! plain paragraph text out.

use std::io::{Cursor, Read, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::types::ConversionError;

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

// A4 portrait, one inch margins, in twentieths of a point.
const DOCUMENT_TAIL: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*?)?(?:/>|>(.*?)</w:p>)").expect("paragraph pattern"));

static RUN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>").expect("run text pattern")
});

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("entity pattern"));

/// Plain text of every body paragraph, in document order.
pub fn read_paragraphs(content: &[u8]) -> Result<Vec<String>, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(content))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)?
        .read_to_string(&mut xml)
        .map_err(|e| ConversionError::InvalidContent {
            message: format!("{DOCUMENT_PART} is unreadable: {e}"),
        })?;

    let paragraphs: Vec<String> = PARAGRAPH
        .captures_iter(&xml)
        .map(|paragraph| match paragraph.get(1) {
            Some(body) => paragraph_text(body.as_str()),
            None => String::new(),
        })
        .collect();

    log::debug!("read {} paragraphs from {}", paragraphs.len(), DOCUMENT_PART);
    Ok(paragraphs)
}

fn paragraph_text(body: &str) -> String {
    let mut text = String::new();
    for run in RUN_TEXT.captures_iter(body) {
        match run.get(1) {
            Some(t) => text.push_str(&unescape_xml(t.as_str())),
            None => text.push('\t'),
        }
    }
    text
}

/// Build a document with one paragraph per line of each page and a page
/// break between pages.
pub fn write_document(pages: &[String]) -> Result<Vec<u8>, ConversionError> {
    let mut body = String::from(DOCUMENT_HEAD);
    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        }
        for line in page.lines() {
            body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            body.push_str(&escape_xml(line.trim_end()));
            body.push_str("</w:t></w:r></w:p>");
        }
    }
    body.push_str(DOCUMENT_TAIL);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, part) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        (DOCUMENT_PART, body.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(part.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Escape text content, dropping characters XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push(c),
            c if c < ' ' || c == '\u{fffe}' || c == '\u{ffff}' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape_xml(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
