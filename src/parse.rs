//! Document parsers and the non-throwing parse boundary.
//!
//! Each [`DocumentParser`] extracts plain-text segments from one family of
//! file formats. [`ParserProvider::parse_safe`] wraps parser execution in a
//! [`ParseOutcome`] so the ingestion pipeline's fault isolation is
//! type-checked: a failed or empty extraction is a `Failure` with a reason,
//! never a panic or an escaping error.

use std::io::Read;

use crate::models::{DocumentMetadata, ParsedSegment};

/// Result of a parse attempt. An extraction yielding no text is a failure,
/// not an empty success.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Success(Vec<ParsedSegment>),
    Failure(String),
}

pub trait DocumentParser: Send + Sync {
    /// Lowercase extensions this parser handles, dot included.
    fn extensions(&self) -> &[&'static str];

    fn parse(&self, doc: &DocumentMetadata) -> Result<Vec<ParsedSegment>, String>;

    fn applies_to(&self, doc: &DocumentMetadata) -> bool {
        self.extensions().iter().any(|e| *e == doc.extension)
    }
}

/// Holds the enabled parser set and routes documents to the right parser.
pub struct ParserProvider {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserProvider {
    pub fn new(parsers: Vec<Box<dyn DocumentParser>>) -> Self {
        Self { parsers }
    }

    /// Build the provider from the configured allow-list. Unknown names are
    /// rejected by config validation before this runs.
    pub fn from_enabled(enabled: &[String]) -> Self {
        let mut parsers: Vec<Box<dyn DocumentParser>> = Vec::new();
        for name in enabled {
            match name.as_str() {
                "text" => parsers.push(Box::new(TextParser)),
                "pdf" => parsers.push(Box::new(PdfParser)),
                "docx" => parsers.push(Box::new(DocxParser)),
                _ => {}
            }
        }
        Self::new(parsers)
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .parsers
            .iter()
            .flat_map(|p| p.extensions().iter().map(|e| e.to_string()))
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Parse a document without ever propagating an error. No applicable
    /// parser, a parser error, and an empty extraction all yield `Failure`.
    pub fn parse_safe(&self, doc: &DocumentMetadata) -> ParseOutcome {
        let parser = match self.parsers.iter().find(|p| p.applies_to(doc)) {
            Some(p) => p,
            None => {
                return ParseOutcome::Failure(format!(
                    "no parser available for '{}'",
                    doc.extension
                ))
            }
        };

        match parser.parse(doc) {
            Ok(segments) => {
                let has_text = segments.iter().any(|s| !s.text.trim().is_empty());
                if !has_text {
                    ParseOutcome::Failure("document contains no extractable text".to_string())
                } else {
                    ParseOutcome::Success(segments)
                }
            }
            Err(reason) => ParseOutcome::Failure(reason),
        }
    }
}

// ============ Plain text ============

pub struct TextParser;

impl DocumentParser for TextParser {
    fn extensions(&self) -> &[&'static str] {
        &[".txt", ".md"]
    }

    fn parse(&self, doc: &DocumentMetadata) -> Result<Vec<ParsedSegment>, String> {
        let text = std::fs::read_to_string(&doc.locator).map_err(|e| e.to_string())?;
        Ok(vec![ParsedSegment { text }])
    }
}

// ============ PDF ============

pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn extensions(&self) -> &[&'static str] {
        &[".pdf"]
    }

    fn parse(&self, doc: &DocumentMetadata) -> Result<Vec<ParsedSegment>, String> {
        let bytes = std::fs::read(&doc.locator).map_err(|e| e.to_string())?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| format!("PDF extraction failed: {}", e))?;
        Ok(vec![ParsedSegment { text }])
    }
}

// ============ DOCX ============

/// Zip-bomb protection: maximum decompressed bytes read from one ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub struct DocxParser;

impl DocumentParser for DocxParser {
    fn extensions(&self) -> &[&'static str] {
        &[".docx"]
    }

    fn parse(&self, doc: &DocumentMetadata) -> Result<Vec<ParsedSegment>, String> {
        let bytes = std::fs::read(&doc.locator).map_err(|e| e.to_string())?;
        let text = extract_docx(&bytes)?;
        Ok(vec![ParsedSegment { text }])
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| e.to_string())?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| e.to_string())?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err("word/document.xml exceeds size limit".to_string());
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err("word/document.xml not found".to_string());
    }
    extract_w_t_elements(&doc_xml)
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
