//! Word processing (`.docx`) adapter.
//!
//! Only the `w:t` text elements of the main document part are touched. Each
//! element is treated on its own, so a sentence split across runs is seen as
//! several independent strings.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;
use tracing::{debug, info};

use super::filter::is_translatable;
use super::package::Package;
use super::strings::{StringSet, StringTable};
use super::xml::{needs_preserve, push_text, XML_DECLARATION};
use super::{ApplyReport, DocumentAdapter, DocumentKind};
use crate::error::Result;

const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

const WORDPROCESSING_NAMESPACES: &[&[u8]] = &[
    b"http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    b"http://purl.oclc.org/ooxml/wordprocessingml/main",
];

fn is_text_element(ns: &ResolveResult<'_>, local_name: &[u8]) -> bool {
    local_name == b"t"
        && matches!(ns, ResolveResult::Bound(Namespace(uri)) if WORDPROCESSING_NAMESPACES.contains(uri))
}

/// Text of every `w:t` element, in document order.
fn collect_text_elements(xml: &str) -> Result<Vec<String>> {
    let mut reader = NsReader::from_str(xml);
    let mut texts = Vec::new();
    let mut current: Option<String> = None;

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        match &event {
            Event::Start(e) if is_text_element(&ns, e.local_name().as_ref()) => {
                current = Some(String::new());
            }
            Event::End(e) if is_text_element(&ns, e.local_name().as_ref()) => {
                if let Some(text) = current.take() {
                    texts.push(text);
                }
            }
            Event::Text(_) | Event::CData(_) => {
                if let Some(text) = current.as_mut() {
                    push_text(&event, text)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(texts)
}

/// A `w:t` element buffered until its end tag.
struct TextElement<'a> {
    start: BytesStart<'a>,
    inner: Vec<Event<'a>>,
    text: String,
}

impl<'a> TextElement<'a> {
    fn new(start: BytesStart<'a>) -> Self {
        Self {
            start,
            inner: Vec::new(),
            text: String::new(),
        }
    }

    fn push(&mut self, event: Event<'a>) -> Result<()> {
        push_text(&event, &mut self.text)?;
        self.inner.push(event);
        Ok(())
    }

    /// Write the element back, replacing its content with the translation
    /// when there is a different one. Returns whether it was replaced.
    fn finish<W: Write>(
        self,
        writer: &mut Writer<W>,
        end: Event<'a>,
        table: &StringTable,
    ) -> Result<bool> {
        let translated = table
            .get(&self.text)
            .filter(|translated| *translated != self.text);

        match translated {
            Some(translated) => {
                let mut start = self.start;
                let has_space = start
                    .attributes()
                    .flatten()
                    .any(|attr| attr.key.as_ref() == b"xml:space");
                if needs_preserve(translated) && !has_space {
                    start.push_attribute(("xml:space", "preserve"));
                }
                writer.write_event(Event::Start(start))?;
                writer.write_event(Event::Text(BytesText::new(translated)))?;
                writer.write_event(end)?;
                Ok(true)
            }
            None => {
                writer.write_event(Event::Start(self.start))?;
                for event in self.inner {
                    writer.write_event(event)?;
                }
                writer.write_event(end)?;
                Ok(false)
            }
        }
    }
}

/// Rewrite the main document part. The output always starts with a fresh
/// UTF-8 declaration; the rest of the markup is passed through as read.
fn rewrite_document(xml: &str, table: &StringTable) -> Result<(Vec<u8>, usize)> {
    let mut reader = NsReader::from_str(xml);
    let mut out = Vec::with_capacity(xml.len() + XML_DECLARATION.len() + 1);
    out.extend_from_slice(XML_DECLARATION.as_bytes());
    out.push(b'\n');
    let mut writer = Writer::new(out);

    let mut element: Option<TextElement<'_>> = None;
    let mut in_prolog = true;
    let mut changed = 0;

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let starts_text =
            matches!(&event, Event::Start(e) if is_text_element(&ns, e.local_name().as_ref()));
        let ends_text =
            matches!(&event, Event::End(e) if is_text_element(&ns, e.local_name().as_ref()));

        if in_prolog {
            match &event {
                Event::Decl(_) => continue,
                Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                Event::Start(_) | Event::Empty(_) => in_prolog = false,
                _ => {}
            }
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if starts_text => element = Some(TextElement::new(e)),
            event if ends_text => match element.take() {
                Some(current) => {
                    if current.finish(&mut writer, event, table)? {
                        changed += 1;
                    }
                }
                None => writer.write_event(event)?,
            },
            event => match element.as_mut() {
                Some(current) => current.push(event)?,
                None => writer.write_event(event)?,
            },
        }
    }

    Ok((writer.into_inner(), changed))
}

/// Adapter for WordprocessingML documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordProcessingAdapter;

impl WordProcessingAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentAdapter for WordProcessingAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::WordProcessing
    }

    fn extract(&self, path: &Path) -> Result<StringSet> {
        let mut package = Package::open(path)?;
        let part = package.main_part(DEFAULT_DOCUMENT_PART)?;
        let xml = package.read_part(&part)?;

        let texts = collect_text_elements(&xml)?;
        debug!("{}: {} text elements", part, texts.len());

        let strings: StringSet = texts
            .into_iter()
            .filter(|text| is_translatable(text))
            .collect();

        info!("Extracted {} unique strings from {}", strings.len(), part);
        Ok(strings)
    }

    fn apply(&self, source: &Path, dest: &Path, table: &StringTable) -> Result<ApplyReport> {
        let mut package = Package::open(source)?;
        let part = package.main_part(DEFAULT_DOCUMENT_PART)?;
        let xml = package.read_part(&part)?;

        let (bytes, changed) = rewrite_document(&xml, table)?;
        let replacements = HashMap::from([(part.clone(), bytes)]);
        package.rewrite_to(dest, &replacements)?;

        info!("Applied translations to {} text elements in {}", changed, part);
        Ok(ApplyReport {
            nodes_updated: changed,
            parts_rewritten: replacements.len(),
        })
    }
}
