//! Spreadsheet (`.xlsx`) adapter.
//!
//! Works directly on the SpreadsheetML parts: the shared string table, inline
//! strings and literal string cells. Formula cells, numbers and every part
//! without a translated string are carried over untouched, so nothing is ever
//! recalculated on save.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tracing::{debug, info, warn};

use super::filter::is_translatable;
use super::package::Package;
use super::strings::{StringSet, StringTable};
use super::xml::{prefixed_name, push_text, write_text_element};
use super::{ApplyReport, DocumentAdapter, DocumentKind};
use crate::error::{DoctransError, Result};

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const WORKSHEET_REL: &str = "/worksheet";
const SHARED_STRINGS_REL: &str = "/sharedStrings";

/// Decode Excel's `_xHHHH_` escape sequences.
///
/// `_x000d_` is a carriage return, `_x005f_` an escaped underscore, and so on.
/// Anything that is not a complete sequence is kept as written.
pub fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match escape_at(candidate) {
            Some(decoded) => {
                result.push(decoded);
                rest = &candidate[7..];
            }
            None => {
                result.push('_');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Encode control characters as `_xHHHH_` and protect literal escape-looking
/// text so that decoding gives back `s`.
pub fn encode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(c) = rest.chars().next() {
        if c == '_' && escape_at(rest).is_some() {
            result.push_str("_x005F_");
        } else if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') {
            result.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            result.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    result
}

/// `s` starts with `_xHHHH_`: the character it stands for.
fn escape_at(s: &str) -> Option<char> {
    let bytes = s.as_bytes();
    if bytes.len() < 7 || &bytes[..2] != b"_x" || bytes[6] != b'_' {
        return None;
    }
    let hex = &s[2..6];
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellSource {
    Shared(usize),
    Inline,
    Literal,
}

#[derive(Debug, Clone)]
struct StringCell {
    source: CellSource,
    value: String,
}

#[derive(Debug, Clone)]
struct SheetRef {
    name: String,
    part: String,
}

/// Where the sheets and the shared string table live inside the package.
#[derive(Debug)]
struct WorkbookLayout {
    sheets: Vec<SheetRef>,
    shared_strings: Option<String>,
}

impl WorkbookLayout {
    fn read<R: Read + Seek>(package: &mut Package<R>) -> Result<Self> {
        let workbook_part = package.main_part(DEFAULT_WORKBOOK_PART)?;
        let rels = package.relationships(&workbook_part)?;
        let xml = package.read_part(&workbook_part)?;

        let mut reader = Reader::from_str(&xml);
        let mut sheets = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                    let mut name = None;
                    let mut r_id = None;

                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            name = Some(attr.unescape_value()?.to_string());
                        } else if attr.key.local_name().as_ref() == b"id"
                            && attr.key.prefix().is_some()
                        {
                            r_id = Some(attr.unescape_value()?.to_string());
                        }
                    }

                    let (Some(name), Some(r_id)) = (name, r_id) else {
                        continue;
                    };

                    match rels.iter().find(|rel| rel.id == r_id) {
                        Some(rel) if rel.rel_type.ends_with(WORKSHEET_REL) => {
                            sheets.push(SheetRef {
                                name,
                                part: rel.target.clone(),
                            });
                        }
                        Some(rel) => debug!("Skipping sheet '{}' of type {}", name, rel.rel_type),
                        None => warn!("Sheet '{}' has no relationship {}", name, r_id),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let shared_strings = rels
            .iter()
            .find(|rel| rel.rel_type.ends_with(SHARED_STRINGS_REL))
            .map(|rel| rel.target.clone())
            .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
        let shared_strings = package.has_part(&shared_strings).then_some(shared_strings);

        Ok(Self {
            sheets,
            shared_strings,
        })
    }
}

/// Read the shared string table. Rich text runs are concatenated; phonetic
/// runs are not part of the value.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut item = SharedItem::default();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) if e.local_name().as_ref() == b"si" => item = SharedItem::default(),
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) if e.local_name().as_ref() == b"si" => {
                strings.push(decode_excel_escapes(&item.text));
            }
            Event::Eof => break,
            _ => item.observe(&event)?,
        }
    }

    Ok(strings)
}

/// Text collected from one `<si>` entry.
#[derive(Default)]
struct SharedItem {
    text: String,
    in_t: bool,
    phonetic_depth: usize,
}

impl SharedItem {
    fn observe(&mut self, event: &Event<'_>) -> Result<()> {
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"rPh" => self.phonetic_depth += 1,
                b"t" if self.phonetic_depth == 0 => self.in_t = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"rPh" => self.phonetic_depth = self.phonetic_depth.saturating_sub(1),
                b"t" => self.in_t = false,
                _ => {}
            },
            Event::Text(_) | Event::CData(_) if self.in_t => push_text(event, &mut self.text)?,
            _ => {}
        }
        Ok(())
    }
}

/// Parse state for a single `<c>` element.
#[derive(Default)]
struct CellState {
    cell_type: Option<String>,
    has_formula: bool,
    value: String,
    inline: SharedItem,
    in_v: bool,
    in_is: bool,
}

impl CellState {
    fn start(e: &BytesStart<'_>) -> Result<Self> {
        let mut state = Self::default();
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"t" {
                state.cell_type = Some(attr.unescape_value()?.to_string());
            }
        }
        Ok(state)
    }

    fn observe(&mut self, event: &Event<'_>) -> Result<()> {
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"f" => self.has_formula = true,
                b"v" => self.in_v = true,
                b"is" => self.in_is = true,
                _ if self.in_is => self.inline.observe(event)?,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"f" => self.has_formula = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => self.in_v = false,
                b"is" => self.in_is = false,
                _ if self.in_is => self.inline.observe(event)?,
                _ => {}
            },
            Event::Text(_) | Event::CData(_) if self.in_v => push_text(event, &mut self.value)?,
            _ if self.in_is => self.inline.observe(event)?,
            _ => {}
        }
        Ok(())
    }

    /// The string this cell holds, if it is a plain (non-formula) string cell.
    fn finish(self, shared: &[String]) -> Result<Option<StringCell>> {
        if self.has_formula {
            return Ok(None);
        }

        let cell = match self.cell_type.as_deref() {
            Some("s") => {
                let raw = self.value.trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                let idx: usize = raw.parse().map_err(|_| {
                    DoctransError::InvalidDocument(format!("invalid shared string index '{}'", raw))
                })?;
                let value = shared.get(idx).ok_or_else(|| {
                    DoctransError::InvalidDocument(format!(
                        "shared string index {} out of bounds",
                        idx
                    ))
                })?;
                StringCell {
                    source: CellSource::Shared(idx),
                    value: value.clone(),
                }
            }
            Some("inlineStr") => StringCell {
                source: CellSource::Inline,
                value: decode_excel_escapes(&self.inline.text),
            },
            Some("str") => StringCell {
                source: CellSource::Literal,
                value: decode_excel_escapes(&self.value),
            },
            _ => return Ok(None),
        };
        Ok(Some(cell))
    }
}

fn is_cell_start(event: &Event<'_>) -> bool {
    matches!(event, Event::Start(e) if e.local_name().as_ref() == b"c")
}

fn is_cell_end(event: &Event<'_>) -> bool {
    matches!(event, Event::End(e) if e.local_name().as_ref() == b"c")
}

/// Every plain string cell of a worksheet, in document order.
fn scan_sheet(xml: &str, shared: &[String]) -> Result<Vec<StringCell>> {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();
    let mut current: Option<CellState> = None;

    loop {
        let event = reader.read_event()?;
        if let Event::Eof = event {
            break;
        }

        if is_cell_start(&event) {
            if let Event::Start(e) = &event {
                current = Some(CellState::start(e)?);
            }
        } else if is_cell_end(&event) {
            if let Some(state) = current.take() {
                if let Some(cell) = state.finish(shared)? {
                    cells.push(cell);
                }
            }
        } else if let Some(state) = current.as_mut() {
            state.observe(&event)?;
        }
    }

    Ok(cells)
}

/// Rewrite inline and literal string cells of a worksheet. Returns the new
/// part and the number of cells changed, or `None` when nothing changed.
fn rewrite_sheet(
    xml: &str,
    shared: &[String],
    table: &StringTable,
) -> Result<Option<(Vec<u8>, usize)>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buffered: Vec<Event<'_>> = Vec::new();
    let mut current: Option<CellState> = None;
    let mut changed = 0;

    loop {
        let event = reader.read_event()?;
        if let Event::Eof = event {
            break;
        }

        if current.is_none() && is_cell_start(&event) {
            if let Event::Start(e) = &event {
                current = Some(CellState::start(e)?);
            }
            buffered.push(event);
        } else if is_cell_end(&event) {
            buffered.push(event);
            let Some(state) = current.take() else {
                for ev in buffered.drain(..) {
                    writer.write_event(ev)?;
                }
                continue;
            };

            let replacement = state
                .finish(shared)?
                .filter(|cell| !matches!(cell.source, CellSource::Shared(_)))
                .and_then(|cell| {
                    table
                        .get(&cell.value)
                        .filter(|translated| *translated != cell.value)
                        .map(|translated| (cell.source, encode_excel_escapes(translated)))
                });

            match replacement {
                Some((source, translated)) => {
                    write_replaced_cell(&mut writer, buffered.drain(..), source, &translated)?;
                    changed += 1;
                }
                None => {
                    for ev in buffered.drain(..) {
                        writer.write_event(ev)?;
                    }
                }
            }
        } else if let Some(state) = current.as_mut() {
            state.observe(&event)?;
            buffered.push(event);
        } else {
            writer.write_event(event)?;
        }
    }

    if changed == 0 {
        return Ok(None);
    }
    Ok(Some((writer.into_inner(), changed)))
}

/// Re-emit a buffered cell with its string content replaced.
fn write_replaced_cell<'a, W: std::io::Write>(
    writer: &mut Writer<W>,
    events: impl Iterator<Item = Event<'a>>,
    source: CellSource,
    translated: &str,
) -> Result<()> {
    let mut skip_depth = 0usize;
    let mut in_value = false;

    for event in events {
        if skip_depth > 0 {
            match &event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => {
                    skip_depth -= 1;
                    if skip_depth == 0 {
                        writer.write_event(event)?;
                    }
                }
                _ => {}
            }
            continue;
        }

        match (&event, source) {
            (Event::Start(e), CellSource::Inline) if e.local_name().as_ref() == b"is" => {
                let t_name = prefixed_name(e, "t");
                writer.write_event(event.clone())?;
                write_text_element(writer, &t_name, translated)?;
                skip_depth = 1;
            }
            (Event::Empty(e), CellSource::Inline) if e.local_name().as_ref() == b"is" => {
                let t_name = prefixed_name(e, "t");
                let is_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.clone()))?;
                write_text_element(writer, &t_name, translated)?;
                writer.write_event(Event::End(BytesEnd::new(is_name)))?;
            }
            (Event::Start(e), CellSource::Literal) if e.local_name().as_ref() == b"v" => {
                writer.write_event(event.clone())?;
                writer.write_event(Event::Text(BytesText::new(translated)))?;
                in_value = true;
            }
            (Event::Text(_) | Event::CData(_), CellSource::Literal) if in_value => {}
            (Event::End(e), CellSource::Literal) if e.local_name().as_ref() == b"v" => {
                in_value = false;
                writer.write_event(event)?;
            }
            _ => writer.write_event(event)?,
        }
    }
    Ok(())
}

/// Rewrite shared string entries whose value has a different translation.
/// Returns the new part and the indices of the entries that changed.
fn rewrite_shared_strings(xml: &str, table: &StringTable) -> Result<(Vec<u8>, HashSet<usize>)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buffered: Vec<Event<'_>> = Vec::new();
    let mut item: Option<SharedItem> = None;
    let mut index = 0usize;
    let mut changed = HashSet::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Eof => break,
            Event::Start(e) if item.is_none() && e.local_name().as_ref() == b"si" => {
                item = Some(SharedItem::default());
                buffered.push(event);
            }
            Event::Empty(e) if item.is_none() && e.local_name().as_ref() == b"si" => {
                index += 1;
                writer.write_event(event)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"si" => {
                let value = item
                    .take()
                    .map(|it| decode_excel_escapes(&it.text))
                    .unwrap_or_default();
                let translated = table
                    .get(&value)
                    .filter(|translated| *translated != value)
                    .map(encode_excel_escapes);

                match (translated, buffered.first()) {
                    (Some(translated), Some(Event::Start(si))) => {
                        let t_name = prefixed_name(si, "t");
                        writer.write_event(Event::Start(si.clone()))?;
                        write_text_element(&mut writer, &t_name, &translated)?;
                        writer.write_event(event)?;
                        buffered.clear();
                        changed.insert(index);
                    }
                    _ => {
                        for ev in buffered.drain(..) {
                            writer.write_event(ev)?;
                        }
                        writer.write_event(event)?;
                    }
                }
                index += 1;
            }
            _ => match item.as_mut() {
                Some(it) => {
                    it.observe(&event)?;
                    buffered.push(event);
                }
                None => writer.write_event(event)?,
            },
        }
    }

    Ok((writer.into_inner(), changed))
}

/// Adapter for SpreadsheetML workbooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetAdapter;

impl SpreadsheetAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentAdapter for SpreadsheetAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Spreadsheet
    }

    fn extract(&self, path: &Path) -> Result<StringSet> {
        let mut package = Package::open(path)?;
        let layout = WorkbookLayout::read(&mut package)?;
        let shared = match &layout.shared_strings {
            Some(part) => parse_shared_strings(&package.read_part(part)?)?,
            None => Vec::new(),
        };

        let mut strings = StringSet::new();
        for sheet in &layout.sheets {
            let xml = package.read_part(&sheet.part)?;
            let cells = scan_sheet(&xml, &shared)?;
            debug!("Sheet '{}': {} string cells", sheet.name, cells.len());

            for cell in cells {
                if is_translatable(&cell.value) {
                    strings.insert(cell.value);
                }
            }
        }

        info!(
            "Extracted {} unique strings from {} sheets",
            strings.len(),
            layout.sheets.len()
        );
        Ok(strings)
    }

    fn apply(&self, source: &Path, dest: &Path, table: &StringTable) -> Result<ApplyReport> {
        let mut package = Package::open(source)?;
        let layout = WorkbookLayout::read(&mut package)?;
        let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
        let mut report = ApplyReport::default();

        let mut shared = Vec::new();
        let mut changed_shared = HashSet::new();
        if let Some(part) = &layout.shared_strings {
            let xml = package.read_part(part)?;
            shared = parse_shared_strings(&xml)?;
            let (bytes, changed) = rewrite_shared_strings(&xml, table)?;
            if !changed.is_empty() {
                replacements.insert(part.clone(), bytes);
            }
            changed_shared = changed;
        }

        for sheet in &layout.sheets {
            let xml = package.read_part(&sheet.part)?;

            report.nodes_updated += scan_sheet(&xml, &shared)?
                .iter()
                .filter(|cell| {
                    matches!(cell.source, CellSource::Shared(idx) if changed_shared.contains(&idx))
                })
                .count();

            if let Some((bytes, changed)) = rewrite_sheet(&xml, &shared, table)? {
                debug!("Sheet '{}': {} inline cells rewritten", sheet.name, changed);
                replacements.insert(sheet.part.clone(), bytes);
                report.nodes_updated += changed;
            }
        }

        report.parts_rewritten = replacements.len();
        package.rewrite_to(dest, &replacements)?;

        info!(
            "Applied translations to {} cells across {} parts",
            report.nodes_updated, report.parts_rewritten
        );
        Ok(report)
    }
}
