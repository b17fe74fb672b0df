//! Office Open XML package access: reading parts out of the zip container,
//! following relationships, and writing a rewritten copy of the package.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{DoctransError, Result};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// A relationship entry from a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Package part name the relationship points at, already resolved.
    pub target: String,
}

/// An opened OOXML package. Dropping it closes the underlying archive.
pub struct Package<R> {
    archive: ZipArchive<R>,
}

impl Package<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> Package<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        if archive.index_for_name(CONTENT_TYPES_PART).is_none() {
            return Err(DoctransError::InvalidDocument(format!(
                "missing {}",
                CONTENT_TYPES_PART
            )));
        }
        Ok(Self { archive })
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Read a required part as UTF-8 text.
    pub fn read_part(&mut self, name: &str) -> Result<String> {
        self.read_optional_part(name)?
            .ok_or_else(|| DoctransError::MissingPart(name.to_string()))
    }

    pub fn read_optional_part(&mut self, name: &str) -> Result<Option<String>> {
        let mut file = match self.archive.by_name(name) {
            Ok(f) => f,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut text = String::from_utf8(bytes)
            .map_err(|_| DoctransError::InvalidDocument(format!("{} is not valid UTF-8", name)))?;
        if text.starts_with('\u{feff}') {
            text.drain(..'\u{feff}'.len_utf8());
        }
        Ok(Some(text))
    }

    /// Relationships declared by `part` (`""` for the package root).
    pub fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_path_for(part);
        let Some(xml) = self.read_optional_part(&rels_name)? else {
            return Ok(Vec::new());
        };

        let mut reader = Reader::from_str(&xml);
        let mut rels = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                    let mut id = None;
                    let mut target = None;
                    let mut rel_type = None;
                    let mut external = false;

                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value()?.to_string();
                        match attr.key.as_ref() {
                            b"Id" => id = Some(value),
                            b"Target" => target = Some(value),
                            b"Type" => rel_type = Some(value),
                            b"TargetMode" => external = value == "External",
                            _ => {}
                        }
                    }

                    if external {
                        continue;
                    }
                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        rels.push(Relationship {
                            id,
                            rel_type,
                            target: resolve_target(part, &target),
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(rels)
    }

    /// Locate the main part through the root relationships, falling back to
    /// the conventional location when the package does not declare one.
    pub fn main_part(&mut self, fallback: &str) -> Result<String> {
        let declared = self
            .relationships("")?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(OFFICE_DOCUMENT_REL))
            .map(|rel| rel.target)
            .filter(|target| self.has_part(target));

        match declared {
            Some(part) => Ok(part),
            None if self.has_part(fallback) => Ok(fallback.to_string()),
            None => Err(DoctransError::MissingPart(fallback.to_string())),
        }
    }

    /// Write a copy of this package to `dest`, substituting the parts named in
    /// `replacements`. Every other entry is copied without recompression, so
    /// its bytes are identical to the source.
    pub fn rewrite_to(mut self, dest: &Path, replacements: &HashMap<String, Vec<u8>>) -> Result<()> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let staging = NamedTempFile::new_in(dir)?;
        let mut writer = ZipWriter::new(staging);

        for idx in 0..self.archive.len() {
            let name = self.archive.by_index_raw(idx)?.name().to_string();
            match replacements.get(&name) {
                Some(bytes) => {
                    debug!("Replacing part {} ({} bytes)", name, bytes.len());
                    let options =
                        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                    writer.start_file(name.clone(), options)?;
                    writer.write_all(bytes)?;
                }
                None => {
                    let entry = self.archive.by_index_raw(idx)?;
                    writer.raw_copy_file(entry)?;
                }
            }
        }

        let staging = writer.finish()?;
        staging
            .persist(dest)
            .map_err(|e| DoctransError::Io(e.error))?;
        Ok(())
    }
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`; `""` -> `_rels/.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that declares it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}
