// Office document handling
//
// Each supported format is an adapter over the same two operations:
// - extract: collect the distinct translatable strings of a document
// - apply: write a copy of the document with those strings replaced
//
// Shared pieces:
// - package: zip container, part lookup and relationship resolution
// - xml: small helpers around quick-xml events
// - strings: ordered string set and translation table
// - filter: which raw values count as translatable

pub mod filter;
pub mod package;
pub mod spreadsheet;
pub mod strings;
pub mod wordprocessing;
pub mod xml;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use filter::is_translatable;
pub use spreadsheet::SpreadsheetAdapter;
pub use strings::{StringSet, StringTable};
pub use wordprocessing::WordProcessingAdapter;

use crate::error::{DoctransError, Result};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// `.xlsx` workbook
    Spreadsheet,
    /// `.docx` document
    WordProcessing,
}

impl DocumentKind {
    /// Detect the format from a file name's extension, case-insensitively.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" => Ok(Self::Spreadsheet),
            "docx" => Ok(Self::WordProcessing),
            _ => Err(DoctransError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Spreadsheet => "xlsx",
            Self::WordProcessing => "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            Self::WordProcessing => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What an `apply` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Text nodes or cells whose value was replaced
    pub nodes_updated: usize,
    /// Package parts written with new content
    pub parts_rewritten: usize,
}

/// Format-specific extraction and reinjection
pub trait DocumentAdapter: Send + Sync {
    /// Format handled by this adapter
    fn kind(&self) -> DocumentKind;

    /// Distinct translatable strings of the document, in first-seen order
    fn extract(&self, path: &Path) -> Result<StringSet>;

    /// Write a copy of `source` to `dest` with every string found in `table`
    /// replaced by its translation. `source` is never modified.
    fn apply(&self, source: &Path, dest: &Path, table: &StringTable) -> Result<ApplyReport>;
}

/// Factory for document adapters
pub struct AdapterFactory;

impl AdapterFactory {
    pub fn create(kind: DocumentKind) -> Box<dyn DocumentAdapter> {
        match kind {
            DocumentKind::Spreadsheet => Box::new(SpreadsheetAdapter::new()),
            DocumentKind::WordProcessing => Box::new(WordProcessingAdapter::new()),
        }
    }
}
