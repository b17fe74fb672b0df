//! Doctrans - Office Document Translation
//!
//! Extracts the distinct text of `.xlsx` and `.docx` documents, translates it
//! in batches through the Gemini API, and writes the translations back into a
//! fresh copy of the document.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod translate;
pub mod workflow;
pub mod workspace;
