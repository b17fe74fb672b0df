use std::fmt;
use std::path::Path;

use indicatif::ProgressBar;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::document::{AdapterFactory, ApplyReport, DocumentKind, StringSet, StringTable};
use crate::error::{DoctransError, Result};
use crate::translate::{BatchTranslator, GeminiBackend, TranslationBackend, TranslationOptions};
use crate::workspace::{ScopedFile, Workspace, OUTPUT_PREFIX, UPLOAD_PREFIX};

/// Steps of a document's trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Uploaded,
    Extracted,
    Translated,
    Rewritten,
    Delivered,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uploaded => "upload",
            Self::Extracted => "extraction",
            Self::Translated => "translation",
            Self::Rewritten => "rewrite",
            Self::Delivered => "delivery",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Raw upload as received from the caller.
#[derive(Debug, Clone)]
pub struct InboundDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl InboundDocument {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a local file, keeping only its base name.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }
}

/// Hand-off after upload and extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    /// Working file name relative to the workspace
    pub working_file: String,
    pub kind: DocumentKind,
    pub strings: StringSet,
    pub original_name: String,
}

/// Hand-off after translation and rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedDocument {
    /// Rewritten artifact, relative to the workspace
    pub working_file: String,
    pub kind: DocumentKind,
    pub table: StringTable,
    pub download_name: String,
    pub nodes_updated: usize,
}

/// Artifact ready to be sent to the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredDocument {
    pub file_name: String,
    pub content_type: String,
    pub content_disposition: String,
    pub bytes: Vec<u8>,
}

// RFC 5987 attr-char
const FILENAME_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `report.xlsx` -> `report_translated.xlsx`.
pub fn download_name(original_name: &str, kind: DocumentKind) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{}_translated.{}", stem, kind.extension())
}

/// `Content-Disposition` value forcing a download of `file_name`.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if ascii == file_name {
        format!("attachment; filename=\"{}\"", ascii)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            utf8_percent_encode(file_name, FILENAME_ENCODE)
        )
    }
}

/// Tag an error with the phase it aborted, logging the transition.
fn aborted(phase: PipelineState) -> impl FnOnce(DoctransError) -> DoctransError {
    move |err| {
        error!("{} -> {}: {}", phase, PipelineState::Aborted, err);
        err.in_phase(phase)
    }
}

/// Run blocking document work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DoctransError::Task(e.to_string()))?
}

/// Remove the upload, then keep the rewritten artifact. The artifact guard
/// stays armed until the upload is gone, so a failed removal leaves no output
/// the caller cannot name.
fn replace_upload(workspace: &Workspace, upload: &str, artifact: ScopedFile) -> Result<()> {
    workspace.remove(upload)?;
    artifact.keep();
    Ok(())
}

/// Distinct translatable strings of a local document.
pub async fn extract_strings(path: &Path) -> Result<(DocumentKind, StringSet)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = DocumentKind::from_file_name(&name)?;
    let path = path.to_path_buf();
    let strings = blocking(move || AdapterFactory::create(kind).extract(&path)).await?;
    Ok((kind, strings))
}

/// Upload, translation, rewrite and delivery of office documents.
pub struct Workflow<B> {
    workspace: Workspace,
    translator: Option<BatchTranslator<B>>,
}

impl Workflow<GeminiBackend> {
    /// Workflow talking to Gemini. Without an API key the workflow can still
    /// upload and extract; translating then fails with a configuration error.
    pub fn from_config(config: &Config) -> Result<Self> {
        let translator = match config.translate.resolve_api_key() {
            Ok(key) => Some(BatchTranslator::new(GeminiBackend::new(&config.translate, key)?)),
            Err(DoctransError::MissingApiKey) => {
                warn!("No translation API key configured");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self::new(Workspace::from_config(&config.workspace), translator))
    }
}

impl<B: TranslationBackend> Workflow<B> {
    pub fn new(workspace: Workspace, translator: Option<BatchTranslator<B>>) -> Self {
        Self {
            workspace,
            translator,
        }
    }

    pub fn with_backend(workspace: Workspace, backend: B) -> Self {
        Self::new(workspace, Some(BatchTranslator::new(backend)))
    }

    /// Report batch progress on `bar`.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.translator = self.translator.map(|t| t.with_progress(bar));
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Validate and store an upload, then extract its strings.
    pub async fn upload(&self, inbound: InboundDocument) -> Result<UploadedDocument> {
        let InboundDocument { file_name, bytes } = inbound;

        let kind =
            DocumentKind::from_file_name(&file_name).map_err(aborted(PipelineState::Uploaded))?;
        if bytes.is_empty() {
            return Err(aborted(PipelineState::Uploaded)(DoctransError::EmptyUpload));
        }

        let working_file = self
            .workspace
            .store(UPLOAD_PREFIX, kind, &bytes)
            .map_err(aborted(PipelineState::Uploaded))?;
        info!("{}: {} stored as {}", PipelineState::Uploaded, file_name, working_file);

        let guard = self
            .workspace
            .scoped(&working_file)
            .map_err(aborted(PipelineState::Uploaded))?;
        let path = guard.path().to_path_buf();

        let strings = blocking(move || AdapterFactory::create(kind).extract(&path))
            .await
            .map_err(aborted(PipelineState::Extracted))?;

        if strings.is_empty() {
            return Err(aborted(PipelineState::Extracted)(DoctransError::NoTranslatableText));
        }

        guard.keep();
        info!(
            "{}: {} unique strings in {}",
            PipelineState::Extracted,
            strings.len(),
            file_name
        );

        Ok(UploadedDocument {
            working_file,
            kind,
            strings,
            original_name: file_name,
        })
    }

    /// Translate the extracted strings and rewrite a fresh copy of the upload.
    ///
    /// The upload is kept when translation fails, so the same hand-off can be
    /// retried. It is removed once the rewritten artifact exists.
    pub async fn translate(
        &self,
        uploaded: UploadedDocument,
        options: &TranslationOptions,
    ) -> Result<TranslatedDocument> {
        let source = self
            .workspace
            .existing(&uploaded.working_file)
            .map_err(aborted(PipelineState::Translated))?;

        let translator = self
            .translator
            .as_ref()
            .ok_or(DoctransError::MissingApiKey)
            .map_err(aborted(PipelineState::Translated))?;

        let table = translator
            .translate(&uploaded.strings, options)
            .await
            .map_err(aborted(PipelineState::Translated))?;
        info!(
            "{}: {} of {} strings translated",
            PipelineState::Translated,
            table.changed_count(),
            table.len()
        );

        let output = Workspace::unique_name(OUTPUT_PREFIX, uploaded.kind);
        let guard = self
            .workspace
            .scoped(&output)
            .map_err(aborted(PipelineState::Rewritten))?;
        let dest = guard.path().to_path_buf();
        debug!("Rewriting {} into {}", source.display(), dest.display());
        let kind = uploaded.kind;
        let apply_table = table.clone();
        let report: ApplyReport = blocking(move || {
            AdapterFactory::create(kind).apply(&source, &dest, &apply_table)
        })
        .await
        .map_err(aborted(PipelineState::Rewritten))?;

        replace_upload(&self.workspace, &uploaded.working_file, guard)
            .map_err(aborted(PipelineState::Rewritten))?;
        info!(
            "{}: {} nodes updated in {} parts",
            PipelineState::Rewritten,
            report.nodes_updated,
            report.parts_rewritten
        );

        Ok(TranslatedDocument {
            working_file: output,
            kind,
            table,
            download_name: download_name(&uploaded.original_name, kind),
            nodes_updated: report.nodes_updated,
        })
    }

    /// Hand the artifact over and remove it from the workspace.
    pub async fn deliver(&self, translated: &TranslatedDocument) -> Result<DeliveredDocument> {
        let bytes = self
            .workspace
            .read(&translated.working_file)
            .map_err(aborted(PipelineState::Delivered))?;
        self.workspace
            .remove(&translated.working_file)
            .map_err(aborted(PipelineState::Delivered))?;

        let file_name = Path::new(&translated.download_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| download_name("", translated.kind));

        info!("{}: {} ({} bytes)", PipelineState::Delivered, file_name, bytes.len());

        Ok(DeliveredDocument {
            content_type: translated.kind.mime_type().to_string(),
            content_disposition: content_disposition(&file_name),
            file_name,
            bytes,
        })
    }

    /// All phases in sequence.
    pub async fn run(
        &self,
        inbound: InboundDocument,
        options: &TranslationOptions,
    ) -> Result<DeliveredDocument> {
        let uploaded = self.upload(inbound).await?;
        let translated = self.translate(uploaded, options).await?;
        self.deliver(&translated).await
    }
}
