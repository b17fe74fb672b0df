use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use super::policy::{ErrorKind, BATCH_DELAY, BATCH_SIZE};
use super::prompt::build_prompt;
use super::reply::{parse_reply, BatchReply};
use super::{TranslationBackend, TranslationOptions};
use crate::document::{StringSet, StringTable};
use crate::error::{DoctransError, Result};

/// Split strings into consecutive batches of at most [`BATCH_SIZE`].
pub fn partition(strings: &[String]) -> Vec<&[String]> {
    strings.chunks(BATCH_SIZE).collect()
}

/// Sequential batch translation with per-batch identity fallback.
pub struct BatchTranslator<B> {
    backend: B,
    progress: Option<ProgressBar>,
}

impl<B: TranslationBackend> BatchTranslator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            progress: None,
        }
    }

    /// Advance `bar` once per finished batch.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Translate every string of `strings` into a table with one entry per
    /// string, in the same order.
    ///
    /// A batch that fails for any reason other than a rate limit maps to
    /// itself. A rate limit stops the run before the next batch is sent.
    pub async fn translate(
        &self,
        strings: &StringSet,
        options: &TranslationOptions,
    ) -> Result<StringTable> {
        let batches = partition(strings.as_slice());
        let total = batches.len();
        let mut table = StringTable::new();

        if let Some(bar) = &self.progress {
            bar.set_length(total as u64);
        }

        info!(
            "Translating {} strings into {} ({} batches)",
            strings.len(),
            options.target_language,
            total
        );

        for (idx, batch) in batches.into_iter().enumerate() {
            if idx > 0 {
                debug!("Waiting {:?} before next batch", BATCH_DELAY);
                tokio::time::sleep(BATCH_DELAY).await;
            }

            info!("Batch {}/{} ({} strings)", idx + 1, total, batch.len());

            match self.translate_batch(batch, options).await? {
                BatchReply::Translated(translations) => {
                    for (source, translated) in batch.iter().zip(translations) {
                        table.insert(source.as_str(), translated);
                    }
                }
                BatchReply::Malformed(reason) => {
                    warn!(
                        "Batch {}/{} left untranslated: {}",
                        idx + 1,
                        total,
                        reason
                    );
                    table.insert_identity(batch.iter().map(String::as_str));
                }
            }

            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        info!(
            "Translation finished: {} of {} strings changed",
            table.changed_count(),
            table.len()
        );
        Ok(table)
    }

    async fn translate_batch(
        &self,
        batch: &[String],
        options: &TranslationOptions,
    ) -> Result<BatchReply> {
        let prompt = build_prompt(batch, options)?;

        match self.backend.generate(&prompt).await {
            Ok(text) => Ok(parse_reply(&text, batch.len())),
            Err(err) => match err.kind() {
                ErrorKind::RateLimited => {
                    warn!("Rate limit reached, aborting translation: {}", err);
                    Err(DoctransError::RateLimited(err.to_string()))
                }
                ErrorKind::Fatal => Err(DoctransError::Config(format!(
                    "translation request cannot be sent: {}",
                    err
                ))),
                ErrorKind::Transient => Ok(BatchReply::Malformed(format!("request failed: {}", err))),
            },
        }
    }
}
