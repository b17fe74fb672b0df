// Batched translation architecture
//
// The translation layer is split into small, separately testable pieces:
// - Backend: one remote text-generation call (Gemini in production)
// - Prompt: instruction payload for one batch
// - Reply: decoding of the service answer into a batch result
// - Policy: batching constants and error classification
// - Batch: the sequential batch loop with identity fallback

pub mod batch;
pub mod gemini;
pub mod policy;
pub mod prompt;
pub mod reply;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use batch::BatchTranslator;
pub use gemini::GeminiBackend;
pub use policy::{classify, ErrorKind, BATCH_DELAY, BATCH_SIZE};
pub use reply::{parse_reply, BatchReply};

/// Failure of a single backend call, as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// HTTP status, when the service answered at all
    pub status: Option<u16>,
    pub message: String,
    /// False when the request could not even be built
    pub sent: bool,
}

impl BackendError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            sent: true,
        }
    }

    /// A request that never left the client, e.g. an endpoint URL or API key
    /// that cannot be put on the wire. Every later batch would fail the same way.
    pub fn unsent(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            sent: false,
        }
    }

    /// Classification of this failure for the batch loop.
    pub fn kind(&self) -> ErrorKind {
        if !self.sent {
            return ErrorKind::Fatal;
        }
        classify(self.status, &self.message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for BackendError {}

/// Remote text generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Send one prompt and return the text payload of the answer
    async fn generate(&self, prompt: &str) -> std::result::Result<String, BackendError>;
}

/// What to translate into, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationOptions {
    /// Free-text language label, e.g. "Japanese"
    pub target_language: String,
    /// Extra instruction appended to the prompt rules
    pub custom_instruction: Option<String>,
}

impl TranslationOptions {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            custom_instruction: None,
        }
    }

    /// Blank instructions are treated as absent.
    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.custom_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }
}
