use thiserror::Error;

use crate::workflow::PipelineState;

#[derive(Error, Debug)]
pub enum DoctransError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("No translatable text found in the document")]
    NoTranslatableText,

    /// Holds the working file name only, never its absolute location.
    #[error("Working file not found: {0}")]
    WorkingFileMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Translation API key is not configured")]
    MissingApiKey,

    #[error("Translation service rate limit reached: {0}")]
    RateLimited(String),

    #[error("Missing required part: {0}")]
    MissingPart(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("{phase} phase failed: {source}")]
    Aborted {
        phase: PipelineState,
        #[source]
        source: Box<DoctransError>,
    },
}

pub type Result<T> = std::result::Result<T, DoctransError>;

/// Coarse error classes the calling layer renders differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputValidation,
    Configuration,
    RateLimited,
    Structure,
    Io,
    Internal,
}

impl ErrorCategory {
    /// HTTP status an outer web layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputValidation | Self::Configuration => 400,
            Self::RateLimited => 429,
            Self::Structure | Self::Io | Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::Configuration => "configuration",
            Self::RateLimited => "rate_limit",
            Self::Structure => "structure",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

const RATE_LIMIT_GUIDANCE: &str = "The translation service rate limit was reached. \
     Wait a few minutes and try again, use a different API key, \
     or check the billing plan of the API account.";

impl DoctransError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedFormat(_)
            | Self::EmptyUpload
            | Self::NoTranslatableText
            | Self::WorkingFileMissing(_) => ErrorCategory::InputValidation,
            Self::Config(_) | Self::Toml(_) | Self::MissingApiKey => ErrorCategory::Configuration,
            Self::RateLimited(_) => ErrorCategory::RateLimited,
            Self::Zip(_) | Self::Xml(_) | Self::MissingPart(_) | Self::InvalidDocument(_) => {
                ErrorCategory::Structure
            }
            Self::Io(_) => ErrorCategory::Io,
            Self::Json(_) | Self::Http(_) | Self::Task(_) => ErrorCategory::Internal,
            Self::Aborted { source, .. } => source.category(),
        }
    }

    /// Phase the pipeline was in when this error aborted it.
    pub fn phase(&self) -> Option<PipelineState> {
        match self {
            Self::Aborted { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.category() == ErrorCategory::RateLimited
    }

    /// Tag the error with the phase it aborted. The innermost phase wins.
    pub fn in_phase(self, phase: PipelineState) -> Self {
        match self {
            Self::Aborted { .. } => self,
            other => Self::Aborted {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Message suitable for the end consumer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Aborted { source, .. } => source.user_message(),
            Self::RateLimited(_) => RATE_LIMIT_GUIDANCE.to_string(),
            Self::MissingApiKey => {
                "The translation API key is not configured. Set it in the configuration first."
                    .to_string()
            }
            Self::WorkingFileMissing(_) => {
                "The uploaded file is no longer available. Please upload it again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
