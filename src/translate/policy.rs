use std::time::Duration;

/// Maximum number of strings sent in one request.
pub const BATCH_SIZE: usize = 10;

/// Pause before every batch except the first.
pub const BATCH_DELAY: Duration = Duration::from_secs(2);

/// How the batch loop reacts to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Quota or rate limit hit: stop the whole run.
    RateLimited,
    /// The request cannot be sent at all: stop the whole run.
    Fatal,
    /// Anything else: keep the batch untranslated and move on.
    Transient,
}

const QUOTA_MARKERS: &[&str] = &["429", "quota", "resource_exhausted"];

/// Classify a call that reached the service from its HTTP status and error
/// text. Only quota exhaustion stops the run; a refused key, a bad request or
/// an outage leaves that batch untranslated.
pub fn classify(status: Option<u16>, text: &str) -> ErrorKind {
    if status == Some(429) {
        return ErrorKind::RateLimited;
    }

    let lowered = text.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return ErrorKind::RateLimited;
    }

    ErrorKind::Transient
}
