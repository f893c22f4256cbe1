use async_trait::async_trait;

use crate::events::Event;

/// Anything that can sit on a playback timeline.
pub trait Timed {
    /// Milliseconds relative to the start of the track.
    fn time(&self) -> u64;
}

impl Timed for Event {
    fn time(&self) -> u64 {
        Event::time(self)
    }
}

/// Failure reported by an applier for a single event.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("{0}")]
    Rejected(String),
}

impl ApplyError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::DocumentNotFound(_) => "document_not_found",
            Self::Io(_) => "io",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Performs the side effects of one event (write a file, move a cursor…).
/// Implemented by the host integration.
#[async_trait]
pub trait Applier<E>: Send + Sync {
    async fn apply(&self, event: &E) -> Result<(), ApplyError>;
}

/// Coarse transport control for an external audio track.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    async fn start(&self, at_ms: u64) -> Result<(), ApplyError>;
    async fn stop(&self);
    async fn pause(&self);
    async fn resume(&self);
}
