use retrace_core::EventKind;

/// A session document that cannot be turned back into events.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported session version {0}")]
    UnsupportedVersion(u32),

    #[error("event {index}: unknown event type {tag}")]
    UnknownKind { index: usize, tag: u8 },

    #[error("event {index}: {kind} is missing field `{field}`")]
    MissingField {
        index: usize,
        kind: EventKind,
        field: &'static str,
    },

    #[error("event {index}: time {time} is earlier than the previous event")]
    OutOfOrder { index: usize, time: u64 },

    #[error("debug event {index}: unknown debug event type {tag}")]
    UnknownDebugKind { index: usize, tag: u8 },

    #[error("debug event {index}: debug start is missing field `name`")]
    MissingDebugName { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed session: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
