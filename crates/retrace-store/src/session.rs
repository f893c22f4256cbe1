use std::path::Path;

use tracing::{info, instrument};

use crate::codec::PathCodec;
use crate::document::{SessionDocument, SessionLog};
use crate::error::StoreError;

/// Read and decode a session document. Any decode failure rejects the
/// whole file.
#[instrument(skip(codec), fields(path = %path.display()))]
pub fn load_session(path: &Path, codec: &PathCodec) -> Result<SessionLog, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let doc: SessionDocument = serde_json::from_str(&text)?;
    let log = doc.decode(codec)?;
    info!(
        events = log.events.len(),
        debug_events = log.debug_events.len(),
        "session loaded"
    );
    Ok(log)
}

/// Encode and write a session document. The file is written beside the
/// target and renamed into place.
#[instrument(skip(log, codec), fields(path = %path.display(), events = log.events.len()))]
pub fn save_session(path: &Path, log: &SessionLog, codec: &PathCodec) -> Result<(), StoreError> {
    write_document(path, &SessionDocument::encode(log, codec))
}

pub fn write_document(path: &Path, doc: &SessionDocument) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
