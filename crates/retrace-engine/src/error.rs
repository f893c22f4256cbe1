use retrace_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("recorder is {actual}, expected {expected}")]
    RecorderState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("playback task failed: {0}")]
    Playback(String),
}
