//! Recording, seek reconciliation and timed playback.

pub mod error;
pub mod player;
pub mod reconcile;
pub mod recorder;
pub mod scheduler;
pub mod timeline;

pub use error::EngineError;
pub use player::{SessionPlayer, SessionReport};
pub use reconcile::reconcile;
pub use recorder::{Activity, OpenDocument, Recorder, RecorderState, VisibleEditor};
pub use scheduler::{PlaybackHandle, PlaybackReport, PlaybackState, Scheduler};
pub use timeline::{DebugTrack, Seekable, Timeline, Track};
