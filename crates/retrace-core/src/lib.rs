//! Event model shared by the recorder, the store and the player.

pub mod buffer;
pub mod debug;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod path;
pub mod subtitles;
pub mod track;

pub use buffer::TextBuffer;
pub use events::{ContentEdit, Event, EventKind, EventPayload};
pub use geometry::{Position, Range, Selection};
pub use ids::SessionId;
pub use path::{DocPath, ViewColumn};
pub use track::{Applier, ApplyError, AudioTransport, Timed};
