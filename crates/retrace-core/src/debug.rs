use serde::{Deserialize, Serialize};

use crate::track::Timed;

/// Event on the debug-session track. Start/stop only; these carry no state
/// that could be collapsed, so seeking just filters and shifts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DebugEvent {
    DebugStart { time: u64, name: String },
    DebugStop { time: u64 },
}

impl DebugEvent {
    pub fn at(&self, time: u64) -> Self {
        match self {
            Self::DebugStart { name, .. } => Self::DebugStart {
                time,
                name: name.clone(),
            },
            Self::DebugStop { .. } => Self::DebugStop { time },
        }
    }
}

impl Timed for DebugEvent {
    fn time(&self) -> u64 {
        match self {
            Self::DebugStart { time, .. } | Self::DebugStop { time } => *time,
        }
    }
}
