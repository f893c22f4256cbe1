use serde::{Deserialize, Serialize};

/// A timed caption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub start: u64,
    pub end: u64,
    pub text: String,
}

/// Cues sorted by start time, indexed by playback position.
#[derive(Clone, Debug, Default)]
pub struct CueList {
    cues: Vec<Cue>,
}

impl CueList {
    pub fn new(mut cues: Vec<Cue>) -> Self {
        cues.sort_by_key(|c| c.start);
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    /// Index of the last cue starting at or before `at_ms`.
    pub fn goto(&self, at_ms: u64) -> Option<usize> {
        self.cues.partition_point(|c| c.start <= at_ms).checked_sub(1)
    }

    /// Same as [`CueList::goto`]; named for the transport call made when a
    /// track begins playing.
    pub fn start(&self, at_ms: u64) -> Option<usize> {
        self.goto(at_ms)
    }
}
