use std::collections::HashMap;

use retrace_core::DocPath;

/// Paths with playback-driven mutations still in flight. Activity on these
/// paths is feedback from the player, not the user.
///
/// Entries are counted: one mutation can trigger several host callbacks, and
/// each completion releases exactly one entry.
#[derive(Debug, Default)]
pub struct PendingPaths {
    counts: HashMap<DocPath, usize>,
}

impl PendingPaths {
    pub fn push(&mut self, path: DocPath) {
        *self.counts.entry(path).or_insert(0) += 1;
    }

    pub fn contains(&self, path: &DocPath) -> bool {
        self.counts.contains_key(path)
    }

    /// Remove one entry for `path`. Returns false if none was queued.
    pub fn release(&mut self, path: &DocPath) -> bool {
        match self.counts.get_mut(path) {
            Some(n) if *n > 1 => {
                *n -= 1;
                true
            }
            Some(_) => {
                self.counts.remove(path);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, path: &DocPath) -> usize {
        self.counts.get(path).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
