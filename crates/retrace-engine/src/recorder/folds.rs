//! Fold detection from viewport notifications.
//!
//! Hosts report folding only indirectly: a folded region splits the visible
//! ranges, and the last line of each split is the fold header. A header
//! whose next line becomes visible again has been unfolded.
//!
//! At most one transition kind is reported per notification and unfolds win.
//! If a single notification both folds and unfolds, the fold is not seen.

use std::collections::{BTreeSet, HashMap};

use retrace_core::{DocPath, Range, ViewColumn};

type FoldKey = (DocPath, Option<ViewColumn>);

/// Outcome of one viewport notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewportChange {
    /// These previously folded header lines were unfolded.
    Unfolded(Vec<u32>),
    /// These lines became new fold headers.
    Folded(Vec<u32>),
    /// Plain scroll.
    Scrolled,
}

#[derive(Debug, Default)]
pub struct FoldTracker {
    folded_up: HashMap<FoldKey, BTreeSet<u32>>,
    folded_down: HashMap<FoldKey, BTreeSet<u32>>,
}

impl FoldTracker {
    pub fn observe(
        &mut self,
        path: &DocPath,
        view_column: Option<ViewColumn>,
        ranges: &[Range],
        line_count: u32,
    ) -> ViewportChange {
        let key = (path.clone(), view_column);
        let mut ranges: Vec<Range> = ranges.iter().map(|r| r.normalized()).collect();
        ranges.sort_by_key(|r| r.start);

        let unfolded: Vec<u32> = self
            .folded_up
            .get(&key)
            .map(|lines| {
                lines
                    .iter()
                    .copied()
                    .filter(|line| ranges.iter().any(|r| r.contains_line(line + 1)))
                    .collect()
            })
            .unwrap_or_default();

        if !unfolded.is_empty() {
            let up = self.folded_up.entry(key.clone()).or_default();
            let down = self.folded_down.entry(key).or_default();
            for line in &unfolded {
                up.remove(line);
                down.insert(*line);
            }
            return ViewportChange::Unfolded(unfolded);
        }

        let last_line = line_count.saturating_sub(1);
        let up = self.folded_up.entry(key.clone()).or_default();
        let folded: Vec<u32> = ranges
            .windows(2)
            .map(|w| w[0].end.line)
            .filter(|line| *line < last_line && !up.contains(line))
            .collect();

        if folded.is_empty() {
            return ViewportChange::Scrolled;
        }

        let down = self.folded_down.entry(key).or_default();
        for line in &folded {
            up.insert(*line);
            down.remove(line);
        }
        ViewportChange::Folded(folded)
    }

    /// Drop all fold state for a document, in every column.
    pub fn forget(&mut self, path: &DocPath) {
        self.folded_up.retain(|(p, _), _| p != path);
        self.folded_down.retain(|(p, _), _| p != path);
    }

    pub fn folded_up_lines(&self, path: &DocPath, view_column: Option<ViewColumn>) -> Vec<u32> {
        Self::lines(&self.folded_up, path, view_column)
    }

    pub fn folded_down_lines(&self, path: &DocPath, view_column: Option<ViewColumn>) -> Vec<u32> {
        Self::lines(&self.folded_down, path, view_column)
    }

    fn lines(
        map: &HashMap<FoldKey, BTreeSet<u32>>,
        path: &DocPath,
        view_column: Option<ViewColumn>,
    ) -> Vec<u32> {
        map.get(&(path.clone(), view_column))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}
