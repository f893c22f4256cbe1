//! Collapse a log's past into the minimal prefix that reproduces the state
//! at a seek point.
//!
//! Events at or before the seek time are grouped per document and reduced to
//! their net effect; the prefix is renumbered `0, 1, 2…` so it replays
//! back-to-back. Events after the seek time follow, shifted so the seek point
//! becomes time zero.

use std::collections::{BTreeMap, HashMap, HashSet};

use retrace_core::{DocPath, Event, EventKind, EventPayload, TextBuffer, ViewColumn};
use tracing::debug;

/// Indexed so ties on time keep log order through the merge.
type Indexed = (usize, Event);

/// Right-anchor cuts, applied in this order.
const ANCHORS: [EventKind; 5] = [
    EventKind::Delete,
    EventKind::Rename,
    EventKind::Close,
    EventKind::Save,
    EventKind::Open,
];

pub fn reconcile(log: &[Event], at: u64) -> Vec<Event> {
    if at == 0 {
        return log.iter().filter(|e| e.time() > 0).cloned().collect();
    }

    let mut by_path: BTreeMap<DocPath, Vec<Indexed>> = BTreeMap::new();
    let mut future = Vec::new();
    for (index, event) in log.iter().enumerate() {
        if event.time() <= at {
            by_path
                .entry(event.path().clone())
                .or_default()
                .push((index, event.clone()));
        } else {
            future.push(event.shifted_back(at));
        }
    }

    let past_len: usize = by_path.values().map(Vec::len).sum();
    let mut past: Vec<Indexed> = by_path.into_values().flat_map(collapse_path).collect();
    past.sort_by_key(|(index, event)| (event.time(), *index));

    debug!(
        seek = at,
        past = past_len,
        collapsed = past.len(),
        future = future.len(),
        "log reconciled"
    );

    past.into_iter()
        .enumerate()
        .map(|(ordinal, (_, event))| event.at(ordinal as u64))
        .chain(future)
        .collect()
}

/// Net effect of one document's past events.
fn collapse_path(mut seq: Vec<Indexed>) -> Vec<Indexed> {
    for kind in ANCHORS {
        if let Some(pos) = seq.iter().rposition(|(_, e)| e.kind() == kind) {
            seq.drain(..pos);
        }
    }

    keep_last(&mut seq, EventKind::VisibleRange);
    keep_last(&mut seq, EventKind::Selection);
    cancel_folds(&mut seq);
    balance_groups(&mut seq);
    synthesize_visible(&mut seq);

    if seq.len() <= 2 {
        return seq;
    }
    consolidate_content(seq)
}

fn keep_last(seq: &mut Vec<Indexed>, kind: EventKind) {
    if let Some(last) = seq.iter().rev().find(|(_, e)| e.kind() == kind).map(|(i, _)| *i) {
        seq.retain(|(i, e)| e.kind() != kind || *i == last);
    }
}

/// Up/down toggles per `(column, line)`: the line ends folded only when its
/// last toggle is a `FoldUp`, which is then the one kept. An anchor cut can
/// leave a run that opens with `FoldDown`, so parity alone is not enough.
fn cancel_folds(seq: &mut Vec<Indexed>) {
    let mut last: HashMap<(Option<ViewColumn>, u32), (usize, bool)> = HashMap::new();
    for (index, event) in seq.iter() {
        match event.payload() {
            EventPayload::FoldUp {
                view_column, line, ..
            } => last.insert((*view_column, *line), (*index, true)),
            EventPayload::FoldDown {
                view_column, line, ..
            } => last.insert((*view_column, *line), (*index, false)),
            _ => continue,
        };
    }

    let keep: HashSet<usize> = last
        .into_values()
        .filter_map(|(index, up)| up.then_some(index))
        .collect();
    seq.retain(|(i, e)| !is_fold(e.kind()) || keep.contains(i));
}

fn is_fold(kind: EventKind) -> bool {
    matches!(kind, EventKind::FoldUp | EventKind::FoldDown)
}

/// Group/Ungroup per column: the most recent event of the majority kind
/// survives and a tie cancels, except that a trailing `Group` always wins.
/// After an anchor cut, a column can end grouped with counts still level.
fn balance_groups(seq: &mut Vec<Indexed>) {
    #[derive(Default)]
    struct Tally {
        groups: usize,
        ungroups: usize,
        last: Option<(usize, EventKind)>,
    }

    let mut tallies: HashMap<Option<ViewColumn>, Tally> = HashMap::new();
    for (index, event) in seq.iter() {
        let kind = event.kind();
        if !matches!(kind, EventKind::Group | EventKind::Ungroup) {
            continue;
        }
        let tally = tallies.entry(event.view_column()).or_default();
        if kind == EventKind::Group {
            tally.groups += 1;
        } else {
            tally.ungroups += 1;
        }
        tally.last = Some((*index, kind));
    }

    let keep: HashSet<usize> = tallies
        .into_values()
        .filter_map(|t| match t.last? {
            (index, EventKind::Group) => Some(index),
            (index, _) if t.ungroups > t.groups => Some(index),
            _ => None,
        })
        .collect();
    seq.retain(|(i, e)| !matches!(e.kind(), EventKind::Group | EventKind::Ungroup) || keep.contains(i));
}

/// One `Visible` per column the document was seen in, all carrying the most
/// recent visible state. Without any `Visible`, the last `ViewColumn` per
/// column stands in.
fn synthesize_visible(seq: &mut Vec<Indexed>) {
    let is_placement = |kind: EventKind| matches!(kind, EventKind::ViewColumn | EventKind::Visible);

    let mut last_seen: BTreeMap<Option<ViewColumn>, (usize, u64)> = BTreeMap::new();
    let mut last_visible: Option<&EventPayload> = None;
    for (index, event) in seq.iter() {
        if !is_placement(event.kind()) {
            continue;
        }
        last_seen.insert(event.view_column(), (*index, event.time()));
        if event.kind() == EventKind::Visible {
            last_visible = Some(event.payload());
        }
    }
    if last_seen.is_empty() {
        return;
    }

    let Some(template) = last_visible.cloned() else {
        let keep: HashSet<usize> = last_seen.values().map(|(i, _)| *i).collect();
        seq.retain(|(i, e)| e.kind() != EventKind::ViewColumn || keep.contains(i));
        return;
    };

    seq.retain(|(_, e)| !is_placement(e.kind()));
    for (column, (index, time)) in last_seen {
        seq.push((index, Event::new(time, template.with_view_column(column))));
    }
    seq.sort_by_key(|(i, _)| *i);
}

/// Fold every `Change` into the last `Open`/`Create` snapshot.
fn consolidate_content(mut seq: Vec<Indexed>) -> Vec<Indexed> {
    let is_base = |kind: EventKind| matches!(kind, EventKind::Open | EventKind::Create);
    let Some(base) = seq.iter().rposition(|(_, e)| is_base(e.kind())) else {
        return seq;
    };

    let Some(content) = seq[base].1.payload().content() else {
        return seq;
    };
    let mut buffer = TextBuffer::new(content);
    for (_, event) in &seq[base + 1..] {
        if let EventPayload::Change { edits, .. } = event.payload() {
            buffer.apply_all(edits);
        }
    }

    let event = &seq[base].1;
    let snapshot = Event::new(event.time(), event.payload().with_content(buffer.into_string()));
    seq[base].1 = snapshot;
    seq.retain(|(_, e)| e.kind() != EventKind::Change);
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use retrace_core::{ContentEdit, Position, Range, Selection};

    const COL: Option<ViewColumn> = Some(ViewColumn(1));

    fn a() -> DocPath {
        DocPath::from("/w/a.rs")
    }

    fn b() -> DocPath {
        DocPath::from("/w/b.rs")
    }

    fn open(time: u64, path: DocPath, content: &str) -> Event {
        Event::new(
            time,
            EventPayload::Open {
                path,
                content: content.into(),
                view_column: COL,
            },
        )
    }

    fn change(time: u64, path: DocPath, edit: ContentEdit) -> Event {
        Event::new(
            time,
            EventPayload::Change {
                path,
                view_column: COL,
                edits: vec![edit],
            },
        )
    }

    fn fold(time: u64, up: bool, line: u32) -> Event {
        let payload = if up {
            EventPayload::FoldUp { path: a(), view_column: COL, line }
        } else {
            EventPayload::FoldDown { path: a(), view_column: COL, line }
        };
        Event::new(time, payload)
    }

    fn group(time: u64, grouped: bool, column: u32) -> Event {
        let view_column = Some(ViewColumn(column));
        let payload = if grouped {
            EventPayload::Group { path: a(), view_column }
        } else {
            EventPayload::Ungroup { path: a(), view_column }
        };
        Event::new(time, payload)
    }

    fn selection(time: u64, path: DocPath, line: u32) -> Event {
        Event::new(
            time,
            EventPayload::Selection {
                path,
                view_column: COL,
                selections: vec![Selection::caret(Position::new(line, 0))],
            },
        )
    }

    fn save(time: u64, content: &str) -> Event {
        Event::new(
            time,
            EventPayload::Save {
                path: a(),
                content: content.into(),
                view_column: COL,
            },
        )
    }

    fn insert(line: u32, character: u32, text: &str) -> ContentEdit {
        ContentEdit::Insert {
            position: Position::new(line, character),
            text: text.into(),
        }
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(Event::kind).collect()
    }

    fn times(events: &[Event]) -> Vec<u64> {
        events.iter().map(Event::time).collect()
    }

    #[test]
    fn fold_toggles_cancel_pairwise() {
        let log = vec![fold(1, true, 4), fold(2, false, 4), fold(3, true, 4)];
        let out = reconcile(&log, 3);
        assert_eq!(out, vec![fold(0, true, 4)]);

        let even = vec![fold(1, true, 4), fold(2, false, 4)];
        assert!(reconcile(&even, 3).is_empty());
    }

    #[test]
    fn fold_after_anchor_follows_last_toggle() {
        let log = vec![
            fold(1, true, 5),
            save(2, "s"),
            fold(3, false, 5),
            fold(4, true, 5),
            fold(5, false, 5),
        ];
        assert_eq!(kinds(&reconcile(&log, 5)), vec![EventKind::Save]);
        // Down then Up after the cut: the line is folded at 4.
        assert_eq!(
            kinds(&reconcile(&log[..4], 4)),
            vec![EventKind::Save, EventKind::FoldUp]
        );
    }

    #[test]
    fn folds_on_different_lines_are_independent() {
        let log = vec![fold(1, true, 4), fold(2, true, 9), fold(3, false, 4)];
        let out = reconcile(&log, 3);
        assert_eq!(out, vec![fold(0, true, 9)]);
    }

    #[test]
    fn groups_balance_per_column() {
        let log = vec![group(1, true, 1), group(2, false, 1), group(3, true, 1)];
        assert_eq!(reconcile(&log, 3), vec![group(0, true, 1)]);

        let balanced = vec![group(1, true, 1), group(2, false, 1)];
        assert!(reconcile(&balanced, 3).is_empty());

        let two_columns = vec![group(1, true, 1), group(2, true, 2), group(3, false, 1)];
        assert_eq!(reconcile(&two_columns, 3), vec![group(0, true, 2)]);
    }

    #[test]
    fn trailing_group_after_anchor_survives_a_tie() {
        let log = vec![
            group(1, true, 1),
            save(2, "s"),
            group(3, false, 1),
            group(4, true, 1),
        ];
        assert_eq!(
            kinds(&reconcile(&log, 4)),
            vec![EventKind::Save, EventKind::Group]
        );

        let ungrouped = vec![group(1, true, 1), save(2, "s"), group(3, false, 1)];
        assert_eq!(
            kinds(&reconcile(&ungrouped, 3)),
            vec![EventKind::Save, EventKind::Ungroup]
        );
    }

    #[test]
    fn changes_consolidate_into_open() {
        let log = vec![
            open(1, a(), "ab"),
            change(2, a(), ContentEdit::Insert { position: Position::new(0, 2), text: "c".into() }),
            change(
                3,
                a(),
                ContentEdit::Replace { range: Range::from_coords(0, 0, 0, 1), text: "x".into() },
            ),
        ];
        let out = reconcile(&log, 3);
        assert_eq!(out, vec![open(0, a(), "xbc")]);
    }

    #[test]
    fn consolidation_keeps_other_state() {
        let log = vec![
            open(1, a(), "ab"),
            change(2, a(), ContentEdit::Insert { position: Position::new(0, 2), text: "c".into() }),
            selection(3, a(), 0),
            selection(4, a(), 1),
        ];
        let out = reconcile(&log, 10);
        assert_eq!(out, vec![open(0, a(), "abc"), selection(1, a(), 1)]);
    }

    #[test]
    fn short_sequences_are_kept_verbatim() {
        let edit = ContentEdit::Insert { position: Position::new(0, 2), text: "c".into() };
        let log = vec![open(1, a(), "ab"), change(2, a(), edit.clone())];
        let out = reconcile(&log, 2);
        assert_eq!(out, vec![open(0, a(), "ab"), change(1, a(), edit)]);
    }

    #[test]
    fn changes_without_snapshot_are_kept() {
        let edit = |t| ContentEdit::Insert { position: Position::new(0, 0), text: t };
        let log = vec![
            change(1, a(), edit("x".into())),
            change(2, a(), edit("y".into())),
            change(3, a(), edit("z".into())),
        ];
        let out = reconcile(&log, 3);
        assert_eq!(kinds(&out), vec![EventKind::Change; 3]);
        assert_eq!(times(&out), vec![0, 1, 2]);
    }

    #[test]
    fn anchors_cut_history() {
        let log = vec![
            open(1, a(), "old"),
            change(2, a(), ContentEdit::Insert { position: Position::new(0, 0), text: "z".into() }),
            Event::new(3, EventPayload::Delete { path: a() }),
            Event::new(4, EventPayload::Create { path: a(), content: "new".into() }),
        ];
        let out = reconcile(&log, 4);
        assert_eq!(kinds(&out), vec![EventKind::Delete, EventKind::Create]);
    }

    #[test]
    fn rename_survives_under_old_path() {
        let log = vec![
            open(1, a(), "ab"),
            Event::new(
                2,
                EventPayload::Rename { old_path: a(), new_path: b(), content: "ab".into() },
            ),
            open(3, b(), "ab"),
        ];
        let out = reconcile(&log, 3);
        assert_eq!(kinds(&out), vec![EventKind::Rename, EventKind::Open]);
        assert_eq!(out[0].payload().paths(), vec![&a(), &b()]);
        assert_eq!(times(&out), vec![0, 1]);
    }

    #[test]
    fn visible_is_synthesized_per_column() {
        let visible = |time, column: u32, line| {
            Event::new(
                time,
                EventPayload::Visible {
                    path: a(),
                    view_column: Some(ViewColumn(column)),
                    selections: vec![Selection::caret(Position::new(line, 0))],
                    ranges: vec![],
                },
            )
        };
        let log = vec![
            visible(1, 1, 10),
            Event::new(2, EventPayload::ViewColumn { path: a(), view_column: Some(ViewColumn(2)) }),
            visible(3, 1, 20),
        ];
        let out = reconcile(&log, 3);
        // Column 2 was last observed before column 1.
        assert_eq!(out, vec![visible(0, 2, 20), visible(1, 1, 20)]);
    }

    #[test]
    fn view_columns_without_visible_keep_last_per_column() {
        let placed = |time, column| {
            Event::new(time, EventPayload::ViewColumn { path: a(), view_column: Some(ViewColumn(column)) })
        };
        let log = vec![placed(1, 1), placed(2, 2), placed(3, 1)];
        assert_eq!(reconcile(&log, 3), vec![placed(0, 2), placed(1, 1)]);
    }

    #[test]
    fn future_is_shifted_by_seek_time() {
        let log = vec![
            open(1, a(), "ab"),
            selection(5, a(), 1),
            selection(10, a(), 2),
            selection(25, b(), 3),
        ];
        let out = reconcile(&log, 5);
        assert_eq!(times(&out), vec![0, 1, 5, 20]);
        assert_eq!(out[2], selection(5, a(), 2));
    }

    #[test]
    fn paths_merge_in_original_order() {
        let log = vec![
            selection(1, a(), 1),
            selection(2, b(), 1),
            selection(3, a(), 2),
        ];
        let out = reconcile(&log, 3);
        assert_eq!(out, vec![selection(0, b(), 1), selection(1, a(), 2)]);
    }

    #[test]
    fn zero_seek_returns_positive_suffix_unchanged() {
        let log = vec![open(0, a(), "ab"), selection(0, a(), 1), selection(7, a(), 2)];
        assert_eq!(reconcile(&log, 0), vec![selection(7, a(), 2)]);
    }

    #[test]
    fn collapse_is_idempotent() {
        let log = vec![
            open(1, a(), "ab"),
            change(2, a(), ContentEdit::Insert { position: Position::new(0, 2), text: "c".into() }),
            fold(3, true, 4),
            selection(4, a(), 3),
            group(5, true, 1),
            open(6, b(), "b"),
            selection(7, b(), 0),
            fold(8, true, 7),
            fold(9, false, 7),
        ];
        let once = reconcile(&log, 9);
        let last = once.last().map(Event::time).unwrap();
        assert_eq!(reconcile(&once, last), once);
    }

    /// Per-document state reached by applying events in order. Every anchor
    /// re-establishes the document from its own snapshot.
    #[derive(Debug, Default, PartialEq)]
    struct DocState {
        content: Option<String>,
        selections: Option<Vec<Selection>>,
        ranges: Option<Vec<Range>>,
        folded: BTreeSet<(Option<ViewColumn>, u32)>,
        grouped: BTreeSet<Option<ViewColumn>>,
    }

    fn replay(events: &[Event]) -> BTreeMap<DocPath, DocState> {
        let mut docs: BTreeMap<DocPath, DocState> = BTreeMap::new();
        for event in events {
            let doc = docs.entry(event.path().clone()).or_default();
            if ANCHORS.contains(&event.kind()) {
                *doc = DocState {
                    content: event.payload().content().map(str::to_string),
                    ..DocState::default()
                };
                continue;
            }
            match event.payload() {
                EventPayload::Create { content, .. } => doc.content = Some(content.clone()),
                EventPayload::Change { edits, .. } => {
                    let mut buffer = TextBuffer::new(doc.content.take().unwrap_or_default());
                    buffer.apply_all(edits);
                    doc.content = Some(buffer.into_string());
                }
                EventPayload::Selection { selections, .. } => doc.selections = Some(selections.clone()),
                EventPayload::VisibleRange { ranges, .. } => doc.ranges = Some(ranges.clone()),
                EventPayload::FoldUp { view_column, line, .. } => {
                    doc.folded.insert((*view_column, *line));
                }
                EventPayload::FoldDown { view_column, line, .. } => {
                    doc.folded.remove(&(*view_column, *line));
                }
                EventPayload::Group { view_column, .. } => {
                    doc.grouped.insert(*view_column);
                }
                EventPayload::Ungroup { view_column, .. } => {
                    doc.grouped.remove(view_column);
                }
                _ => {}
            }
        }
        docs.retain(|_, doc| *doc != DocState::default());
        docs
    }

    /// Playing the collapsed past must land every document in the state the
    /// full log reaches by `at`, for every seek point.
    fn assert_collapse_preserves_state(log: &[Event]) {
        let end = log.last().map(Event::time).unwrap_or(0);
        for at in 1..=end {
            let future = log.iter().filter(|e| e.time() > at).count();
            let out = reconcile(log, at);
            let past = &out[..out.len() - future];
            let played: Vec<Event> = log.iter().filter(|e| e.time() <= at).cloned().collect();
            assert_eq!(replay(past), replay(&played), "seek to {at}");
        }
    }

    #[test]
    fn collapse_preserves_content_and_view_state() {
        let log = vec![
            open(1, a(), "ab"),
            change(2, a(), insert(0, 2, "c")),
            selection(3, a(), 0),
            change(4, a(), ContentEdit::Replace { range: Range::from_coords(0, 0, 0, 1), text: "x".into() }),
            save(5, "xbc"),
            change(6, a(), insert(0, 3, "!")),
            selection(7, a(), 1),
            open(8, b(), "b"),
            Event::new(
                9,
                EventPayload::VisibleRange { path: a(), view_column: COL, ranges: vec![Range::from_coords(0, 0, 10, 0)] },
            ),
            Event::new(10, EventPayload::Close { path: a(), content: "xbc!".into(), view_column: COL }),
            change(11, b(), insert(0, 1, "2")),
        ];
        assert_collapse_preserves_state(&log);
    }

    #[test]
    fn collapse_preserves_fold_and_group_state_across_anchors() {
        let log = vec![
            fold(1, true, 5),
            save(2, "s"),
            fold(3, false, 5),
            fold(4, true, 5),
            fold(5, false, 5),
            group(6, true, 1),
            save(7, "s"),
            group(8, false, 1),
            group(9, true, 1),
            fold(10, true, 9),
            fold(11, true, 5),
            fold(12, false, 9),
        ];
        assert_collapse_preserves_state(&log);
    }

    #[test]
    fn collapse_preserves_lifecycle_state() {
        let log = vec![
            Event::new(1, EventPayload::Create { path: b(), content: String::new() }),
            change(2, b(), insert(0, 0, "hi")),
            change(3, b(), insert(0, 2, "!")),
            Event::new(4, EventPayload::Rename { old_path: b(), new_path: a(), content: "hi!".into() }),
            open(5, a(), "hi!"),
            Event::new(6, EventPayload::Delete { path: a() }),
            Event::new(7, EventPayload::Create { path: a(), content: "new".into() }),
            change(8, a(), insert(0, 3, "er")),
            selection(9, a(), 0),
        ];
        assert_collapse_preserves_state(&log);
    }
}
