use std::fmt;

use crate::geometry::{Position, Range, Selection};
use crate::path::{DocPath, ViewColumn};

/// Discriminant of an editor event. The numeric tag is the durable wire
/// value, so variants must never be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Open,
    Close,
    Create,
    Delete,
    Rename,
    Save,
    Change,
    Selection,
    VisibleRange,
    FoldUp,
    FoldDown,
    ViewColumn,
    Visible,
    Group,
    Ungroup,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        Self::Open,
        Self::Close,
        Self::Create,
        Self::Delete,
        Self::Rename,
        Self::Save,
        Self::Change,
        Self::Selection,
        Self::VisibleRange,
        Self::FoldUp,
        Self::FoldDown,
        Self::ViewColumn,
        Self::Visible,
        Self::Group,
        Self::Ungroup,
    ];

    pub fn tag(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Close => 1,
            Self::Create => 2,
            Self::Delete => 3,
            Self::Rename => 4,
            Self::Save => 5,
            Self::Change => 6,
            Self::Selection => 7,
            Self::VisibleRange => 8,
            Self::FoldUp => 9,
            Self::FoldDown => 10,
            Self::ViewColumn => 11,
            Self::Visible => 12,
            Self::Group => 13,
            Self::Ungroup => 14,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Save => "save",
            Self::Change => "change",
            Self::Selection => "selection",
            Self::VisibleRange => "visible_range",
            Self::FoldUp => "fold_up",
            Self::FoldDown => "fold_down",
            Self::ViewColumn => "view_column",
            Self::Visible => "visible",
            Self::Group => "group",
            Self::Ungroup => "ungroup",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit inside a `Change` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentEdit {
    /// Pure insertion at a position.
    Insert { position: Position, text: String },
    /// Replace the text covered by `range` (empty `text` deletes).
    Replace { range: Range, text: String },
}

impl ContentEdit {
    pub fn text(&self) -> &str {
        match self {
            Self::Insert { text, .. } | Self::Replace { text, .. } => text,
        }
    }
}

/// Kind-specific event data. Every variant except `Create`, `Delete` and
/// `Rename` is scoped to a `(path, view_column)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    Open {
        path: DocPath,
        content: String,
        view_column: Option<ViewColumn>,
    },
    Close {
        path: DocPath,
        content: String,
        view_column: Option<ViewColumn>,
    },
    Create {
        path: DocPath,
        content: String,
    },
    Delete {
        path: DocPath,
    },
    /// `content` is written at `old_path` before the rename is performed.
    Rename {
        old_path: DocPath,
        new_path: DocPath,
        content: String,
    },
    Save {
        path: DocPath,
        content: String,
        view_column: Option<ViewColumn>,
    },
    Change {
        path: DocPath,
        view_column: Option<ViewColumn>,
        edits: Vec<ContentEdit>,
    },
    Selection {
        path: DocPath,
        view_column: Option<ViewColumn>,
        selections: Vec<Selection>,
    },
    VisibleRange {
        path: DocPath,
        view_column: Option<ViewColumn>,
        ranges: Vec<Range>,
    },
    FoldUp {
        path: DocPath,
        view_column: Option<ViewColumn>,
        line: u32,
    },
    FoldDown {
        path: DocPath,
        view_column: Option<ViewColumn>,
        line: u32,
    },
    ViewColumn {
        path: DocPath,
        view_column: Option<ViewColumn>,
    },
    Visible {
        path: DocPath,
        view_column: Option<ViewColumn>,
        selections: Vec<Selection>,
        ranges: Vec<Range>,
    },
    Group {
        path: DocPath,
        view_column: Option<ViewColumn>,
    },
    Ungroup {
        path: DocPath,
        view_column: Option<ViewColumn>,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open { .. } => EventKind::Open,
            Self::Close { .. } => EventKind::Close,
            Self::Create { .. } => EventKind::Create,
            Self::Delete { .. } => EventKind::Delete,
            Self::Rename { .. } => EventKind::Rename,
            Self::Save { .. } => EventKind::Save,
            Self::Change { .. } => EventKind::Change,
            Self::Selection { .. } => EventKind::Selection,
            Self::VisibleRange { .. } => EventKind::VisibleRange,
            Self::FoldUp { .. } => EventKind::FoldUp,
            Self::FoldDown { .. } => EventKind::FoldDown,
            Self::ViewColumn { .. } => EventKind::ViewColumn,
            Self::Visible { .. } => EventKind::Visible,
            Self::Group { .. } => EventKind::Group,
            Self::Ungroup { .. } => EventKind::Ungroup,
        }
    }

    /// Path identity the event belongs to. For `Rename` this is the old path.
    pub fn path(&self) -> &DocPath {
        match self {
            Self::Open { path, .. }
            | Self::Close { path, .. }
            | Self::Create { path, .. }
            | Self::Delete { path }
            | Self::Save { path, .. }
            | Self::Change { path, .. }
            | Self::Selection { path, .. }
            | Self::VisibleRange { path, .. }
            | Self::FoldUp { path, .. }
            | Self::FoldDown { path, .. }
            | Self::ViewColumn { path, .. }
            | Self::Visible { path, .. }
            | Self::Group { path, .. }
            | Self::Ungroup { path, .. } => path,
            Self::Rename { old_path, .. } => old_path,
        }
    }

    /// Every path the event touches: both sides of a rename, otherwise one.
    pub fn paths(&self) -> Vec<&DocPath> {
        match self {
            Self::Rename {
                old_path, new_path, ..
            } => vec![old_path, new_path],
            other => vec![other.path()],
        }
    }

    pub fn view_column(&self) -> Option<ViewColumn> {
        match self {
            Self::Open { view_column, .. }
            | Self::Close { view_column, .. }
            | Self::Save { view_column, .. }
            | Self::Change { view_column, .. }
            | Self::Selection { view_column, .. }
            | Self::VisibleRange { view_column, .. }
            | Self::FoldUp { view_column, .. }
            | Self::FoldDown { view_column, .. }
            | Self::ViewColumn { view_column, .. }
            | Self::Visible { view_column, .. }
            | Self::Group { view_column, .. }
            | Self::Ungroup { view_column, .. } => *view_column,
            Self::Create { .. } | Self::Delete { .. } | Self::Rename { .. } => None,
        }
    }

    /// Copy of this payload scoped to another view column. Unscoped kinds
    /// are returned unchanged.
    pub fn with_view_column(&self, column: Option<ViewColumn>) -> Self {
        let mut next = self.clone();
        match &mut next {
            Self::Open { view_column, .. }
            | Self::Close { view_column, .. }
            | Self::Save { view_column, .. }
            | Self::Change { view_column, .. }
            | Self::Selection { view_column, .. }
            | Self::VisibleRange { view_column, .. }
            | Self::FoldUp { view_column, .. }
            | Self::FoldDown { view_column, .. }
            | Self::ViewColumn { view_column, .. }
            | Self::Visible { view_column, .. }
            | Self::Group { view_column, .. }
            | Self::Ungroup { view_column, .. } => *view_column = column,
            Self::Create { .. } | Self::Delete { .. } | Self::Rename { .. } => {}
        }
        next
    }

    /// Full document text carried by lifecycle events.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Open { content, .. }
            | Self::Close { content, .. }
            | Self::Create { content, .. }
            | Self::Rename { content, .. }
            | Self::Save { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Copy of an `Open`/`Create` payload carrying `text` as its content.
    /// Other kinds are returned unchanged.
    pub fn with_content(&self, text: String) -> Self {
        let mut next = self.clone();
        if let Self::Open { content, .. } | Self::Create { content, .. } = &mut next {
            *content = text;
        }
        next
    }
}

/// Immutable timestamped record in an editor timeline.
///
/// Time is in milliseconds. Recorded logs hold wall-clock epoch times until
/// export; stored and played logs are relative to session start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    time: u64,
    payload: EventPayload,
}

impl Event {
    pub fn new(time: u64, payload: EventPayload) -> Self {
        Self { time, payload }
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn into_payload(self) -> EventPayload {
        self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn path(&self) -> &DocPath {
        self.payload.path()
    }

    pub fn view_column(&self) -> Option<ViewColumn> {
        self.payload.view_column()
    }

    /// Same event stamped at `time`.
    pub fn at(&self, time: u64) -> Self {
        Self {
            time,
            payload: self.payload.clone(),
        }
    }

    /// Same event moved `by` milliseconds earlier, saturating at zero.
    pub fn shifted_back(&self, by: u64) -> Self {
        self.at(self.time.saturating_sub(by))
    }
}
