//! Path-relative codec between in-memory events and their durable JSON form.
//!
//! Paths are stored relative to the session root with `/` separators, and
//! editor geometry is flattened to integer pairs:
//! position `[line, character]`, range `[[l, c], [l, c]]`,
//! selection `[[anchor], [active]]`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use retrace_core::{
    ContentEdit, DocPath, Event, EventKind, EventPayload, Position, Range, Selection, ViewColumn,
};

use crate::error::CodecError;

pub type WirePosition = [u32; 2];
pub type WireRange = [WirePosition; 2];
/// `[anchor, active]`.
pub type WireSelection = [WirePosition; 2];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireEdit {
    Insert { position: WirePosition, text: String },
    Replace { range: WireRange, text: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edits: Option<Vec<WireEdit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selections: Option<Vec<WireSelection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<WireRange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// One stored event: integer kind tag plus its data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: WireData,
}

/// Converts between absolute document paths and root-relative strings.
#[derive(Clone, Debug)]
pub struct PathCodec {
    root: PathBuf,
}

impl PathCodec {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `/`-joined path relative to the root. Paths outside the root are
    /// kept absolute.
    pub fn to_relative(&self, path: &DocPath) -> String {
        match path.as_path().strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string(),
        }
    }

    pub fn to_absolute(&self, stored: &str) -> DocPath {
        if Path::new(stored).is_absolute() {
            return DocPath::new(stored);
        }
        let joined = stored
            .split('/')
            .filter(|seg| !seg.is_empty())
            .fold(self.root.clone(), |acc, seg| acc.join(seg));
        DocPath::new(joined)
    }

    pub fn encode(&self, event: &Event) -> WireEvent {
        let mut data = WireData {
            time: event.time(),
            ..WireData::default()
        };
        let rel = |p: &DocPath| Some(self.to_relative(p));
        let col = |c: &Option<ViewColumn>| c.map(|c| c.0);

        match event.payload() {
            EventPayload::Open {
                path,
                content,
                view_column,
            }
            | EventPayload::Close {
                path,
                content,
                view_column,
            }
            | EventPayload::Save {
                path,
                content,
                view_column,
            } => {
                data.path = rel(path);
                data.content = Some(content.clone());
                data.view_column = col(view_column);
            }
            EventPayload::Create { path, content } => {
                data.path = rel(path);
                data.content = Some(content.clone());
            }
            EventPayload::Delete { path } => {
                data.path = rel(path);
            }
            EventPayload::Rename {
                old_path,
                new_path,
                content,
            } => {
                data.old_path = rel(old_path);
                data.new_path = rel(new_path);
                data.content = Some(content.clone());
            }
            EventPayload::Change {
                path,
                view_column,
                edits,
            } => {
                data.path = rel(path);
                data.view_column = col(view_column);
                data.edits = Some(edits.iter().map(edit_to_wire).collect());
            }
            EventPayload::Selection {
                path,
                view_column,
                selections,
            } => {
                data.path = rel(path);
                data.view_column = col(view_column);
                data.selections = Some(selections.iter().map(selection_to_wire).collect());
            }
            EventPayload::VisibleRange {
                path,
                view_column,
                ranges,
            } => {
                data.path = rel(path);
                data.view_column = col(view_column);
                data.ranges = Some(ranges.iter().map(range_to_wire).collect());
            }
            EventPayload::FoldUp {
                path,
                view_column,
                line,
            }
            | EventPayload::FoldDown {
                path,
                view_column,
                line,
            } => {
                data.path = rel(path);
                data.view_column = col(view_column);
                data.line = Some(*line);
            }
            EventPayload::ViewColumn { path, view_column }
            | EventPayload::Group { path, view_column }
            | EventPayload::Ungroup { path, view_column } => {
                data.path = rel(path);
                data.view_column = col(view_column);
            }
            EventPayload::Visible {
                path,
                view_column,
                selections,
                ranges,
            } => {
                data.path = rel(path);
                data.view_column = col(view_column);
                data.selections = Some(selections.iter().map(selection_to_wire).collect());
                data.ranges = Some(ranges.iter().map(range_to_wire).collect());
            }
        }

        WireEvent {
            kind: event.kind().tag(),
            data,
        }
    }

    /// Decode the event at position `index` of a stored log.
    pub fn decode(&self, index: usize, wire: WireEvent) -> Result<Event, CodecError> {
        let kind = EventKind::from_tag(wire.kind).ok_or(CodecError::UnknownKind {
            index,
            tag: wire.kind,
        })?;
        let time = wire.data.time;
        let mut f = Fields {
            index,
            kind,
            data: wire.data,
            codec: self,
        };

        let payload = match kind {
            EventKind::Open => EventPayload::Open {
                path: f.path()?,
                content: f.content()?,
                view_column: f.view_column(),
            },
            EventKind::Close => EventPayload::Close {
                path: f.path()?,
                content: f.content()?,
                view_column: f.view_column(),
            },
            EventKind::Create => EventPayload::Create {
                path: f.path()?,
                content: f.content()?,
            },
            EventKind::Delete => EventPayload::Delete { path: f.path()? },
            EventKind::Rename => EventPayload::Rename {
                old_path: f.old_path()?,
                new_path: f.new_path()?,
                content: f.content()?,
            },
            EventKind::Save => EventPayload::Save {
                path: f.path()?,
                content: f.content()?,
                view_column: f.view_column(),
            },
            EventKind::Change => EventPayload::Change {
                path: f.path()?,
                view_column: f.view_column(),
                edits: f.edits()?,
            },
            EventKind::Selection => EventPayload::Selection {
                path: f.path()?,
                view_column: f.view_column(),
                selections: f.selections()?,
            },
            EventKind::VisibleRange => EventPayload::VisibleRange {
                path: f.path()?,
                view_column: f.view_column(),
                ranges: f.ranges()?,
            },
            EventKind::FoldUp => EventPayload::FoldUp {
                path: f.path()?,
                view_column: f.view_column(),
                line: f.line()?,
            },
            EventKind::FoldDown => EventPayload::FoldDown {
                path: f.path()?,
                view_column: f.view_column(),
                line: f.line()?,
            },
            EventKind::ViewColumn => EventPayload::ViewColumn {
                path: f.path()?,
                view_column: f.view_column(),
            },
            EventKind::Visible => EventPayload::Visible {
                path: f.path()?,
                view_column: f.view_column(),
                selections: f.selections()?,
                ranges: f.ranges()?,
            },
            EventKind::Group => EventPayload::Group {
                path: f.path()?,
                view_column: f.view_column(),
            },
            EventKind::Ungroup => EventPayload::Ungroup {
                path: f.path()?,
                view_column: f.view_column(),
            },
        };

        Ok(Event::new(time, payload))
    }
}

/// Pulls required fields out of one event's data, reporting the first one
/// that is absent.
struct Fields<'a> {
    index: usize,
    kind: EventKind,
    data: WireData,
    codec: &'a PathCodec,
}

impl Fields<'_> {
    fn missing(&self, field: &'static str) -> CodecError {
        CodecError::MissingField {
            index: self.index,
            kind: self.kind,
            field,
        }
    }

    fn path(&mut self) -> Result<DocPath, CodecError> {
        let raw = self.data.path.take().ok_or_else(|| self.missing("path"))?;
        Ok(self.codec.to_absolute(&raw))
    }

    fn old_path(&mut self) -> Result<DocPath, CodecError> {
        let raw = self.data.old_path.take().ok_or_else(|| self.missing("oldPath"))?;
        Ok(self.codec.to_absolute(&raw))
    }

    fn new_path(&mut self) -> Result<DocPath, CodecError> {
        let raw = self.data.new_path.take().ok_or_else(|| self.missing("newPath"))?;
        Ok(self.codec.to_absolute(&raw))
    }

    fn content(&mut self) -> Result<String, CodecError> {
        self.data.content.take().ok_or_else(|| self.missing("content"))
    }

    fn view_column(&self) -> Option<ViewColumn> {
        self.data.view_column.map(ViewColumn)
    }

    fn line(&self) -> Result<u32, CodecError> {
        self.data.line.ok_or_else(|| self.missing("line"))
    }

    fn edits(&mut self) -> Result<Vec<ContentEdit>, CodecError> {
        let edits = self.data.edits.take().ok_or_else(|| self.missing("edits"))?;
        Ok(edits.into_iter().map(edit_from_wire).collect())
    }

    fn selections(&mut self) -> Result<Vec<Selection>, CodecError> {
        let sels = self.data.selections.take().ok_or_else(|| self.missing("selections"))?;
        Ok(sels.iter().map(selection_from_wire).collect())
    }

    fn ranges(&mut self) -> Result<Vec<Range>, CodecError> {
        let ranges = self.data.ranges.take().ok_or_else(|| self.missing("ranges"))?;
        Ok(ranges.iter().map(range_from_wire).collect())
    }
}

fn position_to_wire(p: &Position) -> WirePosition {
    [p.line, p.character]
}

fn position_from_wire(p: &WirePosition) -> Position {
    Position::new(p[0], p[1])
}

fn range_to_wire(r: &Range) -> WireRange {
    [position_to_wire(&r.start), position_to_wire(&r.end)]
}

fn range_from_wire(r: &WireRange) -> Range {
    Range::new(position_from_wire(&r[0]), position_from_wire(&r[1]))
}

fn selection_to_wire(s: &Selection) -> WireSelection {
    [position_to_wire(&s.anchor), position_to_wire(&s.active)]
}

fn selection_from_wire(s: &WireSelection) -> Selection {
    Selection::new(position_from_wire(&s[0]), position_from_wire(&s[1]))
}

fn edit_to_wire(e: &ContentEdit) -> WireEdit {
    match e {
        ContentEdit::Insert { position, text } => WireEdit::Insert {
            position: position_to_wire(position),
            text: text.clone(),
        },
        ContentEdit::Replace { range, text } => WireEdit::Replace {
            range: range_to_wire(range),
            text: text.clone(),
        },
    }
}

fn edit_from_wire(e: WireEdit) -> ContentEdit {
    match e {
        WireEdit::Insert { position, text } => ContentEdit::Insert {
            position: position_from_wire(&position),
            text,
        },
        WireEdit::Replace { range, text } => ContentEdit::Replace {
            range: range_from_wire(&range),
            text,
        },
    }
}
