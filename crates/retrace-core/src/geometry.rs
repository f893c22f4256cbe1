use serde::{Deserialize, Serialize};

/// Zero-based line/character position. `character` counts UTF-16 code units,
/// matching what editor hosts report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open span between two positions. `start` may come after `end` when
/// taken verbatim from a host; use [`Range::normalized`] before slicing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for `Range::new(Position::new(..), Position::new(..))`.
    pub const fn from_coords(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
        Self {
            start: Position::new(start_line, start_char),
            end: Position::new(end_line, end_char),
        }
    }

    pub fn normalized(self) -> Self {
        if self.start <= self.end {
            self
        } else {
            Self {
                start: self.end,
                end: self.start,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `line` falls inside this range, inclusive on both ends.
    pub fn contains_line(&self, line: u32) -> bool {
        let r = self.normalized();
        r.start.line <= line && line <= r.end.line
    }
}

/// Cursor selection. `active` is where the caret sits; `anchor` is where the
/// selection started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub const fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    pub const fn caret(at: Position) -> Self {
        Self {
            anchor: at,
            active: at,
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.active < self.anchor
    }

    pub fn range(&self) -> Range {
        Range::new(self.anchor, self.active).normalized()
    }
}
