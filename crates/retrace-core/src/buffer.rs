use crate::events::ContentEdit;
use crate::geometry::Position;

/// Reconstructed document text.
///
/// Positions resolve the way editor hosts resolve them: `character` counts
/// UTF-16 code units, a character past the end of a line clamps to the line
/// end (before any `\r\n`), and a line past the end clamps to the end of the
/// document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn line_count(&self) -> u32 {
        self.text.split('\n').count() as u32
    }

    /// Byte offset of `pos`, clamped into the document.
    pub fn offset_at(&self, pos: Position) -> usize {
        let mut line_start = 0usize;
        for _ in 0..pos.line {
            match self.text[line_start..].find('\n') {
                Some(i) => line_start += i + 1,
                None => return self.text.len(),
            }
        }

        let rest = &self.text[line_start..];
        let mut line_end = rest.find('\n').unwrap_or(rest.len());
        if rest[..line_end].ends_with('\r') {
            line_end -= 1;
        }

        let mut units = 0u32;
        for (i, ch) in rest[..line_end].char_indices() {
            if units >= pos.character {
                return line_start + i;
            }
            units += ch.len_utf16() as u32;
        }
        line_start + line_end
    }

    pub fn apply(&mut self, edit: &ContentEdit) {
        match edit {
            ContentEdit::Insert { position, text } => {
                let at = self.offset_at(*position);
                self.text.insert_str(at, text);
            }
            ContentEdit::Replace { range, text } => {
                let range = range.normalized();
                let start = self.offset_at(range.start);
                let end = self.offset_at(range.end);
                self.text.replace_range(start..end, text);
            }
        }
    }

    /// Apply edits left to right, each against the result of the previous.
    pub fn apply_all<'a>(&mut self, edits: impl IntoIterator<Item = &'a ContentEdit>) {
        for edit in edits {
            self.apply(edit);
        }
    }
}
