use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::borrow::Cow;

/// A single field exactly as it appeared in the source.
///
/// The bytes are never decoded or replaced, so a value that is not valid
/// UTF-8 can still be written to the database unchanged. `text` is the
/// best-effort view used for type checks and column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell<'a> {
    bytes: &'a [u8],
}

impl<'a> Cell<'a> {
    pub fn new(bytes: &'a [u8]) -> Cell<'a> {
        Cell { bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn text(&self) -> Option<&'a str> {
        std::str::from_utf8(self.bytes).ok()
    }

    pub fn to_text_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

impl<'a> From<&'a [u8]> for Cell<'a> {
    fn from(bytes: &'a [u8]) -> Cell<'a> {
        Cell::new(bytes)
    }
}

// Empty cells are stored as NULL. Anything that is not UTF-8 goes in as a
// BLOB so the bytes are stored unchanged.
impl ToSql for Cell<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = if self.is_empty() {
            ValueRef::Null
        } else if let Some(text) = self.text() {
            ValueRef::Text(text.as_bytes())
        } else {
            ValueRef::Blob(self.bytes)
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}
