use crate::cell::Cell;
use std::fmt;

/// Column types in order of preference, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Validator = fn(&Cell) -> bool;

fn descriptions() -> Vec<(ColumnType, Validator)> {
    vec![
        (ColumnType::Integer, check_integer as Validator),
        (ColumnType::Real, check_real as Validator),
        (ColumnType::Text, check_text as Validator),
        (ColumnType::Blob, check_blob as Validator),
    ]
}

fn check_integer(cell: &Cell) -> bool {
    cell.text()
        .map_or(false, |text| text.trim().parse::<i64>().is_ok())
}

fn check_real(cell: &Cell) -> bool {
    cell.text()
        .map_or(false, |text| text.trim().parse::<f64>().is_ok())
}

fn check_text(cell: &Cell) -> bool {
    cell.text().is_some()
}

fn check_blob(_cell: &Cell) -> bool {
    true
}

/// Tracks which column types still accept every value seen in one column.
pub struct Describer {
    count: usize,
    empty_count: usize,
    descriptions: Vec<(ColumnType, Validator)>,
}

impl fmt::Debug for Describer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let candidates: Vec<ColumnType> = self.descriptions.iter().map(|(t, _)| *t).collect();
        f.debug_struct("Describer")
            .field("count", &self.count)
            .field("empty_count", &self.empty_count)
            .field("candidates", &candidates)
            .finish()
    }
}

impl Default for Describer {
    fn default() -> Self {
        Describer::new()
    }
}

impl Describer {
    pub fn new() -> Describer {
        Describer {
            count: 0,
            empty_count: 0,
            descriptions: descriptions(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn empty_count(&self) -> usize {
        self.empty_count
    }

    /// Empty values carry no type information and are only counted.
    pub fn process(&mut self, cell: Cell) {
        self.count += 1;

        if cell.is_empty() {
            self.empty_count += 1;
            return;
        }

        self.descriptions.retain(|(_, validator)| validator(&cell));
    }

    /// Strictest type accepting every non-empty value. A column with no
    /// values at all is judged on a single empty value, which makes it TEXT.
    pub fn guess_type(&self) -> Option<ColumnType> {
        if self.count == self.empty_count {
            let probe = Cell::new(b"");
            return self
                .descriptions
                .iter()
                .find(|(_, validator)| validator(&probe))
                .map(|(column_type, _)| *column_type);
        }

        self.descriptions.first().map(|(column_type, _)| *column_type)
    }
}
