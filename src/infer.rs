use crate::cell::Cell;
use crate::describer::{ColumnType, Describer};
use crate::{Error, TypeDetectionSnafu};
use csv::ByteRecord;
use snafu::OptionExt;

/// What the sample says about the file: whether the first record is a
/// header and the type of every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleShape {
    pub has_header: bool,
    pub types: Vec<ColumnType>,
}

/// Column types for `rows`. The first row decides how many columns there are;
/// cells missing from shorter rows count as empty.
pub fn infer_types(rows: &[ByteRecord]) -> Result<Vec<ColumnType>, Error> {
    let arity = rows.first().map_or(0, ByteRecord::len);
    infer_with_arity(rows, arity)
}

fn infer_with_arity(rows: &[ByteRecord], arity: usize) -> Result<Vec<ColumnType>, Error> {
    let mut describers: Vec<Describer> = (0..arity).map(|_| Describer::new()).collect();

    for row in rows {
        for (index, cell) in row.iter().take(arity).enumerate() {
            describers[index].process(Cell::new(cell));
        }
    }

    describers
        .iter()
        .enumerate()
        .map(|(column, describer)| describer.guess_type().context(TypeDetectionSnafu { column }))
        .collect()
}

/// The first row is a header when leaving it out changes the inferred types.
pub fn detect_header(rows: &[ByteRecord]) -> Result<SampleShape, Error> {
    let types_with_first = infer_types(rows)?;

    let types_without_first = match rows.split_first() {
        Some((first, rest)) if !rest.is_empty() => infer_with_arity(rest, first.len())?,
        _ => vec![],
    };

    let has_header = types_with_first != types_without_first;
    let types = if types_without_first.is_empty() {
        types_with_first
    } else {
        types_without_first
    };

    log::debug!("Header detected: {has_header}, column types: {types:?}");

    Ok(SampleShape { has_header, types })
}

/// Column names taken from a header record.
pub fn header_names(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|cell| Cell::new(cell).to_text_lossy().into_owned())
        .collect()
}
