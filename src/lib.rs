//! Load CSV, TSV and other delimited text into SQLite.
//!
//! The delimiter and quoting are sniffed from the first lines of the source,
//! column types and header presence are inferred from the first records, and
//! the table is created and filled inside a single transaction.
//!
//! ```no_run
//! let mut conn = rusqlite::Connection::open_in_memory().unwrap();
//! let rows = csvs_load::loadfile(&mut conn, "students.csv", "students").unwrap();
//! println!("loaded {rows} rows");
//! ```

use snafu::Snafu;

pub mod cell;
pub mod describer;
pub mod importer;
pub mod infer;
pub mod insert;
pub mod lookahead;
pub mod schema;
pub mod sniff;

pub use crate::cell::Cell;
pub use crate::describer::ColumnType;
pub use crate::importer::{
    create_table, load_reader_with_options, loadfile, loadfile_with_options, Options,
};
pub use crate::infer::{detect_header, infer_types, SampleShape};
pub use crate::insert::{ImportSession, RowPolicy};
pub use crate::schema::{
    build_column_names, build_schema, create_table_statement, quote_identifier,
    unquote_identifier, SchemaDefinition,
};
pub use crate::sniff::{sniff, Dialect, SniffError};

#[non_exhaustive]
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not detect dialect of {}: {}", filename, source))]
    DialectDetectionError { source: SniffError, filename: String },

    #[snafu(display("Could not detect type of column {}", column))]
    TypeDetectionError { column: usize },

    #[snafu(display("{}", message))]
    SchemaError { message: String },

    #[snafu(display("{} ({}, row {})", source, filename, line))]
    RowInsertError {
        source: rusqlite::Error,
        filename: String,
        line: u64,
    },

    #[snafu(display("Error reading file {}: {}", filename, source))]
    IoError {
        source: std::io::Error,
        filename: String,
    },

    #[snafu(display("Error loading CSV file {}: {}", filename, source))]
    CSVError {
        source: csv::Error,
        filename: String,
    },

    #[snafu(display("{}{}", message, source))]
    RusqliteError {
        source: rusqlite::Error,
        message: String,
    },

    #[snafu(display("{}", source))]
    JinjaError { source: minijinja::Error },
}
