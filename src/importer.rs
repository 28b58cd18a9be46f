use crate::describer::ColumnType;
use crate::infer::{detect_header, header_names};
use crate::insert::{ImportSession, RowPolicy};
use crate::lookahead::SampledReader;
use crate::schema::build_schema;
use crate::sniff::{sniff, Dialect};
use crate::{CSVSnafu, DialectDetectionSnafu, Error, IoSnafu, RusqliteSnafu, SchemaSnafu};
use csv::ByteRecord;
use rusqlite::Connection;
use snafu::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use typed_builder::TypedBuilder;

#[derive(Debug, TypedBuilder, Clone)]
pub struct Options {
    #[builder(default = true)]
    pub create_table: bool,
    #[builder(default = true)]
    pub if_not_exists: bool,
    #[builder(default = true)]
    pub ignore_errors: bool,
    #[builder(default = true)]
    pub log_warnings: bool,
    #[builder(default)]
    pub delimiter: Option<u8>,
    #[builder(default)]
    pub quote: Option<u8>,
    #[builder(default = 20)]
    pub sample_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options::builder().build()
    }
}

impl Options {
    pub fn row_policy(&self) -> RowPolicy {
        RowPolicy {
            ignore_errors: self.ignore_errors,
            log_warnings: self.log_warnings,
        }
    }
}

/// Create `table` from inferred column types, outside of any load.
pub fn create_table(
    conn: &Connection,
    table: &str,
    types: &[ColumnType],
    columns: Option<&[String]>,
    if_not_exists: bool,
) -> Result<(), Error> {
    let ddl = build_schema(table, columns, types)?.create_table_statement(if_not_exists)?;
    log::debug!("{ddl}");
    conn.execute_batch(&ddl).context(RusqliteSnafu {
        message: "Error creating table: ",
    })
}

pub fn loadfile(
    conn: &mut Connection,
    path: impl AsRef<Path>,
    table: &str,
) -> Result<usize, Error> {
    loadfile_with_options(conn, path, table, &Options::default())
}

pub fn loadfile_with_options(
    conn: &mut Connection,
    path: impl AsRef<Path>,
    table: &str,
    options: &Options,
) -> Result<usize, Error> {
    let path = path.as_ref();
    let filename = path.to_string_lossy();
    let file = File::open(path).context(IoSnafu { filename: &*filename })?;
    load_reader_with_options(conn, file, &filename, table, options)
}

/// Load delimited text from `reader` into `table` and return the number of
/// rows inserted. `filename` only names the source in errors and logs.
///
/// The source is read once from start to end, so it does not need to be a
/// file. Nothing is written unless the whole load succeeds.
pub fn load_reader_with_options<R: Read>(
    conn: &mut Connection,
    reader: R,
    filename: &str,
    table: &str,
    options: &Options,
) -> Result<usize, Error> {
    let reader = SampledReader::new(reader, options.sample_size).context(IoSnafu { filename })?;

    let mut dialect = match options.delimiter {
        Some(delimiter) => Dialect::with_delimiter(delimiter),
        None => sniff(reader.sample()).context(DialectDetectionSnafu { filename })?,
    };
    if let Some(quote) = options.quote {
        dialect.quote = quote;
    }
    log::debug!("Dialect of {filename}: {dialect:?}");

    let mut csv_reader = dialect.reader_builder().from_reader(reader);
    let mut records = csv_reader.byte_records();

    let sample_rows = records
        .by_ref()
        .take(options.sample_size)
        .collect::<Result<Vec<ByteRecord>, csv::Error>>()
        .context(CSVSnafu { filename })?;

    ensure!(
        !sample_rows.is_empty(),
        SchemaSnafu {
            message: format!("No rows found in {filename}")
        }
    );

    let shape = detect_header(&sample_rows)?;
    let arity = sample_rows[0].len();

    let (columns, first_line) = if shape.has_header {
        (Some(header_names(&sample_rows[0])), 2)
    } else {
        (None, 1)
    };

    let ddl = if options.create_table {
        let schema = build_schema(table, columns.as_deref(), &shape.types)?;
        Some(schema.create_table_statement(options.if_not_exists)?)
    } else {
        None
    };

    let mut session = ImportSession::begin(conn, filename, options.row_policy())?;

    if let Some(ddl) = ddl {
        session.execute(&ddl)?;
    }

    let skip = usize::from(shape.has_header);
    let rows = sample_rows.into_iter().skip(skip).map(Ok).chain(records);
    session.insert_rows(table, arity, first_line, rows)?;

    session.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describer::ColumnType::*;
    use rusqlite::types::Value;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
    }

    fn select_all(conn: &Connection, table: &str) -> Vec<Vec<Value>> {
        let mut stmt = conn.prepare(&format!("select * from \"{table}\"")).unwrap();
        let columns = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..columns)
                    .map(|index| row.get::<_, Value>(index))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .unwrap();
        rows.map(|row| row.unwrap()).collect()
    }

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn.prepare("select name from pragma_table_info(?)").unwrap();
        let rows = stmt.query_map([table], |row| row.get::<_, String>(0)).unwrap();
        rows.map(|row| row.unwrap()).collect()
    }

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "select count(*) from sqlite_master where type = 'table' and name = ?",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    fn load(
        conn: &mut Connection,
        source: &str,
        table: &str,
        options: &Options,
    ) -> Result<usize, Error> {
        load_reader_with_options(conn, source.as_bytes(), "memory", table, options)
    }

    fn text(value: &str) -> Value {
        Value::Text(value.to_owned())
    }

    fn short_last_row(tmp: &TempDir) -> PathBuf {
        let mut contents = "A,B,C\n".to_owned();
        contents.push_str(&"1,2,3\n".repeat(20));
        contents.push_str("7,8\n");

        let path = tmp.path().join("short.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Hands out a few bytes per read and cannot seek.
    struct Pipe<'a>(&'a [u8]);

    impl Read for Pipe<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(self.0.len()).min(3);
            buf[..len].copy_from_slice(&self.0[..len]);
            self.0 = &self.0[len..];
            Ok(len)
        }
    }

    #[test]
    fn comma_separated_values() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(loadfile(&mut conn, fixture("students.csv"), "A").unwrap(), 3);

        assert_eq!(column_names(&conn, "A"), vec!["Name", "Year", "Code", "Age"]);
        assert_eq!(
            select_all(&conn, "A"),
            vec![
                vec![text("Jan"), Value::Integer(2014), text("A1"), Value::Integer(18)],
                vec![text("Lucy"), Value::Integer(2016), text("B5"), Value::Integer(16)],
                vec![text("Richard"), Value::Integer(2010), text("--"), Value::Integer(22)],
            ]
        );
    }

    #[test]
    fn tab_separated_values() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(loadfile(&mut conn, fixture("grades.tsv"), "A").unwrap(), 9);

        let expected: Vec<Vec<Value>> = [
            (1, 90, "Richard"),
            (2, 100, "Richard"),
            (3, 70, "Richard"),
            (1, 85, "Lucy"),
            (2, 99, "Lucy"),
            (3, 80, "Lucy"),
            (1, 55, "Jan"),
            (2, 70, "Jan"),
            (3, 40, "Jan"),
        ]
        .iter()
        .map(|(assignment, grade, student)| {
            vec![Value::Integer(*assignment), Value::Integer(*grade), text(student)]
        })
        .collect();

        assert_eq!(select_all(&conn, "A"), expected);
    }

    #[test]
    fn header_detection() {
        let mut conn = Connection::open_in_memory().unwrap();

        loadfile(&mut conn, fixture("grades-no-header.tsv"), "A").unwrap();
        assert_eq!(column_names(&conn, "A"), vec!["a1", "a2", "a3"]);
        assert_eq!(select_all(&conn, "A").len(), 9);

        loadfile(&mut conn, fixture("grades.tsv"), "B").unwrap();
        assert_eq!(column_names(&conn, "B"), vec!["Assignment", "Grade", "Student"]);
        assert_eq!(select_all(&conn, "B").len(), 9);
    }

    #[test]
    fn invalid_unicode() {
        let path = fixture("invalid-unicode.csv");
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(loadfile(&mut conn, &path, "A").unwrap(), 3);

        let source = std::fs::read(&path).unwrap();
        let lines: Vec<&[u8]> = source
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .collect();

        let rows: Vec<Vec<u8>> = select_all(&conn, "A")
            .into_iter()
            .map(|row| {
                let cells: Vec<Vec<u8>> = row
                    .into_iter()
                    .map(|value| match value {
                        Value::Text(text) => text.into_bytes(),
                        Value::Blob(bytes) => bytes,
                        other => panic!("unexpected value {other:?}"),
                    })
                    .collect();
                cells.join(&b","[..])
            })
            .collect();

        assert_eq!(rows, lines);
    }

    #[test]
    fn ignore_errors_true() {
        let tmp = TempDir::new().unwrap();
        let path = short_last_row(&tmp);

        let options = Options::builder().ignore_errors(true).log_warnings(false).build();
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(loadfile_with_options(&mut conn, &path, "A", &options).unwrap(), 20);

        assert_eq!(column_names(&conn, "A"), vec!["A", "B", "C"]);
        assert_eq!(select_all(&conn, "A").len(), 20);
    }

    #[test]
    fn ignore_errors_false() {
        let tmp = TempDir::new().unwrap();
        let path = short_last_row(&tmp);

        let options = Options::builder().ignore_errors(false).log_warnings(false).build();
        let mut conn = Connection::open_in_memory().unwrap();
        let error = loadfile_with_options(&mut conn, &path, "A", &options).unwrap_err();

        assert!(matches!(error, Error::RowInsertError { line: 22, .. }));
        assert!(!table_exists(&conn, "A"));
    }

    #[test]
    fn failed_row_leaves_existing_table_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = short_last_row(&tmp);

        let mut conn = Connection::open_in_memory().unwrap();
        load(&mut conn, "A,B,C\n1,2,3\n4,5,6\n", "A", &Options::default()).unwrap();

        let options = Options::builder().ignore_errors(false).log_warnings(false).build();
        let error = loadfile_with_options(&mut conn, &path, "A", &options).unwrap_err();

        assert!(matches!(error, Error::RowInsertError { line: 22, .. }));
        assert_eq!(
            select_all(&conn, "A"),
            vec![
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
                vec![Value::Integer(4), Value::Integer(5), Value::Integer(6)],
            ]
        );
    }

    #[test]
    fn unseekable_source() {
        let source = b"id|name\n1|Pony\n2|Duck\n3|Grendel\n";
        let mut conn = Connection::open_in_memory().unwrap();
        let options = Options::default();
        let inserted =
            load_reader_with_options(&mut conn, Pipe(source), "pipe", "animals", &options).unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(
            select_all(&conn, "animals"),
            vec![
                vec![Value::Integer(1), text("Pony")],
                vec![Value::Integer(2), text("Duck")],
                vec![Value::Integer(3), text("Grendel")],
            ]
        );
    }

    #[test]
    fn space_separated_values() {
        let mut conn = Connection::open_in_memory().unwrap();
        let inserted = load(&mut conn, "a b c\n1 2 3\n4 5 6\n", "t", &Options::default()).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(column_names(&conn, "t"), vec!["a", "b", "c"]);
        assert_eq!(
            select_all(&conn, "t")[1],
            vec![Value::Integer(4), Value::Integer(5), Value::Integer(6)]
        );
    }

    #[test]
    fn carriage_return_line_endings() {
        let mut source = "n,name\r".to_owned();
        for n in 1..=30 {
            source.push_str(&format!("{n},item {n}\r"));
        }

        let mut conn = Connection::open_in_memory().unwrap();
        let inserted = load_reader_with_options(
            &mut conn,
            Pipe(source.as_bytes()),
            "cr",
            "t",
            &Options::default(),
        )
        .unwrap();

        assert_eq!(inserted, 30);
        assert_eq!(column_names(&conn, "t"), vec!["n", "name"]);
        assert_eq!(select_all(&conn, "t")[29], vec![Value::Integer(30), text("item 30")]);
    }

    #[test]
    fn longer_than_the_sample() {
        let mut source = "n,square\n".to_owned();
        for n in 1..=100 {
            source.push_str(&format!("{n},{}\n", n * n));
        }

        let mut conn = Connection::open_in_memory().unwrap();
        let inserted = load(&mut conn, &source, "squares", &Options::default()).unwrap();

        assert_eq!(inserted, 100);
        assert_eq!(
            conn.query_row("select sum(n), max(square) from squares", [], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
            .unwrap(),
            (5050, 10000)
        );
    }

    #[test]
    fn empty_cells_are_null() {
        let mut conn = Connection::open_in_memory().unwrap();
        load(&mut conn, "a,b,c\n1,,x\n2,3.5,\n", "t", &Options::default()).unwrap();

        assert_eq!(
            select_all(&conn, "t"),
            vec![
                vec![Value::Integer(1), Value::Null, text("x")],
                vec![Value::Integer(2), Value::Real(3.5), Value::Null],
            ]
        );
    }

    #[test]
    fn existing_table_is_appended() {
        let source = "a,b\n1,2\n3,4\n";
        let mut conn = Connection::open_in_memory().unwrap();
        load(&mut conn, source, "t", &Options::default()).unwrap();
        load(&mut conn, source, "t", &Options::default()).unwrap();
        assert_eq!(select_all(&conn, "t").len(), 4);

        let strict = Options::builder().if_not_exists(false).build();
        let error = load(&mut conn, source, "t", &strict).unwrap_err();
        assert!(matches!(error, Error::RusqliteError { .. }));
        assert_eq!(select_all(&conn, "t").len(), 4);
    }

    #[test]
    fn without_create_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        let columns = vec!["who".to_owned(), "score".to_owned()];
        create_table(&conn, "t", &[Text, Integer], Some(columns.as_slice()), false).unwrap();
        assert_eq!(column_names(&conn, "t"), vec!["who", "score"]);

        let options = Options::builder().create_table(false).build();
        load(&mut conn, "Lucy,85\nJan,55\n", "t", &options).unwrap();

        assert_eq!(
            select_all(&conn, "t"),
            vec![vec![text("Lucy"), Value::Integer(85)], vec![text("Jan"), Value::Integer(55)]]
        );
    }

    #[test]
    fn forced_dialect() {
        let options = Options::builder().delimiter(Some(b';')).quote(Some(b'\'')).build();
        let mut conn = Connection::open_in_memory().unwrap();
        load(&mut conn, "'a';'b'\n'x;y';'z'\n", "t", &options).unwrap();

        assert_eq!(
            select_all(&conn, "t"),
            vec![vec![text("a"), text("b")], vec![text("x;y"), text("z")]]
        );
    }

    #[test]
    fn single_line_is_a_header() {
        let options = Options::builder().delimiter(Some(b',')).build();
        let mut conn = Connection::open_in_memory().unwrap();
        let inserted = load(&mut conn, "id,name\n", "t", &options).unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(column_names(&conn, "t"), vec!["id", "name"]);
    }

    #[test]
    fn undetectable_dialect() {
        let mut conn = Connection::open_in_memory().unwrap();
        let error = load(&mut conn, "just one line\n", "t", &Options::default()).unwrap_err();

        assert!(matches!(error, Error::DialectDetectionError { .. }));
        insta::assert_snapshot!(
            error.to_string(),
            @"Could not detect dialect of memory: Need at least 2 lines to detect a dialect, found 1"
        );
    }

    #[test]
    fn empty_source() {
        let options = Options::builder().delimiter(Some(b',')).build();
        let mut conn = Connection::open_in_memory().unwrap();
        let error = load(&mut conn, "", "t", &options).unwrap_err();

        assert!(matches!(error, Error::SchemaError { .. }));
        assert!(!table_exists(&conn, "t"));
    }

    #[test]
    fn missing_file() {
        let tmp = TempDir::new().unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let error = loadfile(&mut conn, tmp.path().join("missing.csv"), "t").unwrap_err();
        assert!(matches!(error, Error::IoError { .. }));
    }
}
