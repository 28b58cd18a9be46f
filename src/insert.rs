use crate::cell::Cell;
use crate::schema::quote_identifier;
use crate::{CSVSnafu, Error, RusqliteSnafu};
use csv::ByteRecord;
use rusqlite::{params_from_iter, Connection, Transaction};
use snafu::prelude::*;

/// What to do with a row the database refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPolicy {
    pub ignore_errors: bool,
    pub log_warnings: bool,
}

impl Default for RowPolicy {
    fn default() -> Self {
        RowPolicy {
            ignore_errors: true,
            log_warnings: true,
        }
    }
}

/// One load into one connection.
///
/// Everything executed through the session shares a single transaction.
/// Nothing is visible until [`ImportSession::commit`]; dropping the session
/// without committing rolls back the table creation and every row.
pub struct ImportSession<'conn> {
    tx: Transaction<'conn>,
    filename: String,
    policy: RowPolicy,
    inserted: usize,
    skipped: usize,
}

impl<'conn> ImportSession<'conn> {
    pub fn begin(
        conn: &'conn mut Connection,
        filename: &str,
        policy: RowPolicy,
    ) -> Result<ImportSession<'conn>, Error> {
        let tx = conn.transaction().context(RusqliteSnafu {
            message: "Error making transaction: ",
        })?;

        Ok(ImportSession {
            tx,
            filename: filename.to_owned(),
            policy,
            inserted: 0,
            skipped: 0,
        })
    }

    pub fn execute(&self, sql: &str) -> Result<(), Error> {
        log::debug!("{sql}");
        self.tx.execute_batch(sql).context(RusqliteSnafu {
            message: "Error executing sqlite statement: ",
        })
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Insert every record of `rows` into `table` with a positional insert of
    /// `arity` parameters. `first_line` numbers the first record when the
    /// reader did not record where it started.
    pub fn insert_rows<I>(
        &mut self,
        table: &str,
        arity: usize,
        first_line: u64,
        rows: I,
    ) -> Result<(), Error>
    where
        I: IntoIterator<Item = csv::Result<ByteRecord>>,
    {
        let mut question_marks = "?,".repeat(arity);
        question_marks.pop();

        let mut statement = self
            .tx
            .prepare_cached(&format!(
                "INSERT INTO {} VALUES ({question_marks})",
                quote_identifier(table)
            ))
            .context(RusqliteSnafu {
                message: "Error preparing sqlite statment: ",
            })?;

        let mut next_line = first_line;

        for row in rows {
            let record = row.context(CSVSnafu {
                filename: &self.filename,
            })?;

            let line = record.position().map_or(next_line, |position| position.line());
            next_line = line + 1;

            log::debug!("Row {line}: {record:?}");

            let source = match statement.execute(params_from_iter(record.iter().map(Cell::new))) {
                Ok(_) => {
                    self.inserted += 1;
                    continue;
                }
                Err(source) => source,
            };

            let error = Error::RowInsertError {
                source,
                filename: self.filename.clone(),
                line,
            };

            if !self.policy.ignore_errors {
                return Err(error);
            }
            if self.policy.log_warnings {
                log::warn!("Skipping row: {error}");
            }
            self.skipped += 1;
        }

        Ok(())
    }

    /// Make the load visible and return the number of rows inserted.
    pub fn commit(self) -> Result<usize, Error> {
        self.tx.commit().context(RusqliteSnafu {
            message: "Error commiting sqlite: ",
        })?;

        log::info!(
            "Loaded {} rows from {} ({} skipped)",
            self.inserted,
            self.filename,
            self.skipped
        );

        Ok(self.inserted)
    }
}
