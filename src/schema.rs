use crate::describer::ColumnType;
use crate::{Error, JinjaSnafu, SchemaSnafu};
use minijinja::Environment;
use serde_json::{json, Value};
use snafu::prelude::*;

lazy_static::lazy_static! {
    pub static ref NON_WORD_REGEX: regex::Regex = regex::Regex::new(r"\W+")
        .expect("we know the regex is fine");
}

const SQLITE_TABLE: &str = "CREATE TABLE {% if if_not_exists %}IF NOT EXISTS {% endif %}{{ table|quote }} (
{%- for column in columns %}
  {{ column.name|quote }} {{ column.type }}{% if not loop.last %},{% endif %}
{%- endfor %}
)";

/// A table name and its ordered, already deduplicated columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub table: String,
    pub columns: Vec<(String, ColumnType)>,
}

impl SchemaDefinition {
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|(_, column_type)| *column_type).collect()
    }

    pub fn create_table_statement(&self, if_not_exists: bool) -> Result<String, Error> {
        create_table_statement(&self.table, &self.names(), &self.types(), if_not_exists)
    }
}

/// ANSI quoting: wrap in double quotes and double any embedded double quote.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Inverse of [`quote_identifier`]. Returns `None` when `quoted` is not a
/// well formed quoted identifier.
pub fn unquote_identifier(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;

    let mut identifier = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(char) = chars.next() {
        if char == '"' && chars.next() != Some('"') {
            return None;
        }
        identifier.push(char);
    }
    Some(identifier)
}

/// Column names for a new table.
///
/// Without supplied names, `count` names are generated from the first letter
/// of the table name (`a1`, `a2`, ... for table `A`, or `n1`, ... when the
/// table name has no letters). Supplied names are reduced to word characters
/// and made unique by adding `_2`, `_3`, ... in the order they are seen.
/// SQLite compares column names case-insensitively, so uniqueness is checked
/// the same way.
pub fn build_column_names(table: &str, supplied: Option<&[String]>, count: usize) -> Vec<String> {
    let Some(supplied) = supplied else {
        let base: String = table
            .chars()
            .find(|char| char.is_alphabetic())
            .map_or_else(|| "n".to_owned(), |char| char.to_lowercase().collect());
        return (1..=count).map(|n| format!("{base}{n}")).collect();
    };

    let mut columns: Vec<String> = Vec::with_capacity(supplied.len());
    for name in supplied {
        let replaced = NON_WORD_REGEX.replace_all(name, "_");
        let word = replaced.trim_matches('_');

        let mut column = word.to_owned();
        let mut suffix = 1;
        while columns.iter().any(|existing| existing.eq_ignore_ascii_case(&column)) {
            suffix += 1;
            column = format!("{word}_{suffix}");
        }
        columns.push(column);
    }
    columns
}

pub fn build_schema(
    table: &str,
    supplied: Option<&[String]>,
    types: &[ColumnType],
) -> Result<SchemaDefinition, Error> {
    ensure!(!types.is_empty(), SchemaSnafu { message: "Must specify types." });

    if let Some(names) = supplied {
        ensure!(
            names.len() == types.len(),
            SchemaSnafu {
                message: format!(
                    "Got {} column names for {} column types",
                    names.len(),
                    types.len()
                )
            }
        );
    }

    let names = build_column_names(table, supplied, types.len());

    Ok(SchemaDefinition {
        table: table.to_owned(),
        columns: names.into_iter().zip(types.iter().copied()).collect(),
    })
}

fn quote(_state: &minijinja::State, identifier: String) -> Result<String, minijinja::Error> {
    Ok(quote_identifier(&identifier))
}

fn render_sqlite_table(value: Value) -> Result<String, Error> {
    let mut env = Environment::new();
    env.add_filter("quote", quote);
    env.add_template("sqlite_table", SQLITE_TABLE).context(JinjaSnafu {})?;
    let tmpl = env.get_template("sqlite_table").context(JinjaSnafu {})?;
    tmpl.render(value).context(JinjaSnafu {})
}

pub fn create_table_statement(
    table: &str,
    columns: &[String],
    types: &[ColumnType],
    if_not_exists: bool,
) -> Result<String, Error> {
    ensure!(!types.is_empty(), SchemaSnafu { message: "Must specify types." });
    ensure!(
        columns.len() == types.len(),
        SchemaSnafu {
            message: format!("Got {} column names for {} column types", columns.len(), types.len())
        }
    );

    let columns: Vec<Value> = columns
        .iter()
        .zip(types)
        .map(|(name, column_type)| json!({"name": name, "type": column_type.as_str()}))
        .collect();

    render_sqlite_table(json!({
        "table": table,
        "if_not_exists": if_not_exists,
        "columns": columns,
    }))
}
