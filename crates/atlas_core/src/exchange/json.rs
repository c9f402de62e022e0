//! JSON export and import of sentence tables.
//!
//! # Responsibility
//! - Dump `attribution` and `ia_connect` as arrays of column → value
//!   objects, one `<table>.json` file per table.
//! - Load such files back, skipping rows whose unique key already exists.
//!
//! # Invariants
//! - Column names come from `PRAGMA table_info`; unknown fields in import
//!   files are rejected, never interpolated into SQL.
//! - An import runs in one transaction; a failing row rolls back all
//!   tables.
//! - Imported links are appended after a model's existing links and the
//!   model's orders are renumbered to `0..n` before commit.
//! - A row whose unique key is new but whose primary key is taken is
//!   skipped with a `status=conflict` warning.

use crate::db::DbError;
use crate::repo::sentence_repo::{compact_link_orders, last_link_rowid};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use serde_json::{Map, Number};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Table taking part in export/import with the fields that identify a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTable {
    pub name: &'static str,
    pub unique_key: &'static [&'static str],
}

pub const EXCHANGE_TABLES: [ExchangeTable; 2] = [
    ExchangeTable {
        name: "attribution",
        unique_key: &["text_hash", "context"],
    },
    ExchangeTable {
        name: "ia_connect",
        unique_key: &["model_value", "text_hash"],
    },
];

/// Rows written or inserted for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: usize,
}

#[derive(Debug)]
pub enum ExchangeError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
    Db(DbError),
    UnknownColumn { table: &'static str, column: String },
    MissingKeyField { table: &'static str, column: &'static str },
    /// JSON value has no SQLite counterpart (arrays, objects, non-finite).
    UnsupportedValue { table: &'static str, column: String },
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Json { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownColumn { table, column } => {
                write!(f, "table `{table}` has no column `{column}`")
            }
            Self::MissingKeyField { table, column } => {
                write!(f, "row for `{table}` lacks key field `{column}`")
            }
            Self::UnsupportedValue { table, column } => {
                write!(f, "unsupported value for `{table}.{column}`")
            }
        }
    }
}

impl Error for ExchangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ExchangeError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Writes every exchange table into `dir` as `<table>.json`.
pub fn export_tables(conn: &Connection, dir: &Path) -> ExchangeResult<Vec<TableCount>> {
    std::fs::create_dir_all(dir).map_err(|source| ExchangeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut counts = Vec::with_capacity(EXCHANGE_TABLES.len());
    for table in EXCHANGE_TABLES {
        let rows = read_table(conn, table)?;
        let path = table_file(dir, table);
        let json = serde_json::to_string_pretty(&rows).map_err(|source| ExchangeError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| ExchangeError::Io {
            path: path.clone(),
            source,
        })?;
        info!(
            "event=table_export module=exchange status=ok table={} rows={}",
            table.name,
            rows.len()
        );
        counts.push(TableCount {
            table: table.name,
            rows: rows.len(),
        });
    }
    Ok(counts)
}

/// Loads `<table>.json` files from `dir`, returning inserted row counts.
///
/// A missing file counts as zero rows.
pub fn import_tables(conn: &Connection, dir: &Path) -> ExchangeResult<Vec<TableCount>> {
    let mut batches = Vec::with_capacity(EXCHANGE_TABLES.len());
    for table in EXCHANGE_TABLES {
        let path = table_file(dir, table);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "event=table_import module=exchange status=skipped table={} reason=missing_file",
                    table.name
                );
                batches.push((table, Vec::new()));
                continue;
            }
            Err(source) => return Err(ExchangeError::Io { path, source }),
        };
        let rows: Vec<Map<String, serde_json::Value>> = serde_json::from_str(&raw)
            .map_err(|source| ExchangeError::Json { path, source })?;
        batches.push((table, rows));
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut counts = Vec::with_capacity(batches.len());
    let copied_after = last_link_rowid(&tx, "main")?;
    let mut linked_models = BTreeSet::new();
    for (table, rows) in &batches {
        let inserted = insert_rows(&tx, *table, rows, &mut linked_models)?;
        counts.push(TableCount {
            table: table.name,
            rows: inserted,
        });
    }
    for model_value in linked_models {
        compact_link_orders(&tx, "main", model_value, copied_after)?;
    }
    tx.commit()?;

    for count in &counts {
        info!(
            "event=table_import module=exchange status=ok table={} inserted={}",
            count.table, count.rows
        );
    }
    Ok(counts)
}

fn table_file(dir: &Path, table: ExchangeTable) -> PathBuf {
    dir.join(format!("{}.json", table.name))
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid;")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn read_table(
    conn: &Connection,
    table: ExchangeTable,
) -> ExchangeResult<Vec<Map<String, serde_json::Value>>> {
    let columns = table_columns(conn, table.name)?;
    let sql = format!(
        "SELECT {} FROM {} ORDER BY rowid;",
        columns.join(", "),
        table.name
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut objects = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let value = row.get::<_, Value>(index)?;
            object.insert(column.clone(), sql_to_json(value));
        }
        objects.push(object);
    }
    Ok(objects)
}

fn insert_rows(
    tx: &Transaction<'_>,
    table: ExchangeTable,
    rows: &[Map<String, serde_json::Value>],
    linked_models: &mut BTreeSet<i64>,
) -> ExchangeResult<usize> {
    let columns = table_columns(tx, table.name)?;
    let key_filter = table
        .unique_key
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let exists_sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {key_filter});",
        table.name
    );

    let mut inserted = 0;
    for row in rows {
        let mut names = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (column, value) in row {
            let Some(known) = columns.iter().find(|known| *known == column) else {
                return Err(ExchangeError::UnknownColumn {
                    table: table.name,
                    column: column.clone(),
                });
            };
            names.push(known.as_str());
            values.push(json_to_sql(table.name, column, value)?);
        }

        let mut key_values = Vec::with_capacity(table.unique_key.len());
        for key in table.unique_key {
            let value = row.get(*key).ok_or(ExchangeError::MissingKeyField {
                table: table.name,
                column: *key,
            })?;
            key_values.push(json_to_sql(table.name, key, value)?);
        }
        let exists: i64 = tx.query_row(&exists_sql, params_from_iter(&key_values), |row| {
            row.get(0)
        })?;
        if exists == 1 {
            continue;
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let insert_sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({placeholders});",
            table.name,
            names.join(", ")
        );
        let written = tx.execute(&insert_sql, params_from_iter(values))?;
        if written == 0 {
            // Unique key is new but the primary key is taken.
            warn!(
                "event=table_import module=exchange status=conflict table={} key={}",
                table.name,
                describe_key(table, &key_values)
            );
            continue;
        }
        if table.name == "ia_connect" {
            if let Some(Value::Integer(model_value)) = key_values.first() {
                linked_models.insert(*model_value);
            }
        }
        inserted += written;
    }
    Ok(inserted)
}

fn describe_key(table: ExchangeTable, values: &[Value]) -> String {
    table
        .unique_key
        .iter()
        .zip(values)
        .map(|(column, value)| match value {
            Value::Integer(number) => format!("{column}:{number}"),
            Value::Text(text) if *column == "context" => {
                format!("{column}_chars:{}", text.chars().count())
            }
            Value::Text(text) => format!("{column}:{text}"),
            _ => format!("{column}:?"),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn sql_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(number) => serde_json::Value::from(number),
        Value::Real(number) => Number::from_f64(number)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(text) => serde_json::Value::String(text),
        Value::Blob(bytes) => serde_json::Value::from(bytes),
    }
}

fn json_to_sql(
    table: &'static str,
    column: &str,
    value: &serde_json::Value,
) -> ExchangeResult<Value> {
    let unsupported = || ExchangeError::UnsupportedValue {
        table,
        column: column.to_string(),
    };
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(flag) => Ok(Value::Integer(i64::from(*flag))),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(integer) => Ok(Value::Integer(integer)),
            None => number.as_f64().map(Value::Real).ok_or_else(unsupported),
        },
        serde_json::Value::String(text) => Ok(Value::Text(text.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(unsupported()),
    }
}
