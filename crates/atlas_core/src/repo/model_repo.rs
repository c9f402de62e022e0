//! Model repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Point lookup, ordered scan and keyword search over `info`.
//! - Structure inserts with codec-derived columns.
//! - Progress counts and legacy info lookup.
//!
//! # Invariants
//! - Value scans are ordered by `sysid ASC, value ASC`.
//! - `sysid`, `sex` and `is_parent` columns are always derived from the
//!   value by the codec, never taken from callers.

use crate::model::body::ModelRecord;
use crate::model::identifier::{Classification, Gender, ModelValue};
use crate::repo::{ensure_connection_ready, invalid_value, RepoError, RepoResult};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const SEARCH_LIMIT_DEFAULT: u32 = 1000;
const SEARCH_LIMIT_MAX: u32 = 5000;

const HAS_SENTENCES_SQL: &str =
    "EXISTS (SELECT 1 FROM ia_connect AS c WHERE c.model_value = i.value)";
const LACKS_SENTENCES_SQL: &str =
    "NOT EXISTS (SELECT 1 FROM ia_connect AS c WHERE c.model_value = i.value)";

/// Restricts search results by whether models already carry sentences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DescriptionFilter {
    #[default]
    All,
    WithoutSentences,
    WithSentences,
}

/// Query options for model search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSearchQuery {
    /// Substring matched against names first, then legacy info.
    pub keywords: String,
    pub system_id: Option<u8>,
    pub filter: DescriptionFilter,
    /// Defaults to 1000 and clamps to 5000.
    pub limit: Option<u32>,
}

/// Described/total model counts for one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCount {
    pub total: u64,
    pub described: u64,
}

impl ProgressCount {
    /// Integer percentage of described models, capped at 100.
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.described * 100 / self.total).min(100) as u8
    }
}

/// Repository interface for model records.
pub trait ModelRepository {
    fn get_model(&self, value: ModelValue) -> RepoResult<Option<ModelRecord>>;
    /// All stored values ordered by system, then value.
    fn list_values_ordered(&self) -> RepoResult<Vec<i64>>;
    fn list_values_in_partition(&self, classification: Classification) -> RepoResult<Vec<i64>>;
    fn search_models(&self, query: &ModelSearchQuery) -> RepoResult<Vec<ModelRecord>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Vec<ModelRecord>>;
    fn create_model(&self, record: &ModelRecord) -> RepoResult<()>;
    fn legacy_info(&self, value: ModelValue) -> RepoResult<Option<String>>;
    fn progress(&self, system_id: Option<u8>, gender: Option<Gender>)
        -> RepoResult<ProgressCount>;
}

/// SQLite-backed model repository.
pub struct SqliteModelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteModelRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["info", "info_old_info"])?;
        Ok(Self { conn })
    }

    fn query_records(
        &self,
        conditions: &[&str],
        mut bind_values: Vec<Value>,
        limit: u32,
    ) -> RepoResult<Vec<ModelRecord>> {
        let mut sql = String::from("SELECT i.value AS value, i.name AS name, i.pval AS pval FROM info AS i");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY i.sysid ASC, i.value ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }
}

impl ModelRepository for SqliteModelRepository<'_> {
    fn get_model(&self, value: ModelValue) -> RepoResult<Option<ModelRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value, name, pval FROM info WHERE value = ?1;")?;
        let mut rows = stmt.query([value.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_record_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_values_ordered(&self) -> RepoResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM info ORDER BY sysid ASC, value ASC;")?;
        let values = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn list_values_in_partition(&self, classification: Classification) -> RepoResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT value FROM info
             WHERE value >= ?1 AND value < ?2
             ORDER BY value ASC;",
        )?;
        let values = stmt
            .query_map(
                params![classification.base_value(), classification.end_value()],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn search_models(&self, query: &ModelSearchQuery) -> RepoResult<Vec<ModelRecord>> {
        let limit = normalize_search_limit(query.limit);
        let mut conditions: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        match query.filter {
            DescriptionFilter::All => {}
            DescriptionFilter::WithSentences => conditions.push(HAS_SENTENCES_SQL),
            DescriptionFilter::WithoutSentences => conditions.push(LACKS_SENTENCES_SQL),
        }
        if let Some(system_id) = query.system_id {
            conditions.push("i.sysid = ?");
            bind_values.push(Value::Integer(i64::from(system_id)));
        }

        let keywords = query.keywords.trim();
        if keywords.is_empty() {
            return self.query_records(&conditions, bind_values, limit);
        }

        let pattern = format!("%{}%", escape_like(keywords));
        let mut by_name_conditions = conditions.clone();
        by_name_conditions.push("i.name LIKE ? ESCAPE '\\'");
        let mut by_name_binds = bind_values.clone();
        by_name_binds.push(Value::Text(pattern.clone()));
        let mut records = self.query_records(&by_name_conditions, by_name_binds, limit)?;

        let remaining = limit.saturating_sub(records.len() as u32);
        if remaining > 0 {
            conditions.push("i.name NOT LIKE ? ESCAPE '\\'");
            conditions.push(
                "EXISTS (SELECT 1 FROM info_old_info AS o
                         WHERE o.value = i.value AND o.info LIKE ? ESCAPE '\\')",
            );
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
            records.extend(self.query_records(&conditions, bind_values, remaining)?);
        }

        Ok(records)
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Vec<ModelRecord>> {
        self.query_records(
            &["i.name = ?"],
            vec![Value::Text(name.to_string())],
            SEARCH_LIMIT_MAX,
        )
    }

    fn create_model(&self, record: &ModelRecord) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM info WHERE value = ?1);",
            [record.value.get()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::Duplicate(record.value.get()));
        }

        let classification = record.classification();
        self.conn.execute(
            "INSERT INTO info (value, name, pval, sysid, sex, is_parent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.value.get(),
                record.name.as_str(),
                record.parent_value,
                i64::from(classification.system_id),
                classification.gender.digit(),
                i64::from(classification.is_parent),
            ],
        )?;

        info!(
            "event=model_create module=repo status=ok model_value={} system_id={} is_parent={}",
            record.value, classification.system_id, classification.is_parent
        );
        Ok(())
    }

    fn legacy_info(&self, value: ModelValue) -> RepoResult<Option<String>> {
        let stored: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT info FROM info_old_info WHERE value = ?1;",
                [value.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored
            .flatten()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    fn progress(
        &self,
        system_id: Option<u8>,
        gender: Option<Gender>,
    ) -> RepoResult<ProgressCount> {
        let mut sql = format!(
            "SELECT COUNT(*), COALESCE(SUM({HAS_SENTENCES_SQL}), 0) FROM info AS i WHERE 1 = 1"
        );
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(system_id) = system_id {
            sql.push_str(" AND i.sysid = ?");
            bind_values.push(Value::Integer(i64::from(system_id)));
        }
        if let Some(gender) = gender {
            sql.push_str(" AND i.sex = ?");
            bind_values.push(Value::Integer(gender.digit()));
        }

        let (total, described): (i64, i64) =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
        Ok(ProgressCount {
            total: total.max(0) as u64,
            described: described.max(0) as u64,
        })
    }
}

/// Normalizes search limit according to the search contract.
pub fn normalize_search_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => SEARCH_LIMIT_DEFAULT,
        Some(value) if value > SEARCH_LIMIT_MAX => SEARCH_LIMIT_MAX,
        Some(value) => value,
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<ModelRecord> {
    let raw_value: i64 = row.get("value")?;
    let value = ModelValue::new(raw_value).map_err(|err| invalid_value("info.value", err))?;
    let parent_value: Option<i64> = row.get("pval")?;
    Ok(ModelRecord::new(value, row.get::<_, String>("name")?, parent_value))
}
