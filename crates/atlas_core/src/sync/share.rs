//! One-way sentence sync with a shared database file.
//!
//! # Responsibility
//! - Copy `attribution` and `ia_connect` rows between the local database
//!   and a share database in either direction.
//!
//! # Invariants
//! - Rows whose primary key already exists on the receiving side keep their
//!   content; sync never deletes and only renumbers link orders.
//! - The share database is migrated before it is attached.
//! - Both table copies commit together or not at all.
//! - Every model that gains links ends with dense orders; links already on
//!   the receiving side keep their place ahead of copied ones.

use crate::db::{open_db, DbError};
use crate::repo::sentence_repo::{compact_link_orders, last_link_rowid};
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const SHARE_SCHEMA: &str = "share";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local rows are copied into the share database.
    Upload,
    /// Share rows are copied into the local database.
    Download,
}

impl SyncDirection {
    fn schemas(self) -> (&'static str, &'static str) {
        match self {
            Self::Upload => ("main", SHARE_SCHEMA),
            Self::Download => (SHARE_SCHEMA, "main"),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub sentences: usize,
    pub links: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.sentences + self.links
    }
}

#[derive(Debug)]
pub enum SyncError {
    Db(DbError),
    /// Download requested from a share file that does not exist.
    ShareMissing(PathBuf),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ShareMissing(path) => {
                write!(f, "share database `{}` does not exist", path.display())
            }
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ShareMissing(_) => None,
        }
    }
}

impl From<DbError> for SyncError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Copies sentence rows between `local` and the database at `share_path`.
pub fn sync_share_database(
    local: &Connection,
    share_path: &Path,
    direction: SyncDirection,
) -> Result<SyncReport, SyncError> {
    if direction == SyncDirection::Download && !share_path.exists() {
        return Err(SyncError::ShareMissing(share_path.to_path_buf()));
    }
    // Opening once brings the share file to the current schema.
    drop(open_db(share_path)?);

    local.execute(
        &format!("ATTACH DATABASE ?1 AS {SHARE_SCHEMA};"),
        [share_path.to_string_lossy().as_ref()],
    )?;
    let copied = copy_tables(local, direction);
    let detached = local.execute(&format!("DETACH DATABASE {SHARE_SCHEMA};"), []);

    let report = match copied {
        Ok(report) => report,
        Err(err) => {
            error!(
                "event=share_sync module=sync status=error direction={} error={}",
                direction.as_str(),
                err
            );
            return Err(err);
        }
    };
    detached?;

    info!(
        "event=share_sync module=sync status=ok direction={} sentences={} links={}",
        direction.as_str(),
        report.sentences,
        report.links
    );
    Ok(report)
}

fn copy_tables(conn: &Connection, direction: SyncDirection) -> Result<SyncReport, SyncError> {
    let (from, to) = direction.schemas();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let gaining = models_gaining_links(&tx, from, to)?;
    let copied_after = last_link_rowid(&tx, to)?;

    let sentences = tx.execute(
        &format!(
            "INSERT OR IGNORE INTO {to}.attribution (text_hash, context)
             SELECT text_hash, context FROM {from}.attribution;"
        ),
        [],
    )?;
    let links = tx.execute(
        &format!(
            "INSERT OR IGNORE INTO {to}.ia_connect (model_value, text_hash, order_id)
             SELECT model_value, text_hash, order_id FROM {from}.ia_connect
             ORDER BY model_value ASC, order_id ASC, rowid ASC;"
        ),
        [],
    )?;
    for model_value in gaining {
        compact_link_orders(&tx, to, model_value, copied_after)?;
    }
    tx.commit()?;

    Ok(SyncReport {
        direction,
        sentences,
        links,
    })
}

/// Models whose links in `from` are not all present in `to`.
fn models_gaining_links(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT f.model_value FROM {from}.ia_connect AS f
         WHERE NOT EXISTS (
            SELECT 1 FROM {to}.ia_connect AS t
            WHERE t.model_value = f.model_value AND t.text_hash = f.text_hash
         )
         ORDER BY f.model_value ASC;"
    ))?;
    let values = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}
