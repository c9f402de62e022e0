//! Sentence and association persistence.
//!
//! # Responsibility
//! - Load a model's ordered sentences and raw `(hash, order)` links.
//! - Apply reconcile plans atomically.
//! - Remove sentences no model links to.
//!
//! # Invariants
//! - Sentence rows are shared store-wide and never rewritten; a known hash
//!   is linked, not inserted again.
//! - All writes of one save run in a single immediate transaction.
//! - Link orders of one model read back as `(order_id, rowid)`; bulk copies
//!   append after existing links and restore dense `0..n` orders.

use crate::model::identifier::ModelValue;
use crate::model::sentence::{Sentence, SentenceHash};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use crate::text::reconcile::{ExistingLink, ReconcilePlan};
use log::{info, warn};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Counts of rows touched by one applied plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub model_value: ModelValue,
    pub linked: usize,
    pub unlinked: usize,
    pub reordered: usize,
    /// Sentence rows that did not exist store-wide before the save.
    pub new_sentences: usize,
}

/// Repository interface for sentences and their model links.
pub trait SentenceRepository {
    /// Ordered sentences linked to `model_value`.
    fn load_sentences(&self, model_value: ModelValue) -> RepoResult<Vec<Sentence>>;
    fn load_links(&self, model_value: ModelValue) -> RepoResult<Vec<ExistingLink>>;
    /// Applies every plan in one transaction.
    fn apply_plans(&self, plans: &[ReconcilePlan]) -> RepoResult<Vec<SaveOutcome>>;
    /// Removes every link of `model_value`; returns the number removed.
    fn clear_links(&self, model_value: ModelValue) -> RepoResult<usize>;
    /// Deletes sentence rows without links; returns the number deleted.
    fn purge_orphan_sentences(&self) -> RepoResult<usize>;
}

/// SQLite-backed sentence repository.
pub struct SqliteSentenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSentenceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["attribution", "ia_connect"])?;
        Ok(Self { conn })
    }
}

impl SentenceRepository for SqliteSentenceRepository<'_> {
    fn load_sentences(&self, model_value: ModelValue) -> RepoResult<Vec<Sentence>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.text_hash, a.context
             FROM ia_connect AS c
             INNER JOIN attribution AS a ON a.text_hash = c.text_hash
             WHERE c.model_value = ?1
             ORDER BY c.order_id ASC, c.rowid ASC;",
        )?;
        let rows = stmt
            .query_map([model_value.get()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut sentences = Vec::with_capacity(rows.len());
        for (stored_hash, text) in rows {
            match Sentence::new(&text) {
                Ok(sentence) => {
                    if sentence.hash().as_str() != stored_hash {
                        warn!(
                            "event=sentence_load module=repo status=hash_mismatch model_value={} stored_hash={}",
                            model_value, stored_hash
                        );
                    }
                    sentences.push(sentence);
                }
                Err(_) => warn!(
                    "event=sentence_load module=repo status=skipped_blank model_value={} stored_hash={}",
                    model_value, stored_hash
                ),
            }
        }
        Ok(sentences)
    }

    fn load_links(&self, model_value: ModelValue) -> RepoResult<Vec<ExistingLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT text_hash, order_id
             FROM ia_connect
             WHERE model_value = ?1
             ORDER BY order_id ASC, rowid ASC;",
        )?;
        let rows = stmt
            .query_map([model_value.get()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(hash, order)| {
                let order = u32::try_from(order).map_err(|_| {
                    RepoError::InvalidData(format!("ia_connect.order_id: {order}"))
                })?;
                Ok(ExistingLink {
                    hash: SentenceHash::from_stored(hash),
                    order,
                })
            })
            .collect()
    }

    fn apply_plans(&self, plans: &[ReconcilePlan]) -> RepoResult<Vec<SaveOutcome>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in plans {
            outcomes.push(apply_plan_in_tx(&tx, plan)?);
        }
        tx.commit()?;

        for outcome in &outcomes {
            info!(
                "event=model_save module=repo status=ok model_value={} linked={} unlinked={} reordered={} new_sentences={}",
                outcome.model_value,
                outcome.linked,
                outcome.unlinked,
                outcome.reordered,
                outcome.new_sentences
            );
        }
        Ok(outcomes)
    }

    fn clear_links(&self, model_value: ModelValue) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM ia_connect WHERE model_value = ?1;",
            [model_value.get()],
        )?;
        info!(
            "event=model_clear module=repo status=ok model_value={} unlinked={}",
            model_value, removed
        );
        Ok(removed)
    }

    fn purge_orphan_sentences(&self) -> RepoResult<usize> {
        let purged = self.conn.execute(
            "DELETE FROM attribution
             WHERE NOT EXISTS (
                SELECT 1 FROM ia_connect AS c WHERE c.text_hash = attribution.text_hash
             );",
            [],
        )?;
        info!("event=sentence_purge module=repo status=ok purged={}", purged);
        Ok(purged)
    }
}

fn apply_plan_in_tx(tx: &Transaction<'_>, plan: &ReconcilePlan) -> RepoResult<SaveOutcome> {
    let model_value = plan.model_value.get();

    // Removals first so reordered rows never collide with stale ones.
    for link in &plan.removed {
        tx.execute(
            "DELETE FROM ia_connect
             WHERE model_value = ?1 AND text_hash = ?2 AND order_id = ?3;",
            params![model_value, link.hash.as_str(), i64::from(link.order)],
        )?;
    }

    let mut reordered = 0;
    for link in plan.reordered() {
        tx.execute(
            "UPDATE ia_connect
             SET order_id = ?4
             WHERE model_value = ?1 AND text_hash = ?2 AND order_id = ?3;",
            params![
                model_value,
                link.hash.as_str(),
                i64::from(link.from_order),
                i64::from(link.to_order)
            ],
        )?;
        reordered += 1;
    }

    let mut new_sentences = 0;
    for link in &plan.inserted {
        new_sentences += tx.execute(
            "INSERT OR IGNORE INTO attribution (text_hash, context) VALUES (?1, ?2);",
            params![link.sentence.hash().as_str(), link.sentence.text()],
        )?;
        tx.execute(
            "INSERT INTO ia_connect (model_value, text_hash, order_id) VALUES (?1, ?2, ?3);",
            params![model_value, link.sentence.hash().as_str(), i64::from(link.order)],
        )?;
    }

    Ok(SaveOutcome {
        model_value: plan.model_value,
        linked: plan.inserted.len(),
        unlinked: plan.removed.len(),
        reordered,
        new_sentences,
    })
}

/// Highest `ia_connect` rowid in `schema`; rows inserted later sort after it.
pub(crate) fn last_link_rowid(conn: &Connection, schema: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(rowid), 0) FROM {schema}.ia_connect;"),
        [],
        |row| row.get(0),
    )
}

/// Rewrites the link orders of one model in `schema` to `0..n`.
///
/// Links with a rowid up to `copied_after` keep their place ahead of links
/// copied in later; each group keeps its `(order_id, rowid)` order. Returns
/// the number of rows whose order changed.
pub(crate) fn compact_link_orders(
    conn: &Connection,
    schema: &str,
    model_value: i64,
    copied_after: i64,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(&format!(
        "SELECT rowid, order_id FROM {schema}.ia_connect
         WHERE model_value = ?1
         ORDER BY rowid > ?2 ASC, order_id ASC, rowid ASC;"
    ))?;
    let rows = stmt
        .query_map(params![model_value, copied_after], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut changed = 0;
    for (position, (rowid, order)) in (0_i64..).zip(rows) {
        if order != position {
            changed += conn.execute(
                &format!("UPDATE {schema}.ia_connect SET order_id = ?1 WHERE rowid = ?2;"),
                params![position, rowid],
            )?;
        }
    }
    if changed > 0 {
        info!(
            "event=link_compact module=repo status=ok schema={} model_value={} reordered={}",
            schema, model_value, changed
        );
    }
    Ok(changed)
}
