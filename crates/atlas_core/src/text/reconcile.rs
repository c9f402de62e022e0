//! Association reconciliation for one model.
//!
//! # Responsibility
//! - Compare the stored `(hash, order)` links of a model with a new ordered
//!   sentence list and describe the minimal set of changes.
//!
//! # Invariants
//! - Matching is by content hash only.
//! - Equal hashes consume the first unmatched stored occurrence.
//! - A hash is linked at most once per model, at its first position in the
//!   new list; resulting orders are dense `0..n`.
//! - Planning is pure; applying the plan is the repository's job.

use crate::model::identifier::ModelValue;
use crate::model::sentence::{Sentence, SentenceHash};
use std::collections::{HashMap, HashSet, VecDeque};

/// One stored association row of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingLink {
    pub hash: SentenceHash,
    pub order: u32,
}

/// Stored link that survives the save, possibly at a new position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptLink {
    pub hash: SentenceHash,
    pub from_order: u32,
    pub to_order: u32,
}

impl KeptLink {
    pub fn is_reordered(&self) -> bool {
        self.from_order != self.to_order
    }
}

/// Link to create. The sentence row itself is stored only when its hash is
/// not yet known store-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub sentence: Sentence,
    pub order: u32,
}

/// Changes needed to make a model's links match a sentence list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub model_value: ModelValue,
    pub kept: Vec<KeptLink>,
    pub inserted: Vec<NewLink>,
    pub removed: Vec<ExistingLink>,
}

impl ReconcilePlan {
    /// Returns true when applying the plan would not touch storage.
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty()
            && self.removed.is_empty()
            && self.kept.iter().all(|link| !link.is_reordered())
    }

    /// Number of links the model has after the plan is applied.
    pub fn link_count(&self) -> usize {
        self.kept.len() + self.inserted.len()
    }

    pub fn reordered(&self) -> impl Iterator<Item = &KeptLink> {
        self.kept.iter().filter(|link| link.is_reordered())
    }
}

/// Computes the plan turning `existing` into `sentences` for one model.
///
/// An empty `sentences` list plans removal of every link; callers decide
/// whether a blank paragraph should reach this point at all.
pub fn reconcile_associations(
    model_value: ModelValue,
    sentences: &[Sentence],
    existing: &[ExistingLink],
) -> ReconcilePlan {
    let mut stored = existing.to_vec();
    stored.sort_by_key(|link| link.order);

    let mut positions: HashMap<&SentenceHash, VecDeque<usize>> = HashMap::new();
    for (index, link) in stored.iter().enumerate() {
        positions.entry(&link.hash).or_default().push_back(index);
    }

    let mut matched = vec![false; stored.len()];
    let mut placed: HashSet<&SentenceHash> = HashSet::new();
    let mut kept = Vec::new();
    let mut inserted = Vec::new();
    let mut next_order: u32 = 0;

    for sentence in sentences {
        if !placed.insert(sentence.hash()) {
            continue;
        }

        let hit = positions
            .get_mut(sentence.hash())
            .and_then(VecDeque::pop_front);
        match hit {
            Some(index) => {
                matched[index] = true;
                kept.push(KeptLink {
                    hash: sentence.hash().clone(),
                    from_order: stored[index].order,
                    to_order: next_order,
                });
            }
            None => inserted.push(NewLink {
                sentence: sentence.clone(),
                order: next_order,
            }),
        }
        next_order += 1;
    }

    let removed = stored
        .iter()
        .zip(matched.iter())
        .filter(|(_, matched)| !**matched)
        .map(|(link, _)| link.clone())
        .collect();

    ReconcilePlan {
        model_value,
        kept,
        inserted,
        removed,
    }
}
