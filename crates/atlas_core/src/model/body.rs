//! Model record and its sentence-bearing projection.
//!
//! # Responsibility
//! - Hold the stored fields of one anatomical model.
//! - Provide name helpers for the parenthesized gender-neutral variant.
//! - Pair a record with its ordered sentences and paragraph view.
//!
//! # Invariants
//! - `BodyModel::paragraph()` is always derived from `sentences`; there is
//!   no separately stored paragraph.

use crate::model::identifier::{Classification, Gender, ModelValue};
use crate::model::sentence::Sentence;
use crate::text::paragraph::{join_sentences, merge_sentences};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NEUTRAL_VARIANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"（[^（）]*）").expect("valid neutral variant regex"));

/// Stored fields of one model (`info` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub value: ModelValue,
    pub name: String,
    /// Parent model value. `None` for roots (stored as NULL or 0).
    pub parent_value: Option<i64>,
}

impl ModelRecord {
    pub fn new(value: ModelValue, name: impl Into<String>, parent_value: Option<i64>) -> Self {
        Self {
            value,
            name: name.into(),
            parent_value: parent_value.filter(|parent| *parent != 0),
        }
    }

    pub fn classification(&self) -> Classification {
        self.value.classification()
    }

    pub fn gender(&self) -> Gender {
        self.value.gender()
    }

    /// Name with the parenthesized gender variant removed.
    pub fn neutral_name(&self) -> String {
        neutral_name(&self.name)
    }

    /// List label in `"<value> <name>"` form.
    pub fn label(&self) -> String {
        format!("{} {}", self.value.display_label(), self.name)
    }
}

/// Removes the first full-width parenthesized group from `name`.
pub fn neutral_name(name: &str) -> String {
    NEUTRAL_VARIANT_RE.replacen(name, 1, "").trim().to_string()
}

/// Converts ASCII parentheses to the full-width form used in names.
pub fn normalize_name(name: &str) -> String {
    name.trim().replace('(', "（").replace(')', "）")
}

/// Returns whether a normalized name carries at most one balanced
/// full-width parenthesized group.
pub fn has_well_formed_variant(name: &str) -> bool {
    let open = name.matches('（').count();
    let close = name.matches('）').count();
    if open != close || open > 1 {
        return false;
    }
    match (name.find('（'), name.find('）')) {
        (Some(start), Some(end)) => start < end,
        _ => true,
    }
}

/// Model record together with its ordered sentences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyModel {
    pub record: ModelRecord,
    sentences: Vec<Sentence>,
}

impl BodyModel {
    pub fn new(record: ModelRecord, sentences: Vec<Sentence>) -> Self {
        Self { record, sentences }
    }

    pub fn value(&self) -> ModelValue {
        self.record.value
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Paragraph view of the current sentence list.
    pub fn paragraph(&self) -> String {
        join_sentences(&self.sentences)
    }

    /// Appends sentences not yet present. Returns how many were added.
    pub fn merge(&mut self, incoming: &[Sentence]) -> usize {
        merge_sentences(&mut self.sentences, incoming)
    }
}
