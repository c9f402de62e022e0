//! Paragraph ⇄ sentence reconciliation.
//!
//! # Responsibility
//! - Convert between the editable paragraph text and ordered sentences.
//! - Compute association changes when a model's sentence list is saved.

pub mod paragraph;
pub mod reconcile;
