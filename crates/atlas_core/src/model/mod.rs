//! Domain model for anatomical models and their descriptive sentences.
//!
//! # Responsibility
//! - Define the identifier codec, the sentence value type and the model
//!   record shared by repositories and services.
//!
//! # Invariants
//! - Every model is identified by a validated `ModelValue`.
//! - Sentences are identified by content hash, never by position.

pub mod body;
pub mod identifier;
pub mod sentence;
