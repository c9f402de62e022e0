//! Sentence value type and content hash.
//!
//! # Invariants
//! - Sentence text is trimmed and never empty.
//! - `hash` is the SHA-256 hex digest of the trimmed UTF-8 text; two
//!   sentences with equal text are the same entity.
//! - Sentences are immutable once built.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Content-addressed identity of a sentence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentenceHash(String);

impl SentenceHash {
    /// Wraps a digest read back from storage or an import file.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SentenceHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the identity hash of `text` after trimming.
pub fn content_hash(text: &str) -> SentenceHash {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    SentenceHash(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceError {
    /// Text is empty after trimming.
    Blank,
}

impl Display for SentenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "sentence text must not be blank"),
        }
    }
}

impl Error for SentenceError {}

/// One deduplicated unit of descriptive text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sentence {
    text: String,
    hash: SentenceHash,
}

impl Sentence {
    /// Builds a sentence from raw text, trimming surrounding whitespace.
    ///
    /// # Errors
    /// - `SentenceError::Blank` when nothing remains after trimming.
    pub fn new(text: impl AsRef<str>) -> Result<Self, SentenceError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SentenceError::Blank);
        }
        Ok(Self {
            text: trimmed.to_string(),
            hash: content_hash(trimmed),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> &SentenceHash {
        &self.hash
    }

    /// Character count of the text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

impl TryFrom<String> for Sentence {
    type Error = SentenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sentence> for String {
    fn from(value: Sentence) -> Self {
        value.text
    }
}

impl Display for Sentence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::{content_hash, Sentence, SentenceError};

    #[test]
    fn new_trims_and_rejects_blank() {
        let sentence = Sentence::new("  肱骨位于上臂  ").unwrap();
        assert_eq!(sentence.text(), "肱骨位于上臂");
        assert_eq!(sentence.char_count(), 6);
        assert_eq!(Sentence::new(" \n\t").unwrap_err(), SentenceError::Blank);
    }

    #[test]
    fn hash_is_deterministic_and_ignores_outer_whitespace() {
        let a = Sentence::new("Hello").unwrap();
        let b = Sentence::new("\nHello  ").unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
        assert_eq!(a.hash().as_str().len(), 64);
        assert_eq!(
            content_hash("Hello").as_str(),
            "185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969"
        );
    }

    #[test]
    fn distinct_text_yields_distinct_hash() {
        let a = Sentence::new("Hello").unwrap();
        let b = Sentence::new("Hello.").unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn deserialize_rejects_blank_text() {
        let err = serde_json::from_value::<Sentence>(serde_json::json!("   ")).unwrap_err();
        assert!(err.to_string().contains("blank"));
    }
}
