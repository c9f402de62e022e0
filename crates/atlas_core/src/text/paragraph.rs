//! Paragraph splitting and joining.
//!
//! # Invariants
//! - Sentences are separated by `。` followed by a line break.
//! - `split_paragraph(join_sentences(s)) == s` for any non-empty `s` whose
//!   texts contain no delimiter.
//! - Splitting never deduplicates; repeated text yields repeated sentences.

use crate::model::sentence::Sentence;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Sentence terminator.
pub const TERMINATOR: char = '。';
/// Boundary searched for when splitting.
pub const SENTENCE_DELIMITER: &str = "。\n";
/// Separator written between sentences when joining.
pub const JOIN_SEPARATOR: &str = "。\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphError {
    /// Paragraph has no sentence content.
    EmptyParagraph,
}

impl Display for ParagraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyParagraph => write!(f, "paragraph is blank"),
        }
    }
}

impl Error for ParagraphError {}

/// Splits a paragraph into ordered sentences.
///
/// Fragments that are blank after trimming are skipped. The last fragment
/// loses one trailing terminator, so `"A。\n\nB。"` splits into `A`, `B`.
///
/// # Errors
/// - `EmptyParagraph` when the text is blank or no fragment survives.
pub fn split_paragraph(text: &str) -> Result<Vec<Sentence>, ParagraphError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParagraphError::EmptyParagraph);
    }

    let mut fragments = trimmed.split(SENTENCE_DELIMITER).peekable();
    let mut sentences = Vec::new();
    while let Some(fragment) = fragments.next() {
        let fragment = if fragments.peek().is_none() {
            let tail = fragment.trim_end();
            tail.strip_suffix(TERMINATOR).unwrap_or(tail)
        } else {
            fragment
        };
        // Blank fragments come from doubled delimiters and are dropped.
        if let Ok(sentence) = Sentence::new(fragment) {
            sentences.push(sentence);
        }
    }

    if sentences.is_empty() {
        return Err(ParagraphError::EmptyParagraph);
    }
    Ok(sentences)
}

/// Joins sentences into paragraph text with a trailing terminator.
pub fn join_sentences(sentences: &[Sentence]) -> String {
    if sentences.is_empty() {
        return String::new();
    }
    let mut paragraph = sentences
        .iter()
        .map(Sentence::text)
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR);
    paragraph.push(TERMINATOR);
    paragraph
}

/// Appends each sentence whose text does not already occur in `paragraph`.
pub fn append_sentences_to_paragraph(paragraph: &str, sentences: &[Sentence]) -> String {
    let mut result = paragraph.to_string();
    for sentence in sentences {
        if result.contains(sentence.text()) {
            continue;
        }
        result.push('\n');
        result.push_str(sentence.text());
        result.push_str(SENTENCE_DELIMITER);
    }
    result
}

/// Appends a raw block of text on its own line.
pub fn append_text_to_paragraph(paragraph: &str, text: &str) -> String {
    let block = text.trim();
    if block.is_empty() {
        return paragraph.to_string();
    }
    if paragraph.is_empty() {
        return block.to_string();
    }
    format!("{paragraph}\n{block}")
}

/// Appends incoming sentences that are not already in `existing`.
///
/// Returns the number of sentences added.
pub fn merge_sentences(existing: &mut Vec<Sentence>, incoming: &[Sentence]) -> usize {
    let mut added = 0;
    for sentence in incoming {
        if existing.iter().any(|current| current.hash() == sentence.hash()) {
            continue;
        }
        existing.push(sentence.clone());
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use super::{
        append_sentences_to_paragraph, append_text_to_paragraph, join_sentences,
        merge_sentences, split_paragraph, ParagraphError,
    };
    use crate::model::sentence::Sentence;

    fn sentences(texts: &[&str]) -> Vec<Sentence> {
        texts.iter().map(|text| Sentence::new(text).unwrap()).collect()
    }

    fn texts(sentences: &[Sentence]) -> Vec<&str> {
        sentences.iter().map(Sentence::text).collect()
    }

    #[test]
    fn blank_paragraph_is_rejected() {
        assert_eq!(split_paragraph(""), Err(ParagraphError::EmptyParagraph));
        assert_eq!(split_paragraph(" \n\n "), Err(ParagraphError::EmptyParagraph));
        assert_eq!(split_paragraph("。\n。"), Err(ParagraphError::EmptyParagraph));
    }

    #[test]
    fn single_sentence_with_terminator() {
        let split = split_paragraph("Hello。\n").unwrap();
        assert_eq!(texts(&split), vec!["Hello"]);
    }

    #[test]
    fn last_fragment_without_terminator_is_kept_whole() {
        let split = split_paragraph("第一句。\n第二句").unwrap();
        assert_eq!(texts(&split), vec!["第一句", "第二句"]);
    }

    #[test]
    fn blank_fragments_are_skipped_and_duplicates_kept() {
        let split = split_paragraph("A。\n。\n\n  。\nA。\n\nB。").unwrap();
        assert_eq!(texts(&split), vec!["A", "A", "B"]);
    }

    #[test]
    fn inline_terminator_without_line_break_does_not_split() {
        let split = split_paragraph("甲。乙。\n丙。").unwrap();
        assert_eq!(texts(&split), vec!["甲。乙", "丙"]);
    }

    #[test]
    fn join_uses_blank_line_and_trailing_terminator() {
        assert_eq!(join_sentences(&[]), "");
        assert_eq!(join_sentences(&sentences(&["A", "B"])), "A。\n\nB。");
    }

    #[test]
    fn join_after_split_is_idempotent() {
        let raw = "  股骨是人体最长的骨。\n  \n它位于大腿。\n。\n\n远端连接膝关节  ";
        let first = join_sentences(&split_paragraph(raw).unwrap());
        let second = join_sentences(&split_paragraph(&first).unwrap());
        assert_eq!(first, "股骨是人体最长的骨。\n\n它位于大腿。\n\n远端连接膝关节。");
        assert_eq!(first, second);
    }

    #[test]
    fn append_skips_text_already_present() {
        let paragraph = "A。\n\nB。";
        let appended = append_sentences_to_paragraph(paragraph, &sentences(&["B", "C"]));
        assert_eq!(appended, "A。\n\nB。\nC。\n");
        assert_eq!(texts(&split_paragraph(&appended).unwrap()), vec!["A", "B", "C"]);
    }

    #[test]
    fn append_text_adds_block_on_new_line() {
        assert_eq!(append_text_to_paragraph("A。", "  旧信息  "), "A。\n旧信息");
        assert_eq!(append_text_to_paragraph("", "旧信息"), "旧信息");
        assert_eq!(append_text_to_paragraph("A。", "   "), "A。");
    }

    #[test]
    fn merge_appends_only_unknown_sentences() {
        let mut existing = sentences(&["A", "B"]);
        let added = merge_sentences(&mut existing, &sentences(&["B", "C", "C"]));
        assert_eq!(added, 1);
        assert_eq!(texts(&existing), vec!["A", "B", "C"]);
    }
}
