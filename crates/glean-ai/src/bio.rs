//! BIO tag decoding for token-classification models.
//!
//! A model predicts one tag per sub-word token (`B-PER`, `I-PER`, `O`, ...).
//! [`merge`] turns those into entity spans over the source text: a word takes
//! the tag of its first piece, `I-X` continues an open `X` span, and anything
//! else closes it. Labels are mapped onto the OntoNotes names the rule tagger
//! uses, so callers see the same label set whichever tagger is loaded.

use crate::entities::TaggedSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BioTag {
    Outside,
    Begin(String),
    Inside(String),
}

impl BioTag {
    /// Parse a model label such as `B-PER`, `I-ORG`, `O`, or a bare `LOC`
    /// (IO tagging, treated as inside).
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label == "O" {
            return Self::Outside;
        }
        match label.split_once(['-', '_']) {
            Some(("B" | "S", entity)) => Self::Begin(ontonotes_label(entity)),
            Some(("I" | "E", entity)) => Self::Inside(ontonotes_label(entity)),
            _ => Self::Inside(ontonotes_label(label)),
        }
    }
}

/// CoNLL names to OntoNotes names; OntoNotes labels pass through.
fn ontonotes_label(entity: &str) -> String {
    match entity.to_ascii_uppercase().as_str() {
        "PER" | "PERS" => "PERSON".to_string(),
        other => other.to_string(),
    }
}

/// One tokenizer token with its predicted tag.
#[derive(Debug, Clone, Copy)]
pub struct TaggedToken<'a> {
    /// Byte range in the source text.
    pub start: usize,
    pub end: usize,
    /// Word index; `None` for special tokens such as `[CLS]`.
    pub word: Option<u32>,
    pub tag: &'a BioTag,
}

/// Merge tagged tokens into non-overlapping spans in document order.
pub fn merge(tokens: &[TaggedToken<'_>]) -> Vec<TaggedSpan> {
    let mut spans = Vec::new();
    let mut current: Option<TaggedSpan> = None;
    let mut prev_word = None;

    for token in tokens {
        if token.word.is_none() || token.end <= token.start {
            continue;
        }
        let continues_word = prev_word.is_some() && token.word == prev_word;
        prev_word = token.word;

        if continues_word {
            if let Some(span) = current.as_mut() {
                span.end = span.end.max(token.end);
            }
            continue;
        }

        match token.tag {
            BioTag::Outside => spans.extend(current.take()),
            BioTag::Inside(label) if current.as_ref().is_some_and(|s| s.label == *label) => {
                if let Some(span) = current.as_mut() {
                    span.end = token.end;
                }
            }
            BioTag::Begin(label) | BioTag::Inside(label) => {
                spans.extend(current.take());
                current = Some(TaggedSpan {
                    start: token.start,
                    end: token.end,
                    label: label.clone(),
                });
            }
        }
    }
    spans.extend(current);
    spans
}
