//! Human-readable cards for annotations and enrichments.

use std::fmt::Write;

use glean_client::Enrichment;
use glean_core::types::Annotation;

const MAX_LIST_ITEMS: usize = 10;
const WRAP_WIDTH: usize = 78;
const EMBEDDING_PREVIEW: usize = 4;

// ── Public API ──

/// Render an annotation as a vertical card grouped by field.
pub fn annotation_card(title: &str, annotation: &Annotation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {title} ===");

    section(&mut out, "Entities", annotation.entities.len(), |out| {
        for e in annotation.entities.iter().take(MAX_LIST_ITEMS) {
            let _ = writeln!(out, "  {:<10} {}", e.label, e.text);
        }
    });
    numbered(&mut out, "Keyphrases", &annotation.keyphrases);
    if let Some(summary) = &annotation.summary {
        paragraph(&mut out, "Summary", summary);
    }
    if let Some(embedding) = &annotation.embedding {
        let preview: Vec<String> = embedding
            .iter()
            .take(EMBEDDING_PREVIEW)
            .map(|x| format!("{x:.4}"))
            .collect();
        let more = if embedding.len() > EMBEDDING_PREVIEW {
            ", …"
        } else {
            ""
        };
        let _ = writeln!(out, "Embedding");
        let _ = writeln!(
            out,
            "  {} dims [{}{more}]",
            embedding.len(),
            preview.join(", ")
        );
    }
    out
}

/// Render an enrichment the way an indexer would store it.
pub fn enrichment_card(title: &str, enrichment: &Enrichment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {title} ===");
    numbered(&mut out, "Entities", &enrichment.entities);
    numbered(&mut out, "Keywords", &enrichment.keywords);
    paragraph(&mut out, "Summary", &enrichment.summary);
    let _ = writeln!(out, "Enriched");
    let _ = writeln!(out, "  {}", enrichment.enriched_at.to_rfc3339());
    out
}

// ── Section rendering ──

fn section(out: &mut String, header: &str, len: usize, body: impl FnOnce(&mut String)) {
    if len == 0 {
        return;
    }
    let _ = writeln!(out, "{header} ({len})");
    body(out);
    if len > MAX_LIST_ITEMS {
        let _ = writeln!(out, "  … {} more", len - MAX_LIST_ITEMS);
    }
}

fn numbered(out: &mut String, header: &str, items: &[String]) {
    section(out, header, items.len(), |out| {
        for (i, item) in items.iter().take(MAX_LIST_ITEMS).enumerate() {
            let _ = writeln!(out, "  {:>2}. {item}", i + 1);
        }
    });
}

fn paragraph(out: &mut String, header: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    let _ = writeln!(out, "{header}");
    for line in wrap(text, WRAP_WIDTH - 2) {
        let _ = writeln!(out, "  {line}");
    }
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
