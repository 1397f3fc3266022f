//! ONNX Runtime entity tagger for token-classification models.
//!
//! The model directory holds `model.onnx`, `tokenizer.json` and the
//! Hugging Face `config.json` whose `id2label` names the output classes
//! (e.g. a BERT NER model exported with `optimum`). Text is tagged one
//! sentence at a time and the BIO tags are merged into spans.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use glean_core::text::{is_blank, sentences};
use glean_core::types::Entity;
use ort::session::Session;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::bio::{self, BioTag, TaggedToken};
use crate::entities::{EntityTagger, TaggedSpan};
use crate::onnx::{ModelInputs, load_model, model_name};

/// Longest sentence the tagger sees, in model tokens.
const MAX_TOKENS: usize = 512;

/// Sentences per session run.
const SENTENCE_BATCH: usize = 32;

pub struct OnnxTagger {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    /// `labels[class]` is the tag for output class `class`.
    labels: Vec<BioTag>,
    name: String,
}

impl OnnxTagger {
    /// Load a model from a directory containing `model.onnx`, `tokenizer.json`
    /// and `config.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let config_path = model_dir.join("config.json");
        let (session, tokenizer) = load_model(model_dir, MAX_TOKENS)?;

        let config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let labels = parse_id2label(&config)
            .with_context(|| format!("reading id2label from {}", config_path.display()))?;

        let name = model_name(model_dir);
        info!(model = %model_dir.display(), classes = labels.len(), "loaded entity model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            name,
        })
    }

    /// Tag a batch of sentences; spans are relative to each sentence.
    fn tag_sentences(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<TaggedSpan>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let inputs = ModelInputs::new(&encodings);
        let (batch_size, classes) = (inputs.batch_size, self.labels.len());

        // Logits: [batch_size, seq_len, classes].
        let (dims, logits) = inputs.run(&self.session)?;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[2] as usize == classes,
            "unexpected output shape: {dims:?}, expected [{batch_size}, _, {classes}]"
        );
        let seq_len = dims[1] as usize;

        let mut out = Vec::with_capacity(batch_size);
        for (i, encoding) in encodings.iter().enumerate() {
            let offsets = encoding.get_offsets();
            let words = encoding.get_word_ids();
            let tokens: Vec<TaggedToken<'_>> = (0..offsets.len().min(seq_len))
                .map(|j| {
                    let row = &logits[(i * seq_len + j) * classes..][..classes];
                    TaggedToken {
                        start: offsets[j].0,
                        end: offsets[j].1,
                        word: words.get(j).copied().flatten(),
                        tag: &self.labels[argmax(row)],
                    }
                })
                .collect();
            out.push(bio::merge(&tokens));
        }
        Ok(out)
    }
}

impl EntityTagger for OnnxTagger {
    fn name(&self) -> &str {
        &self.name
    }

    fn tag(&self, text: &str) -> anyhow::Result<Vec<Entity>> {
        if is_blank(text) {
            return Ok(Vec::new());
        }

        let spans = sentences(text);
        let mut entities = Vec::new();
        for chunk in spans.chunks(SENTENCE_BATCH) {
            let texts: Vec<&str> = chunk.iter().map(|s| s.slice(text)).collect();
            let tagged = self.tag_sentences(&texts)?;
            for (sentence, found) in chunk.iter().zip(tagged) {
                for span in found {
                    let (start, end) = (sentence.start + span.start, sentence.start + span.end);
                    if let Some(surface) = text.get(start..end) {
                        entities.push(Entity::new(surface, span.label));
                    }
                }
            }
        }
        debug!(sentences = spans.len(), entities = entities.len(), "tagged");
        Ok(entities)
    }
}

/// Class index to tag, from a Hugging Face `config.json`.
fn parse_id2label(config: &str) -> anyhow::Result<Vec<BioTag>> {
    let config: serde_json::Value = serde_json::from_str(config)?;
    let id2label = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .context("missing id2label object")?;

    let mut labels = vec![None; id2label.len()];
    for (id, label) in id2label {
        let index: usize = id.parse().with_context(|| format!("class id {id:?}"))?;
        let label = label
            .as_str()
            .with_context(|| format!("label for class {index} is not a string"))?;
        let slot = labels
            .get_mut(index)
            .with_context(|| format!("class id {index} out of range"))?;
        *slot = Some(BioTag::parse(label));
    }
    labels
        .into_iter()
        .enumerate()
        .map(|(i, tag)| tag.with_context(|| format!("no label for class {i}")))
        .collect()
}

fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn model_dir() -> Option<PathBuf> {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("bert-base-NER");
        dir.join("model.onnx").exists().then_some(dir)
    }

    #[test]
    fn id2label_in_class_order() {
        let labels = parse_id2label(
            r#"{"id2label": {"1": "B-PER", "0": "O", "2": "I-PER", "3": "B-LOC"}}"#,
        )
        .unwrap();
        assert_eq!(
            labels,
            vec![
                BioTag::Outside,
                BioTag::Begin("PERSON".into()),
                BioTag::Inside("PERSON".into()),
                BioTag::Begin("LOC".into()),
            ]
        );
    }

    #[test]
    fn id2label_gaps_are_errors() {
        assert!(parse_id2label(r#"{"id2label": {"0": "O", "2": "B-PER"}}"#).is_err());
        assert!(parse_id2label(r#"{"label2id": {}}"#).is_err());
    }

    #[test]
    fn argmax_picks_largest_logit() {
        assert_eq!(argmax(&[0.1, 2.5, -1.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn missing_model_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxTagger::load(dir.path()).err().unwrap();
        assert!(err.to_string().contains("model.onnx not found"));
    }

    #[test]
    fn tags_when_model_present() {
        // Export dslim/bert-base-NER to models/bert-base-NER to run this.
        let Some(dir) = model_dir() else {
            return;
        };
        let tagger = OnnxTagger::load(&dir).unwrap();
        let entities = tagger
            .tag("The President of France visited Berlin. Angela Merkel met him.")
            .unwrap();
        assert!(entities.contains(&Entity::new("Berlin", "LOC")));
        assert!(entities.contains(&Entity::new("Angela Merkel", "PERSON")));
    }
}
