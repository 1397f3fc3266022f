//! Combines the models into one request-to-annotation step.

use std::sync::Arc;

use anyhow::Context;
use glean_core::config::{KeyphraseConfig, ServiceConfig, SummaryConfig};
use glean_core::text::is_blank;
use glean_core::types::{AnnotateRequest, Annotation};
use tracing::{debug, info};
#[cfg(feature = "onnx")]
use tracing::warn;

use crate::encoder::{HashingEncoder, TextEncoder};
use crate::entities::{EntityTagger, RuleTagger};
use crate::gazetteer::Gazetteer;
use crate::keyphrases::KeyphraseExtractor;
use crate::summarizer::Summarizer;

/// Entity tagger, keyphrase extractor, summarizer and encoder, loaded once
/// and shared read-only across requests.
pub struct Annotator {
    tagger: Box<dyn EntityTagger>,
    keyphrases: KeyphraseExtractor,
    summarizer: Summarizer,
    encoder: Arc<dyn TextEncoder>,
}

impl Annotator {
    pub fn new(
        tagger: Box<dyn EntityTagger>,
        encoder: Arc<dyn TextEncoder>,
        keyphrase: KeyphraseConfig,
        summary: SummaryConfig,
        max_text_length: usize,
    ) -> Self {
        Self {
            tagger,
            keyphrases: KeyphraseExtractor::new(Arc::clone(&encoder), keyphrase),
            summarizer: Summarizer::new(Arc::clone(&encoder), summary, max_text_length),
            encoder,
        }
    }

    /// Load every model named by the configuration.
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let encoder = load_encoder(config)?;
        let tagger = load_tagger(config)?;

        info!(
            tagger = tagger.name(),
            encoder = encoder.name(),
            dim = encoder.dim(),
            max_text_length = config.max_text_length,
            "annotator ready"
        );
        Ok(Self::new(
            tagger,
            encoder,
            config.keyphrase.clone(),
            config.summary.clone(),
            config.max_text_length,
        ))
    }

    pub fn encoder(&self) -> &dyn TextEncoder {
        self.encoder.as_ref()
    }

    pub fn annotate(&self, request: &AnnotateRequest) -> anyhow::Result<Annotation> {
        if is_blank(&request.text) {
            return Ok(Annotation::empty_for(request));
        }
        let document = self.encoder.encode(&request.text)?;
        self.annotate_with_document(request, document)
    }

    /// Annotate at most `max_batch_size` documents; `result[i]` belongs to `requests[i]`.
    pub fn annotate_batch(
        &self,
        requests: &[AnnotateRequest],
        max_batch_size: usize,
    ) -> anyhow::Result<Vec<Annotation>> {
        let requests = &requests[..requests.len().min(max_batch_size)];
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = requests
            .iter()
            .filter(|r| !is_blank(&r.text))
            .map(|r| r.text.as_str())
            .collect();
        let mut documents = self.encoder.encode_batch(&texts)?.into_iter();
        anyhow::ensure!(
            documents.len() == texts.len(),
            "{} returned {} vectors for {} documents",
            self.encoder.name(),
            documents.len(),
            texts.len()
        );

        let mut results = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            if is_blank(&request.text) {
                results.push(Annotation::empty_for(request));
                continue;
            }
            let document = documents
                .next()
                .context("document embedding missing")?;
            let annotation = self
                .annotate_with_document(request, document)
                .with_context(|| format!("annotating document {i}"))?;
            results.push(annotation);
        }

        debug!(documents = results.len(), "annotated batch");
        Ok(results)
    }

    fn annotate_with_document(
        &self,
        request: &AnnotateRequest,
        document: Vec<f32>,
    ) -> anyhow::Result<Annotation> {
        let text = request.text.as_str();
        let entities = self.tagger.tag(text).context("tagging entities")?;
        let keyphrases = self
            .keyphrases
            .extract_with_document(text, &document)
            .context("extracting keyphrases")?
            .into_iter()
            .map(|k| k.phrase)
            .collect();
        let summary = if request.needs_summary {
            Some(self.summarizer.summarize(text).context("summarizing")?)
        } else {
            None
        };
        let embedding = request.needs_embedding.then_some(document);

        Ok(Annotation {
            entities,
            keyphrases,
            summary,
            embedding,
        })
    }
}

/// The entity tagger named by the configuration: ONNX when `ner_model` is set,
/// otherwise the rule tagger over the built-in and configured gazetteer.
pub fn load_tagger(config: &ServiceConfig) -> anyhow::Result<Box<dyn EntityTagger>> {
    match &config.ner_model {
        #[cfg(feature = "onnx")]
        Some(dir) => {
            if config.gazetteer_path.is_some() {
                warn!("GAZETTEER_PATH only applies to the rule tagger; ignored with NER_MODEL");
            }
            let tagger = crate::ner::OnnxTagger::load(dir)
                .with_context(|| format!("loading entity model from {}", dir.display()))?;
            Ok(Box::new(tagger))
        }
        #[cfg(not(feature = "onnx"))]
        Some(dir) => anyhow::bail!(
            "NER_MODEL={} set but glean was built without the `onnx` feature",
            dir.display()
        ),
        None => {
            let mut gazetteer = Gazetteer::builtin();
            if let Some(path) = &config.gazetteer_path {
                gazetteer.extend_from_file(path)?;
            }
            let tagger = RuleTagger::new(gazetteer).context("building entity tagger")?;
            Ok(Box::new(tagger))
        }
    }
}

/// The encoder named by the configuration: ONNX when `embedding_model` is set,
/// otherwise the hashing encoder.
pub fn load_encoder(config: &ServiceConfig) -> anyhow::Result<Arc<dyn TextEncoder>> {
    match &config.embedding_model {
        #[cfg(feature = "onnx")]
        Some(dir) => {
            let encoder = crate::onnx::OnnxEncoder::load(dir)
                .with_context(|| format!("loading embedding model from {}", dir.display()))?;
            Ok(Arc::new(encoder))
        }
        #[cfg(not(feature = "onnx"))]
        Some(dir) => anyhow::bail!(
            "EMBEDDING_MODEL={} set but glean was built without the `onnx` feature",
            dir.display()
        ),
        None => Ok(Arc::new(HashingEncoder::new(config.embedding_dim))),
    }
}
