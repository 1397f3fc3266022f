//! Local text models: entity tagging, keyphrase extraction, extractive
//! summaries, and embeddings, combined by [`Annotator`].

pub mod annotator;
pub mod bio;
pub mod encoder;
pub mod entities;
pub mod gazetteer;
pub mod keyphrases;
pub mod mmr;
pub mod stopwords;
pub mod summarizer;

#[cfg(feature = "onnx")]
mod ner;
#[cfg(feature = "onnx")]
mod onnx;

pub use annotator::{Annotator, load_encoder, load_tagger};
pub use encoder::{HashingEncoder, TextEncoder};
pub use entities::{EntityTagger, RuleTagger, TaggedSpan};
pub use gazetteer::Gazetteer;
pub use keyphrases::{Keyphrase, KeyphraseExtractor};
#[cfg(feature = "onnx")]
pub use ner::OnnxTagger;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEncoder;
pub use stopwords::StopwordFilter;
pub use summarizer::Summarizer;
