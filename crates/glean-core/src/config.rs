//! Service configuration.
//!
//! Every setting is both a command-line flag and an environment variable, so
//! the service can be configured the same way in a shell or a container.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use clap::Args;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid bind address {host}:{port}")]
    BindAddress { host: String, port: u16 },
    #[error("{name} must be at least 1")]
    Zero { name: &'static str },
    #[error("keyphrase n-gram range {min}..={max} is empty")]
    NgramRange { min: usize, max: usize },
    #[error("{name} must be within 0.0..=1.0, got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },
}

/// Settings for the HTTP service and the models it loads.
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// HTTP worker threads (defaults to the number of CPUs).
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Documents processed per batch request; extra documents are dropped.
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = 20)]
    pub max_batch_size: usize,

    /// Word budget applied to the input before summarization.
    #[arg(long, env = "MAX_TEXT_LENGTH", default_value_t = 1500)]
    pub max_text_length: usize,

    /// Directory with `model.onnx` and `tokenizer.json`. Unset uses the hashing encoder.
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<PathBuf>,

    /// Dimension of the hashing encoder.
    #[arg(long, env = "EMBEDDING_DIM", default_value_t = 384)]
    pub embedding_dim: usize,

    /// Token-classification model directory (`model.onnx`, `tokenizer.json`,
    /// `config.json`). Unset uses the rule tagger.
    #[arg(long, env = "NER_MODEL")]
    pub ner_model: Option<PathBuf>,

    /// JSON file of extra entity phrases for the rule tagger: `{"LABEL": ["phrase", ...]}`.
    #[arg(long, env = "GAZETTEER_PATH")]
    pub gazetteer_path: Option<PathBuf>,

    #[command(flatten)]
    pub keyphrase: KeyphraseConfig,

    #[command(flatten)]
    pub summary: SummaryConfig,
}

/// Keyphrase extraction settings.
#[derive(Debug, Clone, Args)]
pub struct KeyphraseConfig {
    /// Keyphrases returned per document.
    #[arg(long = "keyphrase-top-n", env = "KEYPHRASE_TOP_N", default_value_t = 10)]
    pub top_n: usize,

    /// Shortest candidate, in words.
    #[arg(long = "keyphrase-ngram-min", env = "KEYPHRASE_NGRAM_MIN", default_value_t = 1)]
    pub ngram_min: usize,

    /// Longest candidate, in words.
    #[arg(long = "keyphrase-ngram-max", env = "KEYPHRASE_NGRAM_MAX", default_value_t = 3)]
    pub ngram_max: usize,

    /// Rank with Maximal Marginal Relevance instead of plain similarity.
    #[arg(
        long = "keyphrase-use-mmr",
        env = "KEYPHRASE_USE_MMR",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub use_mmr: bool,

    /// MMR diversity: 0 ranks by relevance only, 1 by novelty only.
    #[arg(long = "keyphrase-diversity", env = "KEYPHRASE_DIVERSITY", default_value_t = 0.5)]
    pub diversity: f32,
}

impl Default for KeyphraseConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            ngram_min: 1,
            ngram_max: 3,
            use_mmr: true,
            diversity: 0.5,
        }
    }
}

/// Extractive summary settings.
#[derive(Debug, Clone, Args)]
pub struct SummaryConfig {
    /// Sentences per summary.
    #[arg(long = "summary-sentences", env = "SUMMARY_SENTENCES", default_value_t = 3)]
    pub sentences: usize,

    /// MMR trade-off: 1 ranks by relevance only, 0 by novelty only.
    #[arg(long = "summary-lambda", env = "SUMMARY_LAMBDA", default_value_t = 0.7)]
    pub lambda: f32,

    /// Sentences shorter than this are only used when nothing else is left.
    #[arg(long = "summary-min-words", env = "SUMMARY_MIN_WORDS", default_value_t = 4)]
    pub min_sentence_words: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            sentences: 3,
            lambda: 0.7,
            min_sentence_words: 4,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            workers: None,
            max_batch_size: 20,
            max_text_length: 1500,
            embedding_model: None,
            embedding_dim: 384,
            ner_model: None,
            gazetteer_path: None,
            keyphrase: KeyphraseConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Resolved bind address. Host names such as `localhost` are allowed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::BindAddress {
                host: self.host.clone(),
                port: self.port,
            })
    }

    /// Worker count, falling back to the available parallelism.
    pub fn worker_count(&self) -> usize {
        self.workers.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Reject settings the models cannot work with. The bind address is
    /// checked separately by [`ServiceConfig::bind_addr`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_batch_size", self.max_batch_size),
            ("max_text_length", self.max_text_length),
            ("embedding_dim", self.embedding_dim),
            ("keyphrase_top_n", self.keyphrase.top_n),
            ("keyphrase_ngram_min", self.keyphrase.ngram_min),
            ("summary_sentences", self.summary.sentences),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }
        if self.keyphrase.ngram_max < self.keyphrase.ngram_min {
            return Err(ConfigError::NgramRange {
                min: self.keyphrase.ngram_min,
                max: self.keyphrase.ngram_max,
            });
        }
        unit_range("keyphrase_diversity", self.keyphrase.diversity)?;
        unit_range("summary_lambda", self.summary.lambda)?;
        Ok(())
    }
}

fn unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ServiceConfig,
    }

    fn parse(args: &[&str]) -> ServiceConfig {
        let mut argv = vec!["glean"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--max-batch-size",
            "5",
            "--keyphrase-top-n",
            "4",
            "--keyphrase-use-mmr",
            "false",
            "--summary-sentences",
            "2",
        ]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_batch_size, 5);
        assert_eq!(config.keyphrase.top_n, 4);
        assert!(!config.keyphrase.use_mmr);
        assert_eq!(config.summary.sentences, 2);
        assert!(config.ner_model.is_none());
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn ner_model_flag() {
        let config = parse(&["--ner-model", "models/bert-base-NER"]);
        assert_eq!(
            config.ner_model,
            Some(PathBuf::from("models/bert-base-NER"))
        );
    }

    #[test]
    fn default_matches_clap_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_batch_size, 20);
        assert_eq!(config.max_text_length, 1500);
        assert_eq!(config.keyphrase.ngram_max, 3);
        assert!(config.keyphrase.use_mmr);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_workers_win() {
        let config = ServiceConfig {
            workers: Some(3),
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 3);

        let auto = ServiceConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert!(auto.worker_count() >= 1);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = ServiceConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                name: "max_batch_size"
            })
        );
    }

    #[test]
    fn inverted_ngram_range_rejected() {
        let mut config = ServiceConfig::default();
        config.keyphrase.ngram_min = 3;
        config.keyphrase.ngram_max = 2;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NgramRange { min: 3, max: 2 })
        );
    }

    #[test]
    fn diversity_out_of_range_rejected() {
        let mut config = ServiceConfig::default();
        config.keyphrase.diversity = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { name: "keyphrase_diversity", .. })
        ));
    }

    #[test]
    fn bad_host_only_fails_the_bind() {
        let config = ServiceConfig {
            host: "not a host".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.bind_addr(),
            Err(ConfigError::BindAddress { .. })
        ));
    }
}
