mod display;
mod logging;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use glean_ai::{Annotator, load_encoder};
use glean_client::{Batcher, BatcherConfig, DEFAULT_ENDPOINT, Enrichment, NlpClient};
use glean_core::config::ServiceConfig;
use glean_core::text::is_blank;
use glean_core::types::AnnotateRequest;
use tracing::info;

/// Lines embedded per encoder call.
const EMBED_BATCH_SIZE: usize = 256;

#[derive(Parser)]
#[command(
    name = "glean",
    version,
    about = "Entities, keyphrases, summaries and embeddings for raw text"
)]
struct Cli {
    /// Log as JSON lines.
    #[arg(long, global = true, env = "LOG_JSON")]
    json_logs: bool,

    /// Debug-level logging for glean crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[command(flatten)]
        config: ServiceConfig,
    },
    /// Annotate text in-process and print the result.
    Annotate {
        /// Text to annotate. Reads --file or stdin when omitted.
        text: Option<String>,
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// Skip the summary.
        #[arg(long)]
        no_summary: bool,
        /// Include the document embedding.
        #[arg(long)]
        embedding: bool,
        /// Print JSON instead of a card.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        config: ServiceConfig,
    },
    /// Embed one document per input line, writing JSON lines.
    Embed {
        /// Input file; stdin when omitted.
        #[arg(long, short)]
        input: Option<PathBuf>,
        /// Output file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        config: ServiceConfig,
    },
    /// Annotate through a running service, batching the inputs.
    Remote {
        /// Texts to annotate, one document each.
        #[arg(required = true)]
        texts: Vec<String>,
        #[arg(long, env = "NLP_SERVICE_URL", default_value = DEFAULT_ENDPOINT)]
        url: String,
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
        /// Milliseconds to wait before sending a partial batch.
        #[arg(long, default_value_t = 500)]
        batch_timeout_ms: u64,
        /// Print JSON instead of cards.
        #[arg(long)]
        json: bool,
    },
    /// Check a running service.
    Health {
        #[arg(long, env = "NLP_SERVICE_URL", default_value = DEFAULT_ENDPOINT)]
        url: String,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    match cli.command {
        Command::Serve { config } => serve(config).await,
        Command::Annotate {
            text,
            file,
            no_summary,
            embedding,
            json,
            config,
        } => {
            let text = read_input(text, file.as_deref())?;
            let request = AnnotateRequest::new(text)
                .with_summary(!no_summary)
                .with_embedding(embedding);
            annotate_local(&config, &request, json)
        }
        Command::Embed {
            input,
            output,
            config,
        } => embed(&config, input.as_deref(), output.as_deref()),
        Command::Remote {
            texts,
            url,
            batch_size,
            batch_timeout_ms,
            json,
        } => {
            let batcher = BatcherConfig {
                batch_size,
                batch_timeout: Duration::from_millis(batch_timeout_ms),
            };
            remote(&url, texts, batcher, json).await
        }
        Command::Health { url } => {
            let client = NlpClient::new(url.as_str())?;
            let status = client
                .health()
                .await
                .with_context(|| format!("checking {}", client.health_url()))?;
            println!("{}", status.status);
            Ok(())
        }
    }
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    config.validate()?;
    config.bind_addr()?;
    info!("glean v{}", env!("CARGO_PKG_VERSION"));

    let annotator = Arc::new(Annotator::from_config(&config).context("loading models")?);
    glean_server::server(&config, annotator)
        .context("binding HTTP server")?
        .await
        .context("running HTTP server")
}

fn annotate_local(
    config: &ServiceConfig,
    request: &AnnotateRequest,
    json: bool,
) -> anyhow::Result<()> {
    config.validate()?;
    let annotator = Annotator::from_config(config).context("loading models")?;

    let start = Instant::now();
    let annotation = annotator.annotate(request)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "annotated");

    if json {
        println!("{}", serde_json::to_string_pretty(&annotation)?);
    } else {
        print!("{}", display::annotation_card("annotation", &annotation));
    }
    Ok(())
}

fn embed(config: &ServiceConfig, input: Option<&Path>, output: Option<&Path>) -> anyhow::Result<()> {
    config.validate()?;
    let encoder = load_encoder(config)?;
    let start = Instant::now();

    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.context("reading input")?;
        if !is_blank(&line) {
            lines.push(line);
        }
    }
    eprintln!("  Read {} documents", lines.len());

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut processed = 0usize;
    for chunk in lines.chunks(EMBED_BATCH_SIZE) {
        let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
        let vectors = encoder
            .encode_batch(&refs)
            .context("generating embeddings")?;
        for (text, embedding) in chunk.iter().zip(vectors) {
            let row = serde_json::json!({ "text": text, "embedding": embedding });
            serde_json::to_writer(&mut writer, &row)?;
            writeln!(writer)?;
        }
        processed += chunk.len();
        eprint!("\r  Embedded {processed}/{}", lines.len());
    }
    writer.flush()?;

    let elapsed = start.elapsed().as_secs_f64();
    eprintln!(
        "\n  Done: {processed} documents, {} dims, {elapsed:.1}s ({})",
        encoder.dim(),
        encoder.name()
    );
    Ok(())
}

async fn remote(
    url: &str,
    texts: Vec<String>,
    config: BatcherConfig,
    json: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(NlpClient::new(url)?);
    let batcher = Batcher::spawn(Arc::clone(&client), config);

    let submissions = texts
        .iter()
        .map(|text| batcher.submit(AnnotateRequest::new(text.as_str())));
    let results = futures::future::join_all(submissions).await;
    batcher.shutdown().await;

    let mut failures = 0usize;
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(annotation) => {
                let enrichment = Enrichment::from_annotation(annotation, Utc::now());
                if json {
                    println!("{}", serde_json::to_string(&enrichment)?);
                } else {
                    print!("{}", display::enrichment_card(&format!("document {i}"), &enrichment));
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("document {i}: {e}");
            }
        }
    }
    anyhow::ensure!(failures == 0, "{failures} of {} documents failed", texts.len());
    Ok(())
}

fn read_input(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        (None, None) => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn remote_defaults() {
        let cli = Cli::try_parse_from(["glean", "remote", "some text"]).unwrap();
        match cli.command {
            Command::Remote {
                texts,
                batch_size,
                ..
            } => {
                assert_eq!(texts, vec!["some text".to_string()]);
                assert_eq!(batch_size, 10);
            }
            _ => panic!("expected remote"),
        }
    }

    #[test]
    fn annotate_flags() {
        let cli = Cli::try_parse_from([
            "glean",
            "annotate",
            "--no-summary",
            "--embedding",
            "--keyphrase-top-n",
            "5",
            "hello",
        ])
        .unwrap();
        match cli.command {
            Command::Annotate {
                text,
                no_summary,
                embedding,
                config,
                ..
            } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert!(no_summary);
                assert!(embedding);
                assert_eq!(config.keyphrase.top_n, 5);
            }
            _ => panic!("expected annotate"),
        }
    }

    #[test]
    fn text_argument_wins_over_file() {
        let text = read_input(Some("inline".into()), Some(Path::new("/nonexistent"))).unwrap();
        assert_eq!(text, "inline");
    }
}
