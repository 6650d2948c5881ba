use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hydra_core::app::{RunnerOptions, StageRegistry, StageRunner, StoreBuilder, StoreStats};
use hydra_core::config::StoreConfig;
use hydra_core::impls::InMemoryAttachments;
use hydra_core::ports::{Stage, StageContext, StageError};
use hydra_core::{Document, DocumentWriter, DocumentReader, PipelineStatus};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Push documents through a word-count stage and tail the history store.
#[derive(Parser, Debug)]
#[command(name = "hydra", version)]
struct Cli {
    /// TOML store configuration.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Number of documents to insert.
    #[arg(long, default_value_t = 20)]
    documents: usize,

    /// Workers per stage.
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// History retention; falls back to `default_number_to_keep`, then 1000.
    #[arg(long)]
    keep: Option<u64>,
}

/// Counts words in the `text` field, or in the `body.txt` attachment when
/// there is no text. Empty input is discarded.
struct WordCount;

#[async_trait]
impl Stage for WordCount {
    fn name(&self) -> &str {
        "wordcount"
    }

    async fn process(&self, doc: &mut Document, ctx: &StageContext) -> Result<(), StageError> {
        let text = match doc.content_field("text").and_then(|v| v.as_str()) {
            Some(text) => text.to_string(),
            None => {
                let id = doc
                    .id()
                    .ok_or_else(|| StageError::Failed("document has no id".into()))?;
                let mut body = String::new();
                ctx.attachments()?
                    .file("body.txt", id)
                    .await?
                    .read_to_string(&mut body)
                    .await
                    .map_err(|e| StageError::Failed(format!("reading body.txt: {e}")))?;
                body
            }
        };

        let words = text.split_whitespace().count();
        if words == 0 {
            return Err(StageError::Discard("no words".into()));
        }
        doc.put_content_field("words", words);
        Ok(())
    }
}

#[derive(Serialize)]
struct TailLine {
    id: String,
    status: String,
    words: Option<u64>,
}

fn init_tracing() {
    let default_level = "info";
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => StoreConfig::from_path(path)?,
        None => StoreConfig::default(),
    };
    let keep = cli
        .keep
        .or(config.default_number_to_keep)
        .unwrap_or(1000);
    let options = RunnerOptions::from_config(&config, cli.workers.max(1));

    let store = StoreBuilder::new(config)
        .with_status(PipelineStatus::new(keep))
        .build()
        .await?;
    let mut tail = store.inactive_iterator().await?;

    let attachments = InMemoryAttachments::new();
    for n in 0..cli.documents {
        let mut doc = Document::new();
        doc.put_content_field("seq", n);
        match n % 7 {
            // empty input, discarded by the stage
            3 => {
                doc.put_content_field("text", "");
            }
            // text arrives as an attachment
            5 => {}
            _ => {
                doc.put_content_field("text", "the quick brown fox ".repeat(n % 4 + 1));
            }
        }
        let id = store.insert(&mut doc).await?;
        if n % 7 == 5 {
            attachments.put(id, "body.txt", "jumps over the lazy dog").await;
        }
    }
    info!(documents = cli.documents, "documents inserted");

    let mut registry = StageRegistry::new();
    registry.register(Arc::new(WordCount))?;
    let ctx = StageContext::new().with_attachments(Arc::new(attachments));
    let runner = StageRunner::spawn(Arc::new(store.clone()), &registry, ctx, options);

    let mut seen = 0;
    while seen < cli.documents {
        let next = match tokio::time::timeout(Duration::from_secs(10), tail.next()).await {
            Ok(next) => next,
            Err(_) => {
                warn!(seen, "timed out waiting for history");
                break;
            }
        };
        let Some(doc) = next else {
            break;
        };
        let line = TailLine {
            id: doc.id().map(|id| id.to_string()).unwrap_or_default(),
            status: doc.status().to_string(),
            words: doc.content_field("words").and_then(|v| v.as_u64()),
        };
        println!("{}", serde_json::to_string(&line)?);
        seen += 1;
    }

    tail.interrupt();
    if let Some(e) = tail.error() {
        warn!(error = %e, "history tail failed");
    }
    runner.shutdown_and_join().await;

    let stats = StoreStats::collect(&store).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
