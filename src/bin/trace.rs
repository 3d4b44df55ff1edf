//! Demo CLI: run one retrieval against the in-memory reference backend and
//! host, printing the published debug trace as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vecthare::backend::InMemoryVectorBackend;
use vecthare::host::InMemoryChatHost;
use vecthare::pipeline::{trace, PipelineSettings, RetrievalPipeline};
use vecthare::registry::{CollectionMeta, InMemoryMetadataStore, MetadataStore};
use vecthare::types::{ChatMessage, GenerationType};

#[derive(Parser)]
#[command(name = "vh-trace", about = "Run one retrieval and print its debug trace")]
struct Args {
    /// Path to a JSON file holding `{ "messages": [..], "settings": {..} }`.
    #[arg(long)]
    fixture: PathBuf,

    /// Chat/collection id to query against.
    #[arg(long, default_value = "vh:chat:demo")]
    chat_id: String,
}

#[derive(serde::Deserialize)]
struct Fixture {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    settings: Option<PipelineSettings>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(false))
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

    let args = Args::parse();
    let raw = std::fs::read_to_string(&args.fixture)?;
    let fixture: Fixture = serde_json::from_str(&raw)?;
    let settings = fixture.settings.unwrap_or_default();

    let host = Arc::new(
        InMemoryChatHost::new()
        .with_chat_id(args.chat_id.clone())
        .with_messages(fixture.messages),
    );
    let backend = Arc::new(InMemoryVectorBackend::new());
    let metadata = Arc::new(InMemoryMetadataStore::new());
    metadata.set_collection_meta(
        &format!("vh:chat:{}", args.chat_id),
        &CollectionMeta::new_default("chat", &args.chat_id),
    )?;

    let pipeline = RetrievalPipeline::new(host, backend, metadata);
    let outcome = pipeline.run(&settings, GenerationType::Normal).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
                    "injected": outcome.injected,
                    "text": outcome.injected_text,
                    "reason": outcome.reason,
                    "trace": trace::last_search_debug(),
        }))?
    );

    Ok(())
}
