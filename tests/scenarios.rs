//! End-to-end scenarios, literal inputs and expected outputs.

use std::sync::Arc;

use vecthare::backend::InMemoryVectorBackend;
use vecthare::hashing::cache::reset_global_cache;
use vecthare::hashing::splitter::hash_text;
use vecthare::host::InMemoryChatHost;
use vecthare::pipeline::{PipelineSettings, RetrievalPipeline};
use vecthare::registry::{CollectionMeta, InMemoryMetadataStore, MetadataStore};
use vecthare::sync::SyncEngine;
use vecthare::types::{ChatMessage, Chunk, ChunkMetadata, GenerationType, Keyword};

fn chat_msg(text: &str, message_id: i64) -> ChatMessage {
    let mut extra = std::collections::HashMap::new();
    extra.insert("messageId".to_string(), serde_json::json!(message_id));
    ChatMessage {
        mes: text.to_string(),
        name: "Bot".into(),
        is_user: false,
        is_system: false,
        swipes: vec![],
        extra,
    }
}

fn chunk(hash: u32, text: &str, message_id: i64) -> Chunk {
    let mut metadata = ChunkMetadata::default();
    metadata.source = "chat".to_string();
    metadata.message_id = Some(message_id);
    Chunk {
        hash,
        text: text.to_string(),
        index: 0,
        metadata,
        score: None,
    }
}

/// S1. Basic recall — threshold drops the weakest candidate, the other two
/// are injected in score order.
#[tokio::test]
async fn s1_basic_recall() {
    reset_global_cache();
    let host = Arc::new(
        InMemoryChatHost::new()
        .with_chat_id("u1")
        .with_messages((8..=15).map(|i| chat_msg(&format!("filler message {i}"), i)).collect()),
    );
    let backend = Arc::new(InMemoryVectorBackend::new());
    backend.seed(
        "vh:chat:u1",
        vec![
            chunk(hash_text("Aria found the blue key in the garden"), "Aria found the blue key in the garden", 3),
            chunk(hash_text("They ate dinner silently"), "They ate dinner silently", 5),
            chunk(hash_text("The tower was locked"), "The tower was locked", 7),
        ],
    );
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let mut meta = CollectionMeta::new_default("chat", "u1");
    meta.temporal_decay.enabled = false;
    metadata.set_collection_meta("vh:chat:u1", &meta).unwrap();

    let pipeline = RetrievalPipeline::new(host, backend, metadata);
    let mut settings = PipelineSettings::default();
    settings.insert = 5;
    settings.score_threshold = 0.25;
    settings.protect = 4;
    settings.template = "Relevant: {{text}}".to_string();

    let outcome = pipeline.run(&settings, GenerationType::Normal).await.unwrap();
    assert!(outcome.injected);
    assert!(outcome.injected_text.starts_with("Relevant: "));
    assert!(outcome.injected_text.contains("Aria found the blue key in the garden"));
    assert!(outcome.injected_text.contains("The tower was locked"));
    assert!(!outcome.injected_text.contains("ate dinner silently"));
}

/// S2. Keyword boost surfacing — the keyword-carrying chunk overtakes a
/// higher vector-similarity candidate once boosted.
#[tokio::test]
async fn s2_keyword_boost_surfacing() {
    reset_global_cache();
    let host = Arc::new(
        InMemoryChatHost::new()
        .with_chat_id("u1")
        .with_messages((0..10).map(|i| chat_msg(&format!("filler {i}"), i)).collect()),
    );
    let backend = Arc::new(InMemoryVectorBackend::new());
    let mut y = chunk(hash_text("a magic trick happened here"), "a magic trick happened here", 2);
    y.metadata.keywords = vec![Keyword { text: "magic".into(), weight: 2.0 }];
    let x = chunk(hash_text("an ordinary unrelated event occurred"), "an ordinary unrelated event occurred", 3);
    backend.seed("vh:chat:u1", vec![x, y]);
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let mut meta = CollectionMeta::new_default("chat", "u1");
    meta.temporal_decay.enabled = false;
    metadata.set_collection_meta("vh:chat:u1", &meta).unwrap();

    let pipeline = RetrievalPipeline::new(host, backend, metadata);
    let mut settings = PipelineSettings::default();
    settings.score_threshold = 0.0;
    settings.protect = 2;

    let outcome = pipeline.run(&settings, GenerationType::Normal).await.unwrap();
    let magic_pos = outcome.injected_text.find("a magic trick").unwrap();
    let ordinary_pos = outcome.injected_text.find("ordinary unrelated").unwrap();
    assert!(magic_pos < ordinary_pos, "boosted chunk should be injected first");
}

/// S3. Dedup against live context — a chunk whose text is already live in
/// the chat is skipped, not injected.
#[tokio::test]
async fn s3_dedup_against_live_context() {
    reset_global_cache();
    let live_text = "the watchtower fell silent at dusk";
    let host = Arc::new(
        InMemoryChatHost::new().with_chat_id("u1").with_messages(
            (0..10)
            .map(|i| chat_msg(if i == 9 { live_text } else { "unrelated filler text" }, i))
            .collect(),
        ),
    );
    let backend = Arc::new(InMemoryVectorBackend::new());
    backend.seed(
        "vh:chat:u1",
        vec![
            chunk(hash_text(live_text), live_text, 2),
            chunk(hash_text("a fresh detail never mentioned before"), "a fresh detail never mentioned before", 3),
        ],
    );
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let mut meta = CollectionMeta::new_default("chat", "u1");
    meta.temporal_decay.enabled = false;
    metadata.set_collection_meta("vh:chat:u1", &meta).unwrap();

    let pipeline = RetrievalPipeline::new(host, backend, metadata);
    let mut settings = PipelineSettings::default();
    settings.score_threshold = 0.0;
    settings.protect = 2;

    let outcome = pipeline.run(&settings, GenerationType::Normal).await.unwrap();
    assert!(!outcome.injected_text.contains(live_text));
    assert!(outcome.injected_text.contains("a fresh detail never mentioned before"));
}

/// S5. Activation priority — a regex trigger match wins without evaluating
/// a `randomChance(0)` condition that would otherwise always fail.
#[tokio::test]
async fn s5_trigger_wins_without_evaluating_conditions() {
    use vecthare::activation::is_active;
    use vecthare::conditions::{ConditionRule, ConditionSet, Logic};
    use vecthare::types::SearchContext;

    let mut meta = CollectionMeta::new_default("chat", "lore");
    meta.triggers = vec!["/ruin/i".to_string()];
    meta.trigger_scan_depth = 3;
    meta.conditions = ConditionSet {
        enabled: true,
        logic: Some(Logic::And),
        rules: vec![ConditionRule::RandomChance { probability: 0.0, negate: false }],
    };

    let ctx = SearchContext {
        recent_messages: vec![chat_msg("they spoke of the ruin beyond the hills", 1)],
        ..Default::default()
    };

    let reason = is_active(&meta, &ctx, &[], None);
    assert!(reason.activated());
}

/// S6. Sync incremental — batch size 1 drains a two-item queue over two
/// calls, then a third call reports nothing left to do.
#[tokio::test]
async fn s6_sync_incremental() {
    reset_global_cache();
    let backend = Arc::new(InMemoryVectorBackend::new());
    backend.seed(
        "vh:chat:u1",
        vec![chunk(hash_text("first message"), "first message", 1), chunk(hash_text("second message"), "second message", 2)],
    );
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let engine = SyncEngine::new(backend, metadata);

    let mut settings = PipelineSettings::default();
    settings.batch_size = 1;

    let messages = vec![
        chat_msg("first message", 1),
        chat_msg("second message", 2),
        chat_msg("third message", 3),
        chat_msg("fourth message", 4),
    ];

    let first = engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
    assert_eq!(first.remaining, 1);
    assert_eq!(first.messages_processed, 1);
    assert!(first.chunks_created >= 1);

    let second = engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
    assert_eq!(second.remaining, 0);
    assert_eq!(second.messages_processed, 1);
    assert!(second.chunks_created >= 1);

    let third = engine.sync_batch("vh:chat:u1", &messages, &settings).await.unwrap();
    assert_eq!(third.remaining, 0);
    assert_eq!(third.messages_processed, 0);
    assert_eq!(third.chunks_created, 0);
}

/// Pipeline completeness law: every candidate hash that survives the
/// per-collection query lands in exactly one terminal bucket.
#[tokio::test]
async fn pipeline_completeness_every_candidate_gets_a_fate() {
    reset_global_cache();
    let host = Arc::new(
        InMemoryChatHost::new()
        .with_chat_id("u1")
        .with_messages((0..8).map(|i| chat_msg(&format!("filler {i}"), i)).collect()),
    );
    let backend = Arc::new(InMemoryVectorBackend::new());
    backend.seed(
        "vh:chat:u1",
        vec![
            chunk(hash_text("a relevant detail about keys"), "a relevant detail about keys", 2),
            chunk(hash_text("a weak match"), "a weak match", 3),
        ],
    );
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let mut meta = CollectionMeta::new_default("chat", "u1");
    meta.temporal_decay.enabled = false;
    metadata.set_collection_meta("vh:chat:u1", &meta).unwrap();

    let pipeline = RetrievalPipeline::new(host, backend, metadata);
    let mut settings = PipelineSettings::default();
    settings.score_threshold = 0.0;
    settings.protect = 2;

    pipeline.run(&settings, GenerationType::Normal).await.unwrap();

    let trace = vecthare::pipeline::trace::last_search_debug().unwrap();
    assert!(!trace.chunk_fates.is_empty());
    for fates in trace.chunk_fates.values() {
        assert!(!fates.is_empty());
    }
}
