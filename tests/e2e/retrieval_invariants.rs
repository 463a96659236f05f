//! Cross-cutting engine invariants: identity, determinism, durability, and
//! navigation-state persistence across engine restarts

use semem_core::prelude::*;
use semem_core::{InMemoryTripleStore, ModelConfig, TripleStore};
use serde_json::json;
use std::sync::Arc;

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.embedding.model = ModelConfig::custom("mock", 128);
    config
}

async fn engine_over(backend: Arc<InMemoryTripleStore>) -> Arc<SememEngine> {
    SememEngineBuilder::new(config())
        .triple_store(backend as Arc<dyn TripleStore>)
        .embedding_provider(Arc::new(MockEmbeddingProvider::new("mock", 128)))
        .chat_providers(vec![Arc::new(MockChatProvider::new("primary"))])
        .build()
        .await
        .expect("engine builds")
}

#[tokio::test]
async fn stored_interactions_are_retrievable_by_id() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend.clone()).await;

    let told = engine
        .execute(
            VerbRequest::new("tell", json!({"content": "Durable fact about zinc."}))
                .with_session("writer"),
        )
        .await;
    let id = told.result.unwrap()["id"].as_str().unwrap().to_string();

    // Immediately visible in the same process, before any flush
    let same_session = engine
        .execute(
            VerbRequest::new("inspect", json!({"type": "memory", "target": id}))
                .with_session("writer"),
        )
        .await;
    assert!(same_session.success);

    // Visible from another session too
    let other_session = engine
        .execute(
            VerbRequest::new("inspect", json!({"type": "memory", "target": id}))
                .with_session("reader"),
        )
        .await;
    assert!(other_session.success);

    // After a flush, a fresh engine over the same backend sees it
    engine.flush().await.unwrap();
    let restarted = engine_over(backend).await;
    let across_restart = restarted
        .execute(VerbRequest::new(
            "inspect",
            json!({"type": "memory", "target": id}),
        ))
        .await;
    assert!(across_restart.success, "{across_restart:?}");
}

#[tokio::test]
async fn ask_is_deterministic_for_fixed_state() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend).await;

    for fact in [
        "Honey never spoils because of its low water content.",
        "Octopuses have three hearts and blue blood.",
        "Glass is an amorphous solid, not a slow liquid.",
    ] {
        engine
            .execute(VerbRequest::new("tell", json!({"content": fact})))
            .await;
    }

    let args = json!({"question": "why does honey never spoil?"});
    let first = engine
        .execute(VerbRequest::new("ask", args.clone()))
        .await;
    let second = engine.execute(VerbRequest::new("ask", args)).await;

    let a = first.result.unwrap();
    let b = second.result.unwrap();
    assert_eq!(a["answer"], b["answer"]);
    let ids = |v: &serde_json::Value| -> Vec<String> {
        v["contextItems"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(ids(&a), ids(&b), "context ordering must be deterministic");
}

#[tokio::test]
async fn embeddings_match_the_configured_dimension() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend).await;

    let response = engine
        .execute(VerbRequest::new(
            "augment",
            json!({"target": "dimension check", "operation": "generate_embedding"}),
        ))
        .await;
    assert_eq!(response.result.unwrap()["dimension"], json!(128));
}

#[tokio::test]
async fn round_trip_concept_retrieval() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend).await;

    let told = engine
        .execute(VerbRequest::new(
            "tell",
            json!({"content": "Ferritin stores iron inside cells.", "type": "concept"}),
        ))
        .await;
    let id = told.result.unwrap()["id"].as_str().unwrap().to_string();

    let asked = engine
        .execute(VerbRequest::new(
            "ask",
            json!({"question": "What does ferritin store?"}),
        ))
        .await;
    let result = asked.result.unwrap();
    let item = result["contextItems"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["id"] == json!(id))
        .expect("the told interaction is retrieved");
    let concepts: Vec<&str> = item["concepts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert!(concepts.contains(&"ferritin"));
}

#[tokio::test]
async fn navigation_state_survives_engine_restart() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend.clone()).await;
    let session = "persistent-session";

    engine
        .execute(VerbRequest::new("zoom", json!({"level": "entity"})).with_session(session))
        .await;
    engine
        .execute(
            VerbRequest::new("pan", json!({"keywords": ["iron"]})).with_session(session),
        )
        .await;
    engine
        .execute(VerbRequest::new("tilt", json!({"style": "temporal"})).with_session(session))
        .await;

    let restarted = engine_over(backend).await;
    let state = restarted
        .execute(VerbRequest::new("state", json!({})).with_session(session))
        .await;
    let nav = state.result.unwrap();
    assert_eq!(nav["zoom"], json!("entity"));
    assert_eq!(nav["tilt"], json!("temporal"));
    assert_eq!(nav["pan"]["keywords"], json!(["iron"]));
}

#[tokio::test]
async fn degraded_store_still_serves_session_reads() {
    let backend = Arc::new(InMemoryTripleStore::new());
    backend.set_unavailable(true);
    let engine = engine_over(backend.clone()).await;
    assert!(engine.is_degraded());

    let told = engine
        .execute(VerbRequest::new(
            "tell",
            json!({"content": "Buffered while the store is down."}),
        ))
        .await;
    assert!(told.success, "{told:?}");
    let id = told.result.unwrap()["id"].as_str().unwrap().to_string();

    // Readable from the write buffer in degraded mode
    let inspected = engine
        .execute(VerbRequest::new(
            "inspect",
            json!({"type": "memory", "target": id}),
        ))
        .await;
    assert!(inspected.success);

    // Store recovers: flush drains and clears degradation
    backend.set_unavailable(false);
    engine.flush().await.unwrap();
    assert!(!engine.is_degraded());
    assert!(backend.len().await > 0);
}

#[tokio::test]
async fn warmup_rebuilds_the_index_from_the_store() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend.clone()).await;

    engine
        .execute(VerbRequest::new(
            "tell",
            json!({"content": "Warm cache fact: copper conducts well."}),
        ))
        .await;
    engine.flush().await.unwrap();

    // Cold start: the index is pure cache and begins empty
    let restarted = engine_over(backend).await;
    let indexed = restarted.warmup().await.unwrap();
    assert_eq!(indexed, 1);

    let asked = restarted
        .execute(VerbRequest::new(
            "ask",
            json!({"question": "what conducts well?"}),
        ))
        .await;
    let result = asked.result.unwrap();
    assert!(!result["contextItems"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sessions_do_not_share_navigation_state() {
    let backend = Arc::new(InMemoryTripleStore::new());
    let engine = engine_over(backend).await;

    engine
        .execute(VerbRequest::new("zoom", json!({"level": "unit"})).with_session("a"))
        .await;

    let other = engine
        .execute(VerbRequest::new("state", json!({})).with_session("b"))
        .await;
    assert_eq!(other.result.unwrap()["zoom"], json!("corpus"));
}
