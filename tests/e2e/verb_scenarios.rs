//! End-to-end verb scenarios against mock providers and the in-memory store

use semem_core::prelude::*;
use semem_core::{
    EnhancementProvider, EnhancementProviderKind, MockEnhancementProvider, ModelConfig,
};
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    engine: Arc<SememEngine>,
    chat_primary: Arc<MockChatProvider>,
    chat_secondary: Arc<MockChatProvider>,
    wikipedia: Arc<MockEnhancementProvider>,
    wikidata: Arc<MockEnhancementProvider>,
}

async fn fixture() -> Fixture {
    let mut config = EngineConfig::default();
    config.embedding.model = ModelConfig::custom("mock", 128);

    let chat_primary = Arc::new(MockChatProvider::new("primary"));
    let chat_secondary = Arc::new(MockChatProvider::new("secondary"));
    let wikipedia = Arc::new(MockEnhancementProvider::new(
        EnhancementProviderKind::Encyclopedic,
        "wikipedia",
    ));
    let wikidata = Arc::new(MockEnhancementProvider::new(
        EnhancementProviderKind::Factual,
        "wikidata",
    ));

    let engine = SememEngineBuilder::new(config)
        .embedding_provider(Arc::new(MockEmbeddingProvider::new("mock", 128)))
        .chat_providers(vec![chat_primary.clone(), chat_secondary.clone()])
        .enhancement_providers(vec![
            wikipedia.clone() as Arc<dyn EnhancementProvider>,
            wikidata.clone() as Arc<dyn EnhancementProvider>,
        ])
        .build()
        .await
        .expect("engine builds");

    Fixture {
        engine,
        chat_primary,
        chat_secondary,
        wikipedia,
        wikidata,
    }
}

#[tokio::test]
async fn s1_tell_small_then_ask() {
    let fx = fixture().await;
    let session = "s1";

    let told = fx
        .engine
        .execute(
            VerbRequest::new(
                "tell",
                json!({
                    "content": "Mitochondria produce ATP via cellular respiration.",
                    "type": "concept",
                }),
            )
            .with_session(session),
        )
        .await;
    assert!(told.success, "{told:?}");
    let told_result = told.result.unwrap();
    let id = told_result["id"].as_str().unwrap().to_string();
    assert_eq!(told_result["stored"], json!(true));
    assert_eq!(told_result["chunks"], json!(1));
    assert!(told_result["conceptsExtracted"].as_u64().unwrap() >= 2);

    let asked = fx
        .engine
        .execute(
            VerbRequest::new(
                "ask",
                json!({
                    "question": "How do cells produce energy?",
                    "mode": "standard",
                    "useContext": true,
                }),
            )
            .with_session(session),
        )
        .await;
    assert!(asked.success, "{asked:?}");
    let result = asked.result.unwrap();

    let answer = result["answer"].as_str().unwrap();
    assert!(answer.contains("ATP"), "answer should reference ATP: {answer}");

    let context_ids: Vec<&str> = result["contextItems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert!(context_ids.contains(&id.as_str()));
    assert_eq!(result["sourcesUsed"], json!(["personal"]));
}

#[tokio::test]
async fn s2_large_document_chunking() {
    let fx = fixture().await;
    let content = "Cellular respiration converts glucose into usable ATP energy. ".repeat(195);
    assert!(content.len() > 12_000);

    let told = fx
        .engine
        .execute(VerbRequest::new(
            "tell",
            json!({
                "content": content,
                "type": "document",
                "metadata": {"title": "X"},
            }),
        ))
        .await;
    assert!(told.success, "{told:?}");
    let chunks = told.result.unwrap()["chunks"].as_u64().unwrap() as usize;
    let expected = content.len().div_ceil(2000);
    assert!(
        chunks == expected || chunks == expected + 1,
        "expected about {expected} chunks, got {chunks}"
    );

    // Every chunk is indexed
    let inspected = fx
        .engine
        .execute(VerbRequest::new("inspect", json!({"type": "system"})))
        .await;
    let index_size = inspected.result.unwrap()["indexSize"].as_u64().unwrap() as usize;
    assert!(index_size >= chunks);

    // A retrieved chunk's text equals the declared slice of its parent
    let asked = fx
        .engine
        .execute(VerbRequest::new(
            "ask",
            json!({"question": "glucose ATP energy conversion"}),
        ))
        .await;
    let result = asked.result.unwrap();
    let chunk_item = result["contextItems"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["kind"] == json!("document-chunk"))
        .expect("a chunk should be retrieved");
    let chunk_id = chunk_item["id"].as_str().unwrap();

    let chunk_report = fx
        .engine
        .execute(VerbRequest::new(
            "inspect",
            json!({"type": "memory", "target": chunk_id}),
        ))
        .await;
    let report = chunk_report.result.unwrap();
    let offset = report["chunk"]["offset"].as_u64().unwrap() as usize;
    let length = report["chunk"]["length"].as_u64().unwrap() as usize;
    assert_eq!(report["prompt"].as_str().unwrap(), &content[offset..offset + length]);
}

#[tokio::test]
async fn s3_lazy_then_process() {
    let fx = fixture().await;
    let session = "s3";

    let told = fx
        .engine
        .execute(
            VerbRequest::new(
                "tell",
                json!({"content": "note A about tardigrade biology", "lazy": true}),
            )
            .with_session(session),
        )
        .await;
    assert!(told.success);
    let told_result = told.result.unwrap();
    let id = told_result["id"].as_str().unwrap().to_string();
    assert_eq!(told_result["lazy"], json!(true));

    // Local branch may miss the unprocessed note; the verb must still succeed
    let asked = fx
        .engine
        .execute(
            VerbRequest::new("ask", json!({"question": "what is note A about?"}))
                .with_session(session),
        )
        .await;
    assert!(asked.success);

    let augmented = fx
        .engine
        .execute(
            VerbRequest::new(
                "augment",
                json!({"target": "all", "operation": "process_lazy"}),
            )
            .with_session(session),
        )
        .await;
    assert!(augmented.success);
    assert_eq!(augmented.result.unwrap()["processed"], json!(1));

    // Now fully processed and retrievable
    let reasked = fx
        .engine
        .execute(
            VerbRequest::new(
                "ask",
                json!({"question": "tardigrade biology note"}),
            )
            .with_session(session),
        )
        .await;
    let result = reasked.result.unwrap();
    let ids: Vec<&str> = result["contextItems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&id.as_str()), "processed note should be found");
}

#[tokio::test]
async fn s4_enhancement_cache() {
    let fx = fixture().await;
    let args = json!({
        "question": "What organelle produces ATP?",
        "useWikipedia": true,
    });

    let first = fx
        .engine
        .execute(VerbRequest::new("ask", args.clone()))
        .await;
    assert!(first.success);
    assert_eq!(first.diagnostics.cache_hits.get("encyclopedic"), Some(&false));
    assert_eq!(fx.wikipedia.call_count(), 1);

    let second = fx
        .engine
        .execute(VerbRequest::new("ask", args))
        .await;
    assert!(second.success);
    assert_eq!(second.diagnostics.cache_hits.get("encyclopedic"), Some(&true));
    // No additional outbound provider call
    assert_eq!(fx.wikipedia.call_count(), 1);

    // Equivalent answers from identical records
    assert_eq!(
        first.result.unwrap()["answer"],
        second.result.unwrap()["answer"]
    );
}

#[tokio::test]
async fn s5_zpt_pan_filtering() {
    let fx = fixture().await;
    let session = "s5";

    for (domain, fact) in [
        ("a", "Alpha project uses a message queue for ingestion."),
        ("b", "Beta project uses a message queue for billing."),
        ("c", "Gamma project uses a message queue for logging."),
    ] {
        let told = fx
            .engine
            .execute(
                VerbRequest::new(
                    "tell",
                    json!({"content": fact, "metadata": {"domain": domain}}),
                )
                .with_session(session),
            )
            .await;
        assert!(told.success);
    }

    let panned = fx
        .engine
        .execute(
            VerbRequest::new("pan", json!({"domains": ["a"]})).with_session(session),
        )
        .await;
    assert!(panned.success);

    let asked = fx
        .engine
        .execute(
            VerbRequest::new(
                "ask",
                json!({"question": "which project uses a message queue?"}),
            )
            .with_session(session),
        )
        .await;
    assert!(asked.success);
    let result = asked.result.unwrap();
    let items = result["contextItems"].as_array().unwrap();
    assert!(!items.is_empty(), "domain-a items should be retrieved");
    for item in items {
        assert_eq!(item["domain"], json!("a"), "only domain-a items: {item}");
    }
}

#[tokio::test]
async fn s6_llm_provider_failover() {
    let fx = fixture().await;
    fx.chat_primary.set_failing(true);

    let told = fx
        .engine
        .execute(VerbRequest::new(
            "tell",
            json!({"content": "Failover fact: quorum needs three nodes.", "lazy": true}),
        ))
        .await;
    assert!(told.success);

    let asked = fx
        .engine
        .execute(VerbRequest::new(
            "ask",
            json!({"question": "How many nodes does quorum need?"}),
        ))
        .await;
    assert!(asked.success, "{asked:?}");
    assert_eq!(asked.diagnostics.llm_provider.as_deref(), Some("secondary"));
    assert!(fx.chat_secondary.call_count() > 0);

    // No half-written state: everything flushes cleanly
    fx.engine.flush().await.unwrap();
    let inspected = fx
        .engine
        .execute(VerbRequest::new("inspect", json!({"type": "system"})))
        .await;
    assert_eq!(inspected.result.unwrap()["pendingWrites"], json!(0));
}

#[tokio::test]
async fn failing_enhancement_provider_is_isolated() {
    let fx = fixture().await;
    fx.wikidata.set_failing(true);

    let asked = fx
        .engine
        .execute(VerbRequest::new(
            "ask",
            json!({
                "question": "What organelle produces ATP?",
                "useWikipedia": true,
                "useWikidata": true,
            }),
        ))
        .await;
    assert!(asked.success);
    let sources = asked.result.unwrap()["sourcesUsed"].clone();
    let sources: Vec<&str> = sources
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert!(sources.contains(&"encyclopedic"));
    assert!(!sources.contains(&"factual"));
}

#[tokio::test]
async fn chat_enhanced_reports_sources() {
    let fx = fixture().await;
    let response = fx
        .engine
        .execute(VerbRequest::new(
            "chat-enhanced",
            json!({
                "message": "Tell me about ATP synthesis",
                "enabledProviders": ["wikipedia"],
            }),
        ))
        .await;
    assert!(response.success, "{response:?}");
    let result = response.result.unwrap();
    assert!(result["response"].as_str().is_some());
    assert_eq!(result["sourcesUsed"], json!(["encyclopedic"]));
    assert_eq!(fx.wikidata.call_count(), 0);
}

#[tokio::test]
async fn hypothetical_expansion_is_never_cited() {
    let fx = fixture().await;
    fx.engine
        .execute(VerbRequest::new(
            "tell",
            json!({"content": "Chloroplasts capture light for photosynthesis."}),
        ))
        .await;

    let asked = fx
        .engine
        .execute(VerbRequest::new(
            "ask",
            json!({"question": "How is light captured?", "useHyDE": true}),
        ))
        .await;
    assert!(asked.success);
    let result = asked.result.unwrap();
    let sources = result["sourcesUsed"].as_array().unwrap();
    assert!(!sources.iter().any(|s| s == "hypothetical"));
    for item in result["contextItems"].as_array().unwrap() {
        assert_ne!(item["kind"], json!("enhancement"));
    }
}
