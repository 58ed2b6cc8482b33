//! End-to-end scenarios over the engine facade

use chrono::Utc;
use presage_core::{
    MemoryContext, MemoryEngine, MemoryItem, MemoryQuery, MemoryType, PredictionType,
    PreloadCache, RetrievalStrategy,
};

fn item(
    content: &str,
    kind: MemoryType,
    project: &str,
    user: &str,
    tags: &[&str],
    importance: f64,
) -> MemoryItem {
    MemoryItem::new(content, kind)
        .with_context(MemoryContext::for_project_user(project, user))
        .with_tags(tags.to_vec())
        .with_importance(importance)
}

async fn seeded_engine() -> MemoryEngine {
    let engine = MemoryEngine::builder().build();

    engine
        .store_item(item(
            "Python function for calculating Fibonacci numbers",
            MemoryType::Code,
            "math_lib",
            "alice",
            &["python", "fibonacci", "math"],
            0.8,
        ))
        .await
        .unwrap();
    engine
        .store_item(item(
            "Meeting notes about API design decisions",
            MemoryType::Conversation,
            "api_service",
            "bob",
            &["meeting", "api", "design"],
            0.9,
        ))
        .await
        .unwrap();
    engine
        .store_item(item(
            "Documentation for REST API endpoints",
            MemoryType::Document,
            "api_service",
            "alice",
            &["documentation", "api", "rest"],
            0.7,
        ))
        .await
        .unwrap();

    engine
}

#[tokio::test]
async fn semantic_query_surfaces_fibonacci_item() {
    let engine = seeded_engine().await;

    let query = MemoryQuery::new("fibonacci calculation")
        .with_strategy(RetrievalStrategy::Semantic)
        .with_similarity_threshold(0.1)
        .with_max_results(5);
    let results = engine.retrieve(&query).await.unwrap();

    assert!(
        results
            .iter()
            .any(|r| r.item.content.contains("Fibonacci")),
        "expected the fibonacci item among {} results",
        results.len()
    );
}

#[tokio::test]
async fn importance_strategy_returns_strictly_descending() {
    let engine = MemoryEngine::builder().build();
    for (content, importance) in [
        ("deploy checklist", 0.9),
        ("sprint retro notes", 0.7),
        ("lunch menu", 0.6),
    ] {
        engine
            .store_item(item(
                content,
                MemoryType::Text,
                "ops",
                "alice",
                &[],
                importance,
            ))
            .await
            .unwrap();
    }

    let query = MemoryQuery::new("anything")
        .with_strategy(RetrievalStrategy::Importance)
        .with_max_results(3);
    let results = engine.retrieve(&query).await.unwrap();

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].item.importance > pair[1].item.importance);
    }
}

#[tokio::test]
async fn sequence_accesses_predict_the_next_item() {
    let engine = seeded_engine().await;
    let context = MemoryContext::for_project_user("math_lib", "alice");

    let predictor = engine.loader().predictor();
    let now = Utc::now();
    for (offset, id) in ["item-a", "item-b", "item-c"].iter().enumerate() {
        predictor
            .learn_from_access(
                id,
                &context,
                now - chrono::Duration::minutes(3 - offset as i64),
                "alice",
            )
            .unwrap();
    }

    let recent = vec!["item-a".to_string(), "item-b".to_string()];
    let predictions = predictor.predict(&context, "alice", &recent, now).unwrap();

    let next_item = predictions
        .iter()
        .find(|p| p.kind == PredictionType::NextItem)
        .expect("a next-item prediction");
    assert!(next_item.predicted_ids.contains(&"item-c".to_string()));
    assert!((0.0..=1.0).contains(&next_item.confidence));
}

#[tokio::test]
async fn preload_cache_evicts_oldest_on_overflow() {
    let cache = PreloadCache::new(5);
    let base = Utc::now();

    for i in 0..6 {
        let mut entry = MemoryItem::new(format!("cached content {i}"), MemoryType::Text);
        entry.id = format!("cached-{i}");
        cache
            .insert(entry, base + chrono::Duration::seconds(i))
            .unwrap();
    }

    assert_eq!(cache.len().unwrap(), 5);
    assert!(!cache.contains("cached-0").unwrap());
    assert!(cache.contains("cached-5").unwrap());
}

#[tokio::test]
async fn deleted_item_leaves_no_trace_in_indexes() {
    let engine = MemoryEngine::builder().build();
    let id = engine
        .store_item(item(
            "ephemeral tagged note",
            MemoryType::Text,
            "atlas",
            "alice",
            &["ephemeral"],
            0.5,
        ))
        .await
        .unwrap();

    engine.delete(&id).await.unwrap();

    assert!(engine.store().ids_with_tag("ephemeral").unwrap().is_empty());
    assert!(engine
        .store()
        .ids_with_context_key("project:atlas")
        .unwrap()
        .is_empty());

    let mut query = MemoryQuery::new("ephemeral tagged note").with_max_results(5);
    query.filters.tags = vec!["ephemeral".to_string()];
    let results = engine.retrieve(&query).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn identical_queries_within_ttl_are_idempotent() {
    let engine = seeded_engine().await;
    let context = MemoryContext::for_project_user("api_service", "alice");

    let query = MemoryQuery::new("api documentation")
        .with_context(context)
        .with_strategy(RetrievalStrategy::Hybrid)
        .with_similarity_threshold(0.1)
        .with_max_results(5);

    let first = engine.retrieve(&query).await.unwrap();
    let second = engine.retrieve(&query).await.unwrap();

    let first_ids: Vec<&str> = first.iter().map(|r| r.item.id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|r| r.item.id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn confidences_stay_in_bounds_across_the_loop() {
    let engine = seeded_engine().await;
    let context = MemoryContext::for_project_user("api_service", "alice");

    let query = MemoryQuery::new("api design")
        .with_context(context.clone())
        .with_similarity_threshold(0.1)
        .with_max_results(5);
    let results = engine.retrieve(&query).await.unwrap();
    for result in &results {
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!((0.0..=1.0).contains(&result.total_score));
    }

    let report = engine.predict_needs(&context).await.unwrap();
    for prediction in &report.predictions {
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }
}
