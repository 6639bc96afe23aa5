// tests/ranking_pipeline.rs
//
// End-to-end runs of the ranking engine against an in-memory store, using
// the deterministic mock classifier.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use product_ranking_engine::classify::{MockClassifier, SentimentClassifier};
use product_ranking_engine::config::RankingConfig;
use product_ranking_engine::engine::RankingEngine;
use product_ranking_engine::model::{
    AnswerValue, Product, ProductSignals, SentimentLabel, SurveyResponse,
};
use product_ranking_engine::store::SnapshotStore;

fn response(days_ago: i64, rating: f64, comment: &str) -> SurveyResponse {
    let mut answers = BTreeMap::new();
    answers.insert("nps_rating".to_string(), AnswerValue::Number(rating));
    if !comment.is_empty() {
        answers.insert("comment".to_string(), AnswerValue::Text(comment.to_string()));
    }
    SurveyResponse {
        submitted_at: Utc::now() - Duration::days(days_ago),
        answers,
    }
}

fn product_signals(id: &str, category: &str, rating: f64, count: usize) -> ProductSignals {
    ProductSignals {
        product: Product {
            id: id.into(),
            name: format!("Product {id}"),
            category: Some(category.into()),
        },
        responses: (0..count)
            .map(|i| response(i as i64 % 6, rating, "works well and I use it every day"))
            .collect(),
    }
}

fn engine_with_store() -> (RankingEngine, Arc<SnapshotStore>) {
    let store = Arc::new(SnapshotStore::in_memory());
    let engine = RankingEngine::new(
        RankingConfig::default(),
        Arc::new(MockClassifier),
        Arc::clone(&store),
    );
    (engine, store)
}

#[tokio::test]
async fn fifteen_eligible_products_truncate_to_top_ten() {
    let (engine, store) = engine_with_store();
    // Spread ratings so scores differ; all 15 clear the eligibility gate.
    let batch: Vec<_> = (0..15)
        .map(|i| {
            let rating = if i < 8 { 9.0 } else { 3.0 };
            product_signals(&format!("p-{i:02}"), "tools", rating, 6)
        })
        .collect();

    let summary = engine.run(batch).await;
    assert!(!summary.has_failures());

    let snapshot = store.get_current("tools").expect("snapshot written");
    assert_eq!(snapshot.rankings.len(), 10);
    assert_eq!(snapshot.total_products_evaluated, 15);
    for (i, entry) in snapshot.rankings.iter().enumerate() {
        assert_eq!(entry.rank, i as u32 + 1);
    }
    for pair in snapshot.rankings.windows(2) {
        assert!(pair[0].score >= pair[1].score, "not sorted descending");
    }
}

#[tokio::test]
async fn scores_stay_bounded_and_consistent_with_breakdown() {
    let (engine, store) = engine_with_store();
    let batch = vec![
        product_signals("p-happy", "tools", 10.0, 30),
        product_signals("p-mixed", "tools", 7.0, 8),
        product_signals("p-sad", "tools", 1.0, 25),
    ];
    engine.run(batch).await;

    let snapshot = store.get_current("tools").expect("snapshot written");
    assert_eq!(snapshot.rankings.len(), 3);
    for entry in &snapshot.rankings {
        assert!((0.0..=1.0).contains(&entry.score), "score out of bounds");
        let b = &entry.score_breakdown;
        let pre = b.nps + b.sentiment + b.engagement + b.volume + b.recency + b.trend;
        assert!(pre <= 1.0 + 1e-9, "pre-multiplier sum above 1");
        assert!(entry.score <= pre + 1e-9, "multiplier should damp, not boost");
    }
}

#[tokio::test]
async fn rerun_overwrites_the_same_week_wholesale() {
    let (engine, store) = engine_with_store();
    engine
        .run(vec![
            product_signals("p-old", "tools", 9.0, 6),
            product_signals("p-gone", "tools", 8.0, 6),
        ])
        .await;
    engine.run(vec![product_signals("p-new", "tools", 9.0, 6)]).await;

    let history = store.get_history("tools", None);
    assert_eq!(history.len(), 1, "same week must hold a single snapshot");
    let current = store.get_current("tools").unwrap();
    assert_eq!(current.rankings.len(), 1);
    assert_eq!(current.rankings[0].product_id, "p-new");
}

#[tokio::test]
async fn one_failing_classification_does_not_disqualify_a_product() {
    // Fails on one specific fragment, succeeds elsewhere.
    struct FlakyClassifier;
    #[async_trait]
    impl SentimentClassifier for FlakyClassifier {
        async fn classify(&self, text: &str) -> Option<SentimentLabel> {
            if text.contains("unclassifiable") {
                None
            } else {
                Some(SentimentLabel::Positive)
            }
        }
        fn provider_name(&self) -> &'static str {
            "flaky"
        }
    }

    let store = Arc::new(SnapshotStore::in_memory());
    let engine = RankingEngine::new(
        RankingConfig::default(),
        Arc::new(FlakyClassifier),
        Arc::clone(&store),
    );

    let mut signals = product_signals("p-1", "tools", 9.0, 6);
    signals.responses.push(response(1, 9.0, "somehow entirely unclassifiable feedback"));
    engine.run(vec![signals]).await;

    let snapshot = store.get_current("tools").expect("snapshot written");
    assert_eq!(snapshot.rankings.len(), 1, "product must still be ranked");
    let metrics = &snapshot.rankings[0].metrics;
    assert_eq!(metrics.sentiment_breakdown.neutral, 1);
    assert_eq!(metrics.sentiment_breakdown.positive, 6);
}

#[tokio::test]
async fn frozen_metrics_ride_along_in_the_snapshot() {
    let (engine, store) = engine_with_store();
    engine.run(vec![product_signals("p-1", "tools", 9.0, 12)]).await;

    let snapshot = store.get_current("tools").unwrap();
    let entry = &snapshot.rankings[0];
    assert_eq!(entry.metrics.product_id, entry.product_id);
    assert_eq!(entry.metrics.total_responses, 12);
    assert_eq!(entry.metrics.category, "tools");
    assert!(entry.metrics.has_minimum_data);
}
