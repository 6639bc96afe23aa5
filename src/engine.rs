//! # Ranking Engine
//! Batch orchestrator for one ranking run: partition the signal batch by
//! category, compute per-product metrics with a bounded worker pool inside
//! each category, score, filter, rank, and persist one snapshot per
//! (category, week). Categories are independent and run fully in parallel.
//!
//! A failed category surfaces in the `RunSummary` so the external scheduler
//! can retry or alert; it never aborts the other categories.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::calculator::MetricsCalculator;
use crate::classify::SharedClassifier;
use crate::config::RankingConfig;
use crate::eligibility::filter_eligible;
use crate::model::{ProductSignals, WeeklyRanking};
use crate::normalize;
use crate::ranking::generate_top_rankings;
use crate::store::SnapshotStore;
use crate::week;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ranking_runs_total", "Ranking batch runs started.");
        describe_counter!(
            "ranking_products_skipped_total",
            "Products excluded for missing a category."
        );
        describe_counter!(
            "ranking_category_failures_total",
            "Categories whose run failed (usually snapshot write)."
        );
        describe_counter!(
            "ranking_snapshots_written_total",
            "Weekly snapshots persisted."
        );
        describe_counter!(
            "ranking_stale_writes_total",
            "Snapshot writes rejected for stale generated_at."
        );
        describe_counter!("classifier_calls_total", "Sentiment classifier invocations.");
        describe_counter!(
            "classifier_failures_total",
            "Classifier calls that returned no label."
        );
        describe_gauge!("ranking_last_run_ts", "Unix ts when a ranking run last started.");
    });
}

/// Per-category result of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOutcome {
    pub category: String,
    /// Entries in the written snapshot (post top-N truncation).
    pub ranked: u32,
    /// Eligible, scored products before truncation.
    pub evaluated: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What one batch run did, category by category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub week_id: String,
    pub skipped_products: u32,
    pub categories: Vec<CategoryOutcome>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.categories.iter().any(|c| c.error.is_some())
    }
}

#[derive(Clone)]
pub struct RankingEngine {
    config: Arc<RankingConfig>,
    classifier: SharedClassifier,
    store: Arc<SnapshotStore>,
}

impl RankingEngine {
    pub fn new(
        config: RankingConfig,
        classifier: SharedClassifier,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            store,
        }
    }

    /// Run the whole batch: one snapshot per category present in `signals`.
    pub async fn run(&self, signals: Vec<ProductSignals>) -> RunSummary {
        ensure_metrics_described();
        let now = Utc::now();
        counter!("ranking_runs_total").increment(1);
        gauge!("ranking_last_run_ts").set(now.timestamp() as f64);

        let mut by_category: BTreeMap<String, Vec<ProductSignals>> = BTreeMap::new();
        let mut skipped_products = 0u32;
        for s in signals {
            match s.product.category.clone() {
                Some(category) => by_category.entry(category).or_default().push(s),
                None => {
                    tracing::warn!(product = %s.product.id, "product has no category; skipping");
                    counter!("ranking_products_skipped_total").increment(1);
                    skipped_products += 1;
                }
            }
        }

        let mut tasks = JoinSet::new();
        for (category, batch) in by_category {
            let engine = self.clone();
            tasks.spawn(async move {
                let outcome = engine.run_category(&category, batch, now).await;
                (category, outcome)
            });
        }

        let mut categories = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((category, Ok(ranking))) => categories.push(CategoryOutcome {
                    category,
                    ranked: ranking.rankings.len() as u32,
                    evaluated: ranking.total_products_evaluated,
                    error: None,
                }),
                Ok((category, Err(e))) => {
                    counter!("ranking_category_failures_total").increment(1);
                    tracing::error!(category = %category, error = ?e, "category run failed");
                    categories.push(CategoryOutcome {
                        category,
                        ranked: 0,
                        evaluated: 0,
                        error: Some(format!("{e:#}")),
                    });
                }
                Err(e) => tracing::error!(error = ?e, "category task aborted"),
            }
        }
        categories.sort_by(|a, b| a.category.cmp(&b.category));

        RunSummary {
            week_id: week::week_id(now),
            skipped_products,
            categories,
        }
    }

    /// Compute, score, rank, and persist one category. Per-product metrics
    /// run concurrently under `max_products_in_flight`.
    pub async fn run_category(
        &self,
        category: &str,
        batch: Vec<ProductSignals>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<WeeklyRanking> {
        let calculator = Arc::new(MetricsCalculator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.classifier),
        ));
        let limit = Arc::new(Semaphore::new(self.config.max_products_in_flight));

        let mut tasks = JoinSet::new();
        for signals in batch {
            let calculator = Arc::clone(&calculator);
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let Ok(_permit) = limit.acquire_owned().await else {
                    return None;
                };
                calculator
                    .compute(&signals.product, &signals.responses, now)
                    .await
            });
        }

        let mut metrics = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(m)) => metrics.push(m),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = ?e, "metrics task aborted"),
            }
        }
        // Tasks join in completion order; restore a stable order before scoring.
        metrics.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let eligible = filter_eligible(metrics, &self.config.thresholds);
        let scored: Vec<_> = eligible
            .into_iter()
            .map(|m| {
                let score = normalize::normalize(&m, &self.config);
                (m, score)
            })
            .collect();
        let (entries, evaluated) = generate_top_rankings(scored, self.config.top_n);

        let ranking = WeeklyRanking {
            category: category.to_string(),
            week_id: week::week_id(now),
            week_start: week::week_start(now),
            week_end: week::week_end(now),
            generated_at: now,
            total_products_evaluated: evaluated,
            rankings: entries,
        };

        self.store
            .save(ranking.clone())
            .with_context(|| format!("saving weekly ranking for category '{category}'"))?;

        tracing::info!(
            category = %category,
            week = %ranking.week_id,
            ranked = ranking.rankings.len(),
            evaluated = ranking.total_products_evaluated,
            "weekly ranking written"
        );
        Ok(ranking)
    }
}
