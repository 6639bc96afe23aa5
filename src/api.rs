use std::sync::Arc;

use serde::Deserialize;
use shuttle_axum::axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::engine::{RankingEngine, RunSummary};
use crate::model::{ProductSignals, ProductTrendPoint, WeeklyRanking};
use crate::store::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: RankingEngine,
    pub store: Arc<SnapshotStore>,
}

/// Read surface consumed by the dashboards, plus the batch trigger the
/// external scheduler POSTs to. A missing snapshot serializes as JSON null
/// ("no rankings yet"), never as an error status.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/rankings/current", get(current_ranking))
        .route("/rankings/week", get(ranking_for_week))
        .route("/rankings/history", get(ranking_history))
        .route("/rankings/product-trend", get(product_trend))
        .route("/rankings/previous-rank", get(previous_rank))
        .route("/admin/run-ranking", post(run_ranking))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct CategoryQuery {
    category: String,
}

#[derive(Deserialize)]
struct WeekQuery {
    category: String,
    week: String,
}

#[derive(Deserialize)]
struct HistoryQuery {
    category: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ProductQuery {
    category: String,
    product: String,
}

async fn current_ranking(
    State(state): State<AppState>,
    Query(q): Query<CategoryQuery>,
) -> Json<Option<WeeklyRanking>> {
    Json(state.store.get_current(&q.category))
}

async fn ranking_for_week(
    State(state): State<AppState>,
    Query(q): Query<WeekQuery>,
) -> Json<Option<WeeklyRanking>> {
    Json(state.store.get(&q.category, &q.week))
}

async fn ranking_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<WeeklyRanking>> {
    Json(state.store.get_history(&q.category, q.limit))
}

async fn product_trend(
    State(state): State<AppState>,
    Query(q): Query<ProductQuery>,
) -> Json<Vec<ProductTrendPoint>> {
    Json(state.store.get_product_trend(&q.product, &q.category))
}

async fn previous_rank(
    State(state): State<AppState>,
    Query(q): Query<ProductQuery>,
) -> Json<Option<u32>> {
    Json(state.store.get_previous_rank(&q.product, &q.category))
}

/// Run the weekly ranking over the posted signal batch. Failed categories
/// are reported inside the summary so the scheduler can retry them.
async fn run_ranking(
    State(state): State<AppState>,
    Json(batch): Json<Vec<ProductSignals>>,
) -> Json<RunSummary> {
    Json(state.engine.run(batch).await)
}
