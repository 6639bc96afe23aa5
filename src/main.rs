//! Weekly Product Ranking Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the snapshot store, the sentiment
//! classifier, the ranking engine, and the Prometheus exporter.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use product_ranking_engine::api::{self, AppState};
use product_ranking_engine::classify::build_classifier;
use product_ranking_engine::config::RankingConfig;
use product_ranking_engine::engine::RankingEngine;
use product_ranking_engine::metrics::Metrics;
use product_ranking_engine::store::SnapshotStore;

const DEFAULT_CONFIG_PATH: &str = "config/ranking.json";
const DEFAULT_DATA_DIR: &str = "data/rankings";

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - RANKING_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("RANKING_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ranking=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let config_path = std::env::var("RANKING_CONFIG_PATH")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = RankingConfig::load_from_file(&config_path).unwrap_or_else(|e| {
        tracing::warn!(path = %config_path, error = ?e, "using default ranking config");
        RankingConfig::default()
    });

    let data_dir =
        std::env::var("RANKING_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    let store = Arc::new(SnapshotStore::open(&data_dir)?);

    let classifier = build_classifier(&config.classifier);
    tracing::info!(provider = classifier.provider_name(), "classifier ready");

    let metrics = Metrics::init(config.top_n as u64);
    let engine = RankingEngine::new(config, classifier, Arc::clone(&store));

    let router = api::router(AppState { engine, store }).merge(metrics.router());
    Ok(router.into())
}
