//! Score normalization: `ProductRankingMetrics` → `RankingScore`.
//!
//! Pure, no I/O. Each component is bounded to [0,1] before weighting and the
//! weights sum to 1.0, so the pre-multiplier total stays in [0,1]. The
//! confidence multiplier then damps thinly-evidenced products.
//!
//! Transforms:
//! - nps: linear remap of -100..100
//! - volume: log10 scaling, saturating at 1000 responses
//! - recency: exponential decay, roughly halving every 7 days
//! - trend: -100%..+100% change mapped around a neutral 0.5

use crate::config::RankingConfig;
use crate::model::{ProductRankingMetrics, RankingScore, ScoreBreakdown};

pub fn nps_normalized(nps: f64) -> f64 {
    ((nps + 100.0) / 200.0).clamp(0.0, 1.0)
}

pub fn engagement_normalized(completion_rate: f64, feedback_volume: u32) -> f64 {
    let volume_part = (feedback_volume as f64 / 50.0).min(1.0);
    (completion_rate.clamp(0.0, 1.0) * 0.6 + volume_part * 0.4).clamp(0.0, 1.0)
}

pub fn volume_normalized(total_responses: u32) -> f64 {
    ((total_responses as f64 + 1.0).log10() / 1000f64.log10()).min(1.0)
}

pub fn recency_normalized(days_since_last_response: u32) -> f64 {
    (-(days_since_last_response as f64) / 10.0).exp()
}

pub fn trend_normalized(week_over_week_change: f64) -> f64 {
    (0.5 + week_over_week_change / 200.0).clamp(0.0, 1.0)
}

/// Full normalization pass over one metrics record.
pub fn normalize(metrics: &ProductRankingMetrics, config: &RankingConfig) -> RankingScore {
    let w = &config.weights;
    let breakdown = ScoreBreakdown {
        nps: nps_normalized(metrics.nps_score) * w.nps,
        sentiment: metrics.sentiment_score.clamp(0.0, 1.0) * w.sentiment,
        engagement: engagement_normalized(metrics.survey_completion_rate, metrics.feedback_volume)
            * w.engagement,
        volume: volume_normalized(metrics.total_responses) * w.volume,
        recency: recency_normalized(metrics.days_since_last_response) * w.recency,
        trend: trend_normalized(metrics.week_over_week_change) * w.trend,
    };
    let confidence_multiplier = config.multiplier_for(metrics.total_responses);
    RankingScore {
        product_id: metrics.product_id.clone(),
        total_score: breakdown.weighted_sum() * confidence_multiplier,
        breakdown,
        confidence_multiplier,
    }
}
