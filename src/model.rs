//! model.rs — core data types of the ranking pipeline.
//!
//! `ProductRankingMetrics` is the intermediate record one computation run
//! produces per product; it is never mutated afterward and is embedded
//! read-only inside the persisted `WeeklyRanking` entry. `RankingScore` is
//! derived 1:1 from a metrics record. `WeeklyRanking` is the snapshot
//! document keyed by (category, week id).
//!
//! Wire shape uses camelCase so persisted documents and API payloads match
//! what the dashboards consume.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product as handed over by the surrounding platform.
/// `category` is optional; products without one never enter a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// One survey answer value. Surveys mix numeric ratings with free text,
/// so both shapes are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// Numeric view: a number as-is, or a string that parses as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            AnswerValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Free-text view; numeric answers yield `None`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s.as_str()),
            AnswerValue::Number(_) => None,
        }
    }
}

/// One submitted survey response. `answers` is keyed by question key;
/// a BTreeMap keeps iteration order deterministic when scanning keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,
}

/// Label returned by the external sentiment classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// Counts of classified feedback fragments per label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

impl SentimentBreakdown {
    pub fn total(&self) -> u32 {
        self.positive + self.neutral + self.negative
    }
}

/// Week-over-week NPS movement bucket (threshold +-5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Everything one computation run learns about a product. Created fresh on
/// every run; not persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRankingMetrics {
    pub product_id: String,
    pub product_name: String,
    pub category: String,

    /// Net Promoter Score, -100..100.
    pub nps_score: f64,
    pub total_responses: u32,

    /// Share of classified feedback that came back positive, 0..1.
    pub sentiment_score: f64,
    pub sentiment_breakdown: SentimentBreakdown,

    pub survey_completion_rate: f64,
    /// Responses carrying at least one substantive (>20 chars) answer.
    pub feedback_volume: u32,

    /// Responses in the trailing 7 days.
    pub recent_response_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_at: Option<DateTime<Utc>>,
    /// Days between the run and the newest response; 999 when there is none.
    pub days_since_last_response: u32,

    /// Signed percent change of NPS vs the previous 7-day window.
    pub week_over_week_change: f64,
    pub trend_direction: TrendDirection,

    /// Descriptive data-confidence blend, 0..1. Distinct from the discrete
    /// score multiplier applied during normalization.
    pub confidence_score: f64,
    pub has_minimum_data: bool,
}

/// The six weighted component contributions of a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub nps: f64,
    pub sentiment: f64,
    pub engagement: f64,
    pub volume: f64,
    pub recency: f64,
    pub trend: f64,
}

impl ScoreBreakdown {
    /// Sum of the weighted contributions, i.e. the pre-multiplier score.
    pub fn weighted_sum(&self) -> f64 {
        self.nps + self.sentiment + self.engagement + self.volume + self.recency + self.trend
    }
}

/// Normalized, weighted, confidence-adjusted score for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingScore {
    pub product_id: String,
    /// Post-multiplier value; the pre-multiplier sum is `breakdown.weighted_sum()`.
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
    pub confidence_multiplier: f64,
}

/// One row of a weekly ranking. `metrics` is the frozen record the score
/// was computed from, preserved for trend/audit queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: u32,
    pub product_id: String,
    pub product_name: String,
    pub score: f64,
    pub metrics: ProductRankingMetrics,
    pub score_breakdown: ScoreBreakdown,
}

/// Persisted snapshot for one (category, week). Overwritten wholesale by a
/// newer run for the same key; never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRanking {
    pub category: String,
    pub week_id: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    /// Count of eligible, scored products before top-N truncation.
    pub total_products_evaluated: u32,
    pub rankings: Vec<RankingEntry>,
}

impl WeeklyRanking {
    /// Entry for a product, if it made the top-N that week.
    pub fn entry_for(&self, product_id: &str) -> Option<&RankingEntry> {
        self.rankings.iter().find(|e| e.product_id == product_id)
    }
}

/// One point of a per-product trend query. `rank`/`score` are `None` for
/// weeks where the product did not make the top-N.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTrendPoint {
    pub week_start: DateTime<Utc>,
    pub week_id: String,
    pub rank: Option<u32>,
    pub score: Option<f64>,
}

/// SignalSource hand-off unit: a product plus its full response history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSignals {
    pub product: Product,
    #[serde(default)]
    pub responses: Vec<SurveyResponse>,
}
