//! Metrics calculation: raw survey responses → `ProductRankingMetrics`.
//!
//! One record per (product, run). The sentiment pass is the only
//! suspension point; it fans out over the classifier with results matched
//! back by index. A product without a category is not an error: it is
//! logged, counted, and excluded from the run.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;

use crate::classify::{classify_all, SharedClassifier};
use crate::config::RankingConfig;
use crate::model::{
    Product, ProductRankingMetrics, SentimentBreakdown, SentimentLabel, SurveyResponse,
    TrendDirection,
};

/// Sentinel for "never heard from": maps to a near-zero recency score.
const NO_RESPONSE_DAYS: u32 = 999;
/// Surveys are nominally 2-3 questions; 3 counts as fully answered.
const EXPECTED_ANSWERS_PER_RESPONSE: f64 = 3.0;
/// Answers longer than this count toward feedback volume.
const SUBSTANTIVE_ANSWER_CHARS: usize = 20;
/// NPS movement below this magnitude is considered stable.
const TREND_THRESHOLD_PCT: f64 = 5.0;

pub struct MetricsCalculator {
    config: Arc<RankingConfig>,
    classifier: SharedClassifier,
}

impl MetricsCalculator {
    pub fn new(config: Arc<RankingConfig>, classifier: SharedClassifier) -> Self {
        Self { config, classifier }
    }

    /// Compute the full metrics record for one product. Returns `None` when
    /// the product carries no category and therefore cannot be ranked.
    pub async fn compute(
        &self,
        product: &Product,
        responses: &[SurveyResponse],
        now: DateTime<Utc>,
    ) -> Option<ProductRankingMetrics> {
        let Some(category) = product.category.as_deref() else {
            tracing::warn!(product = %product.id, "product has no category; skipping");
            counter!("ranking_products_skipped_total").increment(1);
            return None;
        };

        let total_responses = responses.len() as u32;
        let nps_score = nps_score(responses.iter());

        let texts = feedback_texts(responses, self.config.classifier.min_text_len);
        let labels = classify_all(&self.classifier, texts).await;
        let (sentiment_score, sentiment_breakdown) = aggregate_sentiment(&labels);

        let survey_completion_rate = completion_rate(responses);
        let feedback_volume = feedback_volume(responses);

        let last_response_at = responses.iter().map(|r| r.submitted_at).max();
        let days_since_last_response = last_response_at
            .map(|ts| (now - ts).num_days().max(0) as u32)
            .unwrap_or(NO_RESPONSE_DAYS);

        let recent_response_count = count_since(responses, now - Duration::days(7));
        let recent_30d = count_since(responses, now - Duration::days(30));

        let (week_over_week_change, trend_direction) = week_over_week(responses, now);

        let confidence_score = confidence_blend(
            total_responses,
            days_since_last_response,
            recent_response_count,
        );

        let thresholds = &self.config.thresholds;
        let has_minimum_data = total_responses >= thresholds.min_total_responses
            && recent_30d >= thresholds.min_recent_responses;

        Some(ProductRankingMetrics {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            category: category.to_string(),
            nps_score,
            total_responses,
            sentiment_score,
            sentiment_breakdown,
            survey_completion_rate,
            feedback_volume,
            recent_response_count,
            last_response_at,
            days_since_last_response,
            week_over_week_change,
            trend_direction,
            confidence_score,
            has_minimum_data,
        })
    }
}

// ------------------------------------------------------------
// NPS
// ------------------------------------------------------------

fn nps_key_pattern() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)nps|recommend").expect("valid nps key pattern"))
}

/// The 0-10 rating of a response, taken from the first answer whose question
/// key signals an NPS/"recommend" question.
fn nps_rating(response: &SurveyResponse) -> Option<f64> {
    response.answers.iter().find_map(|(key, value)| {
        if !nps_key_pattern().is_match(key) {
            return None;
        }
        value.as_number().filter(|n| (0.0..=10.0).contains(n))
    })
}

/// Net Promoter Score over a set of responses: promoters (>=9) minus
/// detractors (<=6) over all scored, scaled to -100..100. Zero when nothing
/// is scoreable.
pub fn nps_score<'a>(responses: impl Iterator<Item = &'a SurveyResponse>) -> f64 {
    let mut promoters = 0u32;
    let mut detractors = 0u32;
    let mut scored = 0u32;
    for rating in responses.filter_map(nps_rating) {
        scored += 1;
        if rating >= 9.0 {
            promoters += 1;
        } else if rating <= 6.0 {
            detractors += 1;
        }
    }
    if scored == 0 {
        return 0.0;
    }
    (promoters as f64 - detractors as f64) / scored as f64 * 100.0
}

// ------------------------------------------------------------
// Sentiment
// ------------------------------------------------------------

/// Free-text answers long enough to carry sentiment, across all responses.
fn feedback_texts(responses: &[SurveyResponse], min_len: usize) -> Vec<String> {
    responses
        .iter()
        .flat_map(|r| r.answers.values())
        .filter_map(|a| a.as_text())
        .filter(|t| t.chars().count() > min_len)
        .map(str::to_string)
        .collect()
}

/// Positive share plus label counts. Unclassified fragments (failed or
/// disabled classifier) count as neutral; with no text at all the score
/// defaults to a neutral 0.5 so absence of text does not read as negative.
fn aggregate_sentiment(labels: &[Option<SentimentLabel>]) -> (f64, SentimentBreakdown) {
    let mut breakdown = SentimentBreakdown::default();
    for label in labels {
        match label {
            Some(SentimentLabel::Positive) => breakdown.positive += 1,
            Some(SentimentLabel::Negative) => breakdown.negative += 1,
            _ => breakdown.neutral += 1,
        }
    }
    let total = breakdown.total();
    let score = if total == 0 {
        0.5
    } else {
        breakdown.positive as f64 / total as f64
    };
    (score, breakdown)
}

// ------------------------------------------------------------
// Engagement & recency
// ------------------------------------------------------------

fn completion_rate(responses: &[SurveyResponse]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    let answers: usize = responses.iter().map(|r| r.answers.len()).sum();
    let avg = answers as f64 / responses.len() as f64;
    (avg / EXPECTED_ANSWERS_PER_RESPONSE).min(1.0)
}

/// Responses carrying at least one substantive free-text answer.
fn feedback_volume(responses: &[SurveyResponse]) -> u32 {
    responses
        .iter()
        .filter(|r| {
            r.answers
                .values()
                .filter_map(|a| a.as_text())
                .any(|t| t.chars().count() > SUBSTANTIVE_ANSWER_CHARS)
        })
        .count() as u32
}

fn count_since(responses: &[SurveyResponse], cutoff: DateTime<Utc>) -> u32 {
    responses.iter().filter(|r| r.submitted_at > cutoff).count() as u32
}

// ------------------------------------------------------------
// Trend
// ------------------------------------------------------------

/// NPS over the trailing 7 days vs the 7 days before that, as a signed
/// percent change. Zero when the previous window has no signal.
fn week_over_week(responses: &[SurveyResponse], now: DateTime<Utc>) -> (f64, TrendDirection) {
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);

    let current = nps_score(responses.iter().filter(|r| r.submitted_at > week_ago));
    let previous = nps_score(
        responses
            .iter()
            .filter(|r| r.submitted_at > two_weeks_ago && r.submitted_at <= week_ago),
    );

    let change = if previous != 0.0 {
        (current - previous) / previous.abs() * 100.0
    } else {
        0.0
    };
    let direction = if change > TREND_THRESHOLD_PCT {
        TrendDirection::Up
    } else if change < -TREND_THRESHOLD_PCT {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };
    (change, direction)
}

// ------------------------------------------------------------
// Confidence
// ------------------------------------------------------------

/// Descriptive data-confidence blend: volume (0.5), recency (0.3),
/// recent activity (0.2). Clamped so the blend stays in [0,1].
fn confidence_blend(total: u32, days_since_last: u32, recent: u32) -> f64 {
    let volume_conf = (total as f64 / 100.0).min(1.0);
    let recency_conf = (1.0 - days_since_last as f64 / 30.0).max(0.0);
    let activity_base = total.min(20);
    let activity_conf = if activity_base == 0 {
        0.0
    } else {
        (recent as f64 / activity_base as f64).min(1.0)
    };
    (volume_conf * 0.5 + recency_conf * 0.3 + activity_conf * 0.2).clamp(0.0, 1.0)
}
