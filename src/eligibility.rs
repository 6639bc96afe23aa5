//! Minimum-data gate applied before ranking.
//!
//! Exclusion is not an error: filtered products are simply absent from the
//! output and from `total_products_evaluated`. Products with no category
//! never reach this stage.

use crate::config::EligibilityThresholds;
use crate::model::ProductRankingMetrics;

pub fn is_eligible(metrics: &ProductRankingMetrics, thresholds: &EligibilityThresholds) -> bool {
    metrics.has_minimum_data
        && metrics.total_responses >= thresholds.min_total_responses
        && metrics.recent_response_count >= thresholds.min_recent_responses
}

pub fn filter_eligible(
    metrics: Vec<ProductRankingMetrics>,
    thresholds: &EligibilityThresholds,
) -> Vec<ProductRankingMetrics> {
    metrics
        .into_iter()
        .filter(|m| is_eligible(m, thresholds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SentimentBreakdown, TrendDirection};

    fn metrics(total: u32, recent: u32, has_minimum: bool) -> ProductRankingMetrics {
        ProductRankingMetrics {
            product_id: format!("p-{total}-{recent}"),
            product_name: "Widget".into(),
            category: "tools".into(),
            nps_score: 0.0,
            total_responses: total,
            sentiment_score: 0.5,
            sentiment_breakdown: SentimentBreakdown::default(),
            survey_completion_rate: 0.5,
            feedback_volume: 0,
            recent_response_count: recent,
            last_response_at: None,
            days_since_last_response: 1,
            week_over_week_change: 0.0,
            trend_direction: TrendDirection::Stable,
            confidence_score: 0.1,
            has_minimum_data: has_minimum,
        }
    }

    #[test]
    fn gate_requires_all_three_conditions() {
        let t = EligibilityThresholds {
            min_total_responses: 5,
            min_recent_responses: 1,
        };
        assert!(is_eligible(&metrics(5, 1, true), &t));
        assert!(!is_eligible(&metrics(5, 1, false), &t));
        assert!(!is_eligible(&metrics(4, 1, true), &t));
        assert!(!is_eligible(&metrics(5, 0, true), &t));
    }

    #[test]
    fn filter_drops_only_ineligible_records() {
        let t = EligibilityThresholds::default();
        let kept = filter_eligible(
            vec![
                metrics(10, 2, true),
                metrics(0, 0, false),
                metrics(6, 1, true),
            ],
            &t,
        );
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|m| m.has_minimum_data));
    }
}
