//! Ranking generation: scored products → ordered top-N entries.

use crate::model::{ProductRankingMetrics, RankingEntry, RankingScore};

/// Sort descending by total score, tie-break ascending by product id so the
/// order is deterministic, truncate to `top_n`, and attach 1-based ranks.
/// Also reports the pre-truncation count for display purposes.
pub fn generate_top_rankings(
    mut scored: Vec<(ProductRankingMetrics, RankingScore)>,
    top_n: usize,
) -> (Vec<RankingEntry>, u32) {
    let total_evaluated = scored.len() as u32;

    scored.sort_by(|a, b| {
        b.1.total_score
            .partial_cmp(&a.1.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.product_id.cmp(&b.0.product_id))
    });

    let entries = scored
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(idx, (metrics, score))| RankingEntry {
            rank: idx as u32 + 1,
            product_id: metrics.product_id.clone(),
            product_name: metrics.product_name.clone(),
            score: score.total_score,
            score_breakdown: score.breakdown,
            metrics,
        })
        .collect();

    (entries, total_evaluated)
}
