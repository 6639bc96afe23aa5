// src/config.rs
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Component weights applied to the normalized signals. Must sum to 1.0 so
/// the pre-multiplier total stays in [0,1]; invalid files fall back to the
/// calibrated defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub nps: f64,
    pub sentiment: f64,
    pub engagement: f64,
    pub volume: f64,
    pub recency: f64,
    pub trend: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            nps: 0.25,
            sentiment: 0.20,
            engagement: 0.20,
            volume: 0.15,
            recency: 0.10,
            trend: 0.10,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.nps + self.sentiment + self.engagement + self.volume + self.recency + self.trend
    }

    fn is_valid(&self) -> bool {
        let parts = [
            self.nps,
            self.sentiment,
            self.engagement,
            self.volume,
            self.recency,
            self.trend,
        ];
        parts.iter().all(|w| (0.0..=1.0).contains(w)) && (self.sum() - 1.0).abs() <= 1e-6
    }
}

/// Minimum-data gate a product must clear before it can be ranked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityThresholds {
    pub min_total_responses: u32,
    pub min_recent_responses: u32,
}

impl Default for EligibilityThresholds {
    fn default() -> Self {
        Self {
            min_total_responses: 5,
            min_recent_responses: 1,
        }
    }
}

/// One confidence tier: at least `min_responses` total responses grants
/// `multiplier`. Tiers are evaluated high-to-low, first match wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceTier {
    pub min_responses: u32,
    pub multiplier: f64,
}

/// External classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive); anything else resolves to the neutral client.
    pub provider: Option<String>,
    /// Upper bound on in-flight classifier calls.
    pub max_in_flight: usize,
    /// Minimum character count for a free-text answer to be classified.
    pub min_text_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: None,
            max_in_flight: 8,
            min_text_len: 10,
        }
    }
}

/// Injectable configuration for the whole ranking pipeline, loaded from
/// `config/ranking.json`. Every knob has a default so a missing or partial
/// file still yields a runnable engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: ScoreWeights,
    pub thresholds: EligibilityThresholds,
    /// Sorted descending by `min_responses` after sanitization.
    pub confidence_tiers: Vec<ConfidenceTier>,
    /// Multiplier for products below every tier.
    pub fallback_multiplier: f64,
    pub top_n: usize,
    /// Per-run bound on concurrently computed products.
    pub max_products_in_flight: usize,
    pub classifier: ClassifierConfig,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            thresholds: EligibilityThresholds::default(),
            confidence_tiers: vec![
                ConfidenceTier {
                    min_responses: 100,
                    multiplier: 1.0,
                },
                ConfidenceTier {
                    min_responses: 50,
                    multiplier: 0.9,
                },
                ConfidenceTier {
                    min_responses: 20,
                    multiplier: 0.8,
                },
            ],
            fallback_multiplier: 0.5,
            top_n: 10,
            max_products_in_flight: 4,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl RankingConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: RankingConfig = serde_json::from_str(&data)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Clamp out-of-range knobs instead of failing the boot.
    fn sanitize(&mut self) {
        if !self.weights.is_valid() {
            self.weights = ScoreWeights::default();
        }
        if !(0.0..=1.0).contains(&self.fallback_multiplier) {
            self.fallback_multiplier = 0.5;
        }
        for tier in &mut self.confidence_tiers {
            tier.multiplier = tier.multiplier.clamp(0.0, 1.0);
        }
        // High-to-low so `multiplier_for` can take the first match.
        self.confidence_tiers
            .sort_by(|a, b| b.min_responses.cmp(&a.min_responses));
        if self.top_n == 0 {
            self.top_n = 10;
        }
        if self.max_products_in_flight == 0 {
            self.max_products_in_flight = 1;
        }
        if self.classifier.max_in_flight == 0 {
            self.classifier.max_in_flight = 1;
        }
    }

    /// Discrete damping factor for a product's response volume.
    pub fn multiplier_for(&self, total_responses: u32) -> f64 {
        self.confidence_tiers
            .iter()
            .find(|t| total_responses >= t.min_responses)
            .map(|t| t.multiplier)
            .unwrap_or(self.fallback_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((ScoreWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tier_lookup_first_match_high_to_low() {
        let cfg = RankingConfig::default();
        assert_eq!(cfg.multiplier_for(150), 1.0);
        assert_eq!(cfg.multiplier_for(100), 1.0);
        assert_eq!(cfg.multiplier_for(99), 0.9);
        assert_eq!(cfg.multiplier_for(50), 0.9);
        assert_eq!(cfg.multiplier_for(25), 0.8);
        assert_eq!(cfg.multiplier_for(20), 0.8);
        assert_eq!(cfg.multiplier_for(19), 0.5);
        assert_eq!(cfg.multiplier_for(0), 0.5);
    }

    #[test]
    fn multiplier_is_non_decreasing_in_volume() {
        let cfg = RankingConfig::default();
        let mut last = 0.0;
        for total in [0u32, 19, 20, 49, 50, 99, 100, 500] {
            let m = cfg.multiplier_for(total);
            assert!(m >= last, "multiplier dropped at {total}");
            last = m;
        }
    }

    #[test]
    fn invalid_weights_fall_back_to_defaults() {
        let mut cfg = RankingConfig {
            weights: ScoreWeights {
                nps: 0.9,
                sentiment: 0.9,
                ..ScoreWeights::default()
            },
            ..RankingConfig::default()
        };
        cfg.sanitize();
        assert!((cfg.weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(cfg.weights.nps, 0.25);
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let parsed: RankingConfig =
            serde_json::from_str(r#"{ "top_n": 3, "thresholds": { "min_total_responses": 2 } }"#)
                .unwrap();
        assert_eq!(parsed.top_n, 3);
        assert_eq!(parsed.thresholds.min_total_responses, 2);
        assert_eq!(parsed.thresholds.min_recent_responses, 1);
        assert_eq!(parsed.classifier.max_in_flight, 8);
    }

    #[test]
    fn unsorted_tiers_are_sorted_on_sanitize() {
        let mut cfg = RankingConfig {
            confidence_tiers: vec![
                ConfidenceTier {
                    min_responses: 20,
                    multiplier: 0.8,
                },
                ConfidenceTier {
                    min_responses: 100,
                    multiplier: 1.0,
                },
            ],
            ..RankingConfig::default()
        };
        cfg.sanitize();
        assert_eq!(cfg.confidence_tiers[0].min_responses, 100);
        assert_eq!(cfg.multiplier_for(100), 1.0);
    }
}
