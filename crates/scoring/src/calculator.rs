//! Health score computation.
//!
//! The score combines internal usage metrics with keyword sentiment found
//! in the social analysis texts. Pure: no I/O, same inputs give the same
//! output.
//!
//! ## Algorithm
//! 1. Each metric contributes `min(weight, value / norm * weight)`;
//!    negative or non-finite values contribute 0
//! 2. Every text is scanned (in parallel) for positive and negative
//!    keywords, each keyword counting at most once per text
//! 3. `sentiment = positive / (positive + negative) * sentiment_weight`,
//!    or the neutral constant when nothing matched
//! 4. `health = min(1.0, metrics + sentiment)`, clamped into [0, 1]

use rayon::prelude::*;
use serde::Serialize;
use sources::FeatureMetrics;
use tracing::debug;

use crate::weights::ScoreWeights;

pub const POSITIVE_KEYWORDS: &[&str] = &["positive", "love", "appreciate", "excellent", "great"];
pub const NEGATIVE_KEYWORDS: &[&str] = &["negative", "concern", "issue", "problem", "bug"];

/// Keyword hits across all texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn total(&self) -> usize {
        self.positive + self.negative
    }
}

/// How a health score was made up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub metrics: f64,
    pub sentiment: f64,
    pub counts: SentimentCounts,
    pub total: f64,
}

/// Computes health scores with a fixed set of weights.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
}

impl ScoreCalculator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Health score in [0, 1].
    ///
    /// # Arguments
    /// * `metrics` - Usage metrics, `None` when unavailable (counts as zeros)
    /// * `texts` - Analysis text of every social source that produced one
    pub fn health_score<S>(&self, metrics: Option<&FeatureMetrics>, texts: &[S]) -> f64
    where
        S: AsRef<str> + Sync,
    {
        self.breakdown(metrics, texts).total
    }

    /// Same as `health_score`, keeping the individual parts.
    pub fn breakdown<S>(&self, metrics: Option<&FeatureMetrics>, texts: &[S]) -> ScoreBreakdown
    where
        S: AsRef<str> + Sync,
    {
        let metrics_part = metrics.map_or(0.0, |m| self.metrics_score(m));
        let counts = count_sentiment(texts);
        let sentiment_part = self.sentiment_from_counts(counts);

        let total = metrics_part + sentiment_part;
        let total = if total.is_nan() {
            0.0
        } else {
            total.clamp(0.0, 1.0)
        };

        debug!(
            "Health score - metrics: {:.3}, sentiment: {:.3} ({:?}), total: {:.3}",
            metrics_part, sentiment_part, counts, total
        );
        ScoreBreakdown {
            metrics: metrics_part,
            sentiment: sentiment_part,
            counts,
            total,
        }
    }

    /// Sum of the clamped metric contributions.
    pub fn metrics_score(&self, metrics: &FeatureMetrics) -> f64 {
        let w = &self.weights;
        contribution(metrics.purchase_count as f64, w.purchase_norm, w.purchase_weight)
            + contribution(metrics.login_count as f64, w.login_norm, w.login_weight)
            + contribution(metrics.avg_session_minutes, w.session_norm, w.session_weight)
    }

    /// Sentiment part for a set of texts.
    pub fn sentiment_score<S>(&self, texts: &[S]) -> f64
    where
        S: AsRef<str> + Sync,
    {
        self.sentiment_from_counts(count_sentiment(texts))
    }

    fn sentiment_from_counts(&self, counts: SentimentCounts) -> f64 {
        if counts.total() == 0 {
            return self.weights.neutral_sentiment;
        }
        counts.positive as f64 / counts.total() as f64 * self.weights.sentiment_weight
    }
}

fn contribution(value: f64, norm: f64, weight: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 || !weight.is_finite() || weight <= 0.0 || norm <= 0.0 {
        return 0.0;
    }
    weight.min(value / norm * weight)
}

/// Keyword hits over all texts. Each keyword counts once per text.
pub fn count_sentiment<S>(texts: &[S]) -> SentimentCounts
where
    S: AsRef<str> + Sync,
{
    texts
        .par_iter()
        .map(|text| {
            let lower = text.as_ref().to_lowercase();
            SentimentCounts {
                positive: POSITIVE_KEYWORDS.iter().filter(|k| lower.contains(*k)).count(),
                negative: NEGATIVE_KEYWORDS.iter().filter(|k| lower.contains(*k)).count(),
            }
        })
        .reduce(SentimentCounts::default, |a, b| SentimentCounts {
            positive: a.positive + b.positive,
            negative: a.negative + b.negative,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn metrics(purchases: u64, logins: u64, minutes: f64) -> FeatureMetrics {
        FeatureMetrics {
            feature_id: "f".into(),
            purchase_count: purchases,
            login_count: logins,
            avg_session_minutes: minutes,
            dataset_description: None,
        }
    }

    #[test]
    fn test_full_metrics_without_keywords_is_ceiling_plus_neutral() {
        let calc = ScoreCalculator::default();
        let texts = ["users talked about the checkout page"];

        let breakdown = calc.breakdown(Some(&metrics(1000, 5000, 30.0)), &texts);

        assert!((breakdown.metrics - 0.8).abs() < EPS, "Got {}", breakdown.metrics);
        assert!((breakdown.sentiment - 0.1).abs() < EPS);
        assert!((breakdown.total - 0.9).abs() < EPS);
    }

    #[test]
    fn test_each_metric_is_clamped_at_its_weight() {
        let calc = ScoreCalculator::default();
        let score = calc.metrics_score(&metrics(1_000_000, 0, 0.0));
        assert!((score - 0.3).abs() < EPS);

        let half = calc.metrics_score(&metrics(500, 2500, 15.0));
        assert!((half - 0.4).abs() < EPS, "Got {}", half);
    }

    #[test]
    fn test_bad_session_values_contribute_nothing() {
        let calc = ScoreCalculator::default();
        for minutes in [f64::NAN, f64::INFINITY, -5.0] {
            assert_eq!(calc.metrics_score(&metrics(0, 0, minutes)), 0.0);
        }
    }

    #[test]
    fn test_sentiment_ratio() {
        let calc = ScoreCalculator::default();
        let texts = ["Users love it and say it is great", "one bug report"];

        let counts = count_sentiment(&texts);
        assert_eq!(counts, SentimentCounts { positive: 2, negative: 1 });
        assert!((calc.sentiment_score(&texts) - 2.0 / 3.0 * 0.2).abs() < EPS);
    }

    #[test]
    fn test_keyword_counts_once_per_text() {
        let counts = count_sentiment(&["love love love", "LOVE"]);
        assert_eq!(counts.positive, 2);
        assert_eq!(counts.negative, 0);
    }

    #[test]
    fn test_no_signal_is_neutral_not_zero() {
        let calc = ScoreCalculator::default();
        let empty: [&str; 0] = [];
        assert!((calc.health_score(None, &empty) - 0.1).abs() < EPS);
    }

    #[test]
    fn test_all_negative_sentiment_is_zero() {
        let calc = ScoreCalculator::default();
        assert_eq!(calc.sentiment_score(&["negative issue"]), 0.0);
    }

    #[test]
    fn test_score_is_bounded() {
        let heavy = ScoreCalculator::new(ScoreWeights {
            purchase_weight: 5.0,
            sentiment_weight: 3.0,
            ..ScoreWeights::default()
        });
        let score = heavy.health_score(Some(&metrics(u64::MAX, u64::MAX, 1e300)), &["great"]);
        assert_eq!(score, 1.0);

        let calc = ScoreCalculator::default();
        let inputs = [
            (metrics(0, 0, 0.0), vec![]),
            (metrics(3, 9, 0.5), vec!["bug".to_string()]),
            (metrics(10_000, 1, 90.0), vec!["love".to_string(), String::new()]),
        ];
        for (m, texts) in &inputs {
            let score = calc.health_score(Some(m), texts);
            assert!((0.0..=1.0).contains(&score), "Out of range: {}", score);
        }
    }

    #[test]
    fn test_idempotent() {
        let calc = ScoreCalculator::default();
        let m = metrics(321, 1234, 7.5);
        let texts = vec!["great but slow".to_string(), "a concern".to_string()];

        let first = calc.breakdown(Some(&m), &texts);
        for _ in 0..10 {
            assert_eq!(calc.breakdown(Some(&m), &texts), first);
        }
    }
}
