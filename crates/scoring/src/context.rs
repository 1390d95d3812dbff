//! Inputs shared by all recommendation rules.

use sources::FeatureMetrics;

/// Everything a rule may look at for one report.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    pub health_score: f64,
    pub metrics: &'a FeatureMetrics,
    /// One lowercased entry per social text, in input order.
    sections: Vec<String>,
}

impl<'a> ScoringContext<'a> {
    /// # Arguments
    /// * `health_score` - Score from the ScoreCalculator
    /// * `metrics` - Internal metrics (zeros when the source failed)
    /// * `texts` - Social analysis texts that rules scan for triggers
    pub fn new<S: AsRef<str>>(health_score: f64, metrics: &'a FeatureMetrics, texts: &[S]) -> Self {
        let sections = texts.iter().map(|t| t.as_ref().to_lowercase()).collect();
        Self {
            health_score,
            metrics,
            sections,
        }
    }

    /// Case-insensitive substring test against any of the social texts.
    pub fn mentions(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.sections.iter().any(|s| s.contains(&term))
    }

    /// Whether one single text satisfies `matches`. Terms that must occur
    /// together are checked here so they cannot be split across sources.
    pub fn any_section(&self, matches: impl Fn(&str) -> bool) -> bool {
        self.sections.iter().any(|s| matches(s))
    }
}
