//! Rule that fires on words found in the social feedback.

use crate::context::ScoringContext;
use crate::traits::RecommendationRule;

/// Fires when one social text holds a trigger term and every required term.
///
/// ## Algorithm
/// For each text (one per source):
/// 1. At least one of `any_of` is a case-insensitive substring of it
/// 2. All of `all_of` are too
///
/// A trigger in one source and a required term in another do not fire.
pub struct KeywordRule {
    name: String,
    any_of: Vec<String>,
    all_of: Vec<String>,
    message: String,
}

impl KeywordRule {
    /// Create a rule that fires when any of `terms` is mentioned.
    pub fn any(name: impl Into<String>, terms: &[&str], message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            any_of: terms.iter().map(|t| t.to_lowercase()).collect(),
            all_of: Vec::new(),
            message: message.into(),
        }
    }

    /// Additionally require `term` (builder pattern).
    pub fn requiring(mut self, term: &str) -> Self {
        self.all_of.push(term.to_lowercase());
        self
    }
}

impl RecommendationRule for KeywordRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &ScoringContext<'_>) -> Option<String> {
        let triggered = context.any_section(|text| {
            self.any_of.iter().any(|t| text.contains(t.as_str()))
                && self.all_of.iter().all(|t| text.contains(t.as_str()))
        });
        triggered.then(|| self.message.clone())
    }
}
