//! Scoring for feature health reports.
//!
//! This crate provides:
//! - ScoreCalculator for the [0, 1] health score
//! - RecommendationRule trait and implementations
//! - RecommendationEngine for composing rules
//!
//! ## Architecture
//! Both stages are pure functions of their inputs:
//! 1. ScoreCalculator combines usage metrics with keyword sentiment
//! 2. RecommendationEngine maps the score, the social texts and the
//!    metrics to an ordered list of recommendations
//!
//! ## Example Usage
//! ```ignore
//! use scoring::{RecommendationEngine, ScoreCalculator, ScoringContext};
//!
//! let calculator = ScoreCalculator::default();
//! let score = calculator.health_score(Some(&metrics), &texts);
//!
//! let engine = RecommendationEngine::standard();
//! let context = ScoringContext::new(score, &metrics, &texts);
//! let recommendations = engine.generate(&context, &social_summary, &metrics.summary());
//! ```

pub mod calculator;
pub mod context;
pub mod engine;
pub mod rules;
pub mod traits;
pub mod weights;

// Re-export main types
pub use calculator::{ScoreBreakdown, ScoreCalculator, SentimentCounts};
pub use context::ScoringContext;
pub use engine::RecommendationEngine;
pub use traits::RecommendationRule;
pub use weights::{HealthBand, HealthThresholds, ScoreWeights};
