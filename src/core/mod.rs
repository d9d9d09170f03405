// Core algorithm exports
pub mod boost;
pub mod confidence;
pub mod explain;
pub mod filters;
pub mod matcher;
pub mod scoring;
pub mod similarity;
pub mod tiers;
pub mod tokens;

use thiserror::Error;

/// Configuration errors raised before any candidate is evaluated
///
/// Malformed operator-authored rules or weight classes fail the whole call;
/// scoring against a partially applied configuration is never acceptable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No weight classes configured")]
    EmptyWeightClasses,

    #[error("Invalid weight class '{id}': {reason}")]
    InvalidWeightClass { id: String, reason: String },

    #[error("Weight classes sum to {0:.3}, expected 1.0")]
    WeightSumMismatch(f64),

    #[error("Invalid hard filter rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },
}

pub use boost::{apply_boost, get_boost_status, BoostOutcome, BoostStatus};
pub use confidence::estimate as estimate_confidence;
pub use filters::evaluate_hard_filters;
pub use matcher::{CombinedOutcome, Matcher, RankOutcome};
pub use scoring::score_trainer;
pub use similarity::{cosine_similarity, question_similarity};
pub use tiers::{can_contact_trainer, visibility_rules, ContactDecision, TierRules};
pub use tokens::{calculate_token_cost, deduct_tokens, TokenTransaction};
