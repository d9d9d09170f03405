use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Client intake profile: questionnaire answers plus optional per-question embeddings
///
/// Immutable for the duration of a matching call. Answer maps are ordered so
/// that no part of the pipeline depends on hash iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub embeddings: BTreeMap<String, Vec<f32>>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(rename = "experienceLevel", default)]
    pub experience_level: Option<String>,
}

/// Trainer subscription tier
///
/// Unrecognized wire values deserialize to `Web`, the least-trusted tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerTier {
    EliteVerified,
    Verified,
    Paid,
    Free,
    #[serde(other)]
    Web,
}

impl TrainerTier {
    /// Parse a raw tier string; anything unknown collapses to `Web`
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "elite_verified" => TrainerTier::EliteVerified,
            "verified" => TrainerTier::Verified,
            "paid" => TrainerTier::Paid,
            "free" => TrainerTier::Free,
            _ => TrainerTier::Web,
        }
    }
}

/// Trainer candidate profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerCandidate {
    #[serde(rename = "trainerId")]
    pub trainer_id: String,
    pub name: String,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub embeddings: BTreeMap<String, Vec<f32>>,
    #[serde(rename = "isAvailable", default = "default_true")]
    pub is_available: bool,
    #[serde(rename = "requiredResponses", default)]
    pub required_responses: Vec<String>,
    #[serde(default = "default_tier")]
    pub tier: TrainerTier,
    #[serde(rename = "boostExpiresAt", default)]
    pub boost_expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "badgeExpiresAt", default)]
    pub badge_expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "claimAvailable", default)]
    pub claim_available: bool,
}

fn default_true() -> bool {
    true
}

fn default_tier() -> TrainerTier {
    TrainerTier::Web
}

/// Comparison operator for hard filter rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
}

impl FilterOperator {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "equals" => Some(FilterOperator::Equals),
            "not_equals" => Some(FilterOperator::NotEquals),
            "contains" => Some(FilterOperator::Contains),
            "not_contains" => Some(FilterOperator::NotContains),
            _ => None,
        }
    }
}

/// Operator-authored eligibility rule
///
/// A matching exclusion rule disqualifies a candidate outright. Rules are
/// configuration: the engine evaluates them but never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardFilterRule {
    pub id: String,
    pub field: String,
    pub operator: FilterOperator,
    pub expected: String,
    #[serde(rename = "weightClass")]
    pub weight_class: String,
    #[serde(rename = "failureReason")]
    pub failure_reason: String,
}

/// Named question group with a scoring weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightClass {
    pub id: String,
    pub label: String,
    pub weight: f64,
    #[serde(rename = "questionIds")]
    pub question_ids: Vec<String>,
}

/// Categorical indicator of the evidence behind a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Outcome of the hard filter stage for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardFilterStatus {
    Passed,
    Failed { reason: String },
}

impl HardFilterStatus {
    pub fn passed(&self) -> bool {
        matches!(self, HardFilterStatus::Passed)
    }
}

/// Per-weight-class scoring aggregate
///
/// The single source for both the final score and the explanation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(rename = "classId")]
    pub class_id: String,
    pub label: String,
    pub average: f64,
    pub weighted: f64,
    #[serde(rename = "comparedQuestions")]
    pub compared_questions: usize,
}

/// Ranked match result for one trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedTrainer {
    #[serde(rename = "trainerId")]
    pub trainer_id: String,
    pub name: String,
    pub score: f64,
    pub confidence: Confidence,
    pub explanations: Vec<String>,
    #[serde(rename = "hardFilterStatus")]
    pub hard_filter_status: HardFilterStatus,
    pub breakdown: Vec<ScoreBreakdown>,
    pub tier: TrainerTier,
    #[serde(rename = "tokenCost")]
    pub token_cost: f64,
    #[serde(rename = "isBoosted")]
    pub is_boosted: bool,
    #[serde(rename = "appliedBoosts")]
    pub applied_boosts: Vec<String>,
}

/// Match entry in the combined platform + external feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedMatch {
    #[serde(flatten)]
    pub ranked: RankedTrainer,
    #[serde(rename = "isExternal")]
    pub is_external: bool,
    #[serde(rename = "claimAvailable")]
    pub claim_available: bool,
    #[serde(rename = "contactLimitReached", default)]
    pub contact_limit_reached: bool,
}

/// Caller-owned token balance
///
/// Invariant: available + used = total, nothing negative. Mutated only
/// through deduct/refund, which return the updated value plus an audit
/// transaction. Concurrency control is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub available: f64,
    pub used: f64,
    pub total: f64,
}

impl TokenBalance {
    pub fn new(available: f64, used: f64) -> Self {
        Self {
            available,
            used,
            total: available + used,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.available >= 0.0
            && self.used >= 0.0
            && (self.available + self.used - self.total).abs() < 1e-9
    }
}

/// Promotional boost mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostType {
    PostClaim,
    NewTrainer,
}

/// Which trainers a boost configuration applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostScope {
    AllTiers,
    Tier(TrainerTier),
}

/// Time-boxed multiplicative score adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostConfig {
    pub id: String,
    #[serde(rename = "boostType")]
    pub boost_type: BoostType,
    pub factor: f64,
    pub scope: BoostScope,
    #[serde(rename = "validFrom")]
    pub valid_from: DateTime<Utc>,
    #[serde(rename = "validUntil")]
    pub valid_until: DateTime<Utc>,
}

/// Snapshot of a client's contact and match consumption
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContactUsage {
    #[serde(rename = "freeContactsUsed")]
    pub free_contacts_used: u32,
    #[serde(rename = "matchesThisWeek")]
    pub matches_this_week: u32,
    #[serde(rename = "contactsThisMonth")]
    pub contacts_this_month: u32,
}
