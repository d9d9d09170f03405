// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoostConfig, BoostScope, BoostType, ClientProfile, CombinedMatch, Confidence, ContactUsage,
    FilterOperator, HardFilterRule, HardFilterStatus, RankedTrainer, ScoreBreakdown, TokenBalance,
    TrainerCandidate, TrainerTier, WeightClass,
};
pub use requests::{CombinedMatchesRequest, ContactRequest, RankMatchesRequest, RefundRequest};
pub use responses::{
    CombinedMatchEntry, CombinedMatchesResponse, ContactResponse, ErrorResponse, HealthResponse,
    RankMatchesResponse, RefundResponse, TokenBalanceResponse,
};
