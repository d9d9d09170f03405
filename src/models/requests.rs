use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to rank the platform trainer pool for a client
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RankMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "client_id", rename = "clientId")]
    pub client_id: String,
    #[serde(default = "default_limit")]
    pub limit: u16,
}

/// Request for the combined platform + external feed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CombinedMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "client_id", rename = "clientId")]
    pub client_id: String,
    #[serde(default = "default_limit")]
    pub limit: u16,
    #[validate(range(min = 0.0))]
    #[serde(alias = "token_budget", rename = "tokenBudget", default)]
    pub token_budget: Option<f64>,
}

fn default_limit() -> u16 {
    20
}

/// Request to contact a trainer, deducting tokens where the tier requires it
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "client_id", rename = "clientId")]
    pub client_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "trainer_id", rename = "trainerId")]
    pub trainer_id: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub score: f64,
}

/// Request to refund a cancelled session's tokens
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "client_id", rename = "clientId")]
    pub client_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "trainer_id", rename = "trainerId")]
    pub trainer_id: String,
    #[validate(range(min = 0.0))]
    pub amount: f64,
    #[validate(range(min = 0))]
    #[serde(alias = "notice_minutes", rename = "noticeMinutes")]
    pub notice_minutes: i64,
}
