use serde::{Deserialize, Serialize};

use crate::core::matcher::{CombinedMetadata, EnhancedMatchDetails, RankMetadata};
use crate::core::tokens::TokenUsageSummary;
use crate::models::domain::{CombinedMatch, RankedTrainer, TokenBalance};

/// Response for the rank endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RankMatchesResponse {
    pub matches: Vec<RankedTrainer>,
    pub metadata: RankMetadata,
}

/// Combined feed entry with its derived presentation metadata
#[derive(Debug, Clone, Serialize)]
pub struct CombinedMatchEntry {
    #[serde(flatten)]
    pub entry: CombinedMatch,
    pub details: EnhancedMatchDetails,
}

/// Response for the combined feed endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CombinedMatchesResponse {
    pub matches: Vec<CombinedMatchEntry>,
    pub metadata: CombinedMetadata,
}

/// Response for a contact attempt
///
/// Economic denials are successful responses with `allowed = false`; they are
/// expected user-facing outcomes, never HTTP errors.
#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub allowed: bool,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<uuid::Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<TokenBalance>,
}

/// Response for a refund request
#[derive(Debug, Clone, Serialize)]
pub struct RefundResponse {
    pub refunded: f64,
    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<uuid::Uuid>,
    pub balance: TokenBalance,
}

/// Response for the token balance endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TokenBalanceResponse {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub balance: TokenBalance,
    pub summary: TokenUsageSummary,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
