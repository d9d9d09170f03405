use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::tiers;
use crate::models::{CombinedMatch, TokenBalance, TrainerTier};

/// Score at which the premium surcharge applies
pub const PREMIUM_SCORE: f64 = 90.0;
pub const PREMIUM_BONUS: f64 = 1.0;
/// Score at which the elevated surcharge applies
pub const ELEVATED_SCORE: f64 = 80.0;
pub const ELEVATED_BONUS: f64 = 0.5;
/// Minimum charge whenever a tier is token-gated
pub const TOKEN_COST_FLOOR: f64 = 1.0;
/// Usage percentage at which a balance is reported critical
pub const CRITICAL_USAGE_PERCENT: u32 = 90;

/// Economic failures are structured results, never panics
#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Insufficient tokens")]
    InsufficientTokens,

    #[error("Invalid token amount: {0}")]
    InvalidAmount(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deduction,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deduction => "deduction",
            TransactionKind::Refund => "refund",
        }
    }
}

/// Audit record for a balance mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub id: Uuid,
    pub amount: f64,
    pub kind: TransactionKind,
}

/// Token cost for contacting a trainer
///
/// Tier base plus a surcharge for top-scoring matches, floored at one token
/// whenever the tier is token-gated. Non-token tiers always cost zero.
pub fn calculate_token_cost(tier: TrainerTier, score: f64) -> f64 {
    let rules = tiers::visibility_rules(tier);
    if !rules.requires_token {
        return 0.0;
    }

    let mut cost = rules.token_cost;
    if score >= PREMIUM_SCORE {
        cost += PREMIUM_BONUS;
    } else if score >= ELEVATED_SCORE {
        cost += ELEVATED_BONUS;
    }

    cost.max(TOKEN_COST_FLOOR)
}

/// Non-throwing balance check against the cost of a contact
#[derive(Debug, Clone, Serialize)]
pub struct TokenValidation {
    pub valid: bool,
    pub required: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn validate_token_balance(
    balance: &TokenBalance,
    tier: TrainerTier,
    score: f64,
) -> TokenValidation {
    let required = calculate_token_cost(tier, score);
    if balance.available >= required {
        TokenValidation {
            valid: true,
            required,
            remaining: Some(balance.available - required),
            reason: None,
        }
    } else {
        TokenValidation {
            valid: false,
            required,
            remaining: None,
            reason: Some("Insufficient tokens".to_string()),
        }
    }
}

/// Deduct from a caller-owned balance
///
/// The one state-mutating operation in the engine. Returns the updated
/// balance plus an audit transaction; atomic persistence of both is the
/// caller's responsibility.
pub fn deduct_tokens(
    balance: &TokenBalance,
    amount: f64,
) -> Result<(TokenBalance, TokenTransaction), TokenError> {
    if amount < 0.0 || !amount.is_finite() {
        return Err(TokenError::InvalidAmount(amount));
    }
    if amount > balance.available {
        return Err(TokenError::InsufficientTokens);
    }

    let updated = TokenBalance {
        available: balance.available - amount,
        used: balance.used + amount,
        total: balance.total,
    };
    let transaction = TokenTransaction {
        id: Uuid::new_v4(),
        amount,
        kind: TransactionKind::Deduction,
    };

    Ok((updated, transaction))
}

/// Return previously deducted tokens to the balance, bounded by `used`
pub fn refund_tokens(
    balance: &TokenBalance,
    amount: f64,
) -> Result<(TokenBalance, TokenTransaction), TokenError> {
    if amount < 0.0 || !amount.is_finite() || amount > balance.used {
        return Err(TokenError::InvalidAmount(amount));
    }

    let updated = TokenBalance {
        available: balance.available + amount,
        used: balance.used - amount,
        total: balance.total,
    };
    let transaction = TokenTransaction {
        id: Uuid::new_v4(),
        amount,
        kind: TransactionKind::Refund,
    };

    Ok((updated, transaction))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Empty,
    Critical,
    Healthy,
}

/// Usage summary for balance displays
#[derive(Debug, Clone, Serialize)]
pub struct TokenUsageSummary {
    #[serde(rename = "percentageUsed")]
    pub percentage_used: u32,
    pub status: BalanceStatus,
}

pub fn token_usage_summary(balance: &TokenBalance) -> TokenUsageSummary {
    let percentage_used = if balance.total > 0.0 {
        (100.0 * balance.used / balance.total).round() as u32
    } else {
        0
    };

    let status = if balance.available <= 0.0 {
        BalanceStatus::Empty
    } else if percentage_used >= CRITICAL_USAGE_PERCENT {
        BalanceStatus::Critical
    } else {
        BalanceStatus::Healthy
    };

    TokenUsageSummary {
        percentage_used,
        status,
    }
}

/// Cancellation refund schedule
///
/// Full refund at an hour's notice, stepping down to nothing under fifteen
/// minutes. The refunded amount is floored to a whole token.
pub fn calculate_refund(amount: f64, notice_minutes: i64) -> f64 {
    let fraction = if notice_minutes >= 60 {
        1.0
    } else if notice_minutes >= 30 {
        0.5
    } else if notice_minutes >= 15 {
        0.25
    } else {
        0.0
    };

    (amount * fraction).floor()
}

/// Feed truncated to a token budget
#[derive(Debug, Clone, Serialize)]
pub struct BudgetedFeed {
    pub matches: Vec<CombinedMatch>,
    #[serde(rename = "insufficientTokens")]
    pub insufficient_tokens: bool,
    #[serde(rename = "tokensRequired")]
    pub tokens_required: f64,
}

/// Truncate a ranked feed to what the available balance can afford
///
/// Walks in rank order, admitting matches while the cumulative cost fits.
/// Order-preserving: once one match is excluded every later match is excluded
/// too; a cheaper lower-ranked match never jumps the queue.
pub fn apply_token_costs_to_matches(
    matches: Vec<CombinedMatch>,
    balance: &TokenBalance,
) -> BudgetedFeed {
    let tokens_required: f64 = matches.iter().map(|m| m.ranked.token_cost).sum();

    let mut admitted = Vec::with_capacity(matches.len());
    let mut spent = 0.0;
    let mut excluded = false;

    for m in matches {
        let cost = m.ranked.token_cost;
        if !excluded && spent + cost <= balance.available + 1e-9 {
            spent += cost;
            admitted.push(m);
        } else {
            excluded = true;
        }
    }

    BudgetedFeed {
        matches: admitted,
        insufficient_tokens: excluded,
        tokens_required,
    }
}
