use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::matcher::{enhanced_match_details, CombinedRequest};
use crate::core::{tiers, tokens, Matcher};
use crate::models::{
    ClientProfile, CombinedMatchEntry, CombinedMatchesRequest, CombinedMatchesResponse,
    ContactRequest, ErrorResponse, HealthResponse, RankMatchesRequest, RankMatchesResponse,
    RefundRequest, RefundResponse, TokenBalanceResponse, TrainerCandidate,
};
use crate::services::{CacheKey, CacheManager, DirectoryClient, PostgresClient, PostgresError};

/// Attempts at the read-validate-deduct-write cycle before giving up
const BALANCE_RETRY_ATTEMPTS: usize = 3;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub postgres: Arc<PostgresClient>,
    pub cache: Arc<CacheManager>,
    pub directory: Arc<DirectoryClient>,
    pub matcher: Matcher,
    pub max_limit: usize,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/matches/rank", web::post().to(rank_matches))
        .route("/matches/combined", web::post().to(combined_matches))
        .route("/matches/contact", web::post().to(contact_trainer))
        .route("/tokens/balance", web::get().to(token_balance))
        .route("/tokens/refund", web::post().to(refund_tokens));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let pg_healthy = state.postgres.health_check().await.unwrap_or(false);

    let status = if pg_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Load a client profile, going through the cache first
async fn load_client(
    state: &AppState,
    client_id: &str,
) -> Result<ClientProfile, PostgresError> {
    let cache_key = CacheKey::client(client_id);
    if let Ok(profile) = state.cache.get::<ClientProfile>(&cache_key).await {
        return Ok(profile);
    }

    let profile = state.postgres.get_client_profile(client_id).await?;
    if let Err(e) = state.cache.set(&cache_key, &profile).await {
        tracing::warn!("Failed to cache client profile {}: {}", client_id, e);
    }

    Ok(profile)
}

/// Fetch external directory listings, tolerating directory outages
///
/// A dead directory degrades the feed to platform-only; it never fails the
/// request.
async fn load_external_trainers(state: &AppState, client: &ClientProfile) -> Vec<TrainerCandidate> {
    let specialty = client.goal.as_deref().unwrap_or("all");
    let cache_key = CacheKey::directory(specialty);

    if let Ok(trainers) = state.cache.get::<Vec<TrainerCandidate>>(&cache_key).await {
        return trainers;
    }

    match state.directory.list_trainers(client.goal.as_deref()).await {
        Ok(trainers) => {
            if let Err(e) = state.cache.set(&cache_key, &trainers).await {
                tracing::warn!("Failed to cache directory listings: {}", e);
            }
            trainers
        }
        Err(e) => {
            tracing::warn!("Directory unavailable, serving platform-only feed: {}", e);
            vec![]
        }
    }
}

/// Rank the platform trainer pool for a client
///
/// POST /api/v1/matches/rank
///
/// Request body:
/// ```json
/// {
///   "clientId": "string",
///   "limit": 20
/// }
/// ```
async fn rank_matches(
    state: web::Data<AppState>,
    req: web::Json<RankMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for rank request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let client_id = &req.client_id;
    let limit = (req.limit as usize).min(state.max_limit);

    tracing::info!("Ranking trainers for client: {}, limit: {}", client_id, limit);

    let client = match load_client(&state, client_id).await {
        Ok(client) => client,
        Err(PostgresError::NotFound(what)) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Not found".to_string(),
                message: what,
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!("Failed to load client {}: {}", client_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load client profile".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let (trainers, rules, classes) = match load_matching_inputs(&state).await {
        Ok(inputs) => inputs,
        Err(response) => return response,
    };

    let mut outcome =
        match state
            .matcher
            .rank_trainers(&client, &trainers, &rules, &classes, chrono::Utc::now())
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Matching configuration rejected: {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Invalid matching configuration".to_string(),
                    message: e.to_string(),
                    status_code: 500,
                });
            }
        };
    outcome.ranked_trainers.truncate(limit);

    tracing::info!(
        "Returning {} matches for client {} (from {} candidates, {} filtered out)",
        outcome.ranked_trainers.len(),
        client_id,
        outcome.metadata.total_candidates,
        outcome.metadata.failed
    );

    HttpResponse::Ok().json(RankMatchesResponse {
        matches: outcome.ranked_trainers,
        metadata: outcome.metadata,
    })
}

/// Generate the combined platform + external feed
///
/// POST /api/v1/matches/combined
///
/// Request body:
/// ```json
/// {
///   "clientId": "string",
///   "limit": 20,
///   "tokenBudget": 10.0
/// }
/// ```
async fn combined_matches(
    state: web::Data<AppState>,
    req: web::Json<CombinedMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let client_id = &req.client_id;
    let limit = (req.limit as usize).min(state.max_limit);

    let client = match load_client(&state, client_id).await {
        Ok(client) => client,
        Err(PostgresError::NotFound(what)) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Not found".to_string(),
                message: what,
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!("Failed to load client {}: {}", client_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load client profile".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let (platform_trainers, rules, classes) = match load_matching_inputs(&state).await {
        Ok(inputs) => inputs,
        Err(response) => return response,
    };
    let external_trainers = load_external_trainers(&state, &client).await;

    let request = CombinedRequest {
        client_id: client_id.clone(),
        limit,
        token_budget: req.token_budget,
    };

    let outcome = match state.matcher.generate_combined_matches(
        &client,
        platform_trainers,
        external_trainers,
        &rules,
        &classes,
        &request,
        chrono::Utc::now(),
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Matching configuration rejected: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Invalid matching configuration".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    tracing::info!(
        "Returning combined feed for client {}: {} platform, {} external",
        client_id,
        outcome.metadata.platform_matches,
        outcome.metadata.external_matches
    );

    let matches = outcome
        .matches
        .into_iter()
        .map(|entry| {
            let details = enhanced_match_details(&entry);
            CombinedMatchEntry { entry, details }
        })
        .collect();

    HttpResponse::Ok().json(CombinedMatchesResponse {
        matches,
        metadata: outcome.metadata,
    })
}

/// Load trainers, rules and weight classes for a matching run
async fn load_matching_inputs(
    state: &AppState,
) -> Result<
    (
        Vec<TrainerCandidate>,
        Vec<crate::models::HardFilterRule>,
        Vec<crate::models::WeightClass>,
    ),
    HttpResponse,
> {
    let trainers = state.postgres.get_platform_trainers().await.map_err(|e| {
        tracing::error!("Failed to load trainer pool: {}", e);
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to load trainer pool".to_string(),
            message: e.to_string(),
            status_code: 500,
        })
    })?;

    let rules = state.postgres.get_hard_filter_rules().await.map_err(|e| {
        tracing::error!("Failed to load hard filter rules: {}", e);
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to load hard filter rules".to_string(),
            message: e.to_string(),
            status_code: 500,
        })
    })?;

    let classes = state.postgres.get_weight_classes().await.map_err(|e| {
        tracing::error!("Failed to load weight classes: {}", e);
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to load weight classes".to_string(),
            message: e.to_string(),
            status_code: 500,
        })
    })?;

    Ok((trainers, rules, classes))
}

/// Contact a trainer, deducting tokens where the tier requires it
///
/// POST /api/v1/matches/contact
///
/// Economic denials (insufficient tokens, limits reached) come back as 200s
/// with `allowed: false`; they are expected outcomes, not server errors.
async fn contact_trainer(
    state: web::Data<AppState>,
    req: web::Json<ContactRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let trainer = match state.postgres.get_trainer(&req.trainer_id).await {
        Ok(trainer) => trainer,
        Err(PostgresError::NotFound(what)) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Not found".to_string(),
                message: what,
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!("Failed to load trainer {}: {}", req.trainer_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load trainer".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let usage = match state.postgres.get_contact_usage(&req.client_id).await {
        Ok(usage) => usage,
        Err(e) => {
            tracing::error!("Failed to load contact usage for {}: {}", req.client_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load contact usage".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let (mut balance, mut version) = match state.postgres.get_token_balance(&req.client_id).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("Failed to load balance for {}: {}", req.client_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load token balance".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let decision = tiers::can_contact_trainer(trainer.tier, &usage, balance.available);
    if !decision.allowed {
        return HttpResponse::Ok().json(crate::models::ContactResponse {
            allowed: false,
            cost: decision.cost,
            reason: decision.reason,
            transaction_id: None,
            balance: None,
        });
    }

    let rules = tiers::visibility_rules(trainer.tier);

    // Free tiers only bump the usage counters
    if !rules.requires_token {
        if let Err(e) = state
            .postgres
            .record_contact(&req.client_id, &req.trainer_id, true)
            .await
        {
            tracing::error!("Failed to record contact: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to record contact".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }

        return HttpResponse::Ok().json(crate::models::ContactResponse {
            allowed: true,
            cost: 0.0,
            reason: None,
            transaction_id: None,
            balance: Some(balance),
        });
    }

    // Token tiers run the read-validate-deduct-write cycle under optimistic
    // concurrency; a version conflict means another contact won the race.
    for attempt in 0..BALANCE_RETRY_ATTEMPTS {
        let validation = tokens::validate_token_balance(&balance, trainer.tier, req.score);
        if !validation.valid {
            return HttpResponse::Ok().json(crate::models::ContactResponse {
                allowed: false,
                cost: validation.required,
                reason: validation.reason,
                transaction_id: None,
                balance: None,
            });
        }

        let (updated, transaction) = match tokens::deduct_tokens(&balance, validation.required) {
            Ok(pair) => pair,
            Err(e) => {
                return HttpResponse::Ok().json(crate::models::ContactResponse {
                    allowed: false,
                    cost: validation.required,
                    reason: Some(e.to_string()),
                    transaction_id: None,
                    balance: None,
                });
            }
        };

        match state
            .postgres
            .save_token_balance(&req.client_id, &updated, version)
            .await
        {
            Ok(()) => {
                if let Err(e) = state
                    .postgres
                    .record_transaction(&req.client_id, &req.trainer_id, &transaction)
                    .await
                {
                    tracing::error!("Balance updated but transaction audit failed: {}", e);
                }
                if let Err(e) = state
                    .postgres
                    .record_contact(&req.client_id, &req.trainer_id, false)
                    .await
                {
                    tracing::warn!("Failed to bump contact counters: {}", e);
                }
                if let Err(e) = state.cache.delete(&CacheKey::balance(&req.client_id)).await {
                    tracing::warn!("Failed to invalidate balance cache: {}", e);
                }

                return HttpResponse::Ok().json(crate::models::ContactResponse {
                    allowed: true,
                    cost: validation.required,
                    reason: None,
                    transaction_id: Some(transaction.id),
                    balance: Some(updated),
                });
            }
            Err(PostgresError::VersionConflict(_)) => {
                tracing::debug!(
                    "Balance version conflict for {} (attempt {})",
                    req.client_id,
                    attempt + 1
                );
                match state.postgres.get_token_balance(&req.client_id).await {
                    Ok((fresh_balance, fresh_version)) => {
                        balance = fresh_balance;
                        version = fresh_version;
                    }
                    Err(e) => {
                        tracing::error!("Failed to reload balance: {}", e);
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to save balance for {}: {}", req.client_id, e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to update balance".to_string(),
                    message: e.to_string(),
                    status_code: 500,
                });
            }
        }
    }

    HttpResponse::Conflict().json(ErrorResponse {
        error: "Balance update conflict".to_string(),
        message: "Concurrent balance updates, please retry".to_string(),
        status_code: 409,
    })
}

/// Refund a cancelled session according to the notice-time schedule
///
/// POST /api/v1/tokens/refund
async fn refund_tokens(
    state: web::Data<AppState>,
    req: web::Json<RefundRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let (balance, version) = match state.postgres.get_token_balance(&req.client_id).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("Failed to load balance for {}: {}", req.client_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load token balance".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let refund_amount = tokens::calculate_refund(req.amount, req.notice_minutes);
    if refund_amount <= 0.0 {
        return HttpResponse::Ok().json(RefundResponse {
            refunded: 0.0,
            transaction_id: None,
            balance,
        });
    }

    let (updated, transaction) = match tokens::refund_tokens(&balance, refund_amount) {
        Ok(pair) => pair,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Refund rejected".to_string(),
                message: e.to_string(),
                status_code: 400,
            });
        }
    };

    match state
        .postgres
        .save_token_balance(&req.client_id, &updated, version)
        .await
    {
        Ok(()) => {
            if let Err(e) = state
                .postgres
                .record_transaction(&req.client_id, &req.trainer_id, &transaction)
                .await
            {
                tracing::error!("Balance updated but transaction audit failed: {}", e);
            }
            if let Err(e) = state.cache.delete(&CacheKey::balance(&req.client_id)).await {
                tracing::warn!("Failed to invalidate balance cache: {}", e);
            }

            HttpResponse::Ok().json(RefundResponse {
                refunded: refund_amount,
                transaction_id: Some(transaction.id),
                balance: updated,
            })
        }
        Err(PostgresError::VersionConflict(_)) => HttpResponse::Conflict().json(ErrorResponse {
            error: "Balance update conflict".to_string(),
            message: "Concurrent balance updates, please retry".to_string(),
            status_code: 409,
        }),
        Err(e) => {
            tracing::error!("Failed to save balance for {}: {}", req.client_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to update balance".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

/// Get a client's token balance and usage summary
///
/// GET /api/v1/tokens/balance?clientId={clientId}
async fn token_balance(
    state: web::Data<AppState>,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> impl Responder {
    let client_id = match query.get("clientId") {
        Some(id) => id,
        None => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Missing clientId parameter".to_string(),
                message: "clientId query parameter is required".to_string(),
                status_code: 400,
            });
        }
    };

    match state.postgres.get_token_balance(client_id).await {
        Ok((balance, _version)) => {
            let summary = tokens::token_usage_summary(&balance);
            HttpResponse::Ok().json(TokenBalanceResponse {
                client_id: client_id.clone(),
                balance,
                summary,
            })
        }
        Err(e) => {
            tracing::error!("Failed to fetch balance for {}: {}", client_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch balance".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}
