use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{boost, confidence, explain, filters, scoring, tiers, tokens, EngineError};
use crate::models::{
    BoostConfig, ClientProfile, CombinedMatch, HardFilterRule, HardFilterStatus, RankedTrainer,
    TokenBalance, TrainerCandidate, WeightClass,
};

/// Score ceiling for externally sourced, unclaimed profiles
pub const EXTERNAL_SCORE_CAP: f64 = 75.0;
/// Inclusion gate for external profiles; anything below is dropped
pub const EXTERNAL_MIN_SCORE: f64 = 40.0;

/// Trainer pool assembled for one client, tagged by origin
#[derive(Debug, Clone)]
pub struct CandidatePool {
    pub platform: Vec<TrainerCandidate>,
    pub external: Vec<TrainerCandidate>,
}

/// Build the full pool from both sources
///
/// A claimed platform profile shadows its external copy; the same trainer
/// never appears twice. Identity dedup only, no eligibility logic here.
pub fn assemble_pool(
    platform: Vec<TrainerCandidate>,
    external: Vec<TrainerCandidate>,
) -> CandidatePool {
    let platform_ids: HashSet<String> = platform
        .iter()
        .map(|trainer| trainer.trainer_id.clone())
        .collect();

    let external = external
        .into_iter()
        .filter(|trainer| !platform_ids.contains(&trainer.trainer_id))
        .collect();

    CandidatePool { platform, external }
}

/// Metadata attached to a ranking run
#[derive(Debug, Clone, Serialize)]
pub struct RankMetadata {
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Output of the platform-only ranking contract
#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    #[serde(rename = "rankedTrainers")]
    pub ranked_trainers: Vec<RankedTrainer>,
    pub metadata: RankMetadata,
}

/// Combined-feed request parameters
#[derive(Debug, Clone)]
pub struct CombinedRequest {
    pub client_id: String,
    pub limit: usize,
    pub token_budget: Option<f64>,
}

/// Metadata attached to a combined feed
#[derive(Debug, Clone, Serialize)]
pub struct CombinedMetadata {
    #[serde(rename = "platformMatches")]
    pub platform_matches: usize,
    #[serde(rename = "externalMatches")]
    pub external_matches: usize,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    #[serde(rename = "insufficientTokens")]
    pub insufficient_tokens: bool,
}

/// Output of the combined platform + external contract
#[derive(Debug, Clone, Serialize)]
pub struct CombinedOutcome {
    pub matches: Vec<CombinedMatch>,
    pub metadata: CombinedMetadata,
}

/// Main matching orchestrator
///
/// # Pipeline stages
/// 1. Hard filter elimination
/// 2. Weight-class scoring and confidence estimation
/// 3. Time-boxed boosting (platform trainers only)
/// 4. Deterministic ranking with order-invariant explanations
/// 5. Tier visibility enforcement and token cost estimation
///
/// Pure over its inputs: `now` is injected, nothing reads the wall clock, and
/// identical inputs always produce identical output.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    boosts: Vec<BoostConfig>,
}

impl Matcher {
    pub fn new(boosts: Vec<BoostConfig>) -> Self {
        Self { boosts }
    }

    /// Rank the platform trainer pool for a client
    ///
    /// Hard-filter failures are terminal classifications, not errors: the
    /// failing trainer is dropped and the rest of the pool ranks normally.
    pub fn rank_trainers(
        &self,
        client: &ClientProfile,
        trainers: &[TrainerCandidate],
        rules: &[HardFilterRule],
        classes: &[WeightClass],
        now: DateTime<Utc>,
    ) -> Result<RankOutcome, EngineError> {
        filters::validate_rules(rules)?;
        scoring::validate_weight_classes(classes)?;

        let total_candidates = trainers.len();
        let mut ranked: Vec<RankedTrainer> = trainers
            .iter()
            .filter_map(|trainer| self.rank_one(client, trainer, rules, classes, true, now))
            .collect();
        let passed = ranked.len();

        sort_ranked(&mut ranked);
        for m in &mut ranked {
            tiers::apply_visibility(m);
        }

        Ok(RankOutcome {
            ranked_trainers: ranked,
            metadata: RankMetadata {
                total_candidates,
                passed,
                failed: total_candidates - passed,
            },
        })
    }

    /// Filter, score, boost and explain a single candidate
    ///
    /// Returns `None` for hard-filter failures; those candidates never reach
    /// ranking or output. Explanations are built here, from this trainer's
    /// aggregates alone, before any sorting happens.
    fn rank_one(
        &self,
        client: &ClientProfile,
        trainer: &TrainerCandidate,
        rules: &[HardFilterRule],
        classes: &[WeightClass],
        allow_boosts: bool,
        now: DateTime<Utc>,
    ) -> Option<RankedTrainer> {
        if let HardFilterStatus::Failed { reason } = filters::evaluate_hard_filters(trainer, rules)
        {
            tracing::debug!("Trainer {} excluded: {}", trainer.trainer_id, reason);
            return None;
        }

        let score = scoring::score_trainer(client, trainer, classes);

        let outcome = if allow_boosts {
            boost::apply_boost(score.raw, trainer, &self.boosts, now)
        } else {
            boost::BoostOutcome {
                score: score.raw,
                boosted: false,
                applied: vec![],
            }
        };
        let final_score = scoring::round_score(outcome.score);

        // Confidence reflects the unboosted evidence, not promotional lift
        let confidence = confidence::estimate(score.raw, score.compared_questions);

        let boost_explanation = if outcome.boosted {
            boost::generate_boost_explanation(trainer, &self.boosts, now)
        } else {
            None
        };
        let explanations =
            explain::build_explanations(&score.breakdown, boost_explanation, final_score);
        let token_cost = tokens::calculate_token_cost(trainer.tier, final_score);

        Some(RankedTrainer {
            trainer_id: trainer.trainer_id.clone(),
            name: trainer.name.clone(),
            score: final_score,
            confidence,
            explanations,
            hard_filter_status: HardFilterStatus::Passed,
            breakdown: score.breakdown,
            tier: trainer.tier,
            token_cost,
            is_boosted: outcome.boosted,
            applied_boosts: outcome.applied,
        })
    }

    /// Strict path for externally sourced profiles
    ///
    /// Same hard filters, but the score is capped, gated, and never boosted;
    /// an unclaimed listing cannot outrank verified platform trainers on
    /// scraped data alone.
    fn rank_external(
        &self,
        client: &ClientProfile,
        trainer: &TrainerCandidate,
        rules: &[HardFilterRule],
        classes: &[WeightClass],
        now: DateTime<Utc>,
    ) -> Option<CombinedMatch> {
        let mut ranked = self.rank_one(client, trainer, rules, classes, false, now)?;

        if ranked.score < EXTERNAL_MIN_SCORE {
            tracing::debug!(
                "External trainer {} below inclusion gate ({})",
                ranked.trainer_id,
                ranked.score
            );
            return None;
        }
        if ranked.score > EXTERNAL_SCORE_CAP {
            ranked.score = EXTERNAL_SCORE_CAP;
            ranked.token_cost = tokens::calculate_token_cost(ranked.tier, ranked.score);
        }

        Some(CombinedMatch {
            ranked,
            is_external: true,
            claim_available: trainer.claim_available,
            contact_limit_reached: false,
        })
    }

    /// Merge platform and external pools into one ranked feed
    pub fn generate_combined_matches(
        &self,
        client: &ClientProfile,
        platform_trainers: Vec<TrainerCandidate>,
        external_trainers: Vec<TrainerCandidate>,
        rules: &[HardFilterRule],
        classes: &[WeightClass],
        request: &CombinedRequest,
        now: DateTime<Utc>,
    ) -> Result<CombinedOutcome, EngineError> {
        filters::validate_rules(rules)?;
        scoring::validate_weight_classes(classes)?;

        let pool = assemble_pool(platform_trainers, external_trainers);
        let total_candidates = pool.platform.len() + pool.external.len();

        let mut matches: Vec<CombinedMatch> = pool
            .platform
            .iter()
            .filter_map(|trainer| {
                self.rank_one(client, trainer, rules, classes, true, now)
                    .map(|ranked| CombinedMatch {
                        ranked,
                        is_external: false,
                        claim_available: false,
                        contact_limit_reached: false,
                    })
            })
            .collect();
        matches.extend(
            pool.external
                .iter()
                .filter_map(|trainer| self.rank_external(client, trainer, rules, classes, now)),
        );

        sort_combined(&mut matches);
        for m in &mut matches {
            tiers::apply_visibility(&mut m.ranked);
        }
        matches.truncate(request.limit);

        let mut insufficient_tokens = false;
        if let Some(budget) = request.token_budget {
            let feed =
                tokens::apply_token_costs_to_matches(matches, &TokenBalance::new(budget, 0.0));
            insufficient_tokens = feed.insufficient_tokens;
            matches = feed.matches;
        }

        let platform_matches = matches.iter().filter(|m| !m.is_external).count();
        let external_matches = matches.len() - platform_matches;

        Ok(CombinedOutcome {
            matches,
            metadata: CombinedMetadata {
                platform_matches,
                external_matches,
                total_candidates,
                insufficient_tokens,
            },
        })
    }
}

/// Final score descending, trainer id ascending on ties: a total order, so
/// repeated runs always produce the same ranking
fn sort_ranked(matches: &mut [RankedTrainer]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.trainer_id.cmp(&b.trainer_id))
    });
}

fn sort_combined(matches: &mut [CombinedMatch]) {
    matches.sort_by(|a, b| {
        b.ranked
            .score
            .partial_cmp(&a.ranked.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ranked.trainer_id.cmp(&b.ranked.trainer_id))
    });
}

/// Contact button state for a feed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactAction {
    Contact,
    Claim,
    Locked,
}

/// Presentation metadata derived purely from a match's flags; no I/O
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedMatchDetails {
    pub badges: Vec<String>,
    #[serde(rename = "tierLabel")]
    pub tier_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(rename = "contactAction")]
    pub contact_action: ContactAction,
}

pub fn enhanced_match_details(m: &CombinedMatch) -> EnhancedMatchDetails {
    let mut badges = Vec::new();
    if m.ranked.is_boosted {
        badges.push("Boosted".to_string());
    }
    if m.is_external {
        badges.push("External Listing".to_string());
    }

    let tooltip = if m.is_external {
        Some("Sourced from a public listing; details may be incomplete".to_string())
    } else if m.ranked.is_boosted {
        Some("This trainer is currently promoted".to_string())
    } else {
        None
    };

    let contact_action = if m.contact_limit_reached {
        ContactAction::Locked
    } else if m.is_external && m.claim_available {
        ContactAction::Claim
    } else {
        ContactAction::Contact
    };

    EnhancedMatchDetails {
        badges,
        tier_label: tiers::tier_display_name(m.ranked.tier),
        tooltip,
        contact_action,
    }
}
