use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{BoostConfig, BoostScope, BoostType, TrainerCandidate};

/// Hard ceiling on any boosted score
pub const MAX_SCORE: f64 = 100.0;

/// Result of applying the active boosts to a base score
#[derive(Debug, Clone)]
pub struct BoostOutcome {
    pub score: f64,
    pub boosted: bool,
    /// Ids of the configurations applied, in composition order
    pub applied: Vec<String>,
}

/// Aggregated promotional state for a trainer at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct BoostStatus {
    #[serde(rename = "hasActiveBoost")]
    pub has_active_boost: bool,
    #[serde(rename = "hasBadge")]
    pub has_badge: bool,
    #[serde(rename = "boostType")]
    pub boost_type: Option<BoostType>,
    pub factor: Option<f64>,
    #[serde(rename = "boostRemainingHours")]
    pub boost_remaining_hours: Option<i64>,
    #[serde(rename = "badgeRemainingHours")]
    pub badge_remaining_hours: Option<i64>,
}

/// True iff the trainer's post-claim boost expiry is set and still ahead of `now`
#[inline]
pub fn has_active_post_claim_boost(trainer: &TrainerCandidate, now: DateTime<Utc>) -> bool {
    trainer.boost_expires_at.is_some_and(|expiry| now < expiry)
}

/// True iff the trainer's new-trainer badge expiry is set and still ahead of `now`
#[inline]
pub fn has_new_trainer_badge(trainer: &TrainerCandidate, now: DateTime<Utc>) -> bool {
    trainer.badge_expires_at.is_some_and(|expiry| now < expiry)
}

fn in_scope(scope: BoostScope, trainer: &TrainerCandidate) -> bool {
    match scope {
        BoostScope::AllTiers => true,
        BoostScope::Tier(tier) => trainer.tier == tier,
    }
}

fn mechanism_active(boost_type: BoostType, trainer: &TrainerCandidate, now: DateTime<Utc>) -> bool {
    match boost_type {
        BoostType::PostClaim => has_active_post_claim_boost(trainer, now),
        BoostType::NewTrainer => has_new_trainer_badge(trainer, now),
    }
}

fn is_applicable(config: &BoostConfig, trainer: &TrainerCandidate, now: DateTime<Utc>) -> bool {
    config.valid_from <= now
        && now < config.valid_until
        && in_scope(config.scope, trainer)
        && mechanism_active(config.boost_type, trainer, now)
}

/// Applicable configurations in composition order: ascending validity start,
/// ties broken by config id. Simultaneous boosts always compose identically.
fn applicable_boosts<'a>(
    trainer: &TrainerCandidate,
    active_boosts: &'a [BoostConfig],
    now: DateTime<Utc>,
) -> Vec<&'a BoostConfig> {
    let mut applicable: Vec<&BoostConfig> = active_boosts
        .iter()
        .filter(|config| is_applicable(config, trainer, now))
        .collect();
    applicable.sort_by(|a, b| a.valid_from.cmp(&b.valid_from).then_with(|| a.id.cmp(&b.id)));
    applicable
}

/// Multiply the base score by every applicable boost factor, clamped to 100
pub fn apply_boost(
    base_score: f64,
    trainer: &TrainerCandidate,
    active_boosts: &[BoostConfig],
    now: DateTime<Utc>,
) -> BoostOutcome {
    let mut score = base_score;
    let mut applied = Vec::new();

    for config in applicable_boosts(trainer, active_boosts, now) {
        score *= config.factor;
        applied.push(config.id.clone());
    }

    BoostOutcome {
        score: score.min(MAX_SCORE),
        boosted: !applied.is_empty(),
        applied,
    }
}

/// Remaining validity, rendered in whole hours under a day, whole days otherwise
fn format_remaining(now: DateTime<Utc>, until: DateTime<Utc>) -> String {
    let remaining = until - now;
    if remaining.num_hours() < 24 {
        format!("{}h", remaining.num_hours().max(1))
    } else {
        format!("{} days", remaining.num_days())
    }
}

/// Human-readable summary of the leading active boost, if any
pub fn generate_boost_explanation(
    trainer: &TrainerCandidate,
    active_boosts: &[BoostConfig],
    now: DateTime<Utc>,
) -> Option<String> {
    let applicable = applicable_boosts(trainer, active_boosts, now);
    let config = applicable.first()?;

    let expiry = match config.boost_type {
        BoostType::PostClaim => trainer.boost_expires_at?,
        BoostType::NewTrainer => trainer.badge_expires_at?,
    };

    let label = match config.boost_type {
        BoostType::PostClaim => "Post-claim visibility boost",
        BoostType::NewTrainer => "New trainer boost",
    };
    let percent = (config.factor - 1.0) * 100.0;

    Some(format!(
        "{}: +{:.0}% for {}",
        label,
        percent,
        format_remaining(now, expiry)
    ))
}

/// Aggregate both promotional mechanisms for a trainer
pub fn get_boost_status(
    trainer: &TrainerCandidate,
    active_boosts: &[BoostConfig],
    now: DateTime<Utc>,
) -> BoostStatus {
    let applicable = applicable_boosts(trainer, active_boosts, now);
    let primary = applicable.first();

    BoostStatus {
        has_active_boost: has_active_post_claim_boost(trainer, now),
        has_badge: has_new_trainer_badge(trainer, now),
        boost_type: primary.map(|config| config.boost_type),
        factor: primary.map(|config| config.factor),
        boost_remaining_hours: trainer
            .boost_expires_at
            .filter(|expiry| now < *expiry)
            .map(|expiry| (expiry - now).num_hours()),
        badge_remaining_hours: trainer
            .badge_expires_at
            .filter(|expiry| now < *expiry)
            .map(|expiry| (expiry - now).num_hours()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn create_trainer(
        boost_expires_at: Option<DateTime<Utc>>,
        badge_expires_at: Option<DateTime<Utc>>,
    ) -> TrainerCandidate {
        TrainerCandidate {
            trainer_id: "trainer_1".to_string(),
            name: "Trainer One".to_string(),
            answers: BTreeMap::new(),
            embeddings: BTreeMap::new(),
            is_available: true,
            required_responses: vec![],
            tier: crate::models::TrainerTier::Paid,
            boost_expires_at,
            badge_expires_at,
            claim_available: false,
        }
    }

    fn post_claim_config(factor: f64) -> BoostConfig {
        BoostConfig {
            id: "post_claim".to_string(),
            boost_type: BoostType::PostClaim,
            factor,
            scope: BoostScope::AllTiers,
            valid_from: fixed_now() - Duration::days(30),
            valid_until: fixed_now() + Duration::days(30),
        }
    }

    fn badge_config(factor: f64) -> BoostConfig {
        BoostConfig {
            id: "new_trainer".to_string(),
            boost_type: BoostType::NewTrainer,
            factor,
            scope: BoostScope::AllTiers,
            valid_from: fixed_now() - Duration::days(10),
            valid_until: fixed_now() + Duration::days(30),
        }
    }

    #[test]
    fn test_boost_flags_respect_expiry() {
        let now = fixed_now();
        let active = create_trainer(Some(now + Duration::hours(5)), None);
        let expired = create_trainer(Some(now - Duration::hours(5)), None);
        let unset = create_trainer(None, None);

        assert!(has_active_post_claim_boost(&active, now));
        assert!(!has_active_post_claim_boost(&expired, now));
        assert!(!has_active_post_claim_boost(&unset, now));
    }

    #[test]
    fn test_apply_boost_multiplies_and_flags() {
        let now = fixed_now();
        let trainer = create_trainer(Some(now + Duration::days(2)), None);

        let outcome = apply_boost(60.0, &trainer, &[post_claim_config(1.1)], now);
        assert!((outcome.score - 66.0).abs() < 1e-9);
        assert!(outcome.boosted);
        assert_eq!(outcome.applied, vec!["post_claim"]);
    }

    #[test]
    fn test_boosted_score_never_exceeds_cap() {
        let now = fixed_now();
        let trainer = create_trainer(Some(now + Duration::days(2)), None);

        let outcome = apply_boost(98.0, &trainer, &[post_claim_config(1.5)], now);
        assert_eq!(outcome.score, MAX_SCORE);
    }

    #[test]
    fn test_inactive_mechanism_is_not_applied() {
        let now = fixed_now();
        let trainer = create_trainer(None, None);

        let outcome = apply_boost(60.0, &trainer, &[post_claim_config(1.1)], now);
        assert_eq!(outcome.score, 60.0);
        assert!(!outcome.boosted);
    }

    #[test]
    fn test_multiple_boosts_compose_in_validity_order() {
        let now = fixed_now();
        let trainer = create_trainer(
            Some(now + Duration::days(2)),
            Some(now + Duration::days(5)),
        );

        // post_claim starts earlier, so it applies first
        let outcome = apply_boost(
            50.0,
            &trainer,
            &[badge_config(1.05), post_claim_config(1.1)],
            now,
        );
        assert_eq!(outcome.applied, vec!["post_claim", "new_trainer"]);
        assert!((outcome.score - 50.0 * 1.1 * 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_tier_scoped_boost() {
        let now = fixed_now();
        let trainer = create_trainer(Some(now + Duration::days(2)), None);

        let mut config = post_claim_config(1.2);
        config.scope = BoostScope::Tier(crate::models::TrainerTier::Free);
        let outcome = apply_boost(50.0, &trainer, &[config], now);
        assert!(!outcome.boosted);
    }

    #[test]
    fn test_explanation_uses_hours_under_a_day() {
        let now = fixed_now();
        let trainer = create_trainer(Some(now + Duration::hours(6)), None);

        let explanation =
            generate_boost_explanation(&trainer, &[post_claim_config(1.1)], now).unwrap();
        assert_eq!(explanation, "Post-claim visibility boost: +10% for 6h");
    }

    #[test]
    fn test_explanation_uses_days_over_a_day() {
        let now = fixed_now();
        let trainer = create_trainer(Some(now + Duration::days(3)), None);

        let explanation =
            generate_boost_explanation(&trainer, &[post_claim_config(1.1)], now).unwrap();
        assert_eq!(explanation, "Post-claim visibility boost: +10% for 3 days");
    }

    #[test]
    fn test_no_explanation_when_inactive() {
        let now = fixed_now();
        let trainer = create_trainer(None, None);
        assert!(generate_boost_explanation(&trainer, &[post_claim_config(1.1)], now).is_none());
    }

    #[test]
    fn test_boost_status_aggregates_both_mechanisms() {
        let now = fixed_now();
        let trainer = create_trainer(
            Some(now + Duration::hours(12)),
            Some(now + Duration::days(4)),
        );

        let status = get_boost_status(
            &trainer,
            &[post_claim_config(1.1), badge_config(1.05)],
            now,
        );
        assert!(status.has_active_boost);
        assert!(status.has_badge);
        assert_eq!(status.boost_type, Some(BoostType::PostClaim));
        assert_eq!(status.factor, Some(1.1));
        assert_eq!(status.boost_remaining_hours, Some(12));
        assert_eq!(status.badge_remaining_hours, Some(96));
    }
}
