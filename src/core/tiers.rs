use serde::Serialize;

use crate::models::{ContactUsage, RankedTrainer, TrainerTier};

/// Output visibility level for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Full,
    Partial,
    Blurred,
}

/// Per-tier visibility and contact economics
#[derive(Debug, Clone, Copy)]
pub struct TierRules {
    pub tier: TrainerTier,
    pub visibility: Visibility,
    pub requires_token: bool,
    pub token_cost: f64,
    pub max_free_contacts: Option<u32>,
    pub matches_per_week: u32,
    pub contacts_per_month: u32,
}

/// The full tier table. Data, not control flow: a new tier is a row, not a branch.
pub const TIER_RULES: [TierRules; 5] = [
    TierRules {
        tier: TrainerTier::EliteVerified,
        visibility: Visibility::Full,
        requires_token: true,
        token_cost: 3.0,
        max_free_contacts: None,
        matches_per_week: 50,
        contacts_per_month: 100,
    },
    TierRules {
        tier: TrainerTier::Verified,
        visibility: Visibility::Full,
        requires_token: true,
        token_cost: 2.0,
        max_free_contacts: None,
        matches_per_week: 30,
        contacts_per_month: 60,
    },
    TierRules {
        tier: TrainerTier::Paid,
        visibility: Visibility::Full,
        requires_token: true,
        token_cost: 1.0,
        max_free_contacts: None,
        matches_per_week: 20,
        contacts_per_month: 40,
    },
    TierRules {
        tier: TrainerTier::Free,
        visibility: Visibility::Partial,
        requires_token: false,
        token_cost: 0.0,
        max_free_contacts: Some(3),
        matches_per_week: 10,
        contacts_per_month: 10,
    },
    TierRules {
        tier: TrainerTier::Web,
        visibility: Visibility::Blurred,
        requires_token: false,
        token_cost: 0.0,
        max_free_contacts: Some(1),
        matches_per_week: 5,
        contacts_per_month: 3,
    },
];

/// Row lookup for a tier; `Web` is the catch-all row
pub fn visibility_rules(tier: TrainerTier) -> &'static TierRules {
    TIER_RULES
        .iter()
        .find(|rules| rules.tier == tier)
        .unwrap_or(&TIER_RULES[4])
}

/// Obfuscation buckets for blurred-tier scores
pub const SCORE_BUCKETS: [f64; 4] = [55.0, 70.0, 85.0, 95.0];

/// Breakdown classes still revealed at partial visibility
pub const PARTIAL_VISIBLE_CLASSES: [&str; 2] = ["goals", "experience"];

/// Snap a true score to the nearest fixed bucket; exact midpoints snap down
///
/// The same true score always lands in the same bucket, so only a coarse
/// signal survives obfuscation.
pub fn obfuscate_score(score: f64) -> f64 {
    let mut best = SCORE_BUCKETS[0];
    for bucket in SCORE_BUCKETS {
        if (bucket - score).abs() < (best - score).abs() {
            best = bucket;
        }
    }
    best
}

/// Redact a ranked match according to its trainer's tier
///
/// Blurred listings never expose the true score or any breakdown detail;
/// partial listings keep the defined breakdown subset and zero the rest.
pub fn apply_visibility(m: &mut RankedTrainer) {
    let rules = visibility_rules(m.tier);
    match rules.visibility {
        Visibility::Full => {}
        Visibility::Partial => {
            for entry in &mut m.breakdown {
                if !PARTIAL_VISIBLE_CLASSES.contains(&entry.class_id.as_str()) {
                    entry.average = 0.0;
                    entry.weighted = 0.0;
                    entry.compared_questions = 0;
                }
            }
        }
        Visibility::Blurred => {
            m.score = obfuscate_score(m.score);
            for entry in &mut m.breakdown {
                entry.average = 0.0;
                entry.weighted = 0.0;
                entry.compared_questions = 0;
            }
            m.explanations =
                vec!["Unverified listing. Claim this profile to unlock full match details"
                    .to_string()];
        }
    }
}

/// Contact decision for a client attempting to reach a trainer
#[derive(Debug, Clone, Serialize)]
pub struct ContactDecision {
    pub allowed: bool,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Evaluate contact gating
///
/// Token-gated tiers check the balance, free tiers check the free-contact
/// quota, then the tier's weekly and monthly rate limits apply to everyone.
pub fn can_contact_trainer(
    tier: TrainerTier,
    usage: &ContactUsage,
    available_tokens: f64,
) -> ContactDecision {
    let rules = visibility_rules(tier);

    if rules.requires_token {
        if available_tokens < rules.token_cost {
            return ContactDecision {
                allowed: false,
                cost: rules.token_cost,
                reason: Some("Insufficient tokens".to_string()),
            };
        }
    } else if let Some(max_free) = rules.max_free_contacts {
        if usage.free_contacts_used >= max_free {
            return ContactDecision {
                allowed: false,
                cost: 0.0,
                reason: Some("Free contact limit reached".to_string()),
            };
        }
    }

    if usage.matches_this_week >= rules.matches_per_week {
        return ContactDecision {
            allowed: false,
            cost: rules.token_cost,
            reason: Some("Weekly match limit reached".to_string()),
        };
    }
    if usage.contacts_this_month >= rules.contacts_per_month {
        return ContactDecision {
            allowed: false,
            cost: rules.token_cost,
            reason: Some("Monthly contact limit reached".to_string()),
        };
    }

    ContactDecision {
        allowed: true,
        cost: rules.token_cost,
        reason: None,
    }
}

/// Display label for a known tier
pub fn tier_display_name(tier: TrainerTier) -> &'static str {
    match tier {
        TrainerTier::EliteVerified => "Elite Verified Trainer",
        TrainerTier::Verified => "Verified Trainer",
        TrainerTier::Paid => "Pro Trainer",
        TrainerTier::Free => "Community Trainer",
        TrainerTier::Web => "Web Listing",
    }
}

/// Display label straight from a raw tier string, for wire boundaries
pub fn tier_display_name_from_raw(raw: &str) -> &'static str {
    match raw {
        "elite_verified" | "verified" | "paid" | "free" | "web" => {
            tier_display_name(TrainerTier::from_wire(raw))
        }
        _ => "Unknown Tier",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, HardFilterStatus, ScoreBreakdown};

    fn ranked(tier: TrainerTier, score: f64) -> RankedTrainer {
        RankedTrainer {
            trainer_id: "trainer_1".to_string(),
            name: "Trainer One".to_string(),
            score,
            confidence: Confidence::Medium,
            explanations: vec!["Strong alignment on training goals (92%)".to_string()],
            hard_filter_status: HardFilterStatus::Passed,
            breakdown: vec![
                ScoreBreakdown {
                    class_id: "goals".to_string(),
                    label: "Training goals".to_string(),
                    average: 92.0,
                    weighted: 55.2,
                    compared_questions: 3,
                },
                ScoreBreakdown {
                    class_id: "style".to_string(),
                    label: "Coaching style".to_string(),
                    average: 40.0,
                    weighted: 16.0,
                    compared_questions: 2,
                },
            ],
            tier,
            token_cost: 0.0,
            is_boosted: false,
            applied_boosts: vec![],
        }
    }

    #[test]
    fn test_tier_table_is_complete() {
        for tier in [
            TrainerTier::EliteVerified,
            TrainerTier::Verified,
            TrainerTier::Paid,
            TrainerTier::Free,
            TrainerTier::Web,
        ] {
            assert_eq!(visibility_rules(tier).tier, tier);
        }
    }

    #[test]
    fn test_blurred_score_is_always_a_bucket() {
        for score in [0.0, 12.3, 55.0, 62.4, 62.5, 77.7, 91.0, 100.0] {
            let bucket = obfuscate_score(score);
            assert!(SCORE_BUCKETS.contains(&bucket), "{} -> {}", score, bucket);
        }
        // Exact midpoint snaps to the lower bucket
        assert_eq!(obfuscate_score(62.5), 55.0);
        assert_eq!(obfuscate_score(77.5), 70.0);
    }

    #[test]
    fn test_blurred_never_exposes_true_score() {
        let mut m = ranked(TrainerTier::Web, 73.4);
        apply_visibility(&mut m);
        assert_ne!(m.score, 73.4);
        assert!(SCORE_BUCKETS.contains(&m.score));
        assert!(m.breakdown.iter().all(|entry| entry.average == 0.0));
        assert!(!m.explanations.is_empty());
    }

    #[test]
    fn test_partial_keeps_defined_subset() {
        let mut m = ranked(TrainerTier::Free, 71.2);
        apply_visibility(&mut m);
        assert_eq!(m.score, 71.2);
        assert_eq!(m.breakdown[0].average, 92.0);
        assert_eq!(m.breakdown[1].average, 0.0);
        assert_eq!(m.breakdown[1].compared_questions, 0);
    }

    #[test]
    fn test_full_passes_through() {
        let mut m = ranked(TrainerTier::Verified, 71.2);
        let before = m.clone();
        apply_visibility(&mut m);
        assert_eq!(m.score, before.score);
        assert_eq!(m.breakdown, before.breakdown);
    }

    #[test]
    fn test_contact_requires_tokens_on_paid_tiers() {
        let usage = ContactUsage::default();
        let denied = can_contact_trainer(TrainerTier::Verified, &usage, 1.5);
        assert!(!denied.allowed);
        assert_eq!(denied.reason.as_deref(), Some("Insufficient tokens"));

        let allowed = can_contact_trainer(TrainerTier::Verified, &usage, 2.0);
        assert!(allowed.allowed);
        assert_eq!(allowed.cost, 2.0);
    }

    #[test]
    fn test_free_contact_limit() {
        let usage = ContactUsage {
            free_contacts_used: 3,
            ..Default::default()
        };
        let denied = can_contact_trainer(TrainerTier::Free, &usage, 0.0);
        assert!(!denied.allowed);
        assert_eq!(denied.reason.as_deref(), Some("Free contact limit reached"));
    }

    #[test]
    fn test_weekly_rate_limit() {
        let usage = ContactUsage {
            matches_this_week: 20,
            ..Default::default()
        };
        let denied = can_contact_trainer(TrainerTier::Paid, &usage, 10.0);
        assert!(!denied.allowed);
        assert_eq!(denied.reason.as_deref(), Some("Weekly match limit reached"));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(tier_display_name(TrainerTier::EliteVerified), "Elite Verified Trainer");
        assert_eq!(tier_display_name_from_raw("web"), "Web Listing");
        assert_eq!(tier_display_name_from_raw("platinum"), "Unknown Tier");
    }
}
