// Integration tests for FitMatch Algo

use fitmatch_algo::core::matcher::{CombinedRequest, Matcher};
use fitmatch_algo::models::{
    BoostConfig, BoostScope, BoostType, ClientProfile, FilterOperator, HardFilterRule,
    TrainerCandidate, TrainerTier, WeightClass,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn create_client() -> ClientProfile {
    let mut embeddings = BTreeMap::new();
    embeddings.insert("q1".to_string(), vec![1.0, 0.0, 0.0]);

    ClientProfile {
        client_id: "client_1".to_string(),
        answers: [
            ("q1", "marathon preparation and endurance work"),
            ("q2", "early mornings, three sessions a week"),
            ("q3", "structured plans with weekly check-ins"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
        embeddings,
        goal: Some("endurance".to_string()),
        experience_level: Some("intermediate".to_string()),
    }
}

fn create_trainer(id: &str, tier: TrainerTier, q1_embedding: Vec<f32>, certified: bool) -> TrainerCandidate {
    let mut embeddings = BTreeMap::new();
    embeddings.insert("q1".to_string(), q1_embedding);

    TrainerCandidate {
        trainer_id: id.to_string(),
        name: format!("Trainer {}", id),
        answers: [
            ("certified", if certified { "yes" } else { "no" }),
            ("q1", "endurance and distance running coaching"),
            ("q2", "early mornings, three sessions a week"),
            ("q3", "structured plans with weekly check-ins"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
        embeddings,
        is_available: true,
        required_responses: vec![],
        tier,
        boost_expires_at: None,
        badge_expires_at: None,
        claim_available: false,
    }
}

fn certification_rules() -> Vec<HardFilterRule> {
    vec![HardFilterRule {
        id: "cert_required".to_string(),
        field: "certified".to_string(),
        operator: FilterOperator::NotEquals,
        expected: "yes".to_string(),
        weight_class: "exclusion".to_string(),
        failure_reason: "Trainer is not certified".to_string(),
    }]
}

fn weight_classes() -> Vec<WeightClass> {
    vec![
        WeightClass {
            id: "goals".to_string(),
            label: "Training goals".to_string(),
            weight: 0.5,
            question_ids: vec!["q1".to_string()],
        },
        WeightClass {
            id: "schedule".to_string(),
            label: "Schedule fit".to_string(),
            weight: 0.3,
            question_ids: vec!["q2".to_string()],
        },
        WeightClass {
            id: "style".to_string(),
            label: "Coaching style".to_string(),
            weight: 0.2,
            question_ids: vec!["q3".to_string()],
        },
    ]
}

#[test]
fn test_hard_filter_beats_perfect_similarity() {
    // Trainer B has a perfect q1 embedding but fails the certification rule;
    // trainer A passes with a slightly weaker embedding. Only A may surface.
    let matcher = Matcher::default();
    let client = create_client();

    let trainer_a = create_trainer("a", TrainerTier::Verified, vec![0.9, 0.1, 0.0], true);
    let trainer_b = create_trainer("b", TrainerTier::Verified, vec![1.0, 0.0, 0.0], false);

    let outcome = matcher
        .rank_trainers(
            &client,
            &[trainer_a, trainer_b],
            &certification_rules(),
            &weight_classes(),
            fixed_now(),
        )
        .unwrap();

    assert_eq!(outcome.ranked_trainers.len(), 1);
    assert_eq!(outcome.ranked_trainers[0].trainer_id, "a");
    assert_eq!(outcome.metadata.failed, 1);
}

#[test]
fn test_ranking_is_deterministic() {
    let matcher = Matcher::default();
    let client = create_client();
    let now = fixed_now();

    let trainers: Vec<TrainerCandidate> = (0..10)
        .map(|i| {
            create_trainer(
                &format!("t{:02}", i),
                if i % 2 == 0 { TrainerTier::Verified } else { TrainerTier::Free },
                vec![1.0 - (i as f32) * 0.05, (i as f32) * 0.05, 0.0],
                true,
            )
        })
        .collect();

    let first = matcher
        .rank_trainers(&client, &trainers, &certification_rules(), &weight_classes(), now)
        .unwrap();
    let second = matcher
        .rank_trainers(&client, &trainers, &certification_rules(), &weight_classes(), now)
        .unwrap();

    let first_json = serde_json::to_string(&first).unwrap();
    let second_json = serde_json::to_string(&second).unwrap();
    assert_eq!(first_json, second_json, "Identical inputs must produce identical output");
}

#[test]
fn test_explanations_are_pool_invariant() {
    let matcher = Matcher::default();
    let client = create_client();
    let now = fixed_now();

    let trainer_a = create_trainer("a", TrainerTier::Verified, vec![0.9, 0.1, 0.0], true);
    let trainer_b = create_trainer("b", TrainerTier::Verified, vec![0.5, 0.5, 0.0], true);
    let trainer_c = create_trainer("c", TrainerTier::Verified, vec![0.1, 0.9, 0.0], true);

    let find_a = |trainers: &[TrainerCandidate]| {
        matcher
            .rank_trainers(&client, trainers, &certification_rules(), &weight_classes(), now)
            .unwrap()
            .ranked_trainers
            .into_iter()
            .find(|m| m.trainer_id == "a")
            .expect("trainer a should rank")
    };

    let alone = find_a(&[trainer_a.clone()]);
    let full_pool = find_a(&[trainer_b.clone(), trainer_a.clone(), trainer_c.clone()]);
    let reordered = find_a(&[trainer_c, trainer_a, trainer_b]);

    assert_eq!(alone.explanations, full_pool.explanations);
    assert_eq!(full_pool.explanations, reordered.explanations);
    assert!(!full_pool.explanations.is_empty());
}

#[test]
fn test_embedding_free_pool_ranks_same_count() {
    let matcher = Matcher::default();
    let client = create_client();
    let now = fixed_now();

    let with_embeddings: Vec<TrainerCandidate> = (0..6)
        .map(|i| create_trainer(&format!("t{}", i), TrainerTier::Verified, vec![1.0, 0.0, 0.0], true))
        .collect();

    let mut stripped_client = client.clone();
    stripped_client.embeddings.clear();
    let stripped: Vec<TrainerCandidate> = with_embeddings
        .iter()
        .cloned()
        .map(|mut trainer| {
            trainer.embeddings.clear();
            trainer
        })
        .collect();

    let embedded = matcher
        .rank_trainers(&client, &with_embeddings, &certification_rules(), &weight_classes(), now)
        .unwrap();
    let text_only = matcher
        .rank_trainers(&stripped_client, &stripped, &certification_rules(), &weight_classes(), now)
        .unwrap();

    assert_eq!(embedded.ranked_trainers.len(), text_only.ranked_trainers.len());
    for m in &text_only.ranked_trainers {
        assert!(!m.explanations.is_empty());
    }
}

#[test]
fn test_boost_changes_rank_but_respects_cap() {
    let now = fixed_now();
    let boosts = vec![BoostConfig {
        id: "post_claim".to_string(),
        boost_type: BoostType::PostClaim,
        factor: 1.10,
        scope: BoostScope::AllTiers,
        valid_from: now - Duration::days(1),
        valid_until: now + Duration::days(30),
    }];
    let matcher = Matcher::new(boosts);
    let client = create_client();

    // Slightly weaker base score, but holding an active boost
    let mut boosted = create_trainer("boosted", TrainerTier::Verified, vec![0.85, 0.15, 0.0], true);
    boosted.boost_expires_at = Some(now + Duration::days(2));
    let plain = create_trainer("plain", TrainerTier::Verified, vec![0.9, 0.1, 0.0], true);

    let outcome = matcher
        .rank_trainers(&client, &[plain, boosted], &certification_rules(), &weight_classes(), now)
        .unwrap();

    assert_eq!(outcome.ranked_trainers[0].trainer_id, "boosted");
    assert!(outcome.ranked_trainers[0].is_boosted);
    for m in &outcome.ranked_trainers {
        assert!(m.score <= 100.0);
    }
}

#[test]
fn test_combined_feed_respects_token_budget() {
    let matcher = Matcher::default();
    let client = create_client();

    let platform: Vec<TrainerCandidate> = (0..4)
        .map(|i| create_trainer(&format!("p{}", i), TrainerTier::Verified, vec![1.0, 0.0, 0.0], true))
        .collect();

    let request = CombinedRequest {
        client_id: "client_1".to_string(),
        limit: 10,
        token_budget: Some(6.0),
    };
    let outcome = matcher
        .generate_combined_matches(
            &client,
            platform,
            vec![],
            &certification_rules(),
            &weight_classes(),
            &request,
            fixed_now(),
        )
        .unwrap();

    // Rank order is preserved and the feed stops at the budget
    assert!(outcome.matches.len() < 4);
    assert!(outcome.metadata.insufficient_tokens);
    let ids: Vec<&str> = outcome.matches.iter().map(|m| m.ranked.trainer_id.as_str()).collect();
    let mut sorted_ids = ids.clone();
    sorted_ids.sort();
    assert_eq!(ids, sorted_ids, "Budget truncation must not reorder the feed");
}

#[test]
fn test_combined_feed_merges_and_labels_sources() {
    let matcher = Matcher::default();
    let client = create_client();

    let platform = vec![create_trainer("p1", TrainerTier::Verified, vec![0.9, 0.1, 0.0], true)];
    let mut ext = create_trainer("x1", TrainerTier::Web, vec![0.95, 0.05, 0.0], true);
    ext.claim_available = true;

    let request = CombinedRequest {
        client_id: "client_1".to_string(),
        limit: 10,
        token_budget: None,
    };
    let outcome = matcher
        .generate_combined_matches(
            &client,
            platform,
            vec![ext],
            &certification_rules(),
            &weight_classes(),
            &request,
            fixed_now(),
        )
        .unwrap();

    assert_eq!(outcome.metadata.platform_matches, 1);
    assert_eq!(outcome.metadata.external_matches, 1);

    let external = outcome.matches.iter().find(|m| m.is_external).unwrap();
    assert!(external.claim_available);
    // External trainers never carry boosts
    assert!(!external.ranked.is_boosted);
}

#[test]
fn test_limit_enforcement() {
    let matcher = Matcher::default();
    let client = create_client();

    let platform: Vec<TrainerCandidate> = (0..30)
        .map(|i| create_trainer(&format!("p{:02}", i), TrainerTier::Verified, vec![1.0, 0.0, 0.0], true))
        .collect();

    let request = CombinedRequest {
        client_id: "client_1".to_string(),
        limit: 5,
        token_budget: None,
    };
    let outcome = matcher
        .generate_combined_matches(
            &client,
            platform,
            vec![],
            &certification_rules(),
            &weight_classes(),
            &request,
            fixed_now(),
        )
        .unwrap();

    assert!(outcome.matches.len() <= 5, "Should not exceed limit of 5");
}
