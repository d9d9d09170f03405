use crate::core::EngineError;
use crate::models::{FilterOperator, HardFilterRule, HardFilterStatus, TrainerCandidate};

/// The only weight-class tag accepted on a hard filter rule
pub const EXCLUSION_CLASS: &str = "exclusion";

/// Validate operator-authored rules before any candidate is evaluated
pub fn validate_rules(rules: &[HardFilterRule]) -> Result<(), EngineError> {
    for rule in rules {
        if rule.field.trim().is_empty() {
            return Err(EngineError::InvalidRule {
                id: rule.id.clone(),
                reason: "empty target field".to_string(),
            });
        }
        if rule.weight_class != EXCLUSION_CLASS {
            return Err(EngineError::InvalidRule {
                id: rule.id.clone(),
                reason: format!("unknown weight class '{}'", rule.weight_class),
            });
        }
        if rule.failure_reason.trim().is_empty() {
            return Err(EngineError::InvalidRule {
                id: rule.id.clone(),
                reason: "empty failure reason".to_string(),
            });
        }
    }
    Ok(())
}

/// Resolve a rule's target field on a candidate
///
/// `availability` is structural; every other field is a questionnaire answer.
fn field_value(trainer: &TrainerCandidate, field: &str) -> Option<String> {
    match field {
        "availability" => Some(trainer.is_available.to_string()),
        _ => trainer.answers.get(field).cloned(),
    }
}

/// Whether a rule's condition holds against the resolved field value
///
/// A missing field counts as a match: incomplete data must not leak an
/// ineligible candidate through the gate.
fn rule_matches(rule: &HardFilterRule, value: Option<&str>) -> bool {
    let Some(value) = value else {
        return true;
    };

    let value = value.trim();
    let expected = rule.expected.trim();

    match rule.operator {
        FilterOperator::Equals => value.eq_ignore_ascii_case(expected),
        FilterOperator::NotEquals => !value.eq_ignore_ascii_case(expected),
        FilterOperator::Contains => value
            .to_ascii_lowercase()
            .contains(&expected.to_ascii_lowercase()),
        FilterOperator::NotContains => !value
            .to_ascii_lowercase()
            .contains(&expected.to_ascii_lowercase()),
    }
}

/// Evaluate every exclusion rule against a candidate, in rule-list order
///
/// The first matching rule fails the candidate with that rule's reason and
/// removes it from scoring entirely; it is never merely deprioritized.
/// Candidates missing any of their required responses fail before rule
/// evaluation starts.
pub fn evaluate_hard_filters(
    trainer: &TrainerCandidate,
    rules: &[HardFilterRule],
) -> HardFilterStatus {
    for question in &trainer.required_responses {
        if !trainer.answers.contains_key(question) {
            return HardFilterStatus::Failed {
                reason: format!("Missing required response '{}'", question),
            };
        }
    }

    for rule in rules {
        if rule_matches(rule, field_value(trainer, &rule.field).as_deref()) {
            return HardFilterStatus::Failed {
                reason: rule.failure_reason.clone(),
            };
        }
    }

    HardFilterStatus::Passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn create_trainer(answers: &[(&str, &str)]) -> TrainerCandidate {
        TrainerCandidate {
            trainer_id: "trainer_1".to_string(),
            name: "Trainer One".to_string(),
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            embeddings: BTreeMap::new(),
            is_available: true,
            required_responses: vec![],
            tier: crate::models::TrainerTier::Paid,
            boost_expires_at: None,
            badge_expires_at: None,
            claim_available: false,
        }
    }

    fn certification_rule() -> HardFilterRule {
        HardFilterRule {
            id: "cert_required".to_string(),
            field: "certified".to_string(),
            operator: FilterOperator::NotEquals,
            expected: "yes".to_string(),
            weight_class: EXCLUSION_CLASS.to_string(),
            failure_reason: "Trainer is not certified".to_string(),
        }
    }

    #[test]
    fn test_certified_trainer_passes() {
        let trainer = create_trainer(&[("certified", "yes")]);
        let status = evaluate_hard_filters(&trainer, &[certification_rule()]);
        assert_eq!(status, HardFilterStatus::Passed);
    }

    #[test]
    fn test_uncertified_trainer_fails() {
        let trainer = create_trainer(&[("certified", "no")]);
        let status = evaluate_hard_filters(&trainer, &[certification_rule()]);
        assert_eq!(
            status,
            HardFilterStatus::Failed {
                reason: "Trainer is not certified".to_string()
            }
        );
    }

    #[test]
    fn test_missing_field_fails_closed() {
        let trainer = create_trainer(&[]);
        let status = evaluate_hard_filters(&trainer, &[certification_rule()]);
        assert!(!status.passed());
    }

    #[test]
    fn test_first_failure_wins() {
        let first = HardFilterRule {
            id: "availability".to_string(),
            field: "availability".to_string(),
            operator: FilterOperator::Equals,
            expected: "false".to_string(),
            weight_class: EXCLUSION_CLASS.to_string(),
            failure_reason: "Trainer is not accepting clients".to_string(),
        };
        let mut trainer = create_trainer(&[("certified", "no")]);
        trainer.is_available = false;

        let status = evaluate_hard_filters(&trainer, &[first, certification_rule()]);
        assert_eq!(
            status,
            HardFilterStatus::Failed {
                reason: "Trainer is not accepting clients".to_string()
            }
        );
    }

    #[test]
    fn test_contains_operator() {
        let rule = HardFilterRule {
            id: "no_remote".to_string(),
            field: "delivery".to_string(),
            operator: FilterOperator::NotContains,
            expected: "in_person".to_string(),
            weight_class: EXCLUSION_CLASS.to_string(),
            failure_reason: "Trainer does not offer in-person sessions".to_string(),
        };

        let offers = create_trainer(&[("delivery", "in_person,online")]);
        assert!(evaluate_hard_filters(&offers, std::slice::from_ref(&rule)).passed());

        let remote_only = create_trainer(&[("delivery", "online")]);
        assert!(!evaluate_hard_filters(&remote_only, std::slice::from_ref(&rule)).passed());
    }

    #[test]
    fn test_missing_required_response_fails() {
        let mut trainer = create_trainer(&[("certified", "yes")]);
        trainer.required_responses = vec!["pricing".to_string()];
        let status = evaluate_hard_filters(&trainer, &[]);
        assert!(!status.passed());
    }

    #[test]
    fn test_rule_validation_rejects_unknown_class() {
        let mut rule = certification_rule();
        rule.weight_class = "soft".to_string();
        assert!(validate_rules(&[rule]).is_err());
    }

    #[test]
    fn test_rule_validation_rejects_empty_field() {
        let mut rule = certification_rule();
        rule.field = " ".to_string();
        assert!(validate_rules(&[rule]).is_err());
    }
}
