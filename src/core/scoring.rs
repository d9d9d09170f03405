use std::collections::HashSet;

use crate::core::{similarity::question_similarity, EngineError};
use crate::models::{ClientProfile, ScoreBreakdown, TrainerCandidate, WeightClass};

/// Client answers shorter than this (trimmed) are considered vague
pub const VAGUE_ANSWER_MIN_LEN: usize = 12;
/// Dampening factor applied to a vague answer's contribution
pub const VAGUE_ANSWER_DAMP: f64 = 0.5;
/// Tolerance when checking that class weights sum to 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Scoring result for a single trainer
#[derive(Debug, Clone)]
pub struct TrainerScore {
    /// Weighted 0-100 score, rounded to presentation precision
    pub raw: f64,
    /// Per-weight-class aggregates, in declared class order
    pub breakdown: Vec<ScoreBreakdown>,
    /// Total questions compared across all classes
    pub compared_questions: usize,
}

/// Validate the operator-authored weight class configuration
pub fn validate_weight_classes(classes: &[WeightClass]) -> Result<(), EngineError> {
    if classes.is_empty() {
        return Err(EngineError::EmptyWeightClasses);
    }

    let mut seen = HashSet::new();
    let mut sum = 0.0;
    for class in classes {
        if !seen.insert(class.id.as_str()) {
            return Err(EngineError::InvalidWeightClass {
                id: class.id.clone(),
                reason: "duplicate class id".to_string(),
            });
        }
        if class.weight <= 0.0 || !class.weight.is_finite() {
            return Err(EngineError::InvalidWeightClass {
                id: class.id.clone(),
                reason: format!("weight must be positive, got {}", class.weight),
            });
        }
        if class.question_ids.is_empty() {
            return Err(EngineError::InvalidWeightClass {
                id: class.id.clone(),
                reason: "no question ids".to_string(),
            });
        }
        sum += class.weight;
    }

    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(EngineError::WeightSumMismatch(sum));
    }

    Ok(())
}

/// Score one candidate against the client across every weight class
///
/// Per class, questions are visited in declared order and compared only when
/// both sides answered. Vague client answers contribute at half strength.
/// Classes with no overlap average to zero rather than erroring; missing data
/// degrades the score, it never aborts the pipeline.
pub fn score_trainer(
    client: &ClientProfile,
    trainer: &TrainerCandidate,
    classes: &[WeightClass],
) -> TrainerScore {
    let mut breakdown = Vec::with_capacity(classes.len());
    let mut raw = 0.0;
    let mut compared_total = 0;

    for class in classes {
        let mut sum = 0.0;
        let mut compared = 0usize;

        for question in &class.question_ids {
            let (Some(client_answer), Some(trainer_answer)) =
                (client.answers.get(question), trainer.answers.get(question))
            else {
                continue;
            };

            let mut similarity = question_similarity(
                client_answer,
                trainer_answer,
                client.embeddings.get(question).map(Vec::as_slice),
                trainer.embeddings.get(question).map(Vec::as_slice),
            );

            if client_answer.trim().len() < VAGUE_ANSWER_MIN_LEN {
                similarity *= VAGUE_ANSWER_DAMP;
            }

            sum += similarity;
            compared += 1;
        }

        let average = if compared > 0 {
            round_score(sum / compared as f64)
        } else {
            0.0
        };
        let weighted = round_score(average * class.weight);

        raw += average * class.weight;
        compared_total += compared;
        breakdown.push(ScoreBreakdown {
            class_id: class.id.clone(),
            label: class.label.clone(),
            average,
            weighted,
            compared_questions: compared,
        });
    }

    TrainerScore {
        raw: round_score(raw.clamp(0.0, 100.0)),
        breakdown,
        compared_questions: compared_total,
    }
}

/// Fixed one-decimal presentation precision
#[inline]
pub fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}
