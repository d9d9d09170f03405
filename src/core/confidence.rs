use crate::models::Confidence;

/// Score at or above which a well-evidenced match is High confidence
pub const HIGH_SCORE_THRESHOLD: f64 = 80.0;
/// Score at or below which a match is Low confidence
pub const LOW_SCORE_THRESHOLD: f64 = 30.0;
/// Minimum overlapping questions before High confidence is possible
pub const MIN_COMPARISONS_FOR_HIGH: usize = 3;

/// Derive a confidence label from the raw score and evidence volume
///
/// Monotonic in both arguments. A high score backed by too few comparable
/// questions caps at Medium.
pub fn estimate(score: f64, compared_questions: usize) -> Confidence {
    if score <= LOW_SCORE_THRESHOLD {
        return Confidence::Low;
    }
    if score >= HIGH_SCORE_THRESHOLD && compared_questions >= MIN_COMPARISONS_FOR_HIGH {
        return Confidence::High;
    }
    Confidence::Medium
}
