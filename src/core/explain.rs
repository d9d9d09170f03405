use crate::models::ScoreBreakdown;

/// Class average at or above which alignment is called strong
pub const STRONG_ALIGNMENT: f64 = 80.0;
/// Class average at or above which alignment is called good
pub const GOOD_ALIGNMENT: f64 = 50.0;

/// Build the explanation list for one trainer from its own scoring aggregates
///
/// Only the trainer's breakdown feeds in, so the result is invariant to
/// adding, removing or reordering other candidates in the pool. The
/// overall-compatibility fallback keeps the list non-empty in every case.
pub fn build_explanations(
    breakdown: &[ScoreBreakdown],
    boost_explanation: Option<String>,
    score: f64,
) -> Vec<String> {
    let mut explanations = Vec::with_capacity(breakdown.len() + 1);

    for entry in breakdown {
        let label = entry.label.to_lowercase();
        if entry.compared_questions == 0 {
            explanations.push(format!("No overlapping answers for {}", label));
        } else if entry.average >= STRONG_ALIGNMENT {
            explanations.push(format!("Strong alignment on {} ({:.0}%)", label, entry.average));
        } else if entry.average >= GOOD_ALIGNMENT {
            explanations.push(format!("Good alignment on {} ({:.0}%)", label, entry.average));
        } else {
            explanations.push(format!("Limited alignment on {} ({:.0}%)", label, entry.average));
        }
    }

    if let Some(boost) = boost_explanation {
        explanations.push(boost);
    }

    if explanations.is_empty() {
        explanations.push(format!("Overall compatibility {:.0}%", score));
    }

    explanations
}
