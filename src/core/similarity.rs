/// Compute the cosine similarity between two embedding vectors
///
/// Returns `None` when the vectors are empty, have mismatched dimensions, or
/// either has zero magnitude; callers fall back to textual comparison.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Rescale cosine similarity from [-1, 1] to the 0-100 score range
#[inline]
pub fn embedding_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    cosine_similarity(a, b).map(|cos| (cos.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0)
}

/// Exact-equality text fallback: match = 100, anything else = 0
///
/// Comparison is trimmed and case-insensitive.
#[inline]
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        100.0
    } else {
        0.0
    }
}

/// Per-question similarity with graceful degradation
///
/// Embeddings are used when both sides carry a usable vector; otherwise the
/// textual fallback keeps the pipeline producing scores with embeddings
/// entirely absent.
pub fn question_similarity(
    client_answer: &str,
    trainer_answer: &str,
    client_embedding: Option<&[f32]>,
    trainer_embedding: Option<&[f32]>,
) -> f64 {
    if let (Some(ce), Some(te)) = (client_embedding, trainer_embedding) {
        if let Some(similarity) = embedding_similarity(ce, te) {
            return similarity;
        }
    }

    text_similarity(client_answer, trainer_answer)
}
