//! Length-robust cosine similarity.
//!
//! Vectors of different lengths are compared as if the shorter one were
//! padded with zeros. Padding contributes nothing to the dot product or to
//! either norm, so no padded copy is materialized.

/// Errors that can occur while scoring two embeddings.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimilarityError {
    #[error("Cannot compute similarity with a zero-norm vector")]
    DegenerateVector,

    #[error("Similarity is not a finite number")]
    NonFinite,
}

/// Compute L2 norm of a vector, accumulated in f64 so tiny or huge
/// components neither underflow to zero nor overflow to infinity.
fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity of `a` and `b`, zero-padding the shorter vector.
///
/// Fails when either vector has zero norm, and when the result is NaN or
/// infinite (non-finite input components).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::DegenerateVector);
    }

    // zip stops at the shorter vector: the padded tail multiplies by zero
    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let score = (dot_product / (norm_a * norm_b)) as f32;

    if !score.is_finite() {
        return Err(SimilarityError::NonFinite);
    }
    Ok(score)
}
