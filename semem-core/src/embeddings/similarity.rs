//! Vector similarity functions

use crate::error::{Error, Result};

/// Cosine similarity between two vectors of identical length.
///
/// Returns an error when the lengths differ; similarity between vectors of
/// different models is meaningless and callers must go through
/// [`adjust_dimension`](super::provider::utils::adjust_dimension) explicitly
/// when migrating.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::Dimension {
            got: b.len(),
            expected: a.len(),
        });
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
