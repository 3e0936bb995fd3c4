//! Small vector helpers shared by the embedder, the store and the selector.

/// Cosine similarity. Inputs are expected to be unit-norm, in which case
/// this is a plain dot product; mismatched lengths compare the common
/// prefix.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }

    a.iter().zip(b.iter()).take(len).map(|(x, y)| x * y).sum()
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged
/// rather than divided by zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
