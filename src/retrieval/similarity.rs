use super::vector::ScoredChunk;

/// Cosine similarity between two vectors.
///
/// Returns `0.0` when either vector is empty, the lengths differ, either
/// vector has zero norm, or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (magnitude_a * magnitude_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

// NaN sorts last
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Sort by score descending and keep the first `k`.
///
/// The sort is stable and ties fall back to ascending id, so equal scores
/// come out in insertion order.
pub fn rank_top_k(mut results: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    results.sort_by(|a, b| {
        rank_key(b.score)
            .total_cmp(&rank_key(a.score))
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: i64, score: f32) -> ScoredChunk {
        ScoredChunk {
            score,
            id,
            text: format!("chunk-{}", id),
        }
    }

    #[test]
    fn test_identical_vectors() {
        let v = [0.3, -1.2, 4.0, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_opposite_vectors() {
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_top_k_orders_by_score() {
        let ranked = rank_top_k(vec![scored(0, 0.1), scored(1, 0.9), scored(2, 0.5)], 2);
        let ids: Vec<i64> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_rank_top_k_ties_keep_id_order() {
        let ranked = rank_top_k(vec![scored(3, 0.5), scored(1, 0.5), scored(2, 0.7)], 3);
        let ids: Vec<i64> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_overflowing_vectors_score_zero() {
        let v = [f32::MAX, f32::MAX];
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }

    #[test]
    fn test_rank_top_k_nan_sorts_last() {
        let ranked = rank_top_k(
            vec![scored(0, 0.5), scored(1, f32::NAN), scored(2, 0.9), scored(3, f32::NAN)],
            4,
        );
        let ids: Vec<i64> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_rank_top_k_larger_than_input() {
        let ranked = rank_top_k(vec![scored(0, 0.2)], 4);
        assert_eq!(ranked.len(), 1);
    }
}
