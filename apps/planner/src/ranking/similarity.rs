use crate::catalog::matrix::{DimensionMismatch, EmbeddingMatrix};

/// A candidate row index with its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: f64,
}

/// Ranks the rows of `matrix` against `query` and returns the top `k`.
///
/// Scores are plain dot products (no normalisation). The sort is stable, so
/// rows with equal scores keep their original relative order. `k` larger than
/// the number of rows returns every row; `k = 0` returns nothing. NaN scores
/// rank last.
pub fn rank(
    matrix: &EmbeddingMatrix,
    query: &[f64],
    k: usize,
) -> Result<Vec<ScoredIndex>, DimensionMismatch> {
    let scores = matrix.dot(query)?;

    let mut ranked: Vec<ScoredIndex> = scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| ScoredIndex {
            index,
            score: if score.is_nan() {
                f64::NEG_INFINITY
            } else {
                score
            },
        })
        .collect();

    // Sort descending — highest score first
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(k);

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> EmbeddingMatrix {
        EmbeddingMatrix::from_rows(rows.iter().copied()).unwrap()
    }

    fn indices(ranked: &[ScoredIndex]) -> Vec<usize> {
        ranked.iter().map(|r| r.index).collect()
    }

    #[test]
    fn test_three_cards_quantity_two() {
        let m = matrix(&[&[1.0, 0.0], &[0.0, 1.0], &[0.7, 0.7]]);
        let ranked = rank(&m, &[1.0, 0.0], 2).unwrap();
        assert_eq!(indices(&ranked), [0, 2]);
        assert!((ranked[0].score - 1.0).abs() < 1e-12);
        assert!((ranked[1].score - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_full_ranking_is_sorted_permutation() {
        let m = matrix(&[&[0.1], &[0.9], &[-0.3], &[0.5], &[0.9]]);
        let ranked = rank(&m, &[1.0], 10).unwrap();

        assert_eq!(ranked.len(), 5, "k > n must return exactly n");
        let mut seen = indices(&ranked);
        seen.sort_unstable();
        assert_eq!(seen, [0, 1, 2, 3, 4]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_original_order() {
        let m = matrix(&[&[0.5], &[1.0], &[0.5], &[1.0], &[0.5]]);
        let ranked = rank(&m, &[1.0], 5).unwrap();
        assert_eq!(indices(&ranked), [1, 3, 0, 2, 4]);
    }

    #[test]
    fn test_k_zero_is_empty() {
        let m = matrix(&[&[1.0], &[2.0]]);
        assert!(rank(&m, &[1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_matrix_is_empty() {
        let ranked = rank(&EmbeddingMatrix::default(), &[1.0, 2.0], 3).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_scores_are_not_normalised() {
        // A long vector outranks a perfectly aligned short one.
        let m = matrix(&[&[1.0, 0.0], &[3.0, 3.0]]);
        let ranked = rank(&m, &[1.0, 0.0], 2).unwrap();
        assert_eq!(indices(&ranked), [1, 0]);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let m = matrix(&[&[f64::NAN], &[-5.0], &[2.0]]);
        let ranked = rank(&m, &[1.0], 3).unwrap();
        assert_eq!(indices(&ranked), [2, 1, 0]);
    }

    #[test]
    fn test_inputs_untouched() {
        let m = matrix(&[&[0.2, 0.8], &[0.9, 0.1]]);
        let before = m.clone();
        let query = vec![1.0, 0.0];
        let _ = rank(&m, &query, 2).unwrap();
        assert_eq!(m, before);
        assert_eq!(query, [1.0, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch_propagates() {
        let m = matrix(&[&[1.0, 0.0]]);
        assert!(rank(&m, &[1.0], 1).is_err());
    }
}
