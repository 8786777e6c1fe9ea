//! Selector — picks the cards a study plan is built from.
//!
//! No model calls — the query embedding is computed by the caller.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::cards::CardCatalog;
use crate::catalog::paths::{CardRef, Layer, LayerKind, PathCatalog};
use crate::ranking::similarity::rank;
use crate::ranking::RankError;

pub const DEFAULT_DEPTH: usize = 4;
pub const DEFAULT_MAX_CARDS: usize = 25;
pub const DEFAULT_AVAILABILITY: usize = 8;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionParams {
    /// Expertise layers kept by Stage A.
    pub depth: usize,
    /// Pool entries kept after the priority sort in Stage B.
    pub max_cards: usize,
    /// Cards kept by the final re-rank in Stage C.
    pub availability: usize,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            max_cards: DEFAULT_MAX_CARDS,
            availability: DEFAULT_AVAILABILITY,
        }
    }
}

/// An expertise layer chosen by Stage A.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedLayer {
    pub path_id: String,
    pub path_name: String,
    pub layer: String,
    pub score: f64,
    /// Row in the catalog-wide expertise matrix.
    pub row: usize,
}

/// Outcome of the three selection stages.
#[derive(Debug, Clone)]
pub struct Selection {
    pub layers: Vec<SelectedLayer>,
    /// Stage B output: pooled cards in catalog order.
    pub candidates: CardCatalog,
    /// Stage C output: final cards, best first.
    pub cards: CardCatalog,
    /// Scores aligned with `cards`.
    pub scores: Vec<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Selection algorithm
// ────────────────────────────────────────────────────────────────────────────

/// Runs the full selection for one query embedding.
///
/// Algorithm:
/// 1. Stage A: rank every expertise layer of the catalog, keep the top `depth`
/// 2. Stage B: pool the selected layers' card references, keep the
///    `max_cards` highest priorities, project the surviving ids onto the
///    card catalog
/// 3. Stage C: rank the projected cards, keep the top `availability`
pub fn select(
    cards: &CardCatalog,
    paths: &PathCatalog,
    query: &[f64],
    params: &SelectionParams,
) -> Result<Selection, RankError> {
    let layers = select_layers(paths, query, params.depth)?;

    let pooled_layers = layers
        .iter()
        .filter_map(|l| paths.layer_at(LayerKind::Expertise, l.row))
        .map(|r| r.layer);
    let ids = pool_card_ids(pooled_layers, params.max_cards);
    let candidates = cards.filter_by_ids(&ids);

    let (final_cards, scores) = rank_cards(&candidates, query, params.availability)?;

    Ok(Selection {
        layers,
        candidates,
        cards: final_cards,
        scores,
    })
}

/// Stage A: the `depth` expertise layers closest to the query, across all
/// paths.
pub fn select_layers(
    paths: &PathCatalog,
    query: &[f64],
    depth: usize,
) -> Result<Vec<SelectedLayer>, RankError> {
    let ranked = rank(paths.expertise().embeddings(), query, depth).map_err(|source| {
        RankError {
            target: "expertise layers",
            source,
        }
    })?;

    Ok(ranked
        .into_iter()
        .filter_map(|scored| {
            let found = paths.layer_at(LayerKind::Expertise, scored.index)?;
            Some(SelectedLayer {
                path_id: found.path.id.clone(),
                path_name: found.path.name.clone(),
                layer: found.layer.name.clone(),
                score: scored.score,
                row: scored.index,
            })
        })
        .collect())
}

/// Stage B: pools every card reference of `layers` (duplicates included),
/// stable-sorts by descending priority, keeps the first `max_cards` entries
/// and collapses them to a set of ids.
pub fn pool_card_ids<'a, I>(layers: I, max_cards: usize) -> HashSet<&'a str>
where
    I: IntoIterator<Item = &'a Layer>,
{
    let mut pool: Vec<&CardRef> = layers.into_iter().flat_map(|l| l.cards.iter()).collect();

    pool.sort_by_key(|r| Reverse(r.priority_or_default()));

    pool.into_iter()
        .take(max_cards)
        .map(|r| r.card_id.as_str())
        .collect()
}

/// Stage C (also used for a plain card search): the `quantity` cards closest
/// to the query, best first, with their scores.
pub fn rank_cards(
    cards: &CardCatalog,
    query: &[f64],
    quantity: usize,
) -> Result<(CardCatalog, Vec<f64>), RankError> {
    let ranked = rank(cards.embeddings(), query, quantity).map_err(|source| RankError {
        target: "cards",
        source,
    })?;

    let indices: Vec<usize> = ranked.iter().map(|r| r.index).collect();
    let scores = ranked.iter().map(|r| r.score).collect();

    Ok((cards.select(&indices), scores))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::cards::tests::catalog;
    use crate::catalog::paths::tests::{layer, path};

    fn ids(catalog: &CardCatalog) -> Vec<&str> {
        catalog.cards().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_depth_one_picks_best_layer_across_paths() {
        let paths = PathCatalog::new(vec![
            path("a", vec![layer("A1", &[("x", Some(1))], &[0.2, 0.9])]),
            path("b", vec![layer("B1", &[("y", Some(1))], &[0.9, 0.1])]),
        ])
        .unwrap();

        let layers = select_layers(&paths, &[1.0, 0.0], 1).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].path_id, "b");
        assert_eq!(layers[0].layer, "B1");

        let layers = select_layers(&paths, &[0.0, 1.0], 1).unwrap();
        assert_eq!(layers[0].path_id, "a");
    }

    #[test]
    fn test_max_cards_one_keeps_highest_priority() {
        let l = layer("L", &[("low", Some(5)), ("high", Some(10))], &[1.0]);
        let ids = pool_card_ids([&l], 1);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("high"));
    }

    #[test]
    fn test_missing_priority_ranks_lowest() {
        let l = layer("L", &[("none", None), ("neg", Some(-1)), ("one", Some(1))], &[1.0]);
        let ids = pool_card_ids([&l], 1);
        assert!(ids.contains("one"));

        let ids = pool_card_ids([&l], 2);
        assert!(ids.contains("none"), "missing priority counts as 0");
        assert!(!ids.contains("neg"));
    }

    #[test]
    fn test_equal_priorities_keep_pool_order() {
        let first = layer("First", &[("a", Some(3)), ("b", Some(3))], &[1.0]);
        let second = layer("Second", &[("c", Some(3))], &[1.0]);
        let ids = pool_card_ids([&first, &second], 2);
        assert!(ids.contains("a") && ids.contains("b"));
        assert!(!ids.contains("c"));
    }

    #[test]
    fn test_duplicates_take_pool_slots_before_dedup() {
        let first = layer("First", &[("shared", Some(9))], &[1.0]);
        let second = layer("Second", &[("shared", Some(9)), ("other", Some(8))], &[1.0]);
        // Two slots, both taken by the duplicated card.
        let ids = pool_card_ids([&first, &second], 2);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("shared"));
    }

    #[test]
    fn test_shared_card_appears_once_in_candidates() {
        let cards = catalog(&[("shared", &[1.0, 0.0]), ("solo", &[0.0, 1.0])]);
        let paths = PathCatalog::new(vec![
            path("a", vec![layer("A1", &[("shared", Some(2))], &[1.0, 0.0])]),
            path(
                "b",
                vec![layer("B1", &[("shared", Some(2)), ("solo", Some(1))], &[1.0, 0.0])],
            ),
        ])
        .unwrap();

        let params = SelectionParams {
            depth: 2,
            max_cards: 25,
            availability: 8,
        };
        let selection = select(&cards, &paths, &[1.0, 0.0], &params).unwrap();
        assert_eq!(ids(&selection.candidates), ["shared", "solo"]);
        assert_eq!(ids(&selection.cards), ["shared", "solo"]);
    }

    #[test]
    fn test_candidates_follow_catalog_order_not_priority() {
        let cards = catalog(&[("a", &[0.1]), ("b", &[0.2]), ("c", &[0.3])]);
        let paths = PathCatalog::new(vec![path(
            "p",
            vec![layer("L", &[("c", Some(10)), ("a", Some(5))], &[1.0])],
        )])
        .unwrap();

        let selection = select(&cards, &paths, &[1.0], &SelectionParams::default()).unwrap();
        assert_eq!(ids(&selection.candidates), ["a", "c"]);
        assert_eq!(ids(&selection.cards), ["c", "a"]);
    }

    #[test]
    fn test_end_to_end_three_stages() {
        let cards = catalog(&[
            ("rust", &[1.0, 0.0]),
            ("css", &[0.0, 1.0]),
            ("systems", &[0.7, 0.7]),
            ("unlisted", &[1.0, 0.0]),
        ]);
        let paths = PathCatalog::new(vec![
            path(
                "backend",
                vec![layer(
                    "Core",
                    &[("rust", Some(3)), ("css", Some(1)), ("systems", Some(2)), ("ghost", Some(9))],
                    &[0.9, 0.1],
                )],
            ),
            path(
                "frontend",
                vec![layer("UI", &[("css", Some(5)), ("unlisted", Some(5))], &[0.1, 0.9])],
            ),
        ])
        .unwrap();

        let params = SelectionParams {
            depth: 1,
            max_cards: 25,
            availability: 2,
        };
        let selection = select(&cards, &paths, &[1.0, 0.0], &params).unwrap();

        assert_eq!(selection.layers.len(), 1);
        assert_eq!(selection.layers[0].path_id, "backend");
        // "ghost" is not in the card catalog and "unlisted" is not in the layer.
        assert_eq!(ids(&selection.candidates), ["rust", "css", "systems"]);
        assert_eq!(ids(&selection.cards), ["rust", "systems"]);
        assert_eq!(selection.scores.len(), 2);
        assert!((selection.scores[0] - 1.0).abs() < 1e-12);
        assert!((selection.scores[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_rank_cards_quantity_two() {
        let cards = catalog(&[("a", &[1.0, 0.0]), ("b", &[0.0, 1.0]), ("c", &[0.7, 0.7])]);
        let (ranked, scores) = rank_cards(&cards, &[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&ranked), ["a", "c"]);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn test_query_dimension_mismatch_is_rank_error() {
        let paths = PathCatalog::new(vec![path("a", vec![layer("A1", &[], &[1.0, 0.0])])]).unwrap();
        let err = select_layers(&paths, &[1.0, 0.0, 0.0], 1).unwrap_err();
        assert_eq!(err.target, "expertise layers");
    }

    #[test]
    fn test_defaults() {
        let params = SelectionParams::default();
        assert_eq!(params.depth, 4);
        assert_eq!(params.max_cards, 25);
        assert_eq!(params.availability, 8);
    }
}
