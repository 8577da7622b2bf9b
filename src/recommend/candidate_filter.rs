use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::recipe_model::{IngredientId, RecipeCorpus, RecipeId};

/// A recipe surviving the greedy filter, with its coverage score and the
/// matched/missing partition of its non-optional ingredient set.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub recipe_id: RecipeId,
    pub raw_score: f32,
    pub matched: BTreeSet<IngredientId>,
    pub missing: BTreeSet<IngredientId>,
    /// Total ingredient lines including optional ones; tie-break favors
    /// simpler recipes.
    pub total_lines: usize,
}

/// Stage 1: score every recipe in the corpus by ingredient overlap and keep
/// the top K. Runs against the full corpus on every query, so the scan is
/// parallel and the only super-linear step is the final sort.
///
/// `raw_score = |matched non-optional| / |all non-optional|`. Recipes with
/// zero matched ingredients are excluded, as are recipes with no
/// non-optional ingredients (no defined coverage ratio). Ordering: score
/// descending, then fewer total lines, then recipe id.
pub fn filter_candidates(
    pantry: &BTreeSet<IngredientId>,
    corpus: &RecipeCorpus,
    restrict_to: Option<&BTreeSet<RecipeId>>,
    top_k: usize,
) -> Vec<ScoredCandidate> {
    let mut candidates: Vec<ScoredCandidate> = corpus
        .par_iter()
        .filter(|(id, _)| restrict_to.map_or(true, |allowed| allowed.contains(*id)))
        .filter_map(|(id, recipe)| {
            let required = recipe.non_optional_ingredients();
            if required.is_empty() {
                return None;
            }
            let matched: BTreeSet<IngredientId> =
                required.intersection(pantry).cloned().collect();
            if matched.is_empty() {
                return None;
            }
            let missing: BTreeSet<IngredientId> =
                required.difference(&matched).cloned().collect();
            let raw_score = matched.len() as f32 / required.len() as f32;
            Some(ScoredCandidate {
                recipe_id: id.clone(),
                raw_score,
                matched,
                missing,
                total_lines: recipe.ingredients.len(),
            })
        })
        .collect();

    candidates.sort_by(|x, y| {
        y.raw_score
            .partial_cmp(&x.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.total_lines.cmp(&y.total_lines))
            .then_with(|| x.recipe_id.cmp(&y.recipe_id))
    });
    candidates.truncate(top_k);
    candidates
}
