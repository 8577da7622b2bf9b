use std::collections::{BTreeMap, BTreeSet};

use crate::recipe_model::IngredientId;
use crate::recommend::candidate_filter::ScoredCandidate;
use crate::recommend::{MatchResult, MatchStrategy};
use crate::relationship_graph::{IngredientGraph, SubstitutionSuggestion, TraversalLimits};

#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    pub results: Vec<MatchResult>,
    /// Any substitution traversal hit its fan-out cap.
    pub truncated: bool,
}

/// Stage 2: for each candidate, find pantry stand-ins for its missing
/// ingredients and add a complementarity bonus for (matched, missing) pairs
/// joined by a complement edge. Never alters which ingredients count as
/// matched or missing. Results are re-ranked by enriched score for the
/// stages downstream.
pub fn enrich_candidates(
    candidates: Vec<ScoredCandidate>,
    pantry: &BTreeSet<IngredientId>,
    graph: &IngredientGraph,
    limits: &TraversalLimits,
    complement_weight: f32,
) -> EnrichmentOutcome {
    let mut outcome = EnrichmentOutcome::default();
    // Carry total_lines through so the re-rank can reuse the stage-1
    // tie-break rule.
    let mut ranked: Vec<(MatchResult, usize)> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let mut substitutions: BTreeMap<IngredientId, Vec<SubstitutionSuggestion>> =
            BTreeMap::new();
        for missing in &candidate.missing {
            let search = graph.substitutes_from(missing, pantry, limits);
            if search.truncated {
                outcome.truncated = true;
            }
            if !search.suggestions.is_empty() {
                substitutions.insert(missing.clone(), search.suggestions);
            }
        }

        let mut bonus = 0.0_f32;
        for matched in &candidate.matched {
            for missing in &candidate.missing {
                if let Some(confidence) = graph.complement_confidence(matched, missing) {
                    bonus += complement_weight * confidence;
                }
            }
        }
        let enriched_score = (candidate.raw_score + bonus).min(1.0);

        ranked.push((
            MatchResult {
                recipe_id: candidate.recipe_id,
                raw_score: candidate.raw_score,
                enriched_score,
                matched: candidate.matched,
                missing: candidate.missing,
                substitutions,
                strategy: MatchStrategy::GraphEnriched,
            },
            candidate.total_lines,
        ));
    }

    ranked.sort_by(|(x, x_lines), (y, y_lines)| {
        y.enriched_score
            .partial_cmp(&x.enriched_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x_lines.cmp(y_lines))
            .then_with(|| x.recipe_id.cmp(&y.recipe_id))
    });
    outcome.results = ranked.into_iter().map(|(result, _)| result).collect();
    outcome
}
