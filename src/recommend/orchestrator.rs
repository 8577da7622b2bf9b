use std::collections::BTreeSet;
use std::time::Instant;

use crate::error::PantryError;
use crate::ingredient_normalizer::NormalizedPantry;
use crate::recipe_model::{IngredientId, RecipeCorpus};
use crate::recommend::candidate_filter::filter_candidates;
use crate::recommend::graph_enrichment::enrich_candidates;
use crate::recommend::plan_optimizer::{select_plan, PlanConfig};
use crate::recommend::{
    MatchResult, MatchStrategy, PipelineStats, PlanSummary, ReasonCode, Recommendation,
    RecommendOptions,
};
use crate::relationship_graph::IngredientGraph;

/// Runs the three-stage pipeline: greedy filter -> graph enrichment ->
/// combinatorial optimization. A strict pipeline, each stage's output is the
/// next stage's input; cancellation is honored at stage boundaries only.
///
/// A request that matches nothing returns an empty `Recommendation` with a
/// reason code; only an empty corpus is a hard failure.
pub fn recommend(
    pantry: &NormalizedPantry,
    corpus: &RecipeCorpus,
    graph: &IngredientGraph,
    options: &RecommendOptions,
) -> Result<Recommendation, PantryError> {
    if corpus.is_empty() {
        return Err(PantryError::EmptyCorpus);
    }
    if pantry.resolved.is_empty() {
        // Distinguish "nothing supplied" from "nothing resolved".
        let reason = if pantry.unresolved.is_empty() {
            ReasonCode::EmptyPantry
        } else {
            ReasonCode::UnknownIngredients
        };
        return Ok(Recommendation::empty(reason));
    }

    let mut stats = PipelineStats::default();
    stats.candidates_scanned = match &options.restrict_to {
        Some(allowed) => allowed.iter().filter(|id| corpus.contains_key(*id)).count(),
        None => corpus.len(),
    };

    // Stage 1: greedy candidate filter.
    let started = Instant::now();
    let candidates = filter_candidates(
        &pantry.resolved,
        corpus,
        options.restrict_to.as_ref(),
        options.effective_top_k(),
    );
    stats.filter_elapsed = started.elapsed();
    log::debug!(
        "filter stage: {} of {} recipes survived",
        candidates.len(),
        stats.candidates_scanned
    );
    if candidates.is_empty() {
        return Ok(Recommendation {
            results: Vec::new(),
            plan: None,
            stats,
            reason: Some(ReasonCode::NoMatches),
        });
    }
    if options.is_cancelled() {
        stats.cancelled = true;
        let results = candidates
            .into_iter()
            .take(options.max_results)
            .map(|c| MatchResult {
                recipe_id: c.recipe_id,
                raw_score: c.raw_score,
                enriched_score: c.raw_score,
                matched: c.matched,
                missing: c.missing,
                substitutions: Default::default(),
                strategy: MatchStrategy::GreedyOverlap,
            })
            .collect();
        return Ok(Recommendation {
            results,
            plan: None,
            stats,
            reason: None,
        });
    }

    // Stage 2: graph enrichment.
    let started = Instant::now();
    let enrichment = enrich_candidates(
        candidates,
        &pantry.resolved,
        graph,
        &options.traversal,
        options.complement_weight,
    );
    stats.enrich_elapsed = started.elapsed();
    stats.candidates_enriched = enrichment.results.len();
    stats.traversal_truncated = enrichment.truncated;
    let enriched = enrichment.results;

    if !options.run_optimizer || options.is_cancelled() {
        stats.cancelled = options.is_cancelled();
        let results: Vec<MatchResult> =
            enriched.into_iter().take(options.max_results).collect();
        return Ok(Recommendation {
            results,
            plan: None,
            stats,
            reason: None,
        });
    }

    // Stage 3: backtracking meal-plan optimization.
    let started = Instant::now();
    let outcome = select_plan(&enriched, corpus, &plan_config(options));
    stats.optimize_elapsed = started.elapsed();
    stats.backtracking_nodes_visited = outcome.nodes_visited;
    stats.partial = outcome.partial;
    stats.degraded_mode = outcome.degraded;

    let selection: Vec<MatchResult> = outcome
        .selected
        .iter()
        .map(|&index| enriched[index].clone())
        .collect();
    let plan = PlanSummary {
        recipes: selection.iter().map(|r| r.recipe_id.clone()).collect(),
        objective: outcome.objective,
        distinct_missing: collect_ids(selection.iter().map(|r| &r.missing)),
        leveraged: collect_ids(selection.iter().map(|r| &r.matched)),
    };

    Ok(Recommendation {
        results: selection,
        plan: Some(plan),
        stats,
        reason: None,
    })
}

fn plan_config(options: &RecommendOptions) -> PlanConfig {
    PlanConfig {
        plan_size: options.plan_size,
        diversity_weight: options.diversity_weight,
        redundancy_weight: options.redundancy_weight,
        redundancy_threshold: options.redundancy_threshold,
        node_budget: options.optimizer_node_budget,
        deadline: options.optimizer_deadline,
        fallback_threshold: options.fallback_threshold,
    }
}

fn collect_ids<'a>(
    sets: impl Iterator<Item = &'a BTreeSet<IngredientId>>,
) -> BTreeSet<IngredientId> {
    sets.flat_map(|set| set.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe_model::{Recipe, RecipeIngredientLine};
    use crate::relationship_graph::{RelationKind, RelationshipEdge};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn recipe(id: &str, ingredients: &[&str], cuisine: Option<&str>) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            ingredients: ingredients
                .iter()
                .map(|ing| RecipeIngredientLine {
                    ingredient: ing.to_string(),
                    quantity: None,
                    unit: None,
                    optional: false,
                })
                .collect(),
            instructions: vec![],
            prep_minutes: None,
            cook_minutes: None,
            servings: None,
            difficulty: None,
            cuisine: cuisine.map(|c| c.to_string()),
            tags: vec![],
        }
    }

    fn corpus(recipes: Vec<Recipe>) -> RecipeCorpus {
        recipes.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    fn resolved_pantry(ids: &[&str]) -> NormalizedPantry {
        NormalizedPantry {
            resolved: ids.iter().map(|s| s.to_string()).collect(),
            unresolved: Vec::new(),
        }
    }

    #[test]
    fn test_empty_corpus_is_hard_failure() {
        let result = recommend(
            &resolved_pantry(&["rice"]),
            &RecipeCorpus::new(),
            &IngredientGraph::default(),
            &RecommendOptions::default(),
        );
        assert!(matches!(result, Err(PantryError::EmptyCorpus)));
    }

    #[test]
    fn test_empty_pantry_reason_distinct_from_unresolved() {
        let corpus = corpus(vec![recipe("r1", &["rice"], None)]);
        let graph = IngredientGraph::default();
        let options = RecommendOptions::default();

        let empty = recommend(&NormalizedPantry::default(), &corpus, &graph, &options).unwrap();
        assert!(empty.results.is_empty());
        assert_eq!(empty.reason, Some(ReasonCode::EmptyPantry));

        let unresolved = NormalizedPantry {
            resolved: BTreeSet::new(),
            unresolved: vec!["quinoa".to_string()],
        };
        let missed = recommend(&unresolved, &corpus, &graph, &options).unwrap();
        assert!(missed.results.is_empty());
        assert_eq!(missed.reason, Some(ReasonCode::UnknownIngredients));
    }

    #[test]
    fn test_no_matches_reason() {
        let corpus = corpus(vec![recipe("r1", &["beef"], None)]);
        let result = recommend(
            &resolved_pantry(&["rice"]),
            &corpus,
            &IngredientGraph::default(),
            &RecommendOptions::default(),
        )
        .unwrap();
        assert!(result.results.is_empty());
        assert_eq!(result.reason, Some(ReasonCode::NoMatches));
        assert_eq!(result.stats.candidates_scanned, 1);
    }

    #[test]
    fn test_full_pipeline_with_plan() {
        let corpus = corpus(vec![
            recipe("r1", &["chicken", "rice", "onion"], Some("indian")),
            recipe("r2", &["rice", "onion", "tomato"], Some("italian")),
        ]);
        let graph = IngredientGraph::from_edges(vec![RelationshipEdge {
            a: "chicken".to_string(),
            b: "tofu".to_string(),
            kind: RelationKind::Substitute,
            confidence: 0.7,
        }]);
        let result = recommend(
            &resolved_pantry(&["rice", "onion", "tofu"]),
            &corpus,
            &graph,
            &RecommendOptions::default(),
        )
        .unwrap();

        assert_eq!(result.stats.candidates_scanned, 2);
        assert_eq!(result.stats.candidates_enriched, 2);
        assert!(result.reason.is_none());
        let plan = result.plan.as_ref().unwrap();
        assert_eq!(plan.recipes.len(), result.results.len());
        // r1's missing chicken has a pantry substitute via the graph.
        let r1 = result
            .results
            .iter()
            .find(|r| r.recipe_id == "r1")
            .unwrap();
        assert_eq!(r1.substitutions["chicken"][0].ingredient, "tofu");
    }

    #[test]
    fn test_optimizer_skippable() {
        let corpus = corpus(vec![
            recipe("r1", &["rice"], None),
            recipe("r2", &["rice", "beef"], None),
        ]);
        let options = RecommendOptions {
            run_optimizer: false,
            ..RecommendOptions::default()
        };
        let result = recommend(
            &resolved_pantry(&["rice"]),
            &corpus,
            &IngredientGraph::default(),
            &options,
        )
        .unwrap();
        assert!(result.plan.is_none());
        assert_eq!(result.stats.backtracking_nodes_visited, 0);
        // Ranked individually: full coverage first.
        assert_eq!(result.results[0].recipe_id, "r1");
        assert_eq!(result.results[1].recipe_id, "r2");
    }

    #[test]
    fn test_cancellation_before_enrichment() {
        let corpus = corpus(vec![recipe("r1", &["rice"], None)]);
        let flag = Arc::new(AtomicBool::new(true));
        let options = RecommendOptions {
            cancel: Some(Arc::clone(&flag)),
            ..RecommendOptions::default()
        };
        let result = recommend(
            &resolved_pantry(&["rice"]),
            &corpus,
            &IngredientGraph::default(),
            &options,
        )
        .unwrap();
        assert!(result.stats.cancelled);
        assert!(result.plan.is_none());
        // Stage-1 output is still returned, tagged with its stage.
        assert_eq!(result.results[0].strategy, MatchStrategy::GreedyOverlap);
        flag.store(false, Ordering::Relaxed);
    }

    #[test]
    fn test_stats_idempotent_across_runs() {
        let corpus = corpus(vec![
            recipe("r1", &["rice", "onion"], None),
            recipe("r2", &["rice", "beef"], None),
            recipe("r3", &["beef"], None),
        ]);
        let pantry = resolved_pantry(&["rice", "onion"]);
        let options = RecommendOptions::default();
        let graph = IngredientGraph::default();
        let first = recommend(&pantry, &corpus, &graph, &options).unwrap();
        let second = recommend(&pantry, &corpus, &graph, &options).unwrap();
        assert_eq!(
            first.stats.candidates_scanned,
            second.stats.candidates_scanned
        );
        assert_eq!(
            first.stats.candidates_enriched,
            second.stats.candidates_enriched
        );
        assert_eq!(
            first.stats.backtracking_nodes_visited,
            second.stats.backtracking_nodes_visited
        );
        let first_ids: Vec<_> = first.results.iter().map(|r| &r.recipe_id).collect();
        let second_ids: Vec<_> = second.results.iter().map(|r| &r.recipe_id).collect();
        assert_eq!(first_ids, second_ids);
    }
}
