pub mod candidate_filter;
pub mod graph_enrichment;
pub mod orchestrator;
pub mod plan_optimizer;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::recipe_model::{IngredientId, RecipeId};
use crate::relationship_graph::{SubstitutionSuggestion, TraversalLimits};

/// Which stage produced a result's score.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Stage-1 coverage score only (enrichment never ran).
    GreedyOverlap,
    /// Stage-2 score: coverage plus complementarity bonus.
    GraphEnriched,
    /// Query-mode fallback scored on name/description token overlap.
    NameMatch,
}

/// Per-recipe match outcome. Created fresh per query, never persisted.
#[derive(Debug, Serialize, Clone)]
pub struct MatchResult {
    pub recipe_id: RecipeId,
    /// Coverage ratio in [0,1].
    pub raw_score: f32,
    /// `min(1, raw_score + complementarity bonus)`; always >= raw_score.
    pub enriched_score: f32,
    pub matched: BTreeSet<IngredientId>,
    pub missing: BTreeSet<IngredientId>,
    /// Substitution suggestions, keyed by missing ingredient only.
    pub substitutions: BTreeMap<IngredientId, Vec<SubstitutionSuggestion>>,
    pub strategy: MatchStrategy,
}

/// Why a request produced no results. Distinct from hard errors: an empty
/// result with a reason code is a valid outcome.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The caller supplied no ingredients at all.
    EmptyPantry,
    /// Ingredients were supplied but none resolved against the vocabulary.
    UnknownIngredients,
    /// The pantry resolved but no recipe matched any of it.
    NoMatches,
    /// Query mode with a blank query string.
    EmptyQuery,
}

/// Per-stage counters and timings, surfaced to callers for observability.
#[derive(Debug, Serialize, Clone, Default)]
pub struct PipelineStats {
    pub candidates_scanned: usize,
    pub candidates_enriched: usize,
    pub backtracking_nodes_visited: u64,
    pub filter_elapsed: Duration,
    pub enrich_elapsed: Duration,
    pub optimize_elapsed: Duration,
    /// Optimizer fell back to greedy selection (pool over the safety
    /// threshold).
    pub degraded_mode: bool,
    /// Optimizer ran out of budget; the plan is the best found so far.
    pub partial: bool,
    /// Request was cancelled at a stage boundary.
    pub cancelled: bool,
    /// Some substitution traversal hit the fan-out cap.
    pub traversal_truncated: bool,
}

/// Summary of the meal plan chosen by the optimizer.
#[derive(Debug, Serialize, Clone)]
pub struct PlanSummary {
    pub recipes: Vec<RecipeId>,
    pub objective: f32,
    /// Distinct ingredients still needed across the whole selection.
    pub distinct_missing: BTreeSet<IngredientId>,
    /// Pantry ingredients leveraged by at least one selected recipe.
    pub leveraged: BTreeSet<IngredientId>,
}

/// Full pipeline output: the ranked/selected results plus execution stats.
#[derive(Debug, Serialize, Clone)]
pub struct Recommendation {
    pub results: Vec<MatchResult>,
    pub plan: Option<PlanSummary>,
    pub stats: PipelineStats,
    pub reason: Option<ReasonCode>,
}

impl Recommendation {
    pub fn empty(reason: ReasonCode) -> Self {
        Self {
            results: Vec::new(),
            plan: None,
            stats: PipelineStats::default(),
            reason: Some(reason),
        }
    }
}

/// Global pipeline configuration. Every bonus/penalty weight is a tunable
/// parameter, not a hidden constant.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Maximum results returned when the optimizer is skipped.
    pub max_results: usize,
    /// Candidate-pool bound for stage 1. None: `max(4 * max_results, 12)`.
    pub top_k: Option<usize>,
    /// Maximum recipes in the optimized meal plan.
    pub plan_size: usize,
    /// Skip stage 3 entirely when false; callers then get ranked
    /// individual recipes.
    pub run_optimizer: bool,
    pub traversal: TraversalLimits,
    /// Additive bonus per (matched, missing) complement pair, scaled by
    /// edge confidence.
    pub complement_weight: f32,
    /// Bonus per distinct cuisine in the selection.
    pub diversity_weight: f32,
    /// Penalty scale for near-identical missing-ingredient sets.
    pub redundancy_weight: f32,
    /// Jaccard similarity above which the redundancy penalty applies.
    pub redundancy_threshold: f32,
    /// Backtracking node budget; exceeding it yields a partial result.
    pub optimizer_node_budget: u64,
    /// Optional wall-clock budget for stage 3.
    pub optimizer_deadline: Option<Duration>,
    /// Pool size beyond which stage 3 degrades to greedy selection.
    pub fallback_threshold: usize,
    /// Restrict the corpus scan to these recipes (query-mode prefilter).
    pub restrict_to: Option<BTreeSet<RecipeId>>,
    /// Cooperative cancellation, checked at stage boundaries.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            top_k: None,
            plan_size: 3,
            run_optimizer: true,
            traversal: TraversalLimits::default(),
            complement_weight: 0.05,
            diversity_weight: 0.1,
            redundancy_weight: 0.25,
            redundancy_threshold: 0.5,
            optimizer_node_budget: 200_000,
            optimizer_deadline: None,
            fallback_threshold: 20,
            restrict_to: None,
            cancel: None,
        }
    }
}

impl RecommendOptions {
    pub fn effective_top_k(&self) -> usize {
        self.top_k.unwrap_or_else(|| (4 * self.max_results).max(12))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(std::sync::atomic::Ordering::Relaxed))
            .unwrap_or(false)
    }
}
