use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::recipe_model::{IngredientId, RecipeCorpus};
use crate::recommend::MatchResult;

/// Stage-3 tunables, lifted out of `RecommendOptions` so the search can be
/// driven directly in tests.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub plan_size: usize,
    pub diversity_weight: f32,
    pub redundancy_weight: f32,
    pub redundancy_threshold: f32,
    pub node_budget: u64,
    pub deadline: Option<Duration>,
    /// Pool size beyond which the search degrades to greedy selection.
    pub fallback_threshold: usize,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            plan_size: 3,
            diversity_weight: 0.1,
            redundancy_weight: 0.25,
            redundancy_threshold: 0.5,
            node_budget: 200_000,
            deadline: None,
            fallback_threshold: 20,
        }
    }
}

/// Outcome of the subset search. `selected` holds indices into the candidate
/// pool in inclusion order.
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    pub selected: Vec<usize>,
    pub objective: f32,
    pub nodes_visited: u64,
    /// Budget ran out; this is the best solution found so far, not a failure.
    pub partial: bool,
    /// Greedy fallback was used instead of the exact search.
    pub degraded: bool,
}

/// Stage 3: choose the subset of enriched candidates (at most `plan_size`
/// recipes) maximizing
/// `sum(enriched) + diversity_weight * distinct_cuisines - redundancy`,
/// where redundancy penalizes pairs whose missing-ingredient sets are
/// near-identical. Depth-first backtracking with include-first branching and
/// an upper-bound prune; identical inputs always yield identical selections.
pub fn select_plan(
    candidates: &[MatchResult],
    corpus: &RecipeCorpus,
    config: &PlanConfig,
) -> PlanOutcome {
    if candidates.is_empty() || config.plan_size == 0 {
        return PlanOutcome::default();
    }

    let cuisines: Vec<Option<&str>> = candidates
        .iter()
        .map(|c| {
            corpus
                .get(&c.recipe_id)
                .and_then(|r| r.cuisine.as_deref())
        })
        .collect();

    if candidates.len() > config.fallback_threshold {
        log::info!(
            "candidate pool {} exceeds safety threshold {}, using greedy selection",
            candidates.len(),
            config.fallback_threshold
        );
        return greedy_select(candidates, &cuisines, config);
    }

    // prefix_scores[i] = sum of enriched scores of candidates[..i]. The pool
    // arrives sorted by enriched score descending, so the best s additions
    // from position i are exactly candidates[i..i + s].
    let mut prefix_scores = Vec::with_capacity(candidates.len() + 1);
    let mut running = 0.0_f32;
    prefix_scores.push(running);
    for c in candidates {
        running += c.enriched_score;
        prefix_scores.push(running);
    }

    let mut search = Search {
        candidates,
        cuisines: &cuisines,
        config,
        prefix_scores,
        deadline: config.deadline.map(|d| Instant::now() + d),
        nodes_visited: 0,
        exhausted: false,
        selection: Vec::new(),
        cuisine_counts: HashMap::new(),
        best_selection: vec![0],
        best_objective: 0.0,
    };
    // Seed the incumbent with the single best candidate so even an
    // immediately exhausted budget returns a plan no worse than top-1.
    search.best_objective =
        candidates[0].enriched_score + cuisines[0].map_or(0.0, |_| config.diversity_weight);

    search.dfs(0, 0.0);

    PlanOutcome {
        selected: search.best_selection,
        objective: search.best_objective,
        nodes_visited: search.nodes_visited,
        partial: search.exhausted,
        degraded: false,
    }
}

struct Search<'a> {
    candidates: &'a [MatchResult],
    cuisines: &'a [Option<&'a str>],
    config: &'a PlanConfig,
    prefix_scores: Vec<f32>,
    deadline: Option<Instant>,
    nodes_visited: u64,
    exhausted: bool,
    selection: Vec<usize>,
    cuisine_counts: HashMap<&'a str, usize>,
    best_selection: Vec<usize>,
    best_objective: f32,
}

impl<'a> Search<'a> {
    fn dfs(&mut self, index: usize, objective: f32) {
        self.nodes_visited += 1;
        if self.nodes_visited > self.config.node_budget {
            self.exhausted = true;
            return;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.exhausted = true;
                return;
            }
        }
        if index == self.candidates.len() || self.selection.len() == self.config.plan_size {
            return;
        }

        // Upper bound on any completion of this partial selection: the next
        // `slots` scores (pool is sorted descending) plus one diversity
        // bonus per slot. The redundancy penalty only lowers the objective.
        let slots = self.config.plan_size - self.selection.len();
        let reachable = (index + slots).min(self.candidates.len());
        let bound = objective
            + (self.prefix_scores[reachable] - self.prefix_scores[index])
            + self.config.diversity_weight * slots as f32;
        if bound <= self.best_objective {
            return;
        }

        // Include candidates[index].
        let gain = self.inclusion_gain(index);
        let included_objective = objective + gain;
        self.push(index);
        if included_objective > self.best_objective {
            self.best_objective = included_objective;
            self.best_selection = self.selection.clone();
        }
        self.dfs(index + 1, included_objective);
        self.pop(index);
        if self.exhausted {
            return;
        }

        // Skip candidates[index].
        self.dfs(index + 1, objective);
    }

    /// Objective delta of adding `index` to the current selection.
    fn inclusion_gain(&self, index: usize) -> f32 {
        let candidate = &self.candidates[index];
        let mut gain = candidate.enriched_score;
        if let Some(cuisine) = self.cuisines[index] {
            if self.cuisine_counts.get(cuisine).copied().unwrap_or(0) == 0 {
                gain += self.config.diversity_weight;
            }
        }
        for &chosen in &self.selection {
            let similarity = jaccard(&candidate.missing, &self.candidates[chosen].missing);
            if similarity >= self.config.redundancy_threshold {
                gain -= self.config.redundancy_weight * similarity;
            }
        }
        gain
    }

    fn push(&mut self, index: usize) {
        if let Some(cuisine) = self.cuisines[index] {
            *self.cuisine_counts.entry(cuisine).or_insert(0) += 1;
        }
        self.selection.push(index);
    }

    fn pop(&mut self, index: usize) {
        self.selection.pop();
        if let Some(cuisine) = self.cuisines[index] {
            if let Some(count) = self.cuisine_counts.get_mut(cuisine) {
                *count -= 1;
            }
        }
    }
}

/// Degraded mode: iteratively take the candidate with the highest marginal
/// objective gain. Ties broken by pool position, i.e. the stage-2 ordering.
fn greedy_select(
    candidates: &[MatchResult],
    cuisines: &[Option<&str>],
    config: &PlanConfig,
) -> PlanOutcome {
    let mut selection: Vec<usize> = Vec::new();
    let mut objective = 0.0_f32;
    let mut cuisine_counts: HashMap<&str, usize> = HashMap::new();

    while selection.len() < config.plan_size {
        let mut best: Option<(usize, f32)> = None;
        for index in 0..candidates.len() {
            if selection.contains(&index) {
                continue;
            }
            let mut gain = candidates[index].enriched_score;
            if let Some(cuisine) = cuisines[index] {
                if cuisine_counts.get(cuisine).copied().unwrap_or(0) == 0 {
                    gain += config.diversity_weight;
                }
            }
            for &chosen in &selection {
                let similarity =
                    jaccard(&candidates[index].missing, &candidates[chosen].missing);
                if similarity >= config.redundancy_threshold {
                    gain -= config.redundancy_weight * similarity;
                }
            }
            if best.map_or(true, |(_, best_gain)| gain > best_gain) {
                best = Some((index, gain));
            }
        }
        match best {
            Some((index, gain)) if gain > 0.0 || selection.is_empty() => {
                if let Some(cuisine) = cuisines[index] {
                    *cuisine_counts.entry(cuisine).or_insert(0) += 1;
                }
                selection.push(index);
                objective += gain;
            }
            _ => break,
        }
    }

    PlanOutcome {
        selected: selection,
        objective,
        nodes_visited: 0,
        partial: false,
        degraded: true,
    }
}

/// Jaccard similarity of two missing-ingredient sets. Two fully covered
/// recipes (both sets empty) are not redundant for shopping purposes.
fn jaccard(a: &BTreeSet<IngredientId>, b: &BTreeSet<IngredientId>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f32 / union as f32
}
