use rand::seq::IteratorRandom;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::error::PantryError;
use crate::ingredient_normalizer::IngredientNormalizer;
use crate::recipe_model::{Ingredient, Recipe, RecipeCorpus, RecipeId};
use crate::recommend::orchestrator;
use crate::recommend::{
    MatchResult, MatchStrategy, PipelineStats, ReasonCode, Recommendation, RecommendOptions,
};
use crate::relationship_graph::{IngredientGraph, RelationshipEdge};

const CACHE_CAPACITY: usize = 256;

/// The data providers the engine consumes. Implementations load everything
/// up front; partial updates do not exist.
pub trait SnapshotSource {
    fn load_corpus(&self) -> Result<RecipeCorpus, PantryError>;
    fn load_graph(&self) -> Result<Vec<RelationshipEdge>, PantryError>;
    fn load_vocabulary(&self) -> Result<Vec<Ingredient>, PantryError>;
}

/// One consistent, read-only view of corpus + graph + vocabulary. Built
/// fully, then published atomically; in-flight requests keep the snapshot
/// they started with.
#[derive(Debug)]
pub struct Snapshot {
    pub corpus: RecipeCorpus,
    pub graph: IngredientGraph,
    pub normalizer: IngredientNormalizer,
}

impl Snapshot {
    /// Builds and validates a snapshot. Every recipe ingredient line must
    /// reference a vocabulary ingredient.
    pub fn build(
        vocabulary: Vec<Ingredient>,
        corpus: RecipeCorpus,
        edges: Vec<RelationshipEdge>,
    ) -> Result<Self, PantryError> {
        let normalizer = IngredientNormalizer::from_vocabulary(vocabulary);
        for (recipe_id, recipe) in &corpus {
            for line in &recipe.ingredients {
                if !normalizer.contains(&line.ingredient) {
                    return Err(PantryError::CorpusValidation {
                        recipe: recipe_id.clone(),
                        ingredient: line.ingredient.clone(),
                    });
                }
            }
        }
        let graph = IngredientGraph::from_edges(edges);
        log::info!(
            "snapshot built: {} recipes, {} ingredients, {} relationship edges",
            corpus.len(),
            normalizer.len(),
            graph.edge_count()
        );
        Ok(Self {
            corpus,
            graph,
            normalizer,
        })
    }

    pub fn from_source(source: &dyn SnapshotSource) -> Result<Self, PantryError> {
        let vocabulary = source.load_vocabulary()?;
        let corpus = source.load_corpus()?;
        let edges = source.load_graph()?;
        Self::build(vocabulary, corpus, edges)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct StageDescription {
    pub name: &'static str,
    pub summary: &'static str,
}

/// Observability snapshot: what the stages do plus the counters from the
/// most recent run. Exposes no internal data structures.
#[derive(Debug, Serialize, Clone)]
pub struct AlgorithmReport {
    pub stages: Vec<StageDescription>,
    pub last_run: Option<PipelineStats>,
}

struct CacheEntry {
    created: Instant,
    value: Recommendation,
}

/// The engine's front door. Owns the current snapshot behind a
/// copy-and-swap lock, default pipeline options, a TTL-bounded query cache
/// and the last run's stats. Concurrent requests share one snapshot with no
/// further coordination.
pub struct SnapshotService {
    snapshot: RwLock<Arc<Snapshot>>,
    options: RecommendOptions,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
    last_stats: Mutex<Option<PipelineStats>>,
}

impl SnapshotService {
    pub fn new(snapshot: Snapshot, options: RecommendOptions) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            options,
            cache_ttl: Duration::from_secs(600),
            cache: Mutex::new(HashMap::new()),
            last_stats: Mutex::new(None),
        }
    }

    pub fn from_source(
        source: &dyn SnapshotSource,
        options: RecommendOptions,
    ) -> Result<Self, PantryError> {
        Ok(Self::new(Snapshot::from_source(source)?, options))
    }

    /// A zero TTL disables the cache entirely.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Handle to the current snapshot. Callers keep a consistent view even
    /// across a concurrent reload.
    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Rebuilds from the source and swaps atomically. The old snapshot
    /// stays untouched on any load or validation failure.
    pub fn reload(&self, source: &dyn SnapshotSource) -> Result<(), PantryError> {
        let fresh = Arc::new(Snapshot::from_source(source)?);
        {
            let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
            *guard = fresh;
        }
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.clear();
        log::info!("snapshot reloaded, query cache cleared");
        Ok(())
    }

    pub fn recipe(&self, id: &str) -> Result<Recipe, PantryError> {
        let snapshot = self.current();
        snapshot
            .corpus
            .get(id)
            .cloned()
            .ok_or_else(|| PantryError::UnknownRecipe(id.to_string()))
    }

    /// `recommendByIngredients`: normalize the raw pantry strings and run
    /// the full pipeline against the current snapshot.
    pub fn recommend_by_ingredients(
        &self,
        raw_ingredients: &[String],
        max_results: usize,
    ) -> Result<Recommendation, PantryError> {
        let snapshot = self.current();
        if snapshot.corpus.is_empty() {
            return Err(PantryError::EmptyCorpus);
        }
        let pantry = snapshot.normalizer.normalize_set(raw_ingredients);
        if !pantry.unresolved.is_empty() {
            log::debug!("unresolved pantry entries: {:?}", pantry.unresolved);
        }

        let cache_key = (!pantry.resolved.is_empty()).then(|| {
            let ids: Vec<&str> = pantry.resolved.iter().map(|s| s.as_str()).collect();
            format!("ingredients:{}:{}", ids.join(","), max_results)
        });
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache_get(key) {
                return Ok(hit);
            }
        }

        let options = RecommendOptions {
            max_results,
            ..self.options.clone()
        };
        let recommendation =
            orchestrator::recommend(&pantry, &snapshot.corpus, &snapshot.graph, &options)?;
        self.record(&recommendation);
        if let Some(key) = cache_key {
            self.cache_put(key, &recommendation);
        }
        Ok(recommendation)
    }

    /// `recommendByQuery`: restrict the corpus to recipes whose name or
    /// description mentions a query token, treat the normalizable tokens as
    /// the pantry, and run the same pipeline. Falls back to a token-overlap
    /// name score when no token resolves (or nothing ingredient-matches), so
    /// a plain title search still returns results.
    pub fn recommend_by_query(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Recommendation, PantryError> {
        let snapshot = self.current();
        if snapshot.corpus.is_empty() {
            return Err(PantryError::EmptyCorpus);
        }
        let normalized_query = query.trim().to_lowercase();
        if normalized_query.is_empty() {
            return Ok(Recommendation::empty(ReasonCode::EmptyQuery));
        }

        let cache_key = format!("name:{}:{}", normalized_query, max_results);
        if let Some(hit) = self.cache_get(&cache_key) {
            return Ok(hit);
        }

        let tokens: Vec<String> = normalized_query
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();
        let prefiltered: BTreeSet<RecipeId> = snapshot
            .corpus
            .iter()
            .filter(|(_, recipe)| {
                let name = recipe.name.to_lowercase();
                let description = recipe.description.to_lowercase();
                tokens
                    .iter()
                    .any(|t| name.contains(t.as_str()) || description.contains(t.as_str()))
            })
            .map(|(id, _)| id.clone())
            .collect();
        if prefiltered.is_empty() {
            let recommendation = Recommendation::empty(ReasonCode::NoMatches);
            self.cache_put(cache_key, &recommendation);
            return Ok(recommendation);
        }

        let pantry = snapshot.normalizer.normalize_set(&tokens);
        let mut recommendation = None;
        if !pantry.resolved.is_empty() {
            let options = RecommendOptions {
                max_results,
                restrict_to: Some(prefiltered.clone()),
                ..self.options.clone()
            };
            let piped =
                orchestrator::recommend(&pantry, &snapshot.corpus, &snapshot.graph, &options)?;
            if !piped.results.is_empty() {
                recommendation = Some(piped);
            }
        }
        let recommendation = recommendation.unwrap_or_else(|| {
            name_match_results(&snapshot.corpus, &prefiltered, &tokens, max_results)
        });

        self.record(&recommendation);
        self.cache_put(cache_key, &recommendation);
        Ok(recommendation)
    }

    /// Random sample of the corpus, for a featured/browse surface.
    pub fn featured_recipes(&self, count: usize) -> Vec<Recipe> {
        let snapshot = self.current();
        let mut rng = rand::thread_rng();
        snapshot
            .corpus
            .values()
            .choose_multiple(&mut rng, count)
            .into_iter()
            .cloned()
            .collect()
    }

    /// `explainAlgorithms`: per-stage descriptions plus the most recent
    /// run's counters and timings.
    pub fn explain_algorithms(&self) -> AlgorithmReport {
        let last_run = self
            .last_stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        AlgorithmReport {
            stages: vec![
                StageDescription {
                    name: "greedy_filter",
                    summary: "Scores every recipe by non-optional ingredient coverage \
                              and keeps the top K; linear in corpus size.",
                },
                StageDescription {
                    name: "graph_enrichment",
                    summary: "Bounded substitute-edge traversal finds pantry stand-ins \
                              for missing ingredients; complement edges add a capped \
                              score bonus.",
                },
                StageDescription {
                    name: "plan_optimizer",
                    summary: "Depth-first backtracking over the candidate pool selects \
                              the best meal plan under coverage, diversity and \
                              redundancy terms, with budget-bounded pruning.",
                },
            ],
            last_run,
        }
    }

    fn record(&self, recommendation: &Recommendation) {
        let mut guard = self.last_stats.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(recommendation.stats.clone());
    }

    fn cache_get(&self, key: &str) -> Option<Recommendation> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.get(key) {
            Some(entry) if entry.created.elapsed() < self.cache_ttl => {
                log::info!("returning cached recommendation for '{}'", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn cache_put(&self, key: String, value: &Recommendation) {
        if self.cache_ttl.is_zero() {
            return;
        }
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if cache.len() >= CACHE_CAPACITY {
            let ttl = self.cache_ttl;
            cache.retain(|_, entry| entry.created.elapsed() < ttl);
        }
        cache.insert(
            key,
            CacheEntry {
                created: Instant::now(),
                value: value.clone(),
            },
        );
    }
}

/// Query-mode fallback scoring: fraction of query tokens found in the
/// recipe name, with description hits at half weight. The matched/missing
/// partition is still reported against an empty pantry.
fn name_match_results(
    corpus: &RecipeCorpus,
    prefiltered: &BTreeSet<RecipeId>,
    tokens: &[String],
    max_results: usize,
) -> Recommendation {
    let mut results: Vec<MatchResult> = prefiltered
        .iter()
        .filter_map(|id| corpus.get(id))
        .map(|recipe| {
            let name = recipe.name.to_lowercase();
            let description = recipe.description.to_lowercase();
            let mut weight = 0.0_f32;
            for token in tokens {
                if name.contains(token.as_str()) {
                    weight += 1.0;
                } else if description.contains(token.as_str()) {
                    weight += 0.5;
                }
            }
            let score = (weight / tokens.len() as f32).min(1.0);
            MatchResult {
                recipe_id: recipe.id.clone(),
                raw_score: score,
                enriched_score: score,
                matched: BTreeSet::new(),
                missing: recipe.non_optional_ingredients(),
                substitutions: Default::default(),
                strategy: MatchStrategy::NameMatch,
            }
        })
        .collect();
    results.sort_by(|x, y| {
        y.enriched_score
            .partial_cmp(&x.enriched_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.recipe_id.cmp(&y.recipe_id))
    });
    results.truncate(max_results);

    let stats = PipelineStats {
        candidates_scanned: corpus.len(),
        ..PipelineStats::default()
    };
    Recommendation {
        results,
        plan: None,
        stats,
        reason: None,
    }
}
