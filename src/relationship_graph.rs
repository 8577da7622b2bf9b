use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::recipe_model::IngredientId;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Directed: edge (a, b) means b can stand in for a.
    Substitute,
    /// Undirected, stored in both directions.
    Complement,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelationshipEdge {
    pub a: IngredientId,
    pub b: IngredientId,
    pub kind: RelationKind,
    pub confidence: f32,
}

/// One suggested stand-in for a missing ingredient. `confidence` is the
/// product of edge confidences along the path, `depth` the path length.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubstitutionSuggestion {
    pub ingredient: IngredientId,
    pub confidence: f32,
    pub depth: usize,
}

/// Result of a bounded substitute traversal. `truncated` is set when the
/// fan-out cap cut neighbors off, the non-fatal traversal-limit condition.
#[derive(Debug, Clone, Default)]
pub struct SubstituteSearch {
    pub suggestions: Vec<SubstitutionSuggestion>,
    pub truncated: bool,
}

/// Caps on graph traversal. Exceeding them truncates suggestions, it never
/// fails a request.
#[derive(Debug, Clone)]
pub struct TraversalLimits {
    pub max_depth: usize,
    pub max_fan_out: usize,
    pub max_suggestions: usize,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_fan_out: 16,
            max_suggestions: 3,
        }
    }
}

#[derive(Debug, Clone)]
struct Neighbor {
    target: IngredientId,
    kind: RelationKind,
    confidence: f32,
}

/// In-memory ingredient relationship graph. Adjacency mapping from id to
/// neighbor list, no back-references; traversal uses explicit visited-set
/// bookkeeping so cycles cannot recurse unboundedly. Read-only at query time.
#[derive(Debug, Default)]
pub struct IngredientGraph {
    adjacency: HashMap<IngredientId, Vec<Neighbor>>,
    edge_count: usize,
}

impl IngredientGraph {
    pub fn from_edges(edges: Vec<RelationshipEdge>) -> Self {
        let mut graph = Self::default();
        for edge in edges {
            let confidence = if (0.0..=1.0).contains(&edge.confidence) {
                edge.confidence
            } else {
                log::warn!(
                    "edge ({}, {}) confidence {} outside [0,1], clamping",
                    edge.a,
                    edge.b,
                    edge.confidence
                );
                edge.confidence.clamp(0.0, 1.0)
            };
            graph.insert(edge.a.clone(), edge.b.clone(), edge.kind, confidence);
            if edge.kind == RelationKind::Complement {
                graph.insert(edge.b, edge.a, edge.kind, confidence);
            }
            graph.edge_count += 1;
        }
        // Highest-confidence neighbors first so the fan-out cap and the
        // first-visit BFS are deterministic.
        for neighbors in graph.adjacency.values_mut() {
            neighbors.sort_by(|x, y| {
                y.confidence
                    .partial_cmp(&x.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| x.target.cmp(&y.target))
            });
        }
        graph
    }

    fn insert(&mut self, from: IngredientId, to: IngredientId, kind: RelationKind, confidence: f32) {
        self.adjacency.entry(from).or_default().push(Neighbor {
            target: to,
            kind,
            confidence,
        });
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Confidence of the complement edge between `a` and `b`, if any.
    pub fn complement_confidence(&self, a: &str, b: &str) -> Option<f32> {
        self.adjacency.get(a)?.iter().find_map(|n| {
            (n.kind == RelationKind::Complement && n.target == b).then_some(n.confidence)
        })
    }

    /// Bounded BFS from `start` over substitute edges only, collecting
    /// ingredients the pantry actually contains. Suggestions are ordered by
    /// confidence descending, then depth ascending, then id, and capped at
    /// `limits.max_suggestions`.
    pub fn substitutes_from(
        &self,
        start: &str,
        pantry: &BTreeSet<IngredientId>,
        limits: &TraversalLimits,
    ) -> SubstituteSearch {
        let mut search = SubstituteSearch::default();
        let mut best: HashMap<IngredientId, (f32, usize)> = HashMap::new();
        let mut visited: HashSet<IngredientId> = HashSet::new();
        visited.insert(start.to_string());

        let mut queue: VecDeque<(IngredientId, usize, f32)> = VecDeque::new();
        queue.push_back((start.to_string(), 0, 1.0));

        while let Some((id, depth, confidence)) = queue.pop_front() {
            if depth >= limits.max_depth {
                continue;
            }
            let Some(neighbors) = self.adjacency.get(&id) else {
                continue;
            };
            let substitutes: Vec<&Neighbor> = neighbors
                .iter()
                .filter(|n| n.kind == RelationKind::Substitute)
                .collect();
            if substitutes.len() > limits.max_fan_out {
                search.truncated = true;
            }
            for neighbor in substitutes.into_iter().take(limits.max_fan_out) {
                let next_confidence = confidence * neighbor.confidence;
                let next_depth = depth + 1;
                if pantry.contains(&neighbor.target) {
                    let entry = best
                        .entry(neighbor.target.clone())
                        .or_insert((next_confidence, next_depth));
                    if next_confidence > entry.0
                        || (next_confidence == entry.0 && next_depth < entry.1)
                    {
                        *entry = (next_confidence, next_depth);
                    }
                }
                if visited.insert(neighbor.target.clone()) {
                    queue.push_back((neighbor.target.clone(), next_depth, next_confidence));
                }
            }
        }

        let mut suggestions: Vec<SubstitutionSuggestion> = best
            .into_iter()
            .map(|(ingredient, (confidence, depth))| SubstitutionSuggestion {
                ingredient,
                confidence,
                depth,
            })
            .collect();
        suggestions.sort_by(|x, y| {
            y.confidence
                .partial_cmp(&x.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.depth.cmp(&y.depth))
                .then_with(|| x.ingredient.cmp(&y.ingredient))
        });
        suggestions.truncate(limits.max_suggestions);
        search.suggestions = suggestions;
        search
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(a: &str, b: &str, kind: RelationKind, confidence: f32) -> RelationshipEdge {
        RelationshipEdge {
            a: a.to_string(),
            b: b.to_string(),
            kind,
            confidence,
        }
    }

    fn pantry(ids: &[&str]) -> BTreeSet<IngredientId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_direct_substitute_found() {
        let graph = IngredientGraph::from_edges(vec![edge(
            "butter",
            "oil",
            RelationKind::Substitute,
            0.8,
        )]);
        let search = graph.substitutes_from("butter", &pantry(&["oil"]), &TraversalLimits::default());
        assert_eq!(search.suggestions.len(), 1);
        assert_eq!(search.suggestions[0].ingredient, "oil");
        assert_eq!(search.suggestions[0].confidence, 0.8);
        assert_eq!(search.suggestions[0].depth, 1);
        assert!(!search.truncated);
    }

    #[test]
    fn test_substitute_edges_are_directed() {
        let graph = IngredientGraph::from_edges(vec![edge(
            "butter",
            "oil",
            RelationKind::Substitute,
            0.8,
        )]);
        // oil -> butter was never declared.
        let search =
            graph.substitutes_from("oil", &pantry(&["butter"]), &TraversalLimits::default());
        assert!(search.suggestions.is_empty());
    }

    #[test]
    fn test_complement_edges_are_undirected() {
        let graph = IngredientGraph::from_edges(vec![edge(
            "tomato",
            "basil",
            RelationKind::Complement,
            0.9,
        )]);
        assert_eq!(graph.complement_confidence("tomato", "basil"), Some(0.9));
        assert_eq!(graph.complement_confidence("basil", "tomato"), Some(0.9));
        assert_eq!(graph.complement_confidence("tomato", "rice"), None);
    }

    #[test]
    fn test_two_hop_confidence_is_product() {
        let graph = IngredientGraph::from_edges(vec![
            edge("butter", "margarine", RelationKind::Substitute, 0.9),
            edge("margarine", "oil", RelationKind::Substitute, 0.5),
        ]);
        let search = graph.substitutes_from("butter", &pantry(&["oil"]), &TraversalLimits::default());
        assert_eq!(search.suggestions.len(), 1);
        assert_eq!(search.suggestions[0].ingredient, "oil");
        // 0.9 * 0.5 = 0.45
        assert!((search.suggestions[0].confidence - 0.45).abs() < 1e-6);
        assert_eq!(search.suggestions[0].depth, 2);
    }

    #[test]
    fn test_depth_limit_respected() {
        let graph = IngredientGraph::from_edges(vec![
            edge("a", "b", RelationKind::Substitute, 0.9),
            edge("b", "c", RelationKind::Substitute, 0.9),
            edge("c", "d", RelationKind::Substitute, 0.9),
        ]);
        // d is three hops out; default depth limit is 2.
        let search = graph.substitutes_from("a", &pantry(&["d"]), &TraversalLimits::default());
        assert!(search.suggestions.is_empty());

        let deeper = TraversalLimits {
            max_depth: 3,
            ..TraversalLimits::default()
        };
        let search = graph.substitutes_from("a", &pantry(&["d"]), &deeper);
        assert_eq!(search.suggestions.len(), 1);
        assert_eq!(search.suggestions[0].depth, 3);
    }

    #[test]
    fn test_cycle_terminates() {
        let graph = IngredientGraph::from_edges(vec![
            edge("a", "b", RelationKind::Substitute, 0.9),
            edge("b", "a", RelationKind::Substitute, 0.9),
        ]);
        let limits = TraversalLimits {
            max_depth: 10,
            ..TraversalLimits::default()
        };
        let search = graph.substitutes_from("a", &pantry(&["b"]), &limits);
        assert_eq!(search.suggestions.len(), 1);
        assert_eq!(search.suggestions[0].depth, 1);
    }

    #[test]
    fn test_fan_out_cap_truncates() {
        let mut edges = Vec::new();
        for i in 0..5 {
            edges.push(edge("flour", &format!("alt{}", i), RelationKind::Substitute, 0.5));
        }
        let graph = IngredientGraph::from_edges(edges);
        let limits = TraversalLimits {
            max_fan_out: 3,
            max_suggestions: 10,
            ..TraversalLimits::default()
        };
        let everything = pantry(&["alt0", "alt1", "alt2", "alt3", "alt4"]);
        let search = graph.substitutes_from("flour", &everything, &limits);
        assert!(search.truncated);
        assert_eq!(search.suggestions.len(), 3);
    }

    #[test]
    fn test_suggestions_ordered_and_capped() {
        let graph = IngredientGraph::from_edges(vec![
            edge("milk", "soy milk", RelationKind::Substitute, 0.6),
            edge("milk", "oat milk", RelationKind::Substitute, 0.9),
            edge("milk", "almond milk", RelationKind::Substitute, 0.9),
            edge("milk", "water", RelationKind::Substitute, 0.2),
        ]);
        let everything = pantry(&["soy milk", "oat milk", "almond milk", "water"]);
        let search = graph.substitutes_from("milk", &everything, &TraversalLimits::default());
        // Capped at 3; equal confidence broken by id.
        assert_eq!(search.suggestions.len(), 3);
        assert_eq!(search.suggestions[0].ingredient, "almond milk");
        assert_eq!(search.suggestions[1].ingredient, "oat milk");
        assert_eq!(search.suggestions[2].ingredient, "soy milk");
    }

    #[test]
    fn test_confidence_clamped_on_build() {
        let graph = IngredientGraph::from_edges(vec![edge(
            "a",
            "b",
            RelationKind::Substitute,
            1.7,
        )]);
        let search = graph.substitutes_from("a", &pantry(&["b"]), &TraversalLimits::default());
        assert_eq!(search.suggestions[0].confidence, 1.0);
    }

    #[test]
    fn test_complement_edges_ignored_by_substitute_search() {
        let graph = IngredientGraph::from_edges(vec![edge(
            "tomato",
            "basil",
            RelationKind::Complement,
            0.9,
        )]);
        let search =
            graph.substitutes_from("tomato", &pantry(&["basil"]), &TraversalLimits::default());
        assert!(search.suggestions.is_empty());
    }
}
