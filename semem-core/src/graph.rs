//! Concept graph
//!
//! Undirected weighted graph over extracted concept labels. Co-occurrence
//! within one Interaction or chunk increments edge weights; retrieval scores
//! candidates through bounded spreading activation; a background decay pass
//! multiplies weights down and prunes below a floor.
//!
//! Interactions are linked to concepts by ID adjacency (no object cycles):
//! the graph records which interaction IDs mention each concept label.

use crate::config::GraphConfig;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Node bookkeeping for one concept label
#[derive(Debug, Clone)]
pub struct ConceptNode {
    /// First time this label was observed
    pub first_seen: chrono::DateTime<chrono::Utc>,
    /// Number of observations
    pub occurrences: u64,
    /// IDs of interactions mentioning this concept
    pub interaction_ids: BTreeSet<String>,
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<String, ConceptNode>,
    /// Symmetric adjacency: both directions always present
    edges: HashMap<String, HashMap<String, f32>>,
    edge_count: usize,
    communities: Option<CommunityCache>,
}

struct CommunityCache {
    clusters: Vec<Vec<String>>,
    edge_count_at_build: usize,
}

/// Undirected weighted concept graph
pub struct ConceptGraph {
    state: RwLock<GraphState>,
    config: GraphConfig,
}

impl ConceptGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new(config: GraphConfig) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            config,
        }
    }

    /// Record a set of concepts co-occurring in interaction `interaction_id`.
    ///
    /// Adds pairwise edges with `Δw = 1` and links every concept to the
    /// interaction ID.
    pub fn observe(&self, interaction_id: &str, concepts: &[String]) {
        if concepts.is_empty() {
            return;
        }
        let mut state = self.state.write();
        let now = chrono::Utc::now();
        for concept in concepts {
            let node = state
                .nodes
                .entry(concept.clone())
                .or_insert_with(|| ConceptNode {
                    first_seen: now,
                    occurrences: 0,
                    interaction_ids: BTreeSet::new(),
                });
            node.occurrences += 1;
            node.interaction_ids.insert(interaction_id.to_string());
        }
        for (i, a) in concepts.iter().enumerate() {
            for b in concepts.iter().skip(i + 1) {
                if a == b {
                    continue;
                }
                Self::bump_edge(&mut state, a, b, 1.0);
            }
        }
    }

    /// Increment the weight of edge `(a, b)` by `delta` (symmetric)
    pub fn add_edge(&self, a: &str, b: &str, delta: f32) {
        if a == b || delta <= 0.0 {
            return;
        }
        let mut state = self.state.write();
        Self::bump_edge(&mut state, a, b, delta);
    }

    fn bump_edge(state: &mut GraphState, a: &str, b: &str, delta: f32) {
        let forward = state
            .edges
            .entry(a.to_string())
            .or_default()
            .entry(b.to_string())
            .or_insert(0.0);
        let is_new = *forward == 0.0;
        *forward += delta;
        *state
            .edges
            .entry(b.to_string())
            .or_default()
            .entry(a.to_string())
            .or_insert(0.0) += delta;
        if is_new {
            state.edge_count += 1;
        }
    }

    /// Weight of edge `(a, b)`, zero when absent
    #[must_use]
    pub fn edge_weight(&self, a: &str, b: &str) -> f32 {
        self.state
            .read()
            .edges
            .get(a)
            .and_then(|next| next.get(b))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of distinct undirected edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.state.read().edge_count
    }

    /// Whether the label is known
    #[must_use]
    pub fn contains(&self, concept: &str) -> bool {
        self.state.read().nodes.contains_key(concept)
    }

    /// Occurrences, degree, and linked interactions for one concept
    #[must_use]
    pub fn concept_info(&self, concept: &str) -> Option<(u64, usize, Vec<String>)> {
        let state = self.state.read();
        let node = state.nodes.get(concept)?;
        let degree = state.edges.get(concept).map_or(0, HashMap::len);
        Some((
            node.occurrences,
            degree,
            node.interaction_ids.iter().cloned().collect(),
        ))
    }

    /// Interactions linked to `concept`
    #[must_use]
    pub fn interactions_for(&self, concept: &str) -> Vec<String> {
        self.state
            .read()
            .nodes
            .get(concept)
            .map(|node| node.interaction_ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Bounded level-order BFS with multiplicative decay per hop.
    ///
    /// Seeds start at activation 1.0; each hop multiplies by `decay` and
    /// scales by normalized edge weight. Energy never flows back into an
    /// already-activated node; multiple paths arriving at the same hop
    /// accumulate. Frontiers iterate in label order so float accumulation
    /// is deterministic. Results sort by `(activation desc, label asc)`.
    #[must_use]
    pub fn spread_activation(&self, seeds: &[String]) -> Vec<(String, f32)> {
        let state = self.state.read();
        let hops = self.config.activation_hops;
        let decay = self.config.activation_decay;

        let mut activation: BTreeMap<String, f32> = BTreeMap::new();
        for seed in seeds {
            if state.nodes.contains_key(seed) {
                activation.insert(seed.clone(), 1.0);
            }
        }

        let mut frontier: BTreeMap<String, f32> = activation.clone();
        for _ in 0..hops {
            let mut next: BTreeMap<String, f32> = BTreeMap::new();
            for (label, energy) in &frontier {
                let Some(neighbours) = state.edges.get(label) else {
                    continue;
                };
                let total: f32 = neighbours.values().sum();
                if total <= 0.0 {
                    continue;
                }
                let mut ordered: Vec<(&String, &f32)> = neighbours.iter().collect();
                ordered.sort_by(|a, b| a.0.cmp(b.0));
                for (neighbour, weight) in ordered {
                    if activation.contains_key(neighbour) {
                        continue;
                    }
                    let passed = energy * decay * (weight / total);
                    if passed < 1e-4 {
                        continue;
                    }
                    *next.entry(neighbour.clone()).or_default() += passed;
                }
            }
            if next.is_empty() {
                break;
            }
            for (label, energy) in &next {
                activation.insert(label.clone(), *energy);
            }
            frontier = next;
        }

        let mut result: Vec<(String, f32)> = activation.into_iter().collect();
        result.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        result
    }

    /// Interaction IDs activated by spreading from `seeds`, with their
    /// accumulated activation. Used by the retriever's graph branch.
    #[must_use]
    pub fn activated_interactions(&self, seeds: &[String]) -> Vec<(String, f32)> {
        let activations = self.spread_activation(seeds);
        let state = self.state.read();
        let mut scores: HashMap<String, f32> = HashMap::new();
        for (label, energy) in &activations {
            if let Some(node) = state.nodes.get(label) {
                for id in &node.interaction_ids {
                    *scores.entry(id.clone()).or_default() += energy;
                }
            }
        }
        let mut result: Vec<(String, f32)> = scores.into_iter().collect();
        result.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        result
    }

    /// Apply one decay pass: every weight × `decay_factor`, edges below
    /// `prune_floor` removed
    pub fn decay_edges(&self) {
        let mut state = self.state.write();
        let factor = self.config.decay_factor;
        let floor = self.config.prune_floor;
        let mut removed = 0usize;
        for neighbours in state.edges.values_mut() {
            neighbours.retain(|_, weight| {
                *weight *= factor;
                if *weight < floor {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        state.edges.retain(|_, neighbours| !neighbours.is_empty());
        // Each undirected edge is stored twice
        state.edge_count = state.edge_count.saturating_sub(removed / 2);
        if removed > 0 {
            tracing::debug!(pruned = removed / 2, "concept graph decay pass");
        }
    }

    /// Community clusters for `zoom=community`, lazily computed and cached.
    ///
    /// Label propagation over the weighted graph; the cache is invalidated
    /// when the edge count has drifted more than the configured fraction
    /// since the last build.
    #[must_use]
    pub fn communities(&self) -> Vec<Vec<String>> {
        {
            let state = self.state.read();
            if let Some(cache) = &state.communities {
                let drift = (state.edge_count as f32 - cache.edge_count_at_build as f32).abs()
                    / (cache.edge_count_at_build.max(1) as f32);
                if drift <= self.config.community_invalidation {
                    return cache.clusters.clone();
                }
            }
        }

        let mut state = self.state.write();
        let clusters = Self::label_propagation(&state);
        state.communities = Some(CommunityCache {
            clusters: clusters.clone(),
            edge_count_at_build: state.edge_count,
        });
        clusters
    }

    fn label_propagation(state: &GraphState) -> Vec<Vec<String>> {
        let mut labels: Vec<String> = state.nodes.keys().cloned().collect();
        labels.sort();
        let mut assignment: HashMap<String, String> = labels
            .iter()
            .map(|label| (label.clone(), label.clone()))
            .collect();

        // Deterministic sweeps: nodes in sorted order adopt the strongest
        // neighbouring label; lexicographic tie-break keeps runs stable.
        for _ in 0..4 {
            let mut changed = false;
            for label in &labels {
                let Some(neighbours) = state.edges.get(label) else {
                    continue;
                };
                let best = neighbours
                    .iter()
                    .filter_map(|(next, weight)| {
                        assignment.get(next).map(|c| (c.clone(), *weight))
                    })
                    .fold(HashMap::<String, f32>::new(), |mut acc, (c, w)| {
                        *acc.entry(c).or_default() += w;
                        acc
                    })
                    .into_iter()
                    .max_by(|a, b| {
                        a.1.partial_cmp(&b.1)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| b.0.cmp(&a.0))
                    });
                if let Some((community, _)) = best {
                    if assignment.get(label) != Some(&community) {
                        assignment.insert(label.clone(), community);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut clusters: HashMap<String, Vec<String>> = HashMap::new();
        for (label, community) in assignment {
            clusters.entry(community).or_default().push(label);
        }
        let mut result: Vec<Vec<String>> = clusters
            .into_values()
            .map(|mut members| {
                members.sort();
                members
            })
            .collect();
        result.sort();
        result
    }

    /// Labels sharing a community with any of `seeds`
    #[must_use]
    pub fn community_of(&self, seeds: &[String]) -> HashSet<String> {
        let clusters = self.communities();
        let mut members = HashSet::new();
        for cluster in &clusters {
            if cluster.iter().any(|label| seeds.contains(label)) {
                members.extend(cluster.iter().cloned());
            }
        }
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> ConceptGraph {
        ConceptGraph::new(GraphConfig::default())
    }

    #[test]
    fn test_edges_are_symmetric() {
        let graph = graph();
        graph.add_edge("atp", "mitochondria", 1.0);
        assert!((graph.edge_weight("atp", "mitochondria") - 1.0).abs() < 1e-6);
        assert!((graph.edge_weight("mitochondria", "atp") - 1.0).abs() < 1e-6);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_observe_links_interactions_and_edges() {
        let graph = graph();
        graph.observe("id-1", &["atp".into(), "energy".into(), "cell".into()]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.interactions_for("atp"), vec!["id-1".to_string()]);
        graph.observe("id-2", &["atp".into(), "energy".into()]);
        assert!((graph.edge_weight("atp", "energy") - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_self_edges_rejected() {
        let graph = graph();
        graph.add_edge("x", "x", 1.0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_spread_activation_decays_per_hop() {
        let graph = graph();
        graph.add_edge("a", "b", 1.0);
        graph.add_edge("b", "c", 1.0);
        graph.observe("seed", &["a".into()]);
        let activations = graph.spread_activation(&["a".to_string()]);
        let get = |label: &str| {
            activations
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, a)| *a)
        };
        assert!((get("a").unwrap() - 1.0).abs() < 1e-6);
        let b = get("b").unwrap();
        assert!(b < 1.0 && b > 0.0);
        let c = get("c").unwrap();
        assert!(c < b);
    }

    #[test]
    fn test_spread_activation_hop_limit() {
        let config = GraphConfig {
            activation_hops: 1,
            ..GraphConfig::default()
        };
        let graph = ConceptGraph::new(config);
        graph.add_edge("a", "b", 1.0);
        graph.add_edge("b", "c", 1.0);
        graph.observe("seed", &["a".into()]);
        let activations = graph.spread_activation(&["a".to_string()]);
        assert!(activations.iter().all(|(label, _)| label != "c"));
    }

    #[test]
    fn test_unknown_seed_is_ignored() {
        let graph = graph();
        assert!(graph.spread_activation(&["ghost".to_string()]).is_empty());
    }

    #[test]
    fn test_activated_interactions() {
        let graph = graph();
        graph.observe("id-1", &["atp".into(), "energy".into()]);
        graph.observe("id-2", &["energy".into(), "solar".into()]);
        let hits = graph.activated_interactions(&["atp".to_string()]);
        assert_eq!(hits[0].0, "id-1");
        // id-2 reachable through "energy"
        assert!(hits.iter().any(|(id, _)| id == "id-2"));
    }

    #[test]
    fn test_decay_prunes_below_floor() {
        let config = GraphConfig {
            decay_factor: 0.5,
            prune_floor: 0.3,
            ..GraphConfig::default()
        };
        let graph = ConceptGraph::new(config);
        graph.add_edge("a", "b", 1.0); // 0.5 after one pass
        graph.add_edge("c", "d", 0.5); // 0.25 after one pass, pruned
        graph.decay_edges();
        assert!((graph.edge_weight("a", "b") - 0.5).abs() < 1e-6);
        assert_eq!(graph.edge_weight("c", "d"), 0.0);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_communities_cluster_dense_groups() {
        let graph = graph();
        // Two dense triangles with no connection between them
        graph.observe("i1", &["a".into(), "b".into(), "c".into()]);
        graph.observe("i2", &["x".into(), "y".into(), "z".into()]);
        let members = graph.community_of(&["a".to_string()]);
        assert!(members.contains("b") && members.contains("c"));
        assert!(!members.contains("x"));
    }

    #[test]
    fn test_community_cache_survives_small_drift() {
        let graph = graph();
        for i in 0..20 {
            graph.add_edge(&format!("n{i}"), &format!("n{}", i + 1), 1.0);
        }
        let first = graph.communities();
        graph.add_edge("n0", "n2", 1.0); // 1/20 = 5% drift, under 10%
        let second = graph.communities();
        assert_eq!(first, second);
    }
}
