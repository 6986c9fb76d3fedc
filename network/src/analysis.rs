use serde::Serialize;
use sociogram_core::config::AnalysisConfig;
use sociogram_core::model::EntityId;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::centrality::{self, Adjacency};
use crate::community::{self, Community};
use crate::graph::SocialGraph;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetrics {
    pub id: EntityId,
    pub name: String,
    pub in_degree: f64,
    pub out_degree: f64,
    pub degree: f64,
    pub in_strength: f64,
    pub out_strength: f64,
    pub closeness: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
    pub community: usize,
    pub is_isolate: bool,
    pub is_at_risk: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub max: f64,
    /// Lowest id among the nodes holding `max`.
    pub max_node: Option<EntityId>,
}

impl MetricSummary {
    fn of(ids: &[EntityId], values: impl Iterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.collect();
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mut best: Option<(usize, f64)> = None;
        for (idx, value) in values.iter().enumerate() {
            if best.map_or(true, |(_, max)| *value > max) {
                best = Some((idx, *value));
            }
        }

        Self {
            mean,
            std_dev: variance.sqrt(),
            max: best.map_or(0.0, |(_, max)| max),
            max_node: best.map(|(idx, _)| ids[idx]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub directed: bool,
    pub density: f64,
    pub average_degree: f64,
    pub component_count: usize,
    pub community_count: usize,
    pub modularity: f64,
    /// Share of arcs answered by a reverse arc. Undirected graphs have none.
    pub reciprocity: Option<f64>,
    pub average_clustering: f64,
    pub isolate_count: usize,
    pub at_risk_count: usize,
    pub degree: MetricSummary,
    pub in_degree: MetricSummary,
    pub out_degree: MetricSummary,
    pub closeness: MetricSummary,
    pub betweenness: MetricSummary,
    pub eigenvector: MetricSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub nodes: Vec<NodeMetrics>,
    pub communities: Vec<Community>,
    pub isolates: Vec<EntityId>,
    pub at_risk: Vec<EntityId>,
    pub summary: GraphSummary,
}

impl AnalysisResult {
    pub fn node(&self, id: EntityId) -> Option<&NodeMetrics> {
        self.nodes
            .binary_search_by_key(&id, |node| node.id)
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn community_of(&self, id: EntityId) -> Option<usize> {
        self.node(id).map(|node| node.community)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkAnalyzer {
    at_risk_ratio: f64,
    eigenvector_tolerance: f64,
    eigenvector_max_iterations: usize,
}

impl Default for NetworkAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl NetworkAnalyzer {
    pub fn new(at_risk_ratio: f64) -> Self {
        Self {
            at_risk_ratio,
            ..Self::default()
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            at_risk_ratio: config.at_risk_ratio,
            eigenvector_tolerance: config.eigenvector_tolerance,
            eigenvector_max_iterations: config.eigenvector_max_iterations,
        }
    }

    pub fn with_eigenvector(mut self, tolerance: f64, max_iterations: usize) -> Self {
        self.eigenvector_tolerance = tolerance;
        self.eigenvector_max_iterations = max_iterations;
        self
    }

    /// Every metric is computed once over the finished graph. Disconnected
    /// graphs are the norm in a classroom and never an error.
    pub fn analyze(&self, graph: &SocialGraph) -> AnalysisResult {
        let adj = Adjacency::from_graph(graph);
        let n = adj.len();

        let degrees = centrality::degree(&adj);
        let closeness = centrality::closeness(&adj);
        let betweenness = centrality::betweenness(&adj);
        let eigenvector = centrality::eigenvector(
            &adj,
            self.eigenvector_tolerance,
            self.eigenvector_max_iterations,
        );
        let labels = community::louvain(&adj);
        let modularity = community::modularity(&adj, &labels);
        let communities = community::group(&adj, &labels);
        debug!(
            "Centralities and {} community(ies) computed for {} node(s)",
            communities.len(),
            n
        );

        let isolates: Vec<EntityId> = adj
            .ids
            .iter()
            .copied()
            .filter(|id| graph.is_isolated(*id))
            .collect();
        let isolate_set: BTreeSet<EntityId> = isolates.iter().copied().collect();

        let max_in = degrees.iter().map(|d| d.in_degree).fold(0.0, f64::max);
        let cutoff = self.at_risk_ratio * max_in;
        let at_risk: Vec<EntityId> = adj
            .ids
            .iter()
            .zip(&degrees)
            .filter(|(id, scores)| !isolate_set.contains(*id) && scores.in_degree <= cutoff)
            .map(|(id, _)| *id)
            .collect();
        let at_risk_set: BTreeSet<EntityId> = at_risk.iter().copied().collect();

        let nodes: Vec<NodeMetrics> = (0..n)
            .map(|idx| {
                let id = adj.ids[idx];
                NodeMetrics {
                    id,
                    name: graph.name(id).unwrap_or_default().to_string(),
                    in_degree: degrees[idx].in_degree,
                    out_degree: degrees[idx].out_degree,
                    degree: degrees[idx].degree,
                    in_strength: degrees[idx].in_strength,
                    out_strength: degrees[idx].out_strength,
                    closeness: closeness[idx],
                    betweenness: betweenness[idx],
                    eigenvector: eigenvector[idx],
                    community: labels[idx],
                    is_isolate: isolate_set.contains(&id),
                    is_at_risk: at_risk_set.contains(&id),
                }
            })
            .collect();

        let summary = GraphSummary {
            node_count: n,
            edge_count: graph.edge_count(),
            directed: adj.directed,
            density: density(&adj),
            average_degree: average_degree(&adj),
            component_count: adj.components().len(),
            community_count: communities.len(),
            modularity,
            reciprocity: reciprocity(&adj),
            average_clustering: average_clustering(&adj),
            isolate_count: isolates.len(),
            at_risk_count: at_risk.len(),
            degree: MetricSummary::of(&adj.ids, nodes.iter().map(|m| m.degree)),
            in_degree: MetricSummary::of(&adj.ids, nodes.iter().map(|m| m.in_degree)),
            out_degree: MetricSummary::of(&adj.ids, nodes.iter().map(|m| m.out_degree)),
            closeness: MetricSummary::of(&adj.ids, nodes.iter().map(|m| m.closeness)),
            betweenness: MetricSummary::of(&adj.ids, nodes.iter().map(|m| m.betweenness)),
            eigenvector: MetricSummary::of(&adj.ids, nodes.iter().map(|m| m.eigenvector)),
        };

        info!(
            "Analyzed {} student(s): {} isolate(s), {} at risk, {} community(ies), modularity {:.3}",
            n,
            summary.isolate_count,
            summary.at_risk_count,
            summary.community_count,
            summary.modularity
        );

        AnalysisResult {
            nodes,
            communities,
            isolates,
            at_risk,
            summary,
        }
    }
}

fn arc_count(adj: &Adjacency) -> usize {
    adj.outgoing.iter().map(Vec::len).sum()
}

/// Collapsed arcs over possible arcs; undirected pairs count once.
fn density(adj: &Adjacency) -> f64 {
    let n = adj.len();
    if n < 2 {
        return 0.0;
    }
    let possible = (n * (n - 1)) as f64;
    // Undirected adjacency lists every pair from both ends, matching the
    // doubled pair count of n(n-1).
    arc_count(adj) as f64 / possible
}

fn average_degree(adj: &Adjacency) -> f64 {
    if adj.len() == 0 {
        return 0.0;
    }
    let ends: usize = if adj.directed {
        2 * arc_count(adj)
    } else {
        arc_count(adj)
    };
    ends as f64 / adj.len() as f64
}

fn reciprocity(adj: &Adjacency) -> Option<f64> {
    if !adj.directed {
        return None;
    }
    let arcs = arc_count(adj);
    if arcs == 0 {
        return Some(0.0);
    }
    let mutual = adj
        .outgoing
        .iter()
        .enumerate()
        .map(|(from, targets)| {
            targets
                .iter()
                .filter(|(to, _)| adj.outgoing[*to].iter().any(|(back, _)| *back == from))
                .count()
        })
        .sum::<usize>();
    Some(mutual as f64 / arcs as f64)
}

/// Mean local clustering on the unweighted undirected skeleton. Nodes with
/// fewer than two neighbours contribute 0.
fn average_clustering(adj: &Adjacency) -> f64 {
    let n = adj.len();
    if n == 0 {
        return 0.0;
    }
    let neighbor_sets: Vec<BTreeSet<usize>> = adj
        .undirected
        .iter()
        .map(|neighbors| neighbors.iter().map(|(idx, _)| *idx).collect())
        .collect();

    let total: f64 = neighbor_sets
        .iter()
        .map(|neighbors| {
            let k = neighbors.len();
            if k < 2 {
                return 0.0;
            }
            let linked = neighbors
                .iter()
                .map(|a| {
                    neighbor_sets[*a]
                        .iter()
                        .filter(|b| **b > *a && neighbors.contains(b))
                        .count()
                })
                .sum::<usize>();
            linked as f64 / (k * (k - 1) / 2) as f64
        })
        .sum();
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sociogram_core::model::AggregationPolicy;

    fn graph(directed: bool, n: u32, edges: &[(u32, u32)]) -> SocialGraph {
        let mut graph = SocialGraph::new(directed);
        for id in 0..n {
            graph.add_node(EntityId(id), format!("s{id}"));
        }
        for &(from, to) in edges {
            graph.add_edge(EntityId(from), EntityId(to), "friend", 1.0, AggregationPolicy::Sum);
        }
        graph
    }

    #[test]
    fn test_summary_on_small_directed_graph() {
        // 0 <-> 1, 0 -> 2, 3 isolated.
        let result = NetworkAnalyzer::default().analyze(&graph(true, 4, &[(0, 1), (1, 0), (0, 2)]));
        let summary = &result.summary;

        assert_eq!(summary.node_count, 4);
        assert_eq!(summary.edge_count, 3);
        assert!((summary.density - 3.0 / 12.0).abs() < 1e-12);
        assert!((summary.average_degree - 1.5).abs() < 1e-12);
        assert_eq!(summary.reciprocity, Some(2.0 / 3.0));
        assert_eq!(summary.component_count, 2);
        assert_eq!(summary.average_clustering, 0.0);
        assert_eq!(result.isolates, vec![EntityId(3)]);
        assert_eq!(summary.degree.max_node, Some(EntityId(0)));
        assert_eq!(summary.out_degree.max_node, Some(EntityId(0)));
        assert!((summary.out_degree.max - 2.0 / 3.0).abs() < 1e-12);
        assert!((summary.out_degree.mean - 0.25).abs() < 1e-12);
        assert_eq!(summary.in_degree.max_node, Some(EntityId(0)));
    }

    #[test]
    fn test_at_risk_excludes_isolates() {
        // Node 0 is named by everyone; node 4 names someone but nobody names it.
        let result = NetworkAnalyzer::default().analyze(&graph(
            true,
            6,
            &[(1, 0), (2, 0), (3, 0), (4, 0), (0, 1), (1, 2), (2, 3), (3, 1)],
        ));

        assert_eq!(result.isolates, vec![EntityId(5)]);
        assert_eq!(result.at_risk, vec![EntityId(4)]);
        let four = result.node(EntityId(4)).unwrap();
        assert!(four.is_at_risk && !four.is_isolate);
        assert!(!result.node(EntityId(5)).unwrap().is_at_risk);
    }

    #[test]
    fn test_undirected_triangle_clustering() {
        let result = NetworkAnalyzer::default().analyze(&graph(false, 3, &[(0, 1), (1, 2), (2, 0)]));

        assert_eq!(result.summary.reciprocity, None);
        assert!((result.summary.average_clustering - 1.0).abs() < 1e-12);
        assert!((result.summary.density - 1.0).abs() < 1e-12);
        assert!((result.summary.average_degree - 2.0).abs() < 1e-12);
        assert_eq!(result.communities.len(), 1);
        assert!(result.isolates.is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let result = NetworkAnalyzer::default().analyze(&SocialGraph::new(true));
        assert!(result.nodes.is_empty());
        assert_eq!(result.summary.degree.max_node, None);
        assert_eq!(result.summary.modularity, 0.0);
    }
}
