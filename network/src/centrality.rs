use sociogram_core::model::EntityId;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use crate::graph::SocialGraph;

/// Dense, index-addressed copy of a [`SocialGraph`] for the metric passes.
/// Index order is ascending entity id; neighbour lists are sorted.
#[derive(Debug, Clone)]
pub(crate) struct Adjacency {
    pub ids: Vec<EntityId>,
    pub directed: bool,
    /// Outgoing arcs; every neighbour when undirected.
    pub outgoing: Vec<Vec<(usize, f64)>>,
    pub incoming: Vec<Vec<(usize, f64)>>,
    /// Direction-blind, reciprocal weights summed.
    pub undirected: Vec<Vec<(usize, f64)>>,
}

impl Adjacency {
    pub fn from_graph(graph: &SocialGraph) -> Self {
        let ids = graph.node_ids();
        let index: HashMap<EntityId, usize> =
            ids.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();
        let lists = |map: std::collections::BTreeMap<EntityId, f64>| -> Vec<(usize, f64)> {
            map.into_iter()
                .filter_map(|(id, weight)| index.get(&id).map(|idx| (*idx, weight)))
                .collect()
        };

        let outgoing = ids.iter().map(|id| lists(graph.out_neighbors(*id))).collect();
        let incoming = ids.iter().map(|id| lists(graph.in_neighbors(*id))).collect();
        let undirected = ids.iter().map(|id| lists(graph.neighbors(*id))).collect();

        Self {
            ids,
            directed: graph.is_directed(),
            outgoing,
            incoming,
            undirected,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Weakly connected components, each sorted, ordered by smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.len()];
        let mut components = Vec::new();

        for start in 0..self.len() {
            if visited[start] {
                continue;
            }
            let mut queue = VecDeque::new();
            let mut component = Vec::new();
            visited[start] = true;
            queue.push_back(start);

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &(neighbor, _) in &self.undirected[node] {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        queue.push_back(neighbor);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct DegreeScores {
    pub in_degree: f64,
    pub out_degree: f64,
    pub degree: f64,
    pub in_strength: f64,
    pub out_strength: f64,
}

/// Distinct-neighbour counts over n - 1.
pub(crate) fn degree(adj: &Adjacency) -> Vec<DegreeScores> {
    let n = adj.len();
    let scale = if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };

    (0..n)
        .map(|i| DegreeScores {
            in_degree: adj.incoming[i].len() as f64 * scale,
            out_degree: adj.outgoing[i].len() as f64 * scale,
            degree: adj.undirected[i].len() as f64 * scale,
            in_strength: adj.incoming[i].iter().map(|(_, w)| w).sum(),
            out_strength: adj.outgoing[i].iter().map(|(_, w)| w).sum(),
        })
        .collect()
}

/// Wasserman-Faust closeness on hop distances. In a directed graph the
/// distance runs *to* the node, so arcs are walked backwards. Only the set
/// that can reach the node counts, scaled by its share of the graph, so a
/// node nobody reaches scores 0.
pub(crate) fn closeness(adj: &Adjacency) -> Vec<f64> {
    let n = adj.len();
    let mut scores = vec![0.0; n];
    if n < 2 {
        return scores;
    }
    let arcs = if adj.directed {
        &adj.incoming
    } else {
        &adj.outgoing
    };

    for (source, score) in scores.iter_mut().enumerate() {
        let mut dist = vec![usize::MAX; n];
        dist[source] = 0;
        let mut queue = VecDeque::from([source]);
        let (mut reached, mut total) = (0usize, 0usize);

        while let Some(node) = queue.pop_front() {
            for &(next, _) in &arcs[node] {
                if dist[next] == usize::MAX {
                    dist[next] = dist[node] + 1;
                    reached += 1;
                    total += dist[next];
                    queue.push_back(next);
                }
            }
        }

        if total > 0 {
            let r = reached as f64;
            *score = (r / total as f64) * (r / (n - 1) as f64);
        }
    }

    scores
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, then on index.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn same_length(a: f64, b: f64) -> bool {
    a.is_finite() && b.is_finite() && (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

/// Brandes accumulation over Dijkstra shortest paths. A stronger tie is a
/// shorter hop, so the arc cost is 1 / weight.
pub(crate) fn betweenness(adj: &Adjacency) -> Vec<f64> {
    let n = adj.len();
    let mut scores = vec![0.0; n];
    if n < 3 {
        return scores;
    }

    for source in 0..n {
        let mut dist = vec![f64::INFINITY; n];
        let mut settled = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut heap = BinaryHeap::new();
        dist[source] = 0.0;
        heap.push(Frontier {
            cost: 0.0,
            node: source,
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;
            order.push(node);
            for &(next, weight) in &adj.outgoing[node] {
                let candidate = cost + 1.0 / weight;
                if !settled[next] && candidate < dist[next] && !same_length(candidate, dist[next]) {
                    dist[next] = candidate;
                    heap.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        let mut sigma = vec![0.0f64; n];
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        sigma[source] = 1.0;
        for &node in order.iter().skip(1) {
            for &(prev, weight) in &adj.incoming[node] {
                if settled[prev] && same_length(dist[prev] + 1.0 / weight, dist[node]) {
                    sigma[node] += sigma[prev];
                    preds[node].push(prev);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        for &node in order.iter().rev() {
            for &prev in &preds[node] {
                if sigma[node] > 0.0 {
                    delta[prev] += sigma[prev] / sigma[node] * (1.0 + delta[node]);
                }
            }
            if node != source {
                scores[node] += delta[node];
            }
        }
    }

    // Undirected traversal counts every pair from both ends, which the
    // halved normalizer of the undirected formula cancels out.
    let norm = ((n - 1) * (n - 2)) as f64;
    for score in &mut scores {
        *score = (*score / norm).clamp(0.0, 1.0);
    }
    scores
}

/// Power iteration on (A + I) per component, A being the symmetrised
/// weighted adjacency. The identity shift keeps bipartite components from
/// oscillating. Each component is L2-normalized on its own; nodes without
/// any edge score 0.
pub(crate) fn eigenvector(adj: &Adjacency, tolerance: f64, max_iterations: usize) -> Vec<f64> {
    let mut scores = vec![0.0; adj.len()];

    for component in adj.components() {
        if component.len() < 2 {
            continue;
        }
        let start = 1.0 / (component.len() as f64).sqrt();
        for &node in &component {
            scores[node] = start;
        }

        for _ in 0..max_iterations.max(1) {
            let next: Vec<f64> = component
                .iter()
                .map(|&node| {
                    scores[node]
                        + adj.undirected[node]
                            .iter()
                            .map(|&(other, weight)| weight * scores[other])
                            .sum::<f64>()
                })
                .collect();
            let norm = next.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm <= f64::EPSILON {
                break;
            }

            let mut change = 0.0;
            for (&node, value) in component.iter().zip(next) {
                let value = value / norm;
                change += (value - scores[node]).abs();
                scores[node] = value;
            }
            if change < tolerance {
                break;
            }
        }
    }

    scores
}
