use serde::Serialize;
use sociogram_core::model::EntityId;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::centrality::Adjacency;

const MAX_SWEEPS: usize = 100;
const MAX_LEVELS: usize = 32;
const GAIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Community {
    pub id: usize,
    pub members: Vec<EntityId>,
}

/// Weighted undirected graph over super-nodes. A self-loop entry holds
/// twice the internal weight so that row sums stay node degrees.
#[derive(Debug, Clone)]
struct LevelGraph {
    adj: Vec<BTreeMap<usize, f64>>,
}

impl LevelGraph {
    fn from_adjacency(adj: &Adjacency) -> Self {
        Self {
            adj: adj
                .undirected
                .iter()
                .map(|neighbors| neighbors.iter().copied().collect())
                .collect(),
        }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    fn degree(&self, node: usize) -> f64 {
        self.adj[node].values().sum()
    }

    fn total_degree(&self) -> f64 {
        (0..self.len()).map(|node| self.degree(node)).sum()
    }
}

/// Louvain community labels, one per adjacency index. Nodes and candidate
/// communities are visited in ascending order and only a strictly positive
/// modularity gain moves a node, so the result is deterministic. Labels are
/// renumbered so community 0 holds the smallest node, 1 the next smallest
/// unassigned node, and so on.
pub(crate) fn louvain(adj: &Adjacency) -> Vec<usize> {
    let n = adj.len();
    let mut level = LevelGraph::from_adjacency(adj);
    let two_m = level.total_degree();
    if two_m <= f64::EPSILON {
        return (0..n).collect();
    }

    // members[s] = original nodes folded into super-node s.
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    for _ in 0..MAX_LEVELS {
        let assignment = local_moves(&level, two_m);
        let assignment = split_disconnected(&level, &assignment);
        let count = assignment.iter().copied().max().map_or(0, |max| max + 1);
        if count == level.len() {
            break;
        }

        let mut folded: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (node, community) in assignment.iter().enumerate() {
            folded[*community].extend(members[node].iter().copied());
        }
        members = folded;
        level = aggregate(&level, &assignment, count);
    }

    let mut groups: Vec<Vec<usize>> = members
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|mut group| {
            group.sort_unstable();
            group
        })
        .collect();
    groups.sort_by_key(|group| group[0]);

    let mut labels = vec![0; n];
    for (label, group) in groups.iter().enumerate() {
        for &node in group {
            labels[node] = label;
        }
    }
    labels
}

fn local_moves(level: &LevelGraph, two_m: f64) -> Vec<usize> {
    let n = level.len();
    let mut community: Vec<usize> = (0..n).collect();
    let degrees: Vec<f64> = (0..n).map(|node| level.degree(node)).collect();
    let mut totals = degrees.clone();

    for _ in 0..MAX_SWEEPS {
        let mut moved = false;

        for node in 0..n {
            let current = community[node];
            let k_i = degrees[node];
            totals[current] -= k_i;

            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            links.insert(current, 0.0);
            for (&neighbor, &weight) in &level.adj[node] {
                if neighbor != node {
                    *links.entry(community[neighbor]).or_insert(0.0) += weight;
                }
            }

            let gain = |candidate: usize, k_in: f64| k_in - k_i * totals[candidate] / two_m;
            let mut best = current;
            let mut best_gain = gain(current, links[&current]);
            for (&candidate, &k_in) in &links {
                let candidate_gain = gain(candidate, k_in);
                if candidate_gain > best_gain + GAIN_EPSILON {
                    best = candidate;
                    best_gain = candidate_gain;
                }
            }

            totals[best] += k_i;
            if best != current {
                community[node] = best;
                moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    community
}

/// Splits communities that local moves left disconnected and numbers the
/// pieces densely in order of their smallest node.
fn split_disconnected(level: &LevelGraph, assignment: &[usize]) -> Vec<usize> {
    let n = level.len();
    let mut refined = vec![usize::MAX; n];
    let mut next = 0usize;

    for start in 0..n {
        if refined[start] != usize::MAX {
            continue;
        }
        let community = assignment[start];
        let mut queue = VecDeque::from([start]);
        refined[start] = next;

        while let Some(node) = queue.pop_front() {
            for &neighbor in level.adj[node].keys() {
                if refined[neighbor] == usize::MAX && assignment[neighbor] == community {
                    refined[neighbor] = next;
                    queue.push_back(neighbor);
                }
            }
        }
        next += 1;
    }

    refined
}

fn aggregate(level: &LevelGraph, assignment: &[usize], count: usize) -> LevelGraph {
    let mut adj: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
    for (node, neighbors) in level.adj.iter().enumerate() {
        for (&neighbor, &weight) in neighbors {
            *adj[assignment[node]]
                .entry(assignment[neighbor])
                .or_insert(0.0) += weight;
        }
    }
    LevelGraph { adj }
}

/// Newman modularity of a labelling on the symmetrised weighted graph.
pub(crate) fn modularity(adj: &Adjacency, labels: &[usize]) -> f64 {
    let degrees: Vec<f64> = adj
        .undirected
        .iter()
        .map(|neighbors| neighbors.iter().map(|(_, w)| w).sum())
        .collect();
    let two_m: f64 = degrees.iter().sum();
    if two_m <= f64::EPSILON {
        return 0.0;
    }

    let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut totals: BTreeMap<usize, f64> = BTreeMap::new();
    for (node, neighbors) in adj.undirected.iter().enumerate() {
        *totals.entry(labels[node]).or_insert(0.0) += degrees[node];
        for &(neighbor, weight) in neighbors {
            if labels[neighbor] == labels[node] {
                *internal.entry(labels[node]).or_insert(0.0) += weight;
            }
        }
    }

    totals
        .iter()
        .map(|(label, total)| {
            let inside = internal.get(label).copied().unwrap_or(0.0);
            inside / two_m - (total / two_m).powi(2)
        })
        .sum()
}

pub(crate) fn group(adj: &Adjacency, labels: &[usize]) -> Vec<Community> {
    let mut grouped: BTreeMap<usize, BTreeSet<EntityId>> = BTreeMap::new();
    for (node, label) in labels.iter().enumerate() {
        grouped.entry(*label).or_default().insert(adj.ids[node]);
    }
    grouped
        .into_iter()
        .map(|(id, members)| Community {
            id,
            members: members.into_iter().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SocialGraph;
    use sociogram_core::model::AggregationPolicy;

    fn adjacency(n: u32, edges: &[(u32, u32)]) -> Adjacency {
        let mut graph = SocialGraph::new(true);
        for id in 0..n {
            graph.add_node(EntityId(id), format!("s{id}"));
        }
        for &(from, to) in edges {
            graph.add_edge(EntityId(from), EntityId(to), "friend", 1.0, AggregationPolicy::Sum);
        }
        Adjacency::from_graph(&graph)
    }

    #[test]
    fn test_two_cliques_joined_by_a_bridge() {
        let adj = adjacency(
            7,
            &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)],
        );
        let labels = louvain(&adj);

        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1, 2]);
        let q = modularity(&adj, &labels);
        assert!(q > 0.3, "modularity {q}");

        let communities = group(&adj, &labels);
        assert_eq!(communities.len(), 3);
        assert_eq!(communities[2].members, vec![EntityId(6)]);
    }

    #[test]
    fn test_edgeless_graph_is_all_singletons() {
        let adj = adjacency(3, &[]);
        assert_eq!(louvain(&adj), vec![0, 1, 2]);
        assert_eq!(modularity(&adj, &[0, 1, 2]), 0.0);
    }

    #[test]
    fn test_louvain_is_deterministic() {
        let edges = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (0, 3), (6, 7)];
        let adj = adjacency(8, &edges);
        assert_eq!(louvain(&adj), louvain(&adj));
    }

    #[test]
    fn test_single_community_has_zero_modularity() {
        let adj = adjacency(3, &[(0, 1), (1, 2), (2, 0)]);
        assert!(modularity(&adj, &[0, 0, 0]).abs() < 1e-12);
    }
}
