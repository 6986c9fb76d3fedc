use serde::Serialize;
use sociogram_core::model::{AggregationPolicy, EntityId};
use std::collections::{BTreeMap, BTreeSet};

/// A borrowed view of one aggregated edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeRef<'a> {
    pub from: EntityId,
    pub to: EntityId,
    pub relation_type: &'a str,
    pub weight: f64,
}

type EdgeKey = (EntityId, EntityId, String);

/// Students as nodes, aggregated nominations as typed weighted edges.
/// Undirected graphs keep each pair once with `from < to`.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    directed: bool,
    nodes: BTreeMap<EntityId, String>,
    edges: BTreeMap<EdgeKey, f64>,
    outgoing: BTreeMap<EntityId, BTreeMap<EntityId, f64>>,
    incoming: BTreeMap<EntityId, BTreeMap<EntityId, f64>>,
}

impl SocialGraph {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            ..Default::default()
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn add_node(&mut self, id: EntityId, name: impl Into<String>) {
        self.nodes.insert(id, name.into());
    }

    pub fn contains_node(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Adds or aggregates an edge. Returns `false` when the edge is a
    /// self-loop, carries an unusable weight or touches an unknown node.
    pub fn add_edge(
        &mut self,
        from: EntityId,
        to: EntityId,
        relation_type: &str,
        weight: f64,
        policy: AggregationPolicy,
    ) -> bool {
        if from == to || !weight.is_finite() || weight <= 0.0 {
            return false;
        }
        if !self.contains_node(from) || !self.contains_node(to) {
            return false;
        }

        let (from, to) = if self.directed || from < to {
            (from, to)
        } else {
            (to, from)
        };

        let slot = self
            .edges
            .entry((from, to, relation_type.to_string()))
            .or_insert(0.0);
        let previous = *slot;
        *slot = if previous == 0.0 {
            weight
        } else {
            policy.combine(previous, weight)
        };
        let delta = *slot - previous;

        self.shift(from, to, delta);
        if !self.directed {
            self.shift(to, from, delta);
        }
        true
    }

    fn shift(&mut self, from: EntityId, to: EntityId, delta: f64) {
        *self
            .outgoing
            .entry(from)
            .or_default()
            .entry(to)
            .or_insert(0.0) += delta;
        *self
            .incoming
            .entry(to)
            .or_default()
            .entry(from)
            .or_insert(0.0) += delta;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Ascending.
    pub fn node_ids(&self) -> Vec<EntityId> {
        self.nodes.keys().copied().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (EntityId, &str)> {
        self.nodes.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn name(&self, id: EntityId) -> Option<&str> {
        self.nodes.get(&id).map(String::as_str)
    }

    /// Ordered by (from, to, relation type).
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_>> {
        self.edges
            .iter()
            .map(|((from, to, relation_type), weight)| EdgeRef {
                from: *from,
                to: *to,
                relation_type: relation_type.as_str(),
                weight: *weight,
            })
    }

    pub fn edge_weight(&self, from: EntityId, to: EntityId, relation_type: &str) -> Option<f64> {
        let (from, to) = if self.directed || from < to {
            (from, to)
        } else {
            (to, from)
        };
        self.edges
            .get(&(from, to, relation_type.to_string()))
            .copied()
    }

    pub fn relation_types(&self) -> BTreeSet<&str> {
        self.edges.keys().map(|(_, _, r)| r.as_str()).collect()
    }

    /// Sum of edge weights, for one relation type or all of them.
    pub fn total_weight(&self, relation_type: Option<&str>) -> f64 {
        self.edges()
            .filter(|edge| relation_type.map_or(true, |r| edge.relation_type == r))
            .map(|edge| edge.weight)
            .sum()
    }

    /// Targets named by `id`, weights summed across relation types. In an
    /// undirected graph this is every neighbour.
    pub fn out_neighbors(&self, id: EntityId) -> BTreeMap<EntityId, f64> {
        self.outgoing.get(&id).cloned().unwrap_or_default()
    }

    pub fn in_neighbors(&self, id: EntityId) -> BTreeMap<EntityId, f64> {
        self.incoming.get(&id).cloned().unwrap_or_default()
    }

    /// Direction-blind neighbours. Reciprocal nominations add up.
    pub fn neighbors(&self, id: EntityId) -> BTreeMap<EntityId, f64> {
        let mut merged = self.out_neighbors(id);
        if self.directed {
            for (other, weight) in self.in_neighbors(id) {
                *merged.entry(other).or_insert(0.0) += weight;
            }
        }
        merged
    }

    pub fn in_degree(&self, id: EntityId) -> usize {
        self.incoming.get(&id).map_or(0, BTreeMap::len)
    }

    pub fn out_degree(&self, id: EntityId) -> usize {
        self.outgoing.get(&id).map_or(0, BTreeMap::len)
    }

    pub fn is_isolated(&self, id: EntityId) -> bool {
        self.in_degree(id) == 0 && self.out_degree(id) == 0
    }
}
