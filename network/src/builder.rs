use ingestion::Roster;
use sociogram_core::config::AnalysisConfig;
use sociogram_core::model::{AggregationPolicy, RelationEdge};
use tracing::{info, warn};

use crate::graph::SocialGraph;

#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder {
    policy: AggregationPolicy,
    directed: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(AggregationPolicy::Sum, true)
    }
}

impl GraphBuilder {
    pub fn new(policy: AggregationPolicy, directed: bool) -> Self {
        Self { policy, directed }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.aggregation, config.directed)
    }

    /// Every roster entity becomes a node, nominated or not, so students
    /// nobody mentioned still show up as isolates.
    pub fn build(&self, roster: &Roster, edges: &[RelationEdge]) -> SocialGraph {
        let mut graph = SocialGraph::new(self.directed);
        for entity in roster.entities() {
            graph.add_node(entity.id, entity.name.clone());
        }

        let mut rejected = 0usize;
        for edge in edges {
            if !graph.add_edge(edge.from, edge.to, &edge.relation_type, edge.weight, self.policy) {
                rejected += 1;
            }
        }
        if rejected > 0 {
            warn!("Discarded {} edge(s) that were self-loops or referenced unknown students", rejected);
        }

        info!(
            "Built {} graph: {} node(s), {} edge(s) from {} nomination(s)",
            if self.directed { "directed" } else { "undirected" },
            graph.node_count(),
            graph.edge_count(),
            edges.len()
        );
        graph
    }
}
