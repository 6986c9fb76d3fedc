use serde::Serialize;
use sociogram_core::model::EntityId;

use crate::analysis::{AnalysisResult, GraphSummary, NodeMetrics};
use crate::community::Community;
use crate::graph::SocialGraph;

/// One aggregated edge, flattened for CSV/Excel writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRow {
    pub from: EntityId,
    pub from_name: String,
    pub to: EntityId,
    pub to_name: String,
    pub relation_type: String,
    pub weight: f64,
}

pub fn edge_table(graph: &SocialGraph) -> Vec<EdgeRow> {
    graph
        .edges()
        .map(|edge| EdgeRow {
            from: edge.from,
            from_name: graph.name(edge.from).unwrap_or_default().to_string(),
            to: edge.to,
            to_name: graph.name(edge.to).unwrap_or_default().to_string(),
            relation_type: edge.relation_type.to_string(),
            weight: edge.weight,
        })
        .collect()
}

/// One row per student with every metric. Nodes missing from `result` are
/// skipped.
pub fn node_table(graph: &SocialGraph, result: &AnalysisResult) -> Vec<NodeMetrics> {
    graph
        .node_ids()
        .into_iter()
        .filter_map(|id| result.node(id).cloned())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    pub id: EntityId,
    pub label: String,
    pub community: usize,
    /// Eigenvector centrality, for node sizing.
    pub size: f64,
    pub is_isolate: bool,
    pub is_at_risk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEdge {
    pub source: EntityId,
    pub target: EntityId,
    pub relation_type: String,
    pub weight: f64,
}

/// Everything a sociogram renderer needs in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub directed: bool,
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
    pub communities: Vec<Community>,
    pub summary: GraphSummary,
}

impl GraphView {
    pub fn new(graph: &SocialGraph, result: &AnalysisResult) -> Self {
        let nodes = node_table(graph, result)
            .into_iter()
            .map(|metrics| ViewNode {
                id: metrics.id,
                label: metrics.name,
                community: metrics.community,
                size: metrics.eigenvector,
                is_isolate: metrics.is_isolate,
                is_at_risk: metrics.is_at_risk,
            })
            .collect();
        let edges = graph
            .edges()
            .map(|edge| ViewEdge {
                source: edge.from,
                target: edge.to,
                relation_type: edge.relation_type.to_string(),
                weight: edge.weight,
            })
            .collect();

        Self {
            directed: graph.is_directed(),
            nodes,
            edges,
            communities: result.communities.clone(),
            summary: result.summary.clone(),
        }
    }
}
