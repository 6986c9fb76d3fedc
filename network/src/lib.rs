pub mod analysis;
pub mod builder;
mod centrality;
pub mod community;
pub mod export;
pub mod graph;

pub use analysis::{AnalysisResult, GraphSummary, MetricSummary, NetworkAnalyzer, NodeMetrics};
pub use builder::GraphBuilder;
pub use community::Community;
pub use export::{edge_table, node_table, EdgeRow, GraphView};
pub use graph::{EdgeRef, SocialGraph};
