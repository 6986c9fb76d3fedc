use advisor::AiClient;
use ingestion::{
    validate, EdgeExtractor, EntityResolver, Extraction, Roster, UnresolvedRow, WeightParseError,
};
use network::{
    edge_table, node_table, AnalysisResult, EdgeRow, GraphBuilder, GraphView, NetworkAnalyzer,
    NodeMetrics, SocialGraph,
};
use serde::Serialize;
use sociogram_core::config::{AnalysisConfig, AppConfig};
use sociogram_core::model::ColumnMapping;
use sociogram_core::proposal::MappingProposal;
use sociogram_core::table::RawTable;
use tracing::{info, warn};

use crate::error::PipelineError;

/// Data-quality findings that never abort a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub unresolved_rows: Vec<UnresolvedRow>,
    pub weight_errors: Vec<WeightParseError>,
    pub self_loops_discarded: usize,
    pub unresolved_nominations: usize,
}

impl From<&Extraction> for Diagnostics {
    fn from(extraction: &Extraction) -> Self {
        Self {
            unresolved_rows: extraction.unresolved_rows.clone(),
            weight_errors: extraction.weight_errors.clone(),
            self_loops_discarded: extraction.self_loops_discarded,
            unresolved_nominations: extraction.unresolved_nominations,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub mapping: ColumnMapping,
    pub roster: Roster,
    pub graph: SocialGraph,
    pub result: AnalysisResult,
    pub diagnostics: Diagnostics,
}

impl AnalysisReport {
    pub fn view(&self) -> GraphView {
        GraphView::new(&self.graph, &self.result)
    }

    pub fn edge_table(&self) -> Vec<EdgeRow> {
        edge_table(&self.graph)
    }

    pub fn node_table(&self) -> Vec<NodeMetrics> {
        node_table(&self.graph, &self.result)
    }
}

/// validate → resolve → extract → build → analyze, one table at a time.
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    resolver: EntityResolver,
    extractor: EdgeExtractor,
    builder: GraphBuilder,
    analyzer: NetworkAnalyzer,
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            resolver: EntityResolver::from_config(&config),
            extractor: EdgeExtractor::from_config(&config),
            builder: GraphBuilder::from_config(&config),
            analyzer: NetworkAnalyzer::from_config(&config),
            config,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.analysis.clone())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Rejects the proposal up front if it does not fit the table; data
    /// problems after that only show up in the diagnostics.
    pub fn run(
        &self,
        table: &RawTable,
        proposal: &MappingProposal,
    ) -> Result<AnalysisReport, PipelineError> {
        let mapping = validate(table, proposal)?;
        Ok(self.run_with_mapping(table, mapping))
    }

    pub fn run_with_mapping(&self, table: &RawTable, mapping: ColumnMapping) -> AnalysisReport {
        info!(
            "Analyzing {} row(s) across {} relation type(s)",
            table.row_count(),
            mapping.relation_types().len()
        );

        let roster = self.resolver.resolve(table, &mapping);
        let extraction = self.extractor.extract(table, &mapping, &roster);
        let graph = self.builder.build(&roster, &extraction.edges);
        let result = self.analyzer.analyze(&graph);
        let diagnostics = Diagnostics::from(&extraction);

        if !extraction.is_clean() {
            warn!(
                "Analysis finished with {} unresolved row(s), {} weight error(s), {} unresolved nomination(s)",
                diagnostics.unresolved_rows.len(),
                diagnostics.weight_errors.len(),
                diagnostics.unresolved_nominations
            );
        }

        AnalysisReport {
            mapping,
            roster,
            graph,
            result,
            diagnostics,
        }
    }

    /// Asks the AI for the column mapping and, when enabled, for spelling
    /// groups, then runs. A failed alias request only costs the hints.
    pub async fn propose_and_run(
        &self,
        client: &AiClient,
        table: &RawTable,
    ) -> Result<AnalysisReport, PipelineError> {
        let proposal = client.propose_mapping(table).await?;
        let mut mapping = validate(table, &proposal)?;

        if self.config.ai_alias_hints {
            let names: Vec<String> = self
                .resolver
                .collect_names(table, &mapping)
                .into_keys()
                .collect();
            match client.suggest_aliases(&names).await {
                Ok(hints) => {
                    info!("AI suggested {} alias group(s)", hints.len());
                    mapping.alias_hints.extend(hints);
                }
                Err(err) => warn!("Continuing without AI alias hints: {}", err),
            }
        }

        Ok(self.run_with_mapping(table, mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::MappingError;
    use sociogram_core::error::{ErrorCode, SociogramError};

    fn table() -> RawTable {
        RawTable::from_records(vec![
            vec![("From", "Kim"), ("Nominates", "Lee, Park"), ("How close", "2")],
            vec![("From", "kim "), ("Nominates", "Lee"), ("How close", "many")],
            vec![("From", "Lee"), ("Nominates", "Kim, Lee"), ("How close", "")],
            vec![("From", "???"), ("Nominates", "Kim"), ("How close", "1")],
        ])
        .unwrap()
    }

    #[test]
    fn test_run_reports_diagnostics_without_failing() {
        let proposal = MappingProposal::parse_json(
            r#"{"from_column": "From", "to_columns": ["Nominates"], "weight_column": "How close"}"#,
        )
        .unwrap();

        let report = AnalysisPipeline::default().run(&table(), &proposal).unwrap();

        assert_eq!(report.roster.names(), vec!["Kim", "Lee", "Park"]);
        assert_eq!(report.diagnostics.weight_errors.len(), 1);
        assert_eq!(report.diagnostics.self_loops_discarded, 1);
        assert_eq!(report.diagnostics.unresolved_rows.len(), 1);
        assert_eq!(report.diagnostics.unresolved_rows[0].value, "???");
        assert_eq!(report.edge_table().len(), 3);
        assert_eq!(report.node_table().len(), 3);
        assert!(report.result.isolates.is_empty());
    }

    #[test]
    fn test_run_rejects_mismatched_mapping() {
        let proposal =
            MappingProposal::parse_json(r#"{"from_column": "Respondent", "to_columns": ["Nominates"]}"#)
                .unwrap();

        let err = AnalysisPipeline::default().run(&table(), &proposal).unwrap_err();

        assert!(matches!(err, PipelineError::Mapping(MappingError::SchemaMismatch(_))));
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_undirected_config_is_honoured() {
        let config = AnalysisConfig {
            directed: false,
            ..Default::default()
        };
        let proposal =
            MappingProposal::parse_json(r#"{"from_column": "From", "to_columns": ["Nominates"]}"#)
                .unwrap();

        let report = AnalysisPipeline::new(config).run(&table(), &proposal).unwrap();

        assert!(!report.graph.is_directed());
        assert_eq!(report.result.summary.reciprocity, None);
    }
}
