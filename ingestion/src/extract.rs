use serde::Serialize;
use sociogram_core::config::AnalysisConfig;
use sociogram_core::model::{ColumnMapping, RelationEdge, RelationMapping};
use sociogram_core::table::RawTable;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::normalize::NameSplitter;
use crate::resolver::Roster;

/// A respondent name that matched no roster entity. All of that row's
/// nominations under the same From column are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRow {
    pub row: usize,
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightParseError {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub nominee: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub edges: Vec<RelationEdge>,
    pub unresolved_rows: Vec<UnresolvedRow>,
    pub weight_errors: Vec<WeightParseError>,
    pub self_loops_discarded: usize,
    pub unresolved_nominations: usize,
}

impl Extraction {
    pub fn is_clean(&self) -> bool {
        self.unresolved_rows.is_empty()
            && self.weight_errors.is_empty()
            && self.unresolved_nominations == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeExtractor {
    splitter: NameSplitter,
}

impl EdgeExtractor {
    pub fn new(splitter: NameSplitter) -> Self {
        Self { splitter }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(NameSplitter::from_config(config))
    }

    pub fn extract(&self, table: &RawTable, mapping: &ColumnMapping, roster: &Roster) -> Extraction {
        let mut extraction = Extraction::default();
        let mut reported: BTreeSet<(usize, &str)> = BTreeSet::new();

        for row in 0..table.row_count() {
            for relation in &mapping.relations {
                self.extract_relation(table, row, relation, roster, &mut reported, &mut extraction);
            }
        }

        if !extraction.unresolved_rows.is_empty() {
            warn!(
                "{} respondent name(s) could not be resolved; their rows were skipped",
                extraction.unresolved_rows.len()
            );
        }
        if !extraction.weight_errors.is_empty() {
            warn!(
                "{} nomination(s) dropped because of unparseable weights",
                extraction.weight_errors.len()
            );
        }
        debug!(
            "Extracted {} edge(s) from {} row(s) ({} self-nomination(s) discarded, {} unresolved nominee(s))",
            extraction.edges.len(),
            table.row_count(),
            extraction.self_loops_discarded,
            extraction.unresolved_nominations
        );

        extraction
    }

    fn extract_relation<'m>(
        &self,
        table: &RawTable,
        row: usize,
        relation: &'m RelationMapping,
        roster: &Roster,
        reported: &mut BTreeSet<(usize, &'m str)>,
        extraction: &mut Extraction,
    ) {
        let raw_from = table.cell(row, &relation.from_column).unwrap_or_default();
        let from = match roster.resolve(raw_from) {
            Some(id) => id,
            None => {
                if reported.insert((row, relation.from_column.as_str())) {
                    extraction.unresolved_rows.push(UnresolvedRow {
                        row,
                        column: relation.from_column.clone(),
                        value: raw_from.trim().to_string(),
                    });
                }
                return;
            }
        };

        let weight = match &relation.weight_column {
            None => Ok(1.0),
            Some(column) => {
                let raw = table.cell(row, column).unwrap_or_default();
                parse_weight(raw).ok_or_else(|| (column.clone(), raw.trim().to_string()))
            }
        };

        for column in &relation.to_columns {
            let cell = table.cell(row, column).unwrap_or_default();
            for nominee in self.splitter.split(cell) {
                let Some(to) = roster.resolve(&nominee) else {
                    extraction.unresolved_nominations += 1;
                    continue;
                };
                if to == from {
                    extraction.self_loops_discarded += 1;
                    continue;
                }
                match &weight {
                    Ok(weight) => {
                        if let Some(edge) =
                            RelationEdge::new(from, to, relation.relation_type.clone(), *weight)
                        {
                            extraction.edges.push(edge);
                        }
                    }
                    Err((column, value)) => extraction.weight_errors.push(WeightParseError {
                        row,
                        column: column.clone(),
                        value: value.clone(),
                        nominee,
                    }),
                }
            }
        }
    }
}

/// Empty cells mean an unweighted mention. Anything else must be a finite,
/// strictly positive number.
pub fn parse_weight(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(1.0);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}
