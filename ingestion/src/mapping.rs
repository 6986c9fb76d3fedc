use serde::Serialize;
use sociogram_core::error::{ErrorCode, SociogramError};
use sociogram_core::model::{AliasHint, ColumnMapping, RelationMapping, DEFAULT_RELATION_TYPE};
use sociogram_core::proposal::{MappingProposal, RelationProposal};
use sociogram_core::table::RawTable;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    From,
    To,
    Weight,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ColumnRole::From => "from_column",
            ColumnRole::To => "to_columns",
            ColumnRole::Weight => "weight_column",
        };
        write!(f, "{}", s)
    }
}

/// One concrete reason a proposal was rejected. Relations are numbered from 0
/// in proposal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum MappingViolation {
    #[error("proposal contains no relations")]
    NoRelations,
    #[error("relation {relation}: from_column is missing")]
    MissingFromColumn { relation: usize },
    #[error("relation {relation}: to_columns is empty")]
    MissingToColumns { relation: usize },
    #[error("relation {relation}: {role} references unknown column '{column}'")]
    UnknownColumn {
        relation: usize,
        role: ColumnRole,
        column: String,
    },
    #[error("relation {relation}: column '{column}' is both from_column and a to_column")]
    FromColumnAlsoTo { relation: usize, column: String },
    #[error("relation {relation}: weight_column '{column}' is also used as from/to")]
    WeightColumnReused { relation: usize, column: String },
    #[error("relation {relation}: relation type label is blank")]
    BlankRelationType { relation: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("mapping proposal is not valid JSON for the expected shape: {0}")]
    Malformed(String),
    #[error("mapping does not match the table: {}", join_violations(.0))]
    SchemaMismatch(Vec<MappingViolation>),
}

impl MappingError {
    pub fn violations(&self) -> &[MappingViolation] {
        match self {
            MappingError::SchemaMismatch(violations) => violations,
            MappingError::Malformed(_) => &[],
        }
    }
}

impl SociogramError for MappingError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

fn join_violations(violations: &[MappingViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn validate_json(table: &RawTable, raw: &str) -> Result<ColumnMapping, MappingError> {
    let proposal =
        MappingProposal::parse_json(raw).map_err(|err| MappingError::Malformed(err.to_string()))?;
    validate(table, &proposal)
}

/// Checks an AI proposal against the table schema. Either every relation is
/// usable and a [`ColumnMapping`] comes back, or every problem found is
/// listed.
pub fn validate(table: &RawTable, proposal: &MappingProposal) -> Result<ColumnMapping, MappingError> {
    let mut violations = Vec::new();
    let mut relations = Vec::new();

    if proposal.relations.is_empty() {
        violations.push(MappingViolation::NoRelations);
    }

    for (idx, relation) in proposal.relations.iter().enumerate() {
        if let Some(mapping) = validate_relation(table, idx, relation, &mut violations) {
            relations.push(mapping);
        }
    }

    if !violations.is_empty() {
        warn!(
            "Rejected mapping proposal with {} violation(s)",
            violations.len()
        );
        return Err(MappingError::SchemaMismatch(violations));
    }

    let alias_hints: Vec<AliasHint> = proposal
        .alias_hints()
        .into_iter()
        .filter_map(|hint| {
            let canonical = hint.canonical.trim().to_string();
            let variants: Vec<String> = hint
                .variants
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            (!canonical.is_empty() && !variants.is_empty()).then_some(AliasHint {
                canonical,
                variants,
            })
        })
        .collect();

    let declared_students: Vec<String> = proposal
        .students
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    debug!(
        "Accepted mapping with {} relation(s), {} alias hint(s), {} declared student(s)",
        relations.len(),
        alias_hints.len(),
        declared_students.len()
    );

    Ok(ColumnMapping {
        relations,
        alias_hints,
        declared_students,
    })
}

fn validate_relation(
    table: &RawTable,
    idx: usize,
    relation: &RelationProposal,
    violations: &mut Vec<MappingViolation>,
) -> Option<RelationMapping> {
    let before = violations.len();

    let from_column = match relation
        .from_column
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        None => {
            violations.push(MappingViolation::MissingFromColumn { relation: idx });
            None
        }
        Some(label) => lookup(table, idx, ColumnRole::From, label, violations),
    };

    let requested_to: Vec<&str> = relation
        .to_columns
        .as_slice()
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if requested_to.is_empty() {
        violations.push(MappingViolation::MissingToColumns { relation: idx });
    }

    let mut to_columns: Vec<String> = Vec::new();
    for label in requested_to {
        if let Some(column) = lookup(table, idx, ColumnRole::To, label, violations) {
            if !to_columns.contains(&column) {
                to_columns.push(column);
            }
        }
    }

    if let Some(from) = &from_column {
        if to_columns.contains(from) {
            violations.push(MappingViolation::FromColumnAlsoTo {
                relation: idx,
                column: from.clone(),
            });
        }
    }

    let weight_column = match relation
        .weight_column
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        None => None,
        Some(label) => lookup(table, idx, ColumnRole::Weight, label, violations),
    };

    if let Some(weight) = &weight_column {
        if from_column.as_ref() == Some(weight) || to_columns.contains(weight) {
            violations.push(MappingViolation::WeightColumnReused {
                relation: idx,
                column: weight.clone(),
            });
        }
    }

    let relation_type = match relation.relation_type_label.as_deref() {
        None => DEFAULT_RELATION_TYPE.to_string(),
        Some(label) if label.trim().is_empty() => {
            violations.push(MappingViolation::BlankRelationType { relation: idx });
            String::new()
        }
        Some(label) => label.trim().to_string(),
    };

    if violations.len() > before {
        return None;
    }

    Some(RelationMapping {
        from_column: from_column?,
        to_columns,
        weight_column,
        relation_type,
    })
}

fn lookup(
    table: &RawTable,
    relation: usize,
    role: ColumnRole,
    label: &str,
    violations: &mut Vec<MappingViolation>,
) -> Option<String> {
    match table.find_column(label) {
        Some(column) => Some(column.to_string()),
        None => {
            violations.push(MappingViolation::UnknownColumn {
                relation,
                role,
                column: label.to_string(),
            });
            None
        }
    }
}
