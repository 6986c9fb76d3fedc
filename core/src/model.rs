use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default relation label used when a mapping does not name one.
pub const DEFAULT_RELATION_TYPE: &str = "nomination";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One resolved student identity and every raw spelling that maps to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: EntityId,
    pub name: String,
    pub aliases: BTreeSet<String>,
}

impl CanonicalEntity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            aliases: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub relation_type: String,
    pub weight: f64,
}

impl RelationEdge {
    /// Returns `None` for self-loops and for weights that are not finite and positive.
    pub fn new(
        from: EntityId,
        to: EntityId,
        relation_type: impl Into<String>,
        weight: f64,
    ) -> Option<Self> {
        if from == to || !weight.is_finite() || weight <= 0.0 {
            return None;
        }
        Some(Self {
            from,
            to,
            relation_type: relation_type.into(),
            weight,
        })
    }
}

/// A single validated survey relation: who answered, whom they named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMapping {
    pub from_column: String,
    pub to_columns: Vec<String>,
    pub weight_column: Option<String>,
    pub relation_type: String,
}

/// Explicit "these spellings are the same student" hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasHint {
    pub canonical: String,
    pub variants: Vec<String>,
}

/// Column roles accepted by the mapping validator. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ColumnMapping {
    pub relations: Vec<RelationMapping>,
    #[serde(default)]
    pub alias_hints: Vec<AliasHint>,
    #[serde(default)]
    pub declared_students: Vec<String>,
}

impl ColumnMapping {
    pub fn relation_types(&self) -> BTreeSet<&str> {
        self.relations
            .iter()
            .map(|relation| relation.relation_type.as_str())
            .collect()
    }

    /// Distinct From columns in mapping order.
    pub fn from_columns(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.relations
            .iter()
            .map(|relation| relation.from_column.as_str())
            .filter(|column| seen.insert(*column))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Repeated nominations reinforce the tie.
    #[default]
    Sum,
    /// Repetition is redundant; keep the strongest mention.
    Max,
}

impl AggregationPolicy {
    pub fn combine(self, current: f64, incoming: f64) -> f64 {
        match self {
            AggregationPolicy::Sum => current + incoming,
            AggregationPolicy::Max => current.max(incoming),
        }
    }
}
