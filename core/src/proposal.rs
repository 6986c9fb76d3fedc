//! Untrusted column-mapping suggestions as they come back from the AI.
//!
//! Nothing here is validated beyond JSON shape; `ingestion::mapping` is the
//! gate that turns a proposal into a [`ColumnMapping`](crate::model::ColumnMapping).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::AliasHint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }

    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RelationProposal {
    #[serde(default, alias = "from")]
    pub from_column: Option<String>,
    #[serde(default, alias = "to", alias = "to_column")]
    pub to_columns: OneOrMany,
    #[serde(default)]
    pub weight_column: Option<String>,
    #[serde(default, alias = "relation_type", alias = "type")]
    pub relation_type_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MappingProposal {
    #[serde(default, alias = "relationships", alias = "mappings")]
    pub relations: Vec<RelationProposal>,
    /// canonical spelling -> variants the AI believes refer to the same student
    #[serde(default)]
    pub aliases: BTreeMap<String, OneOrMany>,
    #[serde(default, alias = "roster")]
    pub students: Vec<String>,
}

impl MappingProposal {
    pub fn parse_json(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// Accepts either the full `{ "relations": [...] }` envelope or a bare
    /// single-relation object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let is_bare_relation = value.as_object().is_some_and(|object| {
            ["from_column", "from"].iter().any(|k| object.contains_key(*k))
                && !["relations", "relationships", "mappings"]
                    .iter()
                    .any(|k| object.contains_key(*k))
        });

        if is_bare_relation {
            let relation: RelationProposal = serde_json::from_value(value)?;
            return Ok(Self {
                relations: vec![relation],
                ..Default::default()
            });
        }

        serde_json::from_value(value)
    }

    pub fn alias_hints(&self) -> Vec<AliasHint> {
        self.aliases
            .iter()
            .map(|(canonical, variants)| AliasHint {
                canonical: canonical.clone(),
                variants: variants.as_slice().to_vec(),
            })
            .collect()
    }
}
