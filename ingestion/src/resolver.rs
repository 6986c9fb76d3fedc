use serde::Serialize;
use sociogram_core::config::AnalysisConfig;
use sociogram_core::model::{AliasHint, CanonicalEntity, ColumnMapping, EntityId};
use sociogram_core::table::RawTable;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::normalize::{similarity, NameNormalizer, NameSplitter};

/// The resolved set of students. Every raw spelling observed in the table
/// maps to exactly one entity.
#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    entities: Vec<CanonicalEntity>,
    #[serde(skip)]
    by_alias: HashMap<String, EntityId>,
    #[serde(skip)]
    by_key: HashMap<String, EntityId>,
    #[serde(skip)]
    normalizer: NameNormalizer,
}

impl Roster {
    pub fn entities(&self) -> &[CanonicalEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&CanonicalEntity> {
        self.entities.get(id.index())
    }

    pub fn name(&self, id: EntityId) -> Option<&str> {
        self.get(id).map(|entity| entity.name.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Exact trimmed spelling first, then the normalized key, so an unseen
    /// variant like "KIM" still finds "Kim".
    pub fn resolve(&self, raw: &str) -> Option<EntityId> {
        let trimmed = raw.trim();
        if let Some(id) = self.by_alias.get(trimmed) {
            return Some(*id);
        }
        let key = self.normalizer.normalize(trimmed)?;
        self.by_key.get(&key).copied()
    }

    pub fn resolve_entity(&self, raw: &str) -> Option<&CanonicalEntity> {
        self.resolve(raw).and_then(|id| self.get(id))
    }
}

#[derive(Debug, Clone)]
pub struct EntityResolver {
    normalizer: NameNormalizer,
    splitter: NameSplitter,
    threshold: f64,
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl EntityResolver {
    pub fn new(normalizer: NameNormalizer, splitter: NameSplitter, threshold: f64) -> Self {
        Self {
            normalizer,
            splitter,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            NameNormalizer::from_config(config),
            NameSplitter::from_config(config),
            config.similarity_threshold,
        )
    }

    pub fn splitter(&self) -> &NameSplitter {
        &self.splitter
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Counts every trimmed raw name in the mapped From and To columns.
    /// Declared roster names are included with a zero count so they become
    /// entities without outvoting observed spellings.
    pub fn collect_names(&self, table: &RawTable, mapping: &ColumnMapping) -> BTreeMap<String, usize> {
        let from_columns = mapping.from_columns();
        let mut to_columns: Vec<&str> = Vec::new();
        for relation in &mapping.relations {
            for column in &relation.to_columns {
                if !to_columns.contains(&column.as_str()) {
                    to_columns.push(column.as_str());
                }
            }
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in 0..table.row_count() {
            for column in &from_columns {
                let raw = table.cell(row, column).unwrap_or_default().trim();
                if !raw.is_empty() {
                    *counts.entry(raw.to_string()).or_insert(0) += 1;
                }
            }
            for column in &to_columns {
                let cell = table.cell(row, column).unwrap_or_default();
                for name in self.splitter.split(cell) {
                    *counts.entry(name).or_insert(0) += 1;
                }
            }
        }

        for student in &mapping.declared_students {
            let raw = student.trim();
            if !raw.is_empty() {
                counts.entry(raw.to_string()).or_insert(0);
            }
        }

        counts
    }

    pub fn resolve(&self, table: &RawTable, mapping: &ColumnMapping) -> Roster {
        let counts = self.collect_names(table, mapping);
        self.resolve_names(&counts, &mapping.alias_hints)
    }

    /// Clusters raw names into entities. Alias hints join clusters
    /// unconditionally; similarity merges need every cross pair above the
    /// threshold, so a chain of near matches never bridges two people.
    pub fn resolve_names(&self, counts: &BTreeMap<String, usize>, hints: &[AliasHint]) -> Roster {
        let mut raw_by_key: BTreeMap<String, Vec<(&str, usize)>> = BTreeMap::new();
        let mut discarded = 0usize;
        for (raw, count) in counts {
            match self.normalizer.normalize(raw) {
                Some(key) => raw_by_key
                    .entry(key)
                    .or_default()
                    .push((raw.as_str(), *count)),
                None => discarded += 1,
            }
        }
        if discarded > 0 {
            debug!("Ignored {} raw value(s) with no name content", discarded);
        }

        let keys: Vec<&str> = raw_by_key.keys().map(String::as_str).collect();
        let key_index: HashMap<&str, usize> =
            keys.iter().enumerate().map(|(idx, key)| (*key, idx)).collect();
        let mut clusters = Clusters::new(keys.len());

        for hint in hints {
            let members: BTreeSet<usize> = std::iter::once(hint.canonical.as_str())
                .chain(hint.variants.iter().map(String::as_str))
                .filter_map(|name| self.normalizer.normalize(name))
                .filter_map(|key| key_index.get(key.as_str()).copied())
                .collect();
            let mut members = members.into_iter();
            if let Some(first) = members.next() {
                for other in members {
                    clusters.merge(first, other);
                }
            }
        }

        let n = keys.len();
        let mut scores = vec![0.0f64; n * n];
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for i in 0..n {
            scores[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let score = similarity(keys[i], keys[j]);
                scores[i * n + j] = score;
                scores[j * n + i] = score;
                if score >= self.threshold {
                    candidates.push((score, i, j));
                }
            }
        }
        // Keys are sorted, so index order is the lexicographic tie-break.
        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut kept_apart = 0usize;
        for (_, i, j) in candidates {
            let (ci, cj) = (clusters.cluster_of(i), clusters.cluster_of(j));
            if ci == cj {
                continue;
            }
            let linked = clusters.members(ci).iter().all(|&a| {
                clusters
                    .members(cj)
                    .iter()
                    .all(|&b| scores[a * n + b] >= self.threshold)
            });
            if linked {
                clusters.merge(i, j);
            } else {
                kept_apart += 1;
            }
        }
        if kept_apart > 0 {
            debug!(
                "Kept {} near-match pair(s) apart because their clusters straddle the threshold",
                kept_apart
            );
        }

        let mut groups: Vec<(String, BTreeSet<String>, Vec<usize>)> = clusters
            .groups()
            .into_iter()
            .map(|members| {
                let mut forms: Vec<(&str, usize)> = Vec::new();
                for &member in &members {
                    forms.extend(raw_by_key[keys[member]].iter().copied());
                }
                let canonical = forms
                    .iter()
                    .min_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)))
                    .map(|(raw, _)| raw.to_string())
                    .unwrap_or_default();
                let aliases = forms.iter().map(|(raw, _)| raw.to_string()).collect();
                (canonical, aliases, members)
            })
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entities = Vec::with_capacity(groups.len());
        let mut by_alias = HashMap::new();
        let mut by_key = HashMap::new();
        for (idx, (canonical, aliases, members)) in groups.into_iter().enumerate() {
            let id = EntityId(idx as u32);
            for alias in &aliases {
                by_alias.insert(alias.clone(), id);
            }
            for member in members {
                by_key.insert(keys[member].to_string(), id);
            }
            let mut entity = CanonicalEntity::new(id, canonical);
            entity.aliases = aliases;
            entities.push(entity);
        }

        info!(
            "Resolved {} raw name(s) into {} student(s)",
            counts.len(),
            entities.len()
        );

        Roster {
            entities,
            by_alias,
            by_key,
            normalizer: self.normalizer.clone(),
        }
    }
}

/// Flat cluster bookkeeping over key indices; the smaller cluster is folded
/// into the larger one on merge.
struct Clusters {
    owner: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl Clusters {
    fn new(n: usize) -> Self {
        Self {
            owner: (0..n).collect(),
            members: (0..n).map(|i| vec![i]).collect(),
        }
    }

    fn cluster_of(&self, key: usize) -> usize {
        self.owner[key]
    }

    fn members(&self, cluster: usize) -> &[usize] {
        &self.members[cluster]
    }

    fn merge(&mut self, a: usize, b: usize) {
        let (mut keep, mut fold) = (self.owner[a], self.owner[b]);
        if keep == fold {
            return;
        }
        if self.members[keep].len() < self.members[fold].len() {
            std::mem::swap(&mut keep, &mut fold);
        }
        let moved = std::mem::take(&mut self.members[fold]);
        for &key in &moved {
            self.owner[key] = keep;
        }
        self.members[keep].extend(moved);
    }

    fn groups(self) -> Vec<Vec<usize>> {
        self.members
            .into_iter()
            .filter(|members| !members.is_empty())
            .map(|mut members| {
                members.sort_unstable();
                members
            })
            .collect()
    }
}
