//! Semantic affinity between module templates.
//!
//! Lookup order: the direct pair, the reversed pair (flow flipped), an
//! explicit dimension-pair record, the average over known template pairs that
//! span the two dimensions, and finally the neutral default score.

use std::collections::HashMap;
use std::path::Path;

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{ComposerError, Result};

pub const DEFAULT_AFFINITY: u8 = 50;
pub const DEFAULT_PRIORITY: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    #[default]
    Bidirectional,
    FromTo,
    ToFrom,
}

impl Flow {
    pub fn flipped(self) -> Self {
        match self {
            Flow::Bidirectional => Flow::Bidirectional,
            Flow::FromTo => Flow::ToFrom,
            Flow::ToFrom => Flow::FromTo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityScore {
    pub affinity: u8,
    #[serde(default)]
    pub flow: Flow,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub inferred: bool,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Default for AffinityScore {
    fn default() -> Self {
        Self {
            affinity: DEFAULT_AFFINITY,
            flow: Flow::Bidirectional,
            priority: DEFAULT_PRIORITY,
            inferred: true,
        }
    }
}

impl AffinityScore {
    fn flipped(self) -> Self {
        Self {
            flow: self.flow.flipped(),
            ..self
        }
    }
}

/// Anything able to score a pair of module templates.
pub trait AffinitySource {
    fn module_affinity(&self, template_a: &str, template_b: &str) -> AffinityScore;
}

/// Used when no affinity data is wired in: every pair gets the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAffinity;

impl AffinitySource for NoAffinity {
    fn module_affinity(&self, _template_a: &str, _template_b: &str) -> AffinityScore {
        AffinityScore::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRecord {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub score: AffinityScore,
}

/// On-disk shape of affinity data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffinityData {
    /// template id -> dimension
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub pairs: Vec<PairRecord>,
    #[serde(default)]
    pub dimensions: Vec<PairRecord>,
}

#[derive(Debug, Default)]
pub struct AffinityTable {
    templates: HashMap<String, String>,
    pairs: HashMap<(String, String), AffinityScore>,
    dimensions: HashMap<(String, String), AffinityScore>,
    averages: OnceCell<HashMap<(String, String), AffinityScore>>,
}

impl AffinityTable {
    pub fn new(data: AffinityData) -> Result<Self> {
        let mut table = Self {
            templates: data.templates,
            ..Self::default()
        };
        for record in data.pairs {
            validate(&record)?;
            table.pairs.insert((record.from, record.to), record.score);
        }
        for record in data.dimensions {
            validate(&record)?;
            table.dimensions.insert((record.from, record.to), record.score);
        }
        Ok(table)
    }

    /// Parses JSON or JSON5 affinity data.
    pub fn from_json5(contents: &str) -> Result<Self> {
        let value = json5::from_str::<serde_json::Value>(contents)
            .map_err(|err| ComposerError::AffinityData(err.to_string()))?;
        let data: AffinityData = serde_json::from_value(value)
            .map_err(|err| ComposerError::AffinityData(err.to_string()))?;
        Self::new(data)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5(&contents)
    }

    pub fn dimension_of(&self, template_id: &str) -> Option<&str> {
        self.templates.get(template_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.dimensions.is_empty()
    }

    fn lookup_pair(
        map: &HashMap<(String, String), AffinityScore>,
        a: &str,
        b: &str,
    ) -> Option<AffinityScore> {
        if let Some(score) = map.get(&(a.to_string(), b.to_string())) {
            return Some(*score);
        }
        map.get(&(b.to_string(), a.to_string()))
            .map(|score| score.flipped())
    }

    fn dimension_averages(&self) -> &HashMap<(String, String), AffinityScore> {
        self.averages.get_or_init(|| {
            let mut sums: HashMap<(String, String), (u32, u32)> = HashMap::new();
            for ((a, b), score) in &self.pairs {
                let (Some(da), Some(db)) = (self.templates.get(a), self.templates.get(b)) else {
                    continue;
                };
                let key = if da <= db {
                    (da.clone(), db.clone())
                } else {
                    (db.clone(), da.clone())
                };
                let entry = sums.entry(key).or_insert((0, 0));
                entry.0 += u32::from(score.affinity);
                entry.1 += 1;
            }
            sums.into_iter()
                .map(|(key, (total, count))| {
                    let score = AffinityScore {
                        affinity: (total as f32 / count as f32).round() as u8,
                        inferred: true,
                        ..AffinityScore::default()
                    };
                    (key, score)
                })
                .collect()
        })
    }
}

fn validate(record: &PairRecord) -> Result<()> {
    if record.score.affinity > 100 {
        return Err(ComposerError::AffinityData(format!(
            "affinity {} for {} -> {} is outside 0..=100",
            record.score.affinity, record.from, record.to
        )));
    }
    Ok(())
}

impl AffinitySource for AffinityTable {
    fn module_affinity(&self, template_a: &str, template_b: &str) -> AffinityScore {
        if let Some(score) = Self::lookup_pair(&self.pairs, template_a, template_b) {
            return score;
        }
        let (Some(da), Some(db)) = (self.dimension_of(template_a), self.dimension_of(template_b))
        else {
            return AffinityScore::default();
        };
        if let Some(score) = Self::lookup_pair(&self.dimensions, da, db) {
            return AffinityScore {
                inferred: true,
                ..score
            };
        }
        let key = if da <= db {
            (da.to_string(), db.to_string())
        } else {
            (db.to_string(), da.to_string())
        };
        self.dimension_averages()
            .get(&key)
            .copied()
            .unwrap_or_default()
    }
}

impl<T: AffinitySource + ?Sized> AffinitySource for &T {
    fn module_affinity(&self, template_a: &str, template_b: &str) -> AffinityScore {
        (**self).module_affinity(template_a, template_b)
    }
}

impl<T: AffinitySource> AffinitySource for Option<T> {
    fn module_affinity(&self, template_a: &str, template_b: &str) -> AffinityScore {
        match self {
            Some(source) => source.module_affinity(template_a, template_b),
            None => AffinityScore::default(),
        }
    }
}
