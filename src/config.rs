use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("weight for category '{category}' must be a non-negative number")]
    InvalidWeight { category: String },
    #[error("categories '{first}' and '{second}' differ only by case")]
    DuplicateCategory { first: String, second: String },
    #[error("headers.{field} must not be empty")]
    EmptyMarker { field: &'static str },
    #[error("headers.termPattern is not a valid regex: {0}")]
    TermPattern(#[from] regex::Error),
    #[error("weightTolerance must be a positive number")]
    InvalidTolerance,
    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "bad_config"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoringMode {
    /// Missing counts as zero, then the plain mean across the category.
    #[default]
    MeanOfScores,
    /// Earned over possible points, skipping missing entries on both sides.
    PointsRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundingPolicy {
    #[default]
    None,
    HalfUp,
    Ceiling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub category: String,
    pub weight: f64,
}

/// Category weight table. Lookups are case-insensitive; configured spelling is kept for output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct CategoryWeights {
    entries: Vec<WeightEntry>,
}

impl TryFrom<BTreeMap<String, f64>> for CategoryWeights {
    type Error = ConfigError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut entries: Vec<WeightEntry> = Vec::with_capacity(raw.len());
        for (category, weight) in raw {
            let category = category.trim().to_string();
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight { category });
            }
            if let Some(prev) = entries
                .iter()
                .find(|e| e.category.eq_ignore_ascii_case(&category))
            {
                return Err(ConfigError::DuplicateCategory {
                    first: prev.category.clone(),
                    second: category,
                });
            }
            entries.push(WeightEntry { category, weight });
        }
        Ok(Self { entries })
    }
}

impl From<CategoryWeights> for BTreeMap<String, f64> {
    fn from(w: CategoryWeights) -> Self {
        w.entries
            .into_iter()
            .map(|e| (e.category, e.weight))
            .collect()
    }
}

impl CategoryWeights {
    #[cfg(test)]
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let map: BTreeMap<String, f64> = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::try_from(map)
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        let key = category.trim();
        self.entries
            .iter()
            .find(|e| e.category.eq_ignore_ascii_case(key))
            .map(|e| e.weight)
    }

    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }
}

/// Literal markers and name lists used to read exporter headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderRules {
    /// Exact (case-sensitive) header names that identify a student.
    pub identifier_columns: Vec<String>,
    /// Identifier headers containing one of these sort ahead of the other identifiers.
    pub name_like_terms: Vec<String>,
    pub exclusion_markers: Vec<String>,
    pub category_tag: String,
    pub max_points_tag: String,
    pub term_pattern: String,
}

impl Default for HeaderRules {
    fn default() -> Self {
        Self {
            identifier_columns: [
                "Student Name",
                "First Name",
                "Last Name",
                "Student ID",
                "Unique User ID",
                "Section",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            name_like_terms: vec!["Name".to_string()],
            exclusion_markers: ["(Count in Grade)", "Category Score", "Ungraded"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            category_tag: "Grading Category:".to_string(),
            max_points_tag: "Max Points:".to_string(),
            term_pattern: r"^Term\d+".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub weights: CategoryWeights,
    pub scoring_mode: ScoringMode,
    pub rounding: RoundingPolicy,
    pub weight_tolerance: f64,
    pub headers: HeaderRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            scoring_mode: ScoringMode::default(),
            rounding: RoundingPolicy::default(),
            weight_tolerance: 1e-6,
            headers: HeaderRules::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &serde_json::Value) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_value(raw.clone())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        let raw: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("config {} is invalid JSON", path.to_string_lossy()))?;
        Ok(Self::from_json(&raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.weight_tolerance.is_finite() || self.weight_tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance);
        }
        if self.headers.category_tag.trim().is_empty() {
            return Err(ConfigError::EmptyMarker {
                field: "categoryTag",
            });
        }
        if self.headers.max_points_tag.trim().is_empty() {
            return Err(ConfigError::EmptyMarker {
                field: "maxPointsTag",
            });
        }
        Regex::new(&self.headers.term_pattern)?;
        Ok(())
    }
}
