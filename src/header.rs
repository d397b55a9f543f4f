use crate::config::{ConfigError, HeaderRules};
use regex::Regex;
use serde::Serialize;

pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum ColumnRole {
    Identifier,
    Excluded,
    Gradable { category: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub original_header: String,
    #[serde(flatten)]
    pub role: ColumnRole,
    pub display_name: String,
    pub max_points: Option<f64>,
    pub term: Option<String>,
    pub sequence_index: usize,
}

impl ColumnDescriptor {
    pub fn category(&self) -> Option<&str> {
        match &self.role {
            ColumnRole::Gradable { category } => Some(category.as_str()),
            _ => None,
        }
    }

    pub fn is_identifier(&self) -> bool {
        self.role == ColumnRole::Identifier
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderIssue {
    /// Nothing recognizable in the header; the column was excluded.
    Unstructured,
    /// Category tag present with nothing after it; filed under "Unknown".
    MissingCategoryValue,
}

/// Header rules with their patterns compiled once per run.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    rules: HeaderRules,
    max_points: Regex,
    term: Regex,
}

impl HeaderMatcher {
    pub fn new(rules: &HeaderRules) -> Result<Self, ConfigError> {
        let max_points = Regex::new(&format!(
            r"{}\s*(\d+(?:\.\d+)?)",
            regex::escape(rules.max_points_tag.trim())
        ))?;
        let term = Regex::new(&rules.term_pattern)?;
        Ok(Self {
            rules: rules.clone(),
            max_points,
            term,
        })
    }

    pub fn rules(&self) -> &HeaderRules {
        &self.rules
    }

    pub fn parse(&self, raw: &str, sequence_index: usize) -> (ColumnDescriptor, Option<HeaderIssue>) {
        let header = normalize_whitespace(raw);
        let mut desc = ColumnDescriptor {
            original_header: raw.to_string(),
            role: ColumnRole::Excluded,
            display_name: header.clone(),
            max_points: None,
            term: None,
            sequence_index,
        };

        if self.rules.identifier_columns.iter().any(|n| *n == header) {
            desc.role = ColumnRole::Identifier;
            return (desc, None);
        }

        if self
            .rules
            .exclusion_markers
            .iter()
            .any(|m| !m.is_empty() && header.contains(m.as_str()))
        {
            return (desc, None);
        }

        let tag = self.rules.category_tag.trim();
        let Some(tag_at) = header.find(tag) else {
            return (desc, Some(HeaderIssue::Unstructured));
        };

        let after = &header[tag_at + tag.len()..];
        let value_end = after.find([',', ')']).unwrap_or(after.len());
        let value = after[..value_end].trim();
        let (category, issue) = if value.is_empty() {
            (UNKNOWN_CATEGORY.to_string(), Some(HeaderIssue::MissingCategoryValue))
        } else {
            (value.to_string(), None)
        };

        desc.max_points = self
            .max_points
            .captures(&header)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        desc.term = self.term.find(&header).map(|m| m.as_str().to_string());

        let name_end = header
            .find('(')
            .map(|p| p.min(tag_at))
            .unwrap_or(tag_at);
        let name = header[..name_end].trim().trim_end_matches([':', '-', ',']).trim();
        desc.display_name = if name.is_empty() {
            category.clone()
        } else {
            format!("{} - {}", name, category)
        };
        desc.role = ColumnRole::Gradable { category };
        (desc, issue)
    }
}

pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
