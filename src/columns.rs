use crate::header::{normalize_whitespace, ColumnDescriptor, HeaderIssue, HeaderMatcher};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    /// Spelling of the first member header; membership is case-insensitive.
    pub name: String,
    /// Indices into `Classification::columns`, ascending by sequence index.
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrderedColumn {
    Source { column: usize },
    CategoryScore { category: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFinding {
    pub sequence_index: usize,
    pub header: String,
    pub issue: HeaderIssue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub columns: Vec<ColumnDescriptor>,
    pub identifiers: Vec<usize>,
    pub excluded: Vec<usize>,
    pub categories: Vec<CategoryGroup>,
    pub ordering: Vec<OrderedColumn>,
    pub findings: Vec<HeaderFinding>,
}

impl Classification {
    pub fn gradable_count(&self) -> usize {
        self.categories.iter().map(|c| c.members.len()).sum()
    }

    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.categories
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }
}

pub fn classify_headers(headers: &[String], matcher: &HeaderMatcher) -> Classification {
    let mut columns = Vec::with_capacity(headers.len());
    let mut findings = Vec::new();
    for (idx, raw) in headers.iter().enumerate() {
        let (desc, issue) = matcher.parse(raw, idx);
        if let Some(issue) = issue {
            findings.push(HeaderFinding {
                sequence_index: idx,
                header: raw.clone(),
                issue,
            });
        }
        columns.push(desc);
    }

    let name_terms: Vec<String> = matcher
        .rules()
        .name_like_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.to_lowercase())
        .collect();
    let (mut identifiers, other_ids): (Vec<usize>, Vec<usize>) = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_identifier())
        .map(|(i, _)| i)
        .partition(|&i| {
            let h = columns[i].display_name.to_lowercase();
            name_terms.iter().any(|t| h.contains(t.as_str()))
        });
    identifiers.extend(other_ids);

    let excluded: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_identifier() && c.category().is_none())
        .map(|(i, _)| i)
        .collect();

    // Header order is sequence order, so first appearance fixes category order
    // and members arrive already sorted.
    let mut categories: Vec<CategoryGroup> = Vec::new();
    for (i, c) in columns.iter().enumerate() {
        let Some(cat) = c.category() else {
            continue;
        };
        match categories
            .iter_mut()
            .find(|g| g.name.eq_ignore_ascii_case(cat))
        {
            Some(group) => group.members.push(i),
            None => categories.push(CategoryGroup {
                name: cat.to_string(),
                members: vec![i],
            }),
        }
    }

    let mut ordering: Vec<OrderedColumn> = identifiers
        .iter()
        .map(|&column| OrderedColumn::Source { column })
        .collect();
    for (ci, group) in categories.iter().enumerate() {
        ordering.extend(
            group
                .members
                .iter()
                .map(|&column| OrderedColumn::Source { column }),
        );
        ordering.push(OrderedColumn::CategoryScore { category: ci });
    }

    Classification {
        columns,
        identifiers,
        excluded,
        categories,
        ordering,
        findings,
    }
}

/// Stable digest of the normalized header list, for caching rendered reports.
pub fn header_fingerprint(headers: &[String]) -> String {
    let mut hasher = Sha256::new();
    for h in headers {
        hasher.update(normalize_whitespace(h).as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
