use serde::Serialize;
use thiserror::Error;

/// One raw cell as handed over by the import layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// No score recorded. Distinct from a recorded zero.
    Missing,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Decode a spreadsheet cell the way exported gradebooks write them:
    /// blank is missing, anything that parses as a decimal is a number.
    pub fn from_text(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() {
            return CellValue::Missing;
        }
        match t.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Number(v),
            _ => CellValue::Text(t.to_string()),
        }
    }

    pub fn from_json(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => CellValue::Missing,
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(CellValue::Number)
                .unwrap_or(CellValue::Missing),
            serde_json::Value::String(s) => CellValue::from_text(s),
            serde_json::Value::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            CellValue::Missing => String::new(),
            CellValue::Number(v) => v.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// Fully materialized gradebook export. Rows are positional: `rows[r][c]` is the
/// cell under `headers[c]`, so duplicated headers stay addressable.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row} has {found} cells but the header row has {expected}")]
pub struct RowWidthMismatch {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

impl RawTable {
    /// Short rows are padded with `Missing`; a row wider than the header row is rejected.
    pub fn new(
        headers: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, RowWidthMismatch> {
        let width = headers.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(RowWidthMismatch {
                    row: idx,
                    expected: width,
                    found: row.len(),
                });
            }
            row.resize(width, CellValue::Missing);
            padded.push(row);
        }
        Ok(Self {
            headers,
            rows: padded,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&CellValue::Missing)
    }
}
