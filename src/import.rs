use crate::table::{CellValue, RawTable};
use anyhow::{anyhow, Context};
use std::io::Read;
use std::path::Path;

const UTF8_BOM: char = '\u{feff}';

/// Read an exported gradebook CSV: first record is the header row.
pub fn read_gradebook_csv(path: &Path) -> anyhow::Result<RawTable> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read gradebook {}", path.to_string_lossy()))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_gradebook_csv(text.as_bytes())
        .with_context(|| format!("failed to parse gradebook {}", path.to_string_lossy()))
}

pub fn parse_gradebook_csv<R: Read>(input: R) -> anyhow::Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut records = reader.records();
    let header_record = records
        .next()
        .ok_or_else(|| anyhow!("gradebook has no header row"))?
        .context("failed to read header row")?;
    let headers: Vec<String> = header_record
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches(UTF8_BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        let record = record.with_context(|| format!("failed to read row {}", idx + 1))?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(CellValue::from_text).collect());
    }

    Ok(RawTable::new(headers, rows)?)
}

/// Build a table from the inline JSON shape `{ headers: [...], rows: [...] }`.
/// Rows may be arrays (positional) or objects keyed by header.
pub fn table_from_json(raw: &serde_json::Value) -> anyhow::Result<RawTable> {
    let headers: Vec<String> = raw
        .get("headers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("table.headers must be an array of strings"))?
        .iter()
        .map(|h| {
            h.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow!("table.headers must be an array of strings"))
        })
        .collect::<anyhow::Result<_>>()?;

    let empty = Vec::new();
    let raw_rows = match raw.get("rows") {
        None => &empty,
        Some(v) => v
            .as_array()
            .ok_or_else(|| anyhow!("table.rows must be an array"))?,
    };

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (idx, r) in raw_rows.iter().enumerate() {
        let row: Vec<CellValue> = match r {
            serde_json::Value::Array(cells) => cells.iter().map(CellValue::from_json).collect(),
            serde_json::Value::Object(map) => headers
                .iter()
                .map(|h| {
                    map.get(h)
                        .map(CellValue::from_json)
                        .unwrap_or(CellValue::Missing)
                })
                .collect(),
            _ => return Err(anyhow!("table.rows[{}] must be an array or object", idx)),
        };
        rows.push(row);
    }

    Ok(RawTable::new(headers, rows)?)
}
