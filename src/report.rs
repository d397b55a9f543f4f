use crate::engine::{OutputCell, OutputTable};
use anyhow::Context;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub row_count: usize,
    pub column_count: usize,
}

/// Write the output table as plain CSV. Empty cells stay empty, never "0".
pub fn export_table_csv(table: &OutputTable, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }

    let mut writer = csv::Writer::from_path(out_path).with_context(|| {
        format!("failed to create output file {}", out_path.to_string_lossy())
    })?;
    writer
        .write_record(table.columns.iter().map(|c| c.label.as_str()))
        .context("failed to write header row")?;
    for (idx, row) in table.rows.iter().enumerate() {
        writer
            .write_record(row.iter().map(cell_text))
            .with_context(|| format!("failed to write row {}", idx + 1))?;
    }
    writer.flush().context("failed to flush output file")?;

    Ok(ExportSummary {
        row_count: table.rows.len(),
        column_count: table.columns.len(),
    })
}

pub fn cell_text(cell: &OutputCell) -> String {
    match cell {
        OutputCell::Empty => String::new(),
        OutputCell::Number(v) => format_number(*v),
        OutputCell::Text(s) => s.clone(),
    }
}

/// Whole numbers print bare; anything else prints at most two decimals.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.2}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
