use crate::columns::header_fingerprint;
use crate::config::EngineConfig;
use crate::diagnostics::Diagnostic;
use crate::engine::{header_diagnostics, Engine, StructuralError};
use crate::import;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::table::{RawTable, RowWidthMismatch};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, warn};

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Per-request `params.config` replaces the session default wholesale.
fn engine_for(state: &AppState, req: &Request) -> Result<Engine, serde_json::Value> {
    let cfg = match req.params.get("config") {
        None => state.config.clone(),
        Some(v) if v.is_null() => state.config.clone(),
        Some(v) => EngineConfig::from_json(v)
            .map_err(|e| err(&req.id, e.code(), e.to_string(), None))?,
    };
    Engine::new(cfg).map_err(|e| err(&req.id, e.code(), e.to_string(), None))
}

fn structural_err(req: &Request, e: &StructuralError) -> serde_json::Value {
    let details = match e {
        StructuralError::NoIdentifierColumns { header_count }
        | StructuralError::NoGradableColumns { header_count } => {
            json!({ "headerCount": header_count })
        }
        StructuralError::RowWidthMismatch {
            row,
            expected,
            found,
        } => json!({ "row": row, "expected": expected, "found": found }),
    };
    err(&req.id, e.code(), e.to_string(), Some(details))
}

fn import_err(req: &Request, e: anyhow::Error) -> serde_json::Value {
    if let Some(w) = e.downcast_ref::<RowWidthMismatch>() {
        return structural_err(req, &StructuralError::from(w.clone()));
    }
    warn!(error = %e, "gradebook import failed");
    err(&req.id, "import_failed", format!("{e:#}"), None)
}

fn table_from_params(req: &Request) -> Result<RawTable, serde_json::Value> {
    if let Some(t) = req.params.get("table") {
        return import::table_from_json(t).map_err(|e| import_err(req, e));
    }
    if let Some(text) = req.params.get("csvText").and_then(|v| v.as_str()) {
        return import::parse_gradebook_csv(text.as_bytes()).map_err(|e| import_err(req, e));
    }
    if let Some(path) = req.params.get("csvPath").and_then(|v| v.as_str()) {
        return import::read_gradebook_csv(&PathBuf::from(path)).map_err(|e| import_err(req, e));
    }
    Err(err(
        &req.id,
        "bad_params",
        "one of table, csvText or csvPath is required",
        None,
    ))
}

fn header_list(req: &Request) -> Result<Vec<String>, serde_json::Value> {
    let bad = || err(&req.id, "bad_params", "headers must be an array of strings", None);
    req.params
        .get("headers")
        .and_then(|v| v.as_array())
        .ok_or_else(bad)?
        .iter()
        .map(|h| h.as_str().map(|s| s.to_string()).ok_or_else(bad))
        .collect()
}

fn handle_headers_parse(state: &mut AppState, req: &Request) -> serde_json::Value {
    let header = match required_str(req, "header") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let engine = match engine_for(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (descriptor, issue) = engine.parse_header(&header);
    ok(
        &req.id,
        json!({
            "descriptor": descriptor,
            "issue": issue,
        }),
    )
}

fn handle_headers_classify(state: &mut AppState, req: &Request) -> serde_json::Value {
    let headers = match header_list(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let engine = match engine_for(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let classification = engine.classify(&headers);
    let diagnostics: Vec<Diagnostic> = header_diagnostics(&classification);
    ok(
        &req.id,
        json!({
            "columns": classification.columns,
            "identifiers": classification.identifiers,
            "excluded": classification.excluded,
            "categories": classification.categories,
            "ordering": classification.ordering,
            "fingerprint": header_fingerprint(&headers),
            "diagnostics": diagnostics,
        }),
    )
}

fn handle_gradebook_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let engine = match engine_for(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let table = match table_from_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    debug!(
        headers = table.headers().len(),
        rows = table.rows().len(),
        "computing gradebook"
    );
    match engine.run(&table) {
        Ok(report) => {
            for d in &report.diagnostics {
                debug!(code = d.code(), "diagnostic");
            }
            match serde_json::to_value(&report) {
                Ok(v) => ok(&req.id, v),
                Err(e) => err(&req.id, "internal", e.to_string(), None),
            }
        }
        Err(e) => structural_err(req, &e),
    }
}

fn handle_gradebook_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let engine = match engine_for(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let table = match table_from_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let report = match engine.run(&table) {
        Ok(v) => v,
        Err(e) => return structural_err(req, &e),
    };
    match report::export_table_csv(&report.table, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "path": out_path.to_string_lossy(),
                "rowCount": summary.row_count,
                "columnCount": summary.column_count,
                "diagnosticsCount": report.diagnostics.len(),
                "generatedAt": chrono::Utc::now().to_rfc3339(),
            }),
        ),
        Err(e) => {
            warn!(path = %out_path.to_string_lossy(), error = %e, "csv export failed");
            err(&req.id, "export_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "headers.parse" => Some(handle_headers_parse(state, req)),
        "headers.classify" => Some(handle_headers_classify(state, req)),
        "gradebook.compute" => Some(handle_gradebook_compute(state, req)),
        "gradebook.exportCsv" => Some(handle_gradebook_export_csv(state, req)),
        _ => None,
    }
}
