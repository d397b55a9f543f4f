use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn config_json(req: &Request, cfg: &EngineConfig) -> serde_json::Value {
    match serde_json::to_value(cfg) {
        Ok(v) => ok(&req.id, json!({ "config": v })),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

/// Accept a config only if an engine can actually be built from it.
fn install(state: &mut AppState, req: &Request, cfg: EngineConfig) -> serde_json::Value {
    if let Err(e) = Engine::new(cfg.clone()) {
        return err(&req.id, e.code(), e.to_string(), None);
    }
    info!(
        weights = cfg.weights.entries().len(),
        scoring_mode = ?cfg.scoring_mode,
        rounding = ?cfg.rounding,
        "default config replaced"
    );
    state.config = cfg;
    config_json(req, &state.config)
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    config_json(req, &state.config)
}

fn handle_config_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("config") else {
        return err(&req.id, "bad_params", "missing params.config", None);
    };
    match EngineConfig::from_json(raw) {
        Ok(cfg) => install(state, req, cfg),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

fn handle_config_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    match EngineConfig::load(&path) {
        Ok(cfg) => install(state, req, cfg),
        Err(e) => {
            warn!(path = %path.to_string_lossy(), error = %e, "config load failed");
            err(
                &req.id,
                "bad_config",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(handle_config_get(state, req)),
        "config.set" => Some(handle_config_set(state, req)),
        "config.load" => Some(handle_config_load(state, req)),
        _ => None,
    }
}
