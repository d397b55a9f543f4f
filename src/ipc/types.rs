use crate::config::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Session defaults only. Every grading run starts from scratch.
#[derive(Debug, Default)]
pub struct AppState {
    pub config: EngineConfig,
}
