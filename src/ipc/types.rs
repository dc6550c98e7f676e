use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::scheduler::RankScheduler;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub uploads_root: Option<PathBuf>,
    pub rank_scheduler: Option<RankScheduler>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            workspace: None,
            db: None,
            uploads_root: None,
            rank_scheduler: None,
        }
    }
}
