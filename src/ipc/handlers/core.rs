use crate::db;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::scheduler::{DailySchedule, RankScheduler};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerError> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "uploadsRoot": state.uploads_root.as_ref().map(|p| p.to_string_lossy().to_string()),
        "adminCount": state.config.auth.admin_emails.len(),
        "rankSchedule": {
            "enabled": state.config.ranks.enabled,
            "schedule": state.config.ranks.schedule,
            "utcOffset": state.config.ranks.utc_offset,
            "running": state.rank_scheduler.is_some(),
        }
    }))
}

/// Opens (or creates) the workspace database and points uploads and the rank
/// scheduler at it. Any previous workspace is released first.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;

    if let Some(old) = state.rank_scheduler.take() {
        old.stop();
    }

    let uploads_root = state
        .config
        .uploads
        .storage_root
        .clone()
        .unwrap_or_else(|| path.join("uploads"));

    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.uploads_root = Some(uploads_root);

    if state.config.ranks.enabled {
        let schedule = DailySchedule::parse(&state.config.ranks.schedule, &state.config.ranks.utc_offset)?;
        state.rank_scheduler = Some(RankScheduler::start(schedule, path.to_path_buf())?);
    }

    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let path = PathBuf::from(required_str(&req.params, "path")?);
    open_workspace(state, &path)?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
