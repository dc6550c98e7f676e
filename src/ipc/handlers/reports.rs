use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate, opt_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::Teacher;
use crate::stats::{self, LeaderboardQuery, SortBy, SortOrder};
use crate::store;
use serde_json::Value;

fn handle_departments_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let teachers = store::list_teachers(conn)?;
    to_json(&stats::department_summaries(&teachers))
}

fn parse_query(params: &Value) -> Result<LeaderboardQuery, HandlerError> {
    let mut query = LeaderboardQuery::default();
    if let Some(raw) = opt_str(params, "sortBy") {
        query.sort_by = SortBy::parse(&raw).ok_or_else(|| {
            HandlerError::bad_params(format!(
                "sortBy must be one of totalPoints, certifications, name, department (got {})",
                raw
            ))
        })?;
    }
    if let Some(raw) = opt_str(params, "sortOrder") {
        query.sort_order = SortOrder::parse(&raw)
            .ok_or_else(|| HandlerError::bad_params(format!("sortOrder must be asc or desc (got {})", raw)))?;
    }
    query.search = opt_str(params, "search").unwrap_or_default();
    Ok(query)
}

fn handle_leaderboard_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let query = parse_query(&req.params)?;
    let teachers: Vec<Teacher> = store::list_teachers(conn)?
        .into_iter()
        .filter(|t| !state.config.leaderboard.is_exempt(&t.email))
        .collect();
    to_json(&stats::build_leaderboard(&teachers, &query))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "departments.summary" => handle_departments_summary(state, req),
        "leaderboard.get" => handle_leaderboard_get(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
