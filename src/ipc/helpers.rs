use crate::ipc::error::HandlerError;
use crate::ipc::types::{AppState, Request};
use crate::model::non_empty;
use crate::session::{self, Session};
use rusqlite::Connection;
use serde_json::Value;

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerError> {
    state.db.as_ref().ok_or(HandlerError::NoWorkspace)
}

/// Trimmed string param; empty counts as absent.
pub fn opt_str(params: &Value, key: &str) -> Option<String> {
    non_empty(params.get(key).and_then(|v| v.as_str()))
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerError> {
    opt_str(params, key).ok_or_else(|| HandlerError::bad_params(format!("missing {}", key)))
}

/// Resolves `params.token` to a live session.
pub fn authenticate<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<(&'a Connection, Session), HandlerError> {
    let conn = require_db(state)?;
    let token = opt_str(&req.params, "token").ok_or(HandlerError::NotAuthenticated)?;
    let session = session::find_session(conn, &token)?.ok_or(HandlerError::NotAuthenticated)?;
    Ok((conn, session))
}

/// Like [`authenticate`] but the caller must be on the admin allow-list.
pub fn authenticate_admin<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<(&'a Connection, Session), HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    if !state.config.auth.is_admin(&session.user.email) {
        tracing::warn!(email = %session.user.email, method = %req.method, "admin method refused");
        return Err(HandlerError::Forbidden("Unauthorized".to_string()));
    }
    Ok((conn, session))
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::Internal(e.into()))
}
