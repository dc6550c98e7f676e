use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate, authenticate_admin, opt_str, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_date_input, ALL_DEPARTMENTS};
use crate::store;
use chrono::Utc;
use serde_json::{json, Value};

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let links = store::list_open_certification_links(conn, Utc::now())?;
    to_json(&links)
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate_admin(state, req)?;
    let p = &req.params;
    let (Some(url), Some(description), Some(deadline_raw)) = (
        opt_str(p, "url"),
        opt_str(p, "description"),
        opt_str(p, "lastDateToApply"),
    ) else {
        return Err(HandlerError::bad_params("Missing required fields"));
    };
    let deadline = parse_date_input(&deadline_raw)
        .ok_or_else(|| HandlerError::bad_params("lastDateToApply is not a valid date"))?;
    let department = opt_str(p, "department").unwrap_or_else(|| ALL_DEPARTMENTS.to_string());

    let link = store::insert_certification_link(conn, &url, &description, deadline, &department)?;
    tracing::info!(link_id = %link.id, admin = %session.user.email, "certification link created");
    to_json(&link)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    let link_id = required_str(&req.params, "linkId")?;
    if !store::delete_certification_link(conn, &link_id)? {
        return Err(HandlerError::not_found("Certification link not found"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "certLinks.list" => handle_list(state, req),
        "certLinks.create" => handle_create(state, req),
        "certLinks.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
