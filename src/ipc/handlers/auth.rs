use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate, opt_str, require_db, required_str};
use crate::ipc::types::{AppState, Request};
use crate::session::{self, SessionUser};
use crate::store;
use serde_json::json;

/// The shell has already completed the identity provider handshake; this call
/// turns the verified identity into a daemon session.
fn handle_sign_in(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let conn = require_db(state)?;
    let user_id = required_str(&req.params, "userId")?;
    let email = required_str(&req.params, "email")?;
    if !email.contains('@') {
        return Err(HandlerError::bad_params("email is not valid"));
    }

    if !state.config.auth.domain_allowed(&email) {
        let blocked = store::record_blocked_login(conn, &email, "email domain is not allowed")?;
        tracing::warn!(email = %email, "sign-in blocked");
        return Err(HandlerError::Forbidden(blocked.reason));
    }

    let user = SessionUser {
        id: user_id,
        email,
        name: opt_str(&req.params, "name"),
        image: opt_str(&req.params, "image"),
    };
    let (token, session) = session::create_session(conn, user, state.config.auth.session_ttl_hours)?;
    let has_profile = store::find_teacher_by_user_id(conn, &session.user.id)?.is_some();
    tracing::info!(email = %session.user.email, has_profile, "signed in");

    Ok(json!({
        "token": token,
        "expiresAt": session.expires_at,
        "isAdmin": state.config.auth.is_admin(&session.user.email),
        "hasProfile": has_profile,
        "user": session.user,
    }))
}

fn handle_session(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let has_profile = store::find_teacher_by_user_id(conn, &session.user.id)?.is_some();
    Ok(json!({
        "expiresAt": session.expires_at,
        "isAdmin": state.config.auth.is_admin(&session.user.email),
        "hasProfile": has_profile,
        "user": session.user,
    }))
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let conn = require_db(state)?;
    let token = opt_str(&req.params, "token").ok_or(HandlerError::NotAuthenticated)?;
    let removed = session::delete_session(conn, &token)?;
    Ok(json!({ "signedOut": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.signIn" => handle_sign_in(state, req),
        "auth.session" => handle_session(state, req),
        "auth.signOut" => handle_sign_out(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
