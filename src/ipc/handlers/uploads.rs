use crate::files::{self, UploadKind};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Validates then copies `params.sourcePath` into the uploads root.
fn accept_upload(
    uploads_root: &Path,
    req: &Request,
    kind: UploadKind,
    max_bytes: u64,
) -> Result<files::StoredUpload, HandlerError> {
    let source = PathBuf::from(required_str(&req.params, "sourcePath")?);
    let content_type = opt_str(&req.params, "contentType");
    let content_type = files::validate_upload(&source, content_type.as_deref(), kind, max_bytes)
        .map_err(|r| HandlerError::bad_params(r.message()))?;

    files::store_upload(uploads_root, &source, kind, &content_type).map_err(|e| HandlerError::Io {
        message: format!("{:#}", e),
        details: Some(json!({ "sourcePath": source.to_string_lossy() })),
    })
}

fn handle_file(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (_conn, session) = authenticate(state, req)?;
    let uploads_root = state.uploads_root.as_deref().ok_or(HandlerError::NoWorkspace)?;
    let stored = accept_upload(
        uploads_root,
        req,
        UploadKind::Document,
        state.config.uploads.max_file_bytes,
    )?;
    tracing::info!(user = %session.user.email, url = %stored.url, bytes = stored.bytes, "file uploaded");
    Ok(json!({ "url": stored.url, "filename": stored.filename }))
}

fn handle_profile_picture(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let uploads_root = state.uploads_root.as_deref().ok_or(HandlerError::NoWorkspace)?;
    let mut teacher = store::find_teacher_by_user_id(conn, &session.user.id)?
        .ok_or_else(|| HandlerError::not_found("Teacher profile not found"))?;

    let stored = accept_upload(
        uploads_root,
        req,
        UploadKind::ProfilePicture,
        state.config.uploads.max_profile_picture_bytes,
    )?;

    let previous = teacher.profile_picture.replace(stored.url.clone());
    store::save_teacher(conn, &mut teacher)?;

    if let Some(old) = previous.filter(|u| files::is_replaceable_profile_picture(u)) {
        if store::upload_url_in_use(conn, &old)? {
            tracing::debug!(url = %old, "previous profile picture still referenced, kept");
        } else if let Err(e) = files::delete_upload(uploads_root, &old) {
            tracing::warn!(error = %e, url = %old, "failed to delete previous profile picture");
        }
    }

    Ok(json!({
        "url": stored.url,
        "filename": stored.filename,
        "profilePicture": teacher.profile_picture,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "uploads.file" => handle_file(state, req),
        "uploads.profilePicture" => handle_profile_picture(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
