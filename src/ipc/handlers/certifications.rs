use crate::files;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate, opt_str, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_ts, parse_date_input, Certification, CertificationType};
use crate::store;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

struct CertificationInput {
    name: String,
    issuing_organization: String,
    issue_date: String,
    expiry_date: Option<String>,
    credential_id: Option<String>,
    credential_url: Option<String>,
    image_url: Option<String>,
    cert_type: Option<CertificationType>,
}

fn parse_input(p: &Value) -> Result<CertificationInput, HandlerError> {
    let (Some(name), Some(issuing_organization), Some(issue_date_raw)) = (
        opt_str(p, "name"),
        opt_str(p, "issuingOrganization"),
        opt_str(p, "issueDate"),
    ) else {
        return Err(HandlerError::bad_params("Missing required fields"));
    };
    let issue_date = parse_date_input(&issue_date_raw)
        .ok_or_else(|| HandlerError::bad_params("issueDate is not a valid date"))?;
    let expiry_date = match opt_str(p, "expiryDate") {
        Some(raw) => Some(
            parse_date_input(&raw)
                .ok_or_else(|| HandlerError::bad_params("expiryDate is not a valid date"))?,
        ),
        None => None,
    };
    let cert_type = match opt_str(p, "type") {
        Some(raw) => Some(CertificationType::parse(&raw).ok_or_else(|| {
            let allowed: Vec<&str> = CertificationType::ALL.iter().map(|t| t.as_str()).collect();
            HandlerError::bad_params(format!("type must be one of {} (got {})", allowed.join(", "), raw))
        })?),
        None => None,
    };

    Ok(CertificationInput {
        name,
        issuing_organization,
        issue_date: format_ts(issue_date),
        expiry_date: expiry_date.map(format_ts),
        credential_id: opt_str(p, "credentialId"),
        credential_url: opt_str(p, "credentialUrl"),
        image_url: opt_str(p, "imageUrl"),
        cert_type,
    })
}

/// Deletes a certificate image once nothing in the database references it.
/// `imageUrl` is caller-supplied, so it may name a file another profile owns.
fn remove_stored_image(
    conn: &Connection,
    uploads_root: Option<&Path>,
    url: Option<&str>,
) -> Result<(), HandlerError> {
    let (Some(root), Some(url)) = (uploads_root, url) else {
        return Ok(());
    };
    if store::upload_url_in_use(conn, url)? {
        tracing::debug!(url, "image still referenced, kept");
        return Ok(());
    }
    if let Err(e) = files::delete_upload(root, url) {
        tracing::warn!(error = %e, url, "failed to delete certificate image");
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let teacher = store::find_teacher_by_user_id(conn, &session.user.id)?
        .ok_or_else(|| HandlerError::not_found("Teacher profile not found"))?;
    to_json(&teacher.certifications)
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let mut teacher = store::find_teacher_by_user_id(conn, &session.user.id)?
        .ok_or_else(|| HandlerError::not_found("Teacher profile not found"))?;
    let input = parse_input(&req.params)?;

    let cert_type = input.cert_type.unwrap_or(CertificationType::Other);
    teacher.certifications.push(Certification {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        issuing_organization: input.issuing_organization,
        issue_date: input.issue_date,
        expiry_date: input.expiry_date,
        credential_id: input.credential_id,
        credential_url: input.credential_url,
        image_url: input.image_url,
        cert_type: cert_type.as_str().to_string(),
        points: 0,
    });

    store::save_teacher(conn, &mut teacher)?;
    tracing::info!(teacher_id = %teacher.id, total_points = teacher.total_points, "certification added");
    to_json(&teacher)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let cert_id = required_str(&req.params, "certificationId")?;
    let mut teacher = store::find_teacher_by_user_id(conn, &session.user.id)?
        .ok_or_else(|| HandlerError::not_found("Teacher profile not found"))?;
    let Some(idx) = teacher.certifications.iter().position(|c| c.id == cert_id) else {
        return Err(HandlerError::not_found("Certification not found"));
    };
    let input = parse_input(&req.params)?;

    let cert = &mut teacher.certifications[idx];
    let replaced_image = cert
        .image_url
        .take()
        .filter(|old| input.image_url.as_deref() != Some(old.as_str()));
    cert.name = input.name;
    cert.issuing_organization = input.issuing_organization;
    cert.issue_date = input.issue_date;
    cert.expiry_date = input.expiry_date;
    cert.credential_id = input.credential_id;
    cert.credential_url = input.credential_url;
    cert.image_url = input.image_url;
    if let Some(t) = input.cert_type {
        cert.cert_type = t.as_str().to_string();
    }

    store::save_teacher(conn, &mut teacher)?;
    remove_stored_image(conn, state.uploads_root.as_deref(), replaced_image.as_deref())?;
    to_json(&teacher)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let cert_id = required_str(&req.params, "certificationId")?;
    let mut teacher = store::find_teacher_by_user_id(conn, &session.user.id)?
        .ok_or_else(|| HandlerError::not_found("Teacher profile not found"))?;

    let (removed, kept): (Vec<Certification>, Vec<Certification>) = teacher
        .certifications
        .drain(..)
        .partition(|c| c.id == cert_id);
    teacher.certifications = kept;

    store::save_teacher(conn, &mut teacher)?;
    for cert in &removed {
        remove_stored_image(conn, state.uploads_root.as_deref(), cert.image_url.as_deref())?;
    }
    to_json(&teacher)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "certifications.list" => handle_list(state, req),
        "certifications.create" => handle_create(state, req),
        "certifications.update" => handle_update(state, req),
        "certifications.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
