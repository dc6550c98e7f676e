use crate::export;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate_admin, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::Certification;
use crate::ranks;
use crate::store;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminCertificate<'a> {
    #[serde(flatten)]
    certification: &'a Certification,
    teacher_id: &'a str,
    faculty_name: &'a str,
    faculty_email: &'a str,
    department: &'a str,
}

fn handle_blocked_logins(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    to_json(&store::list_blocked_logins(conn)?)
}

fn handle_certificates(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    let teachers = store::list_teachers(conn)?;
    let rows: Vec<AdminCertificate<'_>> = teachers
        .iter()
        .flat_map(|t| {
            t.certifications.iter().map(move |c| AdminCertificate {
                certification: c,
                teacher_id: &t.id,
                faculty_name: &t.name,
                faculty_email: &t.email,
                department: &t.department,
            })
        })
        .collect();
    to_json(&rows)
}

fn handle_export_leaderboard(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, session) = authenticate_admin(state, req)?;
    let out_path = PathBuf::from(required_str(&req.params, "outPath")?);
    let teachers = store::list_teachers(conn)?;

    let summary = export::export_leaderboard_bundle(&teachers, &out_path).map_err(|e| HandlerError::Io {
        message: format!("{:#}", e),
        details: Some(json!({ "path": out_path.to_string_lossy() })),
    })?;
    tracing::info!(
        admin = %session.user.email,
        path = %out_path.display(),
        faculty = summary.faculty_rows,
        "leaderboard exported"
    );

    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "exportFormat": summary.export_format,
        "entryCount": summary.entry_count,
        "facultyRows": summary.faculty_rows,
        "certificateRows": summary.certificate_rows,
    }))
}

fn handle_update_ranks(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    let ranked = ranks::update_ranks(conn)?;
    Ok(json!({ "ranked": ranked }))
}

fn handle_recalculate_points(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    let teachers = store::list_teachers(conn)?;
    let teacher_count = teachers.len();
    let mut changed = 0usize;
    let mut certifications = 0usize;
    for mut t in teachers {
        let before: Vec<i64> = t.certifications.iter().map(|c| c.points).collect();
        let before_total = t.total_points;
        store::save_teacher(conn, &mut t)?;
        let after = t.certifications.iter().map(|c| c.points);
        if before_total != t.total_points || !before.into_iter().eq(after) {
            changed += 1;
        }
        certifications += t.certifications.len();
    }
    tracing::info!(changed, "points recalculated");
    Ok(json!({
        "teachers": teacher_count,
        "certifications": certifications,
        "changed": changed,
    }))
}

fn handle_normalize_credentials(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    let (ids, urls) = store::normalize_empty_credentials(conn)?;
    Ok(json!({ "credentialIds": ids, "credentialUrls": urls }))
}

fn handle_backfill_stats(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let (conn, _session) = authenticate_admin(state, req)?;
    let (rates, achievements) = store::backfill_teacher_stats(conn)?;
    Ok(json!({ "improvementRates": rates, "recentAchievements": achievements }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "admin.blockedLogins" => handle_blocked_logins(state, req),
        "admin.certificates" => handle_certificates(state, req),
        "admin.exportLeaderboard" => handle_export_leaderboard(state, req),
        "admin.updateRanks" => handle_update_ranks(state, req),
        "maintenance.recalculatePoints" => handle_recalculate_points(state, req),
        "maintenance.normalizeCredentials" => handle_normalize_credentials(state, req),
        "maintenance.backfillStats" => handle_backfill_stats(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
