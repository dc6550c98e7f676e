use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{authenticate, opt_str, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{now_ts, Teacher};
use crate::store;
use serde_json::json;
use uuid::Uuid;

const MISSING_TYPE_NOTE: &str =
    "Some of your certifications are missing a type. Please update them on your profile page.";

fn profile_not_found() -> HandlerError {
    HandlerError::not_found("Teacher profile not found")
}

fn handle_onboarding_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;

    if store::find_teacher_by_user_id(conn, &session.user.id)?.is_some() {
        return Err(HandlerError::Conflict("Teacher profile already exists".to_string()));
    }

    let p = &req.params;
    let (Some(name), Some(contact_number), Some(department)) = (
        opt_str(p, "name"),
        opt_str(p, "contactNumber"),
        opt_str(p, "department"),
    ) else {
        return Err(HandlerError::bad_params("Missing required fields"));
    };

    if store::find_teacher_by_email(conn, &session.user.email)?.is_some() {
        return Err(HandlerError::Conflict(
            "A teacher profile already uses this email".to_string(),
        ));
    }

    let now = now_ts();
    let mut teacher = Teacher {
        id: Uuid::new_v4().to_string(),
        user_id: session.user.id.clone(),
        name,
        designation: opt_str(p, "designation").unwrap_or_default(),
        email: session.user.email.clone(),
        contact_number,
        department,
        profile_picture: session.user.image.clone(),
        certifications: Vec::new(),
        total_points: 0,
        improvement_rate: 0.0,
        recent_achievement: None,
        rank: None,
        created_at: now.clone(),
        updated_at: now,
    };
    store::save_teacher(conn, &mut teacher)?;
    tracing::info!(teacher_id = %teacher.id, department = %teacher.department, "teacher onboarded");
    to_json(&teacher)
}

fn handle_teacher_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let teacher = match opt_str(&req.params, "email") {
        Some(email) => store::find_teacher_by_email(conn, &email)?,
        None => store::find_teacher_by_user_id(conn, &session.user.id)?,
    }
    .ok_or_else(profile_not_found)?;

    let patch_notes = teacher
        .certifications
        .iter()
        .any(|c| !c.has_known_type())
        .then_some(MISSING_TYPE_NOTE);

    let mut out = to_json(&teacher)?;
    out["patchNotes"] = json!(patch_notes);
    Ok(out)
}

fn handle_teacher_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, session) = authenticate(state, req)?;
    let mut teacher = store::find_teacher_by_user_id(conn, &session.user.id)?
        .ok_or_else(profile_not_found)?;

    let p = &req.params;
    if let Some(v) = opt_str(p, "name") {
        teacher.name = v;
    }
    if let Some(v) = opt_str(p, "contactNumber") {
        teacher.contact_number = v;
    }
    if let Some(v) = opt_str(p, "department") {
        teacher.department = v;
    }
    // Designation may be cleared.
    if let Some(v) = p.get("designation").and_then(|v| v.as_str()) {
        teacher.designation = v.trim().to_string();
    }

    store::save_teacher(conn, &mut teacher)?;
    to_json(&teacher)
}

fn handle_teacher_lookup(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let email = required_str(&req.params, "email")?;
    let teacher = store::find_teacher_by_email(conn, &email)?.ok_or_else(profile_not_found)?;
    Ok(json!({
        "id": teacher.id,
        "name": teacher.name,
        "email": teacher.email,
        "department": teacher.department,
    }))
}

fn handle_teacher_by_email(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let email = required_str(&req.params, "email")?;
    let teacher = store::find_teacher_by_email(conn, &email)?
        .ok_or_else(|| HandlerError::not_found("Teacher not found"))?;
    to_json(&teacher)
}

fn handle_teacher_update_stats(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let teacher_id = required_str(&req.params, "teacherId")?;

    let improvement_rate = match req.params.get("improvementRate") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| HandlerError::bad_params("improvementRate must be a number"))?,
        ),
    };
    let recent_achievement = match req.params.get("recentAchievement") {
        None => None,
        Some(serde_json::Value::Null) => Some(None),
        Some(v) => Some(Some(
            v.as_str()
                .ok_or_else(|| HandlerError::bad_params("recentAchievement must be a string"))?
                .to_string(),
        )),
    };
    if improvement_rate.is_none() && recent_achievement.is_none() {
        return Err(HandlerError::bad_params("No valid fields to update"));
    }

    let teacher = store::update_teacher_stats(conn, &teacher_id, improvement_rate, recent_achievement)?
        .ok_or_else(|| HandlerError::not_found("Teacher not found"))?;
    to_json(&teacher)
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let (conn, _session) = authenticate(state, req)?;
    let teachers = store::list_teachers(conn)?;
    to_json(&teachers)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "onboarding.create" => handle_onboarding_create(state, req),
        "teacher.get" => handle_teacher_get(state, req),
        "teacher.update" => handle_teacher_update(state, req),
        "teacher.lookup" => handle_teacher_lookup(state, req),
        "teacher.byEmail" => handle_teacher_by_email(state, req),
        "teacher.updateStats" => handle_teacher_update_stats(state, req),
        "teachers.list" => handle_teachers_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
