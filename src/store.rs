//! Persistence for the teacher aggregate and the small admin-side tables.
//!
//! A teacher is loaded and saved as a whole: the profile row plus its ordered
//! certification rows. [`save_teacher`] is the only writer for certifications and
//! is where derived fields (points, total, `updatedAt`) are refreshed.

use crate::model::{
    format_ts, now_ts, BlockedLogin, Certification, CertificationLink, Teacher,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

const TEACHER_COLUMNS: &str = "id, user_id, name, designation, email, contact_number, department,
     profile_picture, total_points, improvement_rate, recent_achievement, rank, created_at, updated_at";

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: r.get(0)?,
        user_id: r.get(1)?,
        name: r.get(2)?,
        designation: r.get(3)?,
        email: r.get(4)?,
        contact_number: r.get(5)?,
        department: r.get(6)?,
        profile_picture: r.get(7)?,
        certifications: Vec::new(),
        total_points: r.get(8)?,
        improvement_rate: r.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
        recent_achievement: r.get(10)?,
        rank: r.get(11)?,
        created_at: r.get(12)?,
        updated_at: r.get(13)?,
    })
}

fn certification_from_row(r: &Row<'_>) -> rusqlite::Result<Certification> {
    Ok(Certification {
        id: r.get(0)?,
        name: r.get(1)?,
        issuing_organization: r.get(2)?,
        issue_date: r.get(3)?,
        expiry_date: r.get(4)?,
        credential_id: r.get(5)?,
        credential_url: r.get(6)?,
        image_url: r.get(7)?,
        cert_type: r.get(8)?,
        points: r.get(9)?,
    })
}

const CERT_COLUMNS: &str = "id, name, issuing_organization, issue_date, expiry_date, credential_id,
     credential_url, image_url, cert_type, points";

fn load_certifications(conn: &Connection, teacher_id: &str) -> rusqlite::Result<Vec<Certification>> {
    let sql = format!(
        "SELECT {} FROM certifications WHERE teacher_id = ? ORDER BY sort_order",
        CERT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([teacher_id], certification_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_teacher_where(
    conn: &Connection,
    column: &str,
    value: &str,
) -> rusqlite::Result<Option<Teacher>> {
    let sql = format!("SELECT {} FROM teachers WHERE {} = ?", TEACHER_COLUMNS, column);
    let found = conn.query_row(&sql, [value], teacher_from_row).optional()?;
    match found {
        Some(mut t) => {
            t.certifications = load_certifications(conn, &t.id)?;
            Ok(Some(t))
        }
        None => Ok(None),
    }
}

pub fn find_teacher_by_user_id(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Teacher>> {
    find_teacher_where(conn, "user_id", user_id)
}

pub fn find_teacher_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Teacher>> {
    find_teacher_where(conn, "email", email)
}

pub fn find_teacher_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Teacher>> {
    find_teacher_where(conn, "id", id)
}

/// All teachers, highest total first. Ties keep onboarding order.
pub fn list_teachers(conn: &Connection) -> rusqlite::Result<Vec<Teacher>> {
    let sql = format!(
        "SELECT {} FROM teachers ORDER BY total_points DESC, created_at, id",
        TEACHER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut teachers = stmt
        .query_map([], teacher_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let cert_sql = format!(
        "SELECT teacher_id, {} FROM certifications ORDER BY teacher_id, sort_order",
        CERT_COLUMNS
    );
    let mut cert_stmt = conn.prepare(&cert_sql)?;
    let mut by_teacher: HashMap<String, Vec<Certification>> = HashMap::new();
    let mut rows = cert_stmt.query([])?;
    while let Some(row) = rows.next()? {
        let teacher_id: String = row.get(0)?;
        let cert = Certification {
            id: row.get(1)?,
            name: row.get(2)?,
            issuing_organization: row.get(3)?,
            issue_date: row.get(4)?,
            expiry_date: row.get(5)?,
            credential_id: row.get(6)?,
            credential_url: row.get(7)?,
            image_url: row.get(8)?,
            cert_type: row.get(9)?,
            points: row.get(10)?,
        };
        by_teacher.entry(teacher_id).or_default().push(cert);
    }

    for t in teachers.iter_mut() {
        t.certifications = by_teacher.remove(&t.id).unwrap_or_default();
    }
    Ok(teachers)
}

/// Writes the whole aggregate. Refreshes `updated_at`, per-certification points
/// and `total_points` before anything is persisted. An existing row keeps its
/// `rank`; only the rank job writes that column.
pub fn save_teacher(conn: &Connection, teacher: &mut Teacher) -> rusqlite::Result<()> {
    teacher.updated_at = now_ts();
    teacher.recalculate_points();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO teachers(
            id, user_id, name, designation, email, contact_number, department, profile_picture,
            total_points, improvement_rate, recent_achievement, rank, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            name = excluded.name,
            designation = excluded.designation,
            email = excluded.email,
            contact_number = excluded.contact_number,
            department = excluded.department,
            profile_picture = excluded.profile_picture,
            total_points = excluded.total_points,
            improvement_rate = excluded.improvement_rate,
            recent_achievement = excluded.recent_achievement,
            updated_at = excluded.updated_at",
        params![
            teacher.id,
            teacher.user_id,
            teacher.name,
            teacher.designation,
            teacher.email,
            teacher.contact_number,
            teacher.department,
            teacher.profile_picture,
            teacher.total_points,
            teacher.improvement_rate,
            teacher.recent_achievement,
            teacher.rank,
            teacher.created_at,
            teacher.updated_at,
        ],
    )?;

    tx.execute("DELETE FROM certifications WHERE teacher_id = ?", [&teacher.id])?;
    {
        let mut ins = tx.prepare(
            "INSERT INTO certifications(
                id, teacher_id, sort_order, name, issuing_organization, issue_date, expiry_date,
                credential_id, credential_url, image_url, cert_type, points
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (i, c) in teacher.certifications.iter().enumerate() {
            ins.execute(params![
                c.id,
                teacher.id,
                i as i64,
                c.name,
                c.issuing_organization,
                c.issue_date,
                c.expiry_date,
                c.credential_id,
                c.credential_url,
                c.image_url,
                c.cert_type,
                c.points,
            ])?;
        }
    }
    tx.commit()
}

/// Sets only the two leaderboard annotation fields. Returns the refreshed teacher.
pub fn update_teacher_stats(
    conn: &Connection,
    teacher_id: &str,
    improvement_rate: Option<f64>,
    recent_achievement: Option<Option<String>>,
) -> rusqlite::Result<Option<Teacher>> {
    if find_teacher_by_id(conn, teacher_id)?.is_none() {
        return Ok(None);
    }
    if let Some(rate) = improvement_rate {
        conn.execute(
            "UPDATE teachers SET improvement_rate = ? WHERE id = ?",
            params![rate, teacher_id],
        )?;
    }
    if let Some(achievement) = recent_achievement {
        conn.execute(
            "UPDATE teachers SET recent_achievement = ? WHERE id = ?",
            params![achievement, teacher_id],
        )?;
    }
    find_teacher_by_id(conn, teacher_id)
}

pub fn insert_certification_link(
    conn: &Connection,
    url: &str,
    description: &str,
    last_date_to_apply: DateTime<Utc>,
    department: &str,
) -> rusqlite::Result<CertificationLink> {
    let now = now_ts();
    let link = CertificationLink {
        id: Uuid::new_v4().to_string(),
        url: url.to_string(),
        description: description.to_string(),
        last_date_to_apply: format_ts(last_date_to_apply),
        department: department.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO certification_links(id, url, description, last_date_to_apply, department, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            link.id,
            link.url,
            link.description,
            link.last_date_to_apply,
            link.department,
            link.created_at,
            link.updated_at,
        ],
    )?;
    Ok(link)
}

/// Links still open for applications at `now`, soonest deadline first.
pub fn list_open_certification_links(
    conn: &Connection,
    now: DateTime<Utc>,
) -> rusqlite::Result<Vec<CertificationLink>> {
    let mut stmt = conn.prepare(
        "SELECT id, url, description, last_date_to_apply, department, created_at, updated_at
         FROM certification_links
         WHERE last_date_to_apply >= ?
         ORDER BY last_date_to_apply, created_at",
    )?;
    let rows = stmt
        .query_map([format_ts(now)], |r| {
            Ok(CertificationLink {
                id: r.get(0)?,
                url: r.get(1)?,
                description: r.get(2)?,
                last_date_to_apply: r.get(3)?,
                department: r.get(4)?,
                created_at: r.get(5)?,
                updated_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_certification_link(conn: &Connection, link_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM certification_links WHERE id = ?", [link_id])?;
    Ok(n > 0)
}

pub fn record_blocked_login(conn: &Connection, email: &str, reason: &str) -> rusqlite::Result<BlockedLogin> {
    let entry = BlockedLogin {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        reason: reason.to_string(),
        attempted_at: now_ts(),
    };
    conn.execute(
        "INSERT INTO blocked_logins(id, email, reason, attempted_at) VALUES(?, ?, ?, ?)",
        params![entry.id, entry.email, entry.reason, entry.attempted_at],
    )?;
    Ok(entry)
}

pub fn list_blocked_logins(conn: &Connection) -> rusqlite::Result<Vec<BlockedLogin>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, reason, attempted_at FROM blocked_logins ORDER BY attempted_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(BlockedLogin {
                id: r.get(0)?,
                email: r.get(1)?,
                reason: r.get(2)?,
                attempted_at: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether any certification image or profile picture still points at `url`.
pub fn upload_url_in_use(conn: &Connection, url: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM certifications WHERE image_url = ?1)
             OR EXISTS(SELECT 1 FROM teachers WHERE profile_picture = ?1)",
        [url],
        |r| r.get(0),
    )
}

/// Blank credential ids/urls become NULL. Returns `(ids, urls)` changed.
pub fn normalize_empty_credentials(conn: &Connection) -> rusqlite::Result<(usize, usize)> {
    let tx = conn.unchecked_transaction()?;
    let ids = tx.execute(
        "UPDATE certifications SET credential_id = NULL
         WHERE credential_id IS NOT NULL AND trim(credential_id) = ''",
        [],
    )?;
    let urls = tx.execute(
        "UPDATE certifications SET credential_url = NULL
         WHERE credential_url IS NOT NULL AND trim(credential_url) = ''",
        [],
    )?;
    tx.commit()?;
    Ok((ids, urls))
}

/// Fills NULL leaderboard annotations on rows written before they existed.
/// Returns `(improvement_rates, recent_achievements)` filled.
pub fn backfill_teacher_stats(conn: &Connection) -> rusqlite::Result<(usize, usize)> {
    let tx = conn.unchecked_transaction()?;
    let rates = tx.execute(
        "UPDATE teachers SET improvement_rate = 0 WHERE improvement_rate IS NULL",
        [],
    )?;
    let achievements = tx.execute(
        "UPDATE teachers SET recent_achievement = '' WHERE recent_achievement IS NULL",
        [],
    )?;
    tx.commit()?;
    Ok((rates, achievements))
}
