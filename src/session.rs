//! Bearer-token sessions. The token is handed out once; only its SHA-256 digest
//! is stored.

use crate::model::{format_ts, now_ts};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub expires_at: String,
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Creates a session and returns `(token, session)`.
pub fn create_session(
    conn: &Connection,
    user: SessionUser,
    ttl_hours: i64,
) -> rusqlite::Result<(String, Session)> {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let expires_at = format_ts(Utc::now() + Duration::hours(ttl_hours.max(1)));
    conn.execute(
        "INSERT INTO sessions(token_hash, user_id, email, name, image, created_at, expires_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            hash_token(&token),
            user.id,
            user.email,
            user.name,
            user.image,
            now_ts(),
            expires_at,
        ],
    )?;
    Ok((token, Session { user, expires_at }))
}

/// Resolves a live session. Expired rows are purged on the way.
pub fn find_session(conn: &Connection, token: &str) -> rusqlite::Result<Option<Session>> {
    conn.execute("DELETE FROM sessions WHERE expires_at < ?", [now_ts()])?;
    conn.query_row(
        "SELECT user_id, email, name, image, expires_at FROM sessions WHERE token_hash = ?",
        [hash_token(token)],
        |r| {
            Ok(Session {
                user: SessionUser {
                    id: r.get(0)?,
                    email: r.get(1)?,
                    name: r.get(2)?,
                    image: r.get(3)?,
                },
                expires_at: r.get(4)?,
            })
        },
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM sessions WHERE token_hash = ?", [hash_token(token)])?;
    Ok(n > 0)
}
