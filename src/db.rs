use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "certboard.sqlite3";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(db_path(workspace))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    // The rank scheduler holds a second connection to the same file.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            designation TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL UNIQUE,
            contact_number TEXT NOT NULL,
            department TEXT NOT NULL,
            profile_picture TEXT,
            total_points INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_points ON teachers(total_points)",
        [],
    )?;

    // Leaderboard columns arrived after the first release.
    ensure_teachers_leaderboard_columns(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS certifications(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            name TEXT NOT NULL,
            issuing_organization TEXT NOT NULL,
            issue_date TEXT NOT NULL,
            expiry_date TEXT,
            credential_id TEXT,
            credential_url TEXT,
            image_url TEXT,
            cert_type TEXT NOT NULL DEFAULT 'other',
            points INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_certifications_teacher ON certifications(teacher_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS certification_links(
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            description TEXT NOT NULL,
            last_date_to_apply TEXT NOT NULL,
            department TEXT NOT NULL DEFAULT 'All Departments',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_certification_links_last_date ON certification_links(last_date_to_apply)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS blocked_logins(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            reason TEXT NOT NULL,
            attempted_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            email TEXT NOT NULL,
            name TEXT,
            image TEXT,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
        [],
    )?;

    Ok(conn)
}

fn ensure_teachers_leaderboard_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "teachers", "improvement_rate")? {
        conn.execute("ALTER TABLE teachers ADD COLUMN improvement_rate REAL", [])?;
    }
    if !table_has_column(conn, "teachers", "recent_achievement")? {
        conn.execute("ALTER TABLE teachers ADD COLUMN recent_achievement TEXT", [])?;
    }
    if !table_has_column(conn, "teachers", "rank")? {
        conn.execute("ALTER TABLE teachers ADD COLUMN rank INTEGER", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn upgrades_first_release_teachers_table() {
        let workspace = temp_dir("certboard-db-upgrade");
        {
            let conn = Connection::open(db_path(&workspace)).expect("open raw db");
            conn.execute(
                "CREATE TABLE teachers(
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    designation TEXT NOT NULL DEFAULT '',
                    email TEXT NOT NULL UNIQUE,
                    contact_number TEXT NOT NULL,
                    department TEXT NOT NULL,
                    profile_picture TEXT,
                    total_points INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                [],
            )
            .expect("create old table");
        }

        let conn = open_db(&workspace).expect("open_db");
        assert!(table_has_column(&conn, "teachers", "improvement_rate").expect("pragma"));
        assert!(table_has_column(&conn, "teachers", "recent_achievement").expect("pragma"));
        assert!(table_has_column(&conn, "teachers", "rank").expect("pragma"));

        // Idempotent.
        drop(conn);
        open_db(&workspace).expect("reopen");

        let _ = std::fs::remove_dir_all(workspace);
    }
}
