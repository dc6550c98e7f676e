//! Leaderboard rank assignment.
//!
//! Teachers are ordered by total points (highest first). Equal totals are broken
//! by onboarding time, earlier first, then by id. Ranks are sequential: no two
//! teachers share a rank.

use rusqlite::{params, Connection};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct RankInput {
    pub id: String,
    pub total_points: i64,
    pub created_at: String,
}

pub fn compare_for_rank(a: &RankInput, b: &RankInput) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Returns `(teacher_id, rank)` pairs, rank starting at 1.
pub fn assign_ranks(mut rows: Vec<RankInput>) -> Vec<(String, i64)> {
    rows.sort_by(compare_for_rank);
    rows.into_iter()
        .enumerate()
        .map(|(i, r)| (r.id, i as i64 + 1))
        .collect()
}

/// Re-ranks every teacher in one transaction. Returns the number ranked.
pub fn update_ranks(conn: &Connection) -> rusqlite::Result<usize> {
    let rows = {
        let mut stmt = conn.prepare("SELECT id, total_points, created_at FROM teachers")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(RankInput {
                    id: r.get(0)?,
                    total_points: r.get(1)?,
                    created_at: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let ranked = assign_ranks(rows);
    let tx = conn.unchecked_transaction()?;
    {
        let mut upd = tx.prepare("UPDATE teachers SET rank = ? WHERE id = ?")?;
        for (id, rank) in &ranked {
            upd.execute(params![rank, id])?;
        }
    }
    tx.commit()?;

    tracing::info!(count = ranked.len(), "ranks updated");
    Ok(ranked.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, pts: i64, created: &str) -> RankInput {
        RankInput {
            id: id.into(),
            total_points: pts,
            created_at: created.into(),
        }
    }

    #[test]
    fn ranks_by_points_then_earlier_onboarding() {
        let ranked = assign_ranks(vec![
            row("late", 10, "2024-03-01T00:00:00.000Z"),
            row("top", 25, "2024-05-01T00:00:00.000Z"),
            row("early", 10, "2024-01-01T00:00:00.000Z"),
            row("zero", 0, "2023-01-01T00:00:00.000Z"),
        ]);
        assert_eq!(
            ranked,
            vec![
                ("top".to_string(), 1),
                ("early".to_string(), 2),
                ("late".to_string(), 3),
                ("zero".to_string(), 4),
            ]
        );
    }

    #[test]
    fn identical_rows_fall_back_to_id() {
        let ranked = assign_ranks(vec![
            row("b", 5, "2024-01-01T00:00:00.000Z"),
            row("a", 5, "2024-01-01T00:00:00.000Z"),
        ]);
        assert_eq!(ranked[0].0, "a");
        assert_eq!(ranked[1].1, 2);
    }

    #[test]
    fn empty_input_ranks_nobody() {
        assert!(assign_ranks(Vec::new()).is_empty());
    }

    #[test]
    fn missing_schema_surfaces_as_sqlite_error() {
        let bare = Connection::open_in_memory().expect("open");
        let err = update_ranks(&bare).expect_err("no teachers table");
        assert!(matches!(err, rusqlite::Error::SqliteFailure(..)));
    }
}
