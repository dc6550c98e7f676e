use crate::model::Teacher;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Round half away from zero, as dashboards show whole-number averages.
fn round_avg(total: i64, count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    ((total as f64) / (count as f64)).round() as i64
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub name: String,
    pub avg_score: i64,
    pub total_certs: usize,
    pub teacher_count: usize,
}

pub fn department_summaries(teachers: &[Teacher]) -> Vec<DepartmentSummary> {
    // (order of first appearance, total points, certs, teachers)
    let mut by_dept: HashMap<&str, (usize, i64, usize, usize)> = HashMap::new();
    for t in teachers {
        let next = by_dept.len();
        let e = by_dept
            .entry(t.department.as_str())
            .or_insert((next, 0, 0, 0));
        e.1 += t.total_points;
        e.2 += t.certifications.len();
        e.3 += 1;
    }

    let mut out: Vec<(usize, DepartmentSummary)> = by_dept
        .into_iter()
        .map(|(name, (order, total, certs, count))| {
            (
                order,
                DepartmentSummary {
                    name: name.to_string(),
                    avg_score: round_avg(total, count),
                    total_certs: certs,
                    teacher_count: count,
                },
            )
        })
        .collect();
    out.sort_by(|a, b| b.1.avg_score.cmp(&a.1.avg_score).then(a.0.cmp(&b.0)));
    out.into_iter().map(|(_, d)| d).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    TotalPoints,
    Certifications,
    Name,
    Department,
}

impl SortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "totalPoints" => Some(Self::TotalPoints),
            "certifications" => Some(Self::Certifications),
            "name" => Some(Self::Name),
            "department" => Some(Self::Department),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardQuery {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub search: String,
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            sort_by: SortBy::TotalPoints,
            sort_order: SortOrder::Desc,
            search: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardStats {
    pub faculty_count: usize,
    pub total_certifications: usize,
    pub average_score: i64,
    pub department_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub designation: String,
    pub profile_picture: Option<String>,
    pub total_points: i64,
    pub certification_count: usize,
    pub improvement_rate: f64,
    pub recent_achievement: Option<String>,
    pub rank: Option<i64>,
}

impl LeaderboardEntry {
    fn from_teacher(t: &Teacher) -> Self {
        let recent_achievement = t
            .recent_achievement
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| t.latest_certification().map(|c| c.name.clone()));
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            email: t.email.clone(),
            department: t.department.clone(),
            designation: t.designation.clone(),
            profile_picture: t.profile_picture.clone(),
            total_points: t.total_points,
            certification_count: t.certifications.len(),
            improvement_rate: t.improvement_rate,
            recent_achievement,
            rank: t.rank,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub stats: LeaderboardStats,
    pub top_three: Vec<LeaderboardEntry>,
    pub most_improved: Vec<LeaderboardEntry>,
    pub recent_achievements: Vec<LeaderboardEntry>,
    pub remaining: Vec<LeaderboardEntry>,
}

fn podium_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    // Unranked teachers go last.
    let ra = a.rank.unwrap_or(i64::MAX);
    let rb = b.rank.unwrap_or(i64::MAX);
    ra.cmp(&rb).then(b.total_points.cmp(&a.total_points))
}

fn table_order(by: SortBy, order: SortOrder, a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    let asc = match by {
        SortBy::TotalPoints => a.total_points.cmp(&b.total_points),
        SortBy::Certifications => a.certification_count.cmp(&b.certification_count),
        SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortBy::Department => a.department.to_lowercase().cmp(&b.department.to_lowercase()),
    };
    match order {
        SortOrder::Asc => asc,
        SortOrder::Desc => asc.reverse(),
    }
}

/// Builds the dashboard. `teachers` should already exclude exempt accounts.
pub fn build_leaderboard(teachers: &[Teacher], query: &LeaderboardQuery) -> Leaderboard {
    let entries: Vec<LeaderboardEntry> = teachers.iter().map(LeaderboardEntry::from_teacher).collect();

    let total_certifications: usize = entries.iter().map(|e| e.certification_count).sum();
    let total_points: i64 = entries.iter().map(|e| e.total_points).sum();
    let stats = LeaderboardStats {
        faculty_count: entries.len(),
        total_certifications,
        average_score: round_avg(total_points, entries.len()),
        department_count: department_summaries(teachers).len(),
    };

    let mut podium = entries.clone();
    podium.sort_by(podium_order);
    podium.truncate(3);

    let mut most_improved = entries.clone();
    most_improved.sort_by(|a, b| {
        b.improvement_rate
            .partial_cmp(&a.improvement_rate)
            .unwrap_or(Ordering::Equal)
    });
    most_improved.truncate(3);

    let recent_achievements: Vec<LeaderboardEntry> = entries
        .iter()
        .filter(|e| e.recent_achievement.is_some())
        .cloned()
        .collect();

    let needle = query.search.trim().to_lowercase();
    let mut remaining: Vec<LeaderboardEntry> = entries
        .into_iter()
        .filter(|e| !podium.iter().any(|p| p.id == e.id))
        .filter(|e| {
            needle.is_empty()
                || e.name.to_lowercase().contains(&needle)
                || e.department.to_lowercase().contains(&needle)
        })
        .collect();
    remaining.sort_by(|a, b| table_order(query.sort_by, query.sort_order, a, b));

    Leaderboard {
        stats,
        top_three: podium,
        most_improved,
        recent_achievements,
        remaining,
    }
}
