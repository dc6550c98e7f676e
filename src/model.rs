use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationType {
    Fdp,
    Global,
    Webinar,
    Online,
    Other,
}

impl CertificationType {
    pub const ALL: [CertificationType; 5] = [
        CertificationType::Fdp,
        CertificationType::Global,
        CertificationType::Webinar,
        CertificationType::Online,
        CertificationType::Other,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fdp" => Some(Self::Fdp),
            "global" => Some(Self::Global),
            "webinar" => Some(Self::Webinar),
            "online" => Some(Self::Online),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fdp => "fdp",
            Self::Global => "global",
            Self::Webinar => "webinar",
            Self::Online => "online",
            Self::Other => "other",
        }
    }

    pub fn points(self) -> i64 {
        match self {
            Self::Fdp => 5,
            Self::Global => 10,
            Self::Webinar => 3,
            Self::Online => 8,
            Self::Other => 2,
        }
    }
}

/// Points for a stored type string. Anything unrecognized scores as `other`.
pub fn points_for_stored_type(raw: &str) -> i64 {
    CertificationType::parse(raw)
        .unwrap_or(CertificationType::Other)
        .points()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub id: String,
    pub name: String,
    pub issuing_organization: String,
    pub issue_date: String,
    pub expiry_date: Option<String>,
    pub credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub image_url: Option<String>,
    /// Stored verbatim so rows written by older tools keep their (possibly empty) type.
    #[serde(rename = "type")]
    pub cert_type: String,
    pub points: i64,
}

impl Certification {
    pub fn has_known_type(&self) -> bool {
        CertificationType::parse(&self.cert_type).is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub designation: String,
    pub email: String,
    pub contact_number: String,
    pub department: String,
    pub profile_picture: Option<String>,
    pub certifications: Vec<Certification>,
    pub total_points: i64,
    pub improvement_rate: f64,
    pub recent_achievement: Option<String>,
    pub rank: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Teacher {
    /// Applies the point table to every certification and refreshes the total.
    pub fn recalculate_points(&mut self) {
        for cert in self.certifications.iter_mut() {
            cert.points = points_for_stored_type(&cert.cert_type);
        }
        self.total_points = self.certifications.iter().map(|c| c.points).sum();
    }

    /// Most recently issued certification, if any.
    pub fn latest_certification(&self) -> Option<&Certification> {
        self.certifications
            .iter()
            .max_by(|a, b| a.issue_date.cmp(&b.issue_date))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationLink {
    pub id: String,
    pub url: String,
    pub description: String,
    pub last_date_to_apply: String,
    pub department: String,
    pub created_at: String,
    pub updated_at: String,
}

pub const ALL_DEPARTMENTS: &str = "All Departments";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedLogin {
    pub id: String,
    pub email: String,
    pub reason: String,
    pub attempted_at: String,
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date_input(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(d.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Empty or whitespace-only optional text becomes `None`.
pub fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
