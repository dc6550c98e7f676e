//! Configuration for certboardd

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sign-in and authorization
    #[serde(default)]
    pub auth: AuthConfig,

    /// Leaderboard presentation rules
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    /// File upload storage
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Nightly rank job
    #[serde(default)]
    pub ranks: RankConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Emails allowed to use admin methods
    #[serde(default)]
    pub admin_emails: Vec<String>,

    /// When non-empty, only these email domains may sign in
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_emails: Vec::new(),
            allowed_domains: Vec::new(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

impl AuthConfig {
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|a| a.trim().eq_ignore_ascii_case(email.trim()))
    }

    pub fn domain_allowed(&self, email: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };
        self.allowed_domains
            .iter()
            .any(|d| d.trim().trim_start_matches('@').eq_ignore_ascii_case(domain))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Accounts hidden from the leaderboard (test and staff accounts)
    #[serde(default)]
    pub exempt_emails: Vec<String>,
}

impl LeaderboardConfig {
    pub fn is_exempt(&self, email: &str) -> bool {
        self.exempt_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Root for stored uploads; defaults to `<workspace>/uploads`
    #[serde(default)]
    pub storage_root: Option<PathBuf>,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_max_profile_picture_bytes")]
    pub max_profile_picture_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            max_file_bytes: default_max_file_bytes(),
            max_profile_picture_bytes: default_max_profile_picture_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression, `minute hour * * *`
    #[serde(default = "default_rank_schedule")]
    pub schedule: String,

    /// Offset the schedule is evaluated in, `+HH:MM`
    #[serde(default = "default_rank_utc_offset")]
    pub utc_offset: String,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_rank_schedule(),
            utc_offset: default_rank_utc_offset(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_session_ttl_hours() -> i64 {
    30 * 24
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_profile_picture_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_rank_schedule() -> String {
    "30 19 * * *".to_string()
}

fn default_rank_utc_offset() -> String {
    "+05:30".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and `CERTBOARD_*` variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // CERTBOARD_RANKS__SCHEDULE, CERTBOARD_AUTH__ADMIN_EMAILS=a@x,b@y, ...
        builder = builder.add_source(
            config::Environment::with_prefix("CERTBOARD")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("auth.admin_emails")
                .with_list_parse_key("auth.allowed_domains")
                .with_list_parse_key("leaderboard.exempt_emails")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
