//! Background thread that runs the rank job on a daily cron schedule.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// `minute hour * * *`. A `*` minute or hour field matches every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub offset: FixedOffset,
}

fn parse_field(raw: &str, max: u32, name: &str) -> anyhow::Result<Option<u32>> {
    if raw == "*" {
        return Ok(None);
    }
    let v: u32 = raw
        .parse()
        .with_context(|| format!("invalid cron {} field: {}", name, raw))?;
    if v > max {
        return Err(anyhow!("cron {} out of range: {}", name, v));
    }
    Ok(Some(v))
}

/// Parses `+HH:MM` / `-HH:MM`.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    let s = raw.trim();
    let (sign, rest) = match s.chars().next() {
        Some('+') => (1, &s[1..]),
        Some('-') => (-1, &s[1..]),
        _ => return Err(anyhow!("utc offset must start with + or -: {}", raw)),
    };
    let (h, m) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("utc offset must be +HH:MM: {}", raw))?;
    let h: i32 = h.parse().with_context(|| format!("bad offset hours: {}", raw))?;
    let m: i32 = m.parse().with_context(|| format!("bad offset minutes: {}", raw))?;
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
        .ok_or_else(|| anyhow!("utc offset out of range: {}", raw))
}

impl DailySchedule {
    pub fn parse(expr: &str, utc_offset: &str) -> anyhow::Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(anyhow!("cron expression needs 5 fields: {}", expr));
        }
        if fields[2..].iter().any(|f| *f != "*") {
            return Err(anyhow!(
                "only daily schedules are supported (day, month and weekday must be *): {}",
                expr
            ));
        }
        Ok(Self {
            minute: parse_field(fields[0], 59, "minute")?,
            hour: parse_field(fields[1], 23, "hour")?,
            offset: parse_utc_offset(utc_offset)?,
        })
    }

    fn matches(&self, t: &DateTime<FixedOffset>) -> bool {
        self.minute.map_or(true, |m| t.minute() == m) && self.hour.map_or(true, |h| t.hour() == h)
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let local = after.with_timezone(&self.offset);
        let truncated = local
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local);
        let mut candidate = truncated + Duration::minutes(1);

        if let (Some(m), Some(h)) = (self.minute, self.hour) {
            // Fast path for the common fixed time of day.
            let time = NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
            let today = candidate.date_naive().and_time(time);
            let mut at = self
                .offset
                .from_local_datetime(&today)
                .single()
                .unwrap_or(candidate);
            if at < candidate {
                at += Duration::days(1);
            }
            return at.with_timezone(&Utc);
        }

        // At most one day of minutes to scan.
        for _ in 0..(24 * 60) {
            if self.matches(&candidate) {
                break;
            }
            candidate += Duration::minutes(1);
        }
        candidate.with_timezone(&Utc)
    }
}

pub struct RankScheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RankScheduler {
    /// Spawns the scheduler thread. It opens its own connection for every run.
    pub fn start(schedule: DailySchedule, workspace: PathBuf) -> anyhow::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("rank-scheduler".into())
            .spawn(move || run_loop(schedule, workspace, thread_stop))
            .context("failed to spawn rank scheduler thread")?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            h.thread().unpark();
            let _ = h.join();
        }
    }
}

impl Drop for RankScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(schedule: DailySchedule, workspace: PathBuf, stop: Arc<AtomicBool>) {
    tracing::info!(workspace = %workspace.display(), "rank scheduler started");
    while !stop.load(Ordering::SeqCst) {
        let next = schedule.next_after(Utc::now());
        tracing::debug!(next = %next, "next rank update");

        // Park in short slices so a stop request is noticed promptly.
        loop {
            if stop.load(Ordering::SeqCst) {
                tracing::info!("rank scheduler stopped");
                return;
            }
            let now = Utc::now();
            if now >= next {
                break;
            }
            let remaining = (next - now)
                .to_std()
                .unwrap_or_default()
                .min(std::time::Duration::from_secs(30));
            std::thread::park_timeout(remaining);
        }

        let run = crate::db::open_db(&workspace)
            .and_then(|conn| Ok(crate::ranks::update_ranks(&conn)?));
        match run {
            Ok(n) => tracing::info!(ranked = n, "scheduled rank update finished"),
            Err(e) => tracing::error!(error = %e, "scheduled rank update failed"),
        }
    }
    tracing::info!("rank scheduler stopped");
}
