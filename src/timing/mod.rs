//! Timeout parsing and timing analysis.
//!
//! Durations use [`std::time::Duration`]; a zero `JobTimeoutSec` means
//! infinity, matching the manager's convention.

mod cascade;
mod critical_path;

pub use cascade::{detect_cascades, CascadeResult, CascadeRisk};
pub use critical_path::{
    boot_critical_units, compute_critical_paths, CriticalPath, CriticalPathResult, PathNode,
};

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{UnitFile, UnitSet};

/// Default start timeout (`DefaultTimeoutStartSec`).
pub const DEFAULT_TIMEOUT_START: Duration = Duration::from_secs(90);
/// Default stop timeout (`DefaultTimeoutStopSec`).
pub const DEFAULT_TIMEOUT_STOP: Duration = Duration::from_secs(90);
/// Default restart delay (`DefaultRestartSec`).
pub const DEFAULT_RESTART_SEC: Duration = Duration::from_millis(100);
/// Default job timeout: zero means infinity.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::ZERO;

/// Parsed timeout values for a unit. Field names follow the directive
/// names they come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub unit: String,
    pub timeout_start_sec: Duration,
    pub timeout_stop_sec: Duration,
    /// Defaults to `timeout_stop_sec`.
    pub timeout_abort_sec: Duration,
    /// Zero means infinity.
    pub job_timeout_sec: Duration,
    pub restart_sec: Duration,
    /// File where the primary timeout is defined.
    pub source: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            unit: String::new(),
            timeout_start_sec: DEFAULT_TIMEOUT_START,
            timeout_stop_sec: DEFAULT_TIMEOUT_STOP,
            timeout_abort_sec: DEFAULT_TIMEOUT_STOP,
            job_timeout_sec: DEFAULT_JOB_TIMEOUT,
            restart_sec: DEFAULT_RESTART_SEC,
            source: String::new(),
        }
    }
}

/// System-wide defaults, normally from `system.conf`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub default_timeout_start_sec: Duration,
    pub default_timeout_stop_sec: Duration,
    pub default_restart_sec: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_timeout_start_sec: DEFAULT_TIMEOUT_START,
            default_timeout_stop_sec: DEFAULT_TIMEOUT_STOP,
            default_restart_sec: DEFAULT_RESTART_SEC,
        }
    }
}

/// Extract timeout configuration from a unit, falling back to system
/// defaults for unset values.
pub fn parse_timeouts(unit: &UnitFile, system: Option<&SystemConfig>) -> TimeoutConfig {
    let defaults = SystemConfig::default();
    let system = system.unwrap_or(&defaults);

    let mut config = TimeoutConfig {
        unit: unit.name.clone(),
        timeout_start_sec: system.default_timeout_start_sec,
        timeout_stop_sec: system.default_timeout_stop_sec,
        timeout_abort_sec: Duration::ZERO,
        job_timeout_sec: DEFAULT_JOB_TIMEOUT,
        restart_sec: system.default_restart_sec,
        source: unit.path.clone(),
    };

    let start = unit.directive("Service", "TimeoutStartSec");
    if !start.is_empty() {
        config.timeout_start_sec = parse_duration(start);
    }
    let stop = unit.directive("Service", "TimeoutStopSec");
    if !stop.is_empty() {
        config.timeout_stop_sec = parse_duration(stop);
    }
    // TimeoutSec sets both start and stop.
    let both = unit.directive("Service", "TimeoutSec");
    if !both.is_empty() {
        let d = parse_duration(both);
        config.timeout_start_sec = d;
        config.timeout_stop_sec = d;
    }
    let abort = unit.directive("Service", "TimeoutAbortSec");
    if !abort.is_empty() {
        config.timeout_abort_sec = parse_duration(abort);
    }
    let restart = unit.directive("Service", "RestartSec");
    if !restart.is_empty() {
        config.restart_sec = parse_duration(restart);
    }

    let job = unit.directive("Unit", "JobTimeoutSec");
    if !job.is_empty() {
        config.job_timeout_sec = parse_duration(job);
    }
    let job_running = unit.directive("Unit", "JobRunningTimeoutSec");
    if !job_running.is_empty() && config.job_timeout_sec == Duration::ZERO {
        config.job_timeout_sec = parse_duration(job_running);
    }

    if config.timeout_abort_sec == Duration::ZERO {
        config.timeout_abort_sec = config.timeout_stop_sec;
    }

    config
}

/// Timeout configurations for every unit in a set.
pub fn parse_all_timeouts(
    units: &UnitSet,
    system: Option<&SystemConfig>,
) -> BTreeMap<String, TimeoutConfig> {
    units
        .iter()
        .map(|(name, unit)| (name.clone(), parse_timeouts(unit, system)))
        .collect()
}

static TIME_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(usec|us|msec|ms|seconds|second|sec|s|minutes|minute|min|m|hours|hour|hr|h|days|day|d|weeks|week|w|months|month|years|year|y)?",
    )
    .expect("time span regex is valid")
});

/// Parse a time span: `5`, `5s`, `5min`, `1h30min`, `infinity`.
///
/// Empty, `"0"` and `"infinity"` all yield zero (infinity for job
/// timeouts). A bare decimal is seconds. Compound forms are additive.
/// Unparseable input yields zero.
pub fn parse_duration(s: &str) -> Duration {
    let s = s.trim();

    if s.is_empty() || s == "infinity" || s == "0" {
        return Duration::ZERO;
    }

    // Bare decimal means seconds.
    if let Ok(secs) = s.parse::<f64>() {
        if secs >= 0.0 {
            return Duration::from_secs_f64(secs);
        }
        return Duration::ZERO;
    }

    let mut total = Duration::ZERO;
    let mut matched = false;
    for caps in TIME_SPAN_RE.captures_iter(s) {
        let Ok(value) = caps[1].parse::<f64>() else {
            continue;
        };
        matched = true;
        let unit = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let multiplier = match unit.as_str() {
            "usec" | "us" => Duration::from_micros(1),
            "msec" | "ms" => Duration::from_millis(1),
            "seconds" | "second" | "sec" | "s" | "" => Duration::from_secs(1),
            "minutes" | "minute" | "min" | "m" => Duration::from_secs(60),
            "hours" | "hour" | "hr" | "h" => Duration::from_secs(3600),
            "days" | "day" | "d" => Duration::from_secs(24 * 3600),
            "weeks" | "week" | "w" => Duration::from_secs(7 * 24 * 3600),
            // Months and years are approximations: 30 and 365 days.
            "months" | "month" => Duration::from_secs(30 * 24 * 3600),
            "years" | "year" | "y" => Duration::from_secs(365 * 24 * 3600),
            _ => Duration::from_secs(1),
        };
        total += multiplier.mul_f64(value);
    }

    if !matched {
        return Duration::ZERO;
    }
    total
}

/// Format a duration for humans. Zero renders as `infinity`.
pub fn format_duration(d: Duration) -> String {
    if d == Duration::ZERO {
        return "infinity".to_string();
    }
    if d < Duration::from_secs(1) {
        return format!("{}ms", d.as_millis());
    }

    let total = d.as_secs_f64().round() as u64;
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}min"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit_str;

    #[test]
    fn test_parse_duration_special_values() {
        assert_eq!(parse_duration(""), Duration::ZERO);
        assert_eq!(parse_duration("0"), Duration::ZERO);
        assert_eq!(parse_duration("infinity"), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_bare_number_is_seconds() {
        assert_eq!(parse_duration("5"), Duration::from_secs(5));
        assert_eq!(parse_duration("1.5"), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100ms"), Duration::from_millis(100));
        assert_eq!(parse_duration("5s"), Duration::from_secs(5));
        assert_eq!(parse_duration("5min"), Duration::from_secs(300));
        assert_eq!(parse_duration("2h"), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d"), Duration::from_secs(86400));
        assert_eq!(parse_duration("1w"), Duration::from_secs(7 * 86400));
        assert_eq!(parse_duration("10us"), Duration::from_micros(10));
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("1h30min"), Duration::from_secs(5400));
        assert_eq!(parse_duration("1min 30s"), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_duration_case_insensitive() {
        assert_eq!(parse_duration("5MIN"), Duration::from_secs(300));
        assert_eq!(parse_duration("100MS"), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_duration_months_years() {
        assert_eq!(parse_duration("1month"), Duration::from_secs(30 * 86400));
        assert_eq!(parse_duration("1y"), Duration::from_secs(365 * 86400));
    }

    #[test]
    fn test_parse_duration_nonsense_is_zero() {
        assert_eq!(parse_duration("not a duration"), Duration::ZERO);
        assert_eq!(parse_duration("xyz"), Duration::ZERO);
    }

    #[test]
    fn test_parse_timeouts_defaults() {
        let unit = parse_unit_str("/x/a.service", "[Service]\nExecStart=/bin/a\n");
        let config = parse_timeouts(&unit, None);
        assert_eq!(config.timeout_start_sec, DEFAULT_TIMEOUT_START);
        assert_eq!(config.timeout_stop_sec, DEFAULT_TIMEOUT_STOP);
        assert_eq!(config.restart_sec, DEFAULT_RESTART_SEC);
        assert_eq!(config.job_timeout_sec, Duration::ZERO);
        // Abort falls back to stop.
        assert_eq!(config.timeout_abort_sec, DEFAULT_TIMEOUT_STOP);
    }

    #[test]
    fn test_parse_timeouts_explicit() {
        let unit = parse_unit_str(
            "/x/a.service",
            "[Service]\nTimeoutStartSec=10\nTimeoutStopSec=20\nRestartSec=2\n\
             [Unit]\nJobTimeoutSec=1min\n",
        );
        let config = parse_timeouts(&unit, None);
        assert_eq!(config.timeout_start_sec, Duration::from_secs(10));
        assert_eq!(config.timeout_stop_sec, Duration::from_secs(20));
        assert_eq!(config.restart_sec, Duration::from_secs(2));
        assert_eq!(config.job_timeout_sec, Duration::from_secs(60));
        assert_eq!(config.timeout_abort_sec, Duration::from_secs(20));
    }

    #[test]
    fn test_timeout_sec_sets_both() {
        let unit = parse_unit_str("/x/a.service", "[Service]\nTimeoutSec=45\n");
        let config = parse_timeouts(&unit, None);
        assert_eq!(config.timeout_start_sec, Duration::from_secs(45));
        assert_eq!(config.timeout_stop_sec, Duration::from_secs(45));
    }

    #[test]
    fn test_job_running_timeout_only_if_job_unset() {
        let unit = parse_unit_str("/x/a.service", "[Unit]\nJobRunningTimeoutSec=30\n");
        let config = parse_timeouts(&unit, None);
        assert_eq!(config.job_timeout_sec, Duration::from_secs(30));

        let unit = parse_unit_str(
            "/x/a.service",
            "[Unit]\nJobTimeoutSec=10\nJobRunningTimeoutSec=30\n",
        );
        let config = parse_timeouts(&unit, None);
        assert_eq!(config.job_timeout_sec, Duration::from_secs(10));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "infinity");
        assert_eq!(format_duration(Duration::from_millis(100)), "100ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1min30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30min");
    }
}
