//! Timer unit validation: trigger directives, calendar expressions, and
//! time span grammar.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::timer_service;
use crate::types::{UnitFile, UnitSet};

/// An invalid timer directive value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidTimerDirective {
    pub directive: String,
    pub value: String,
    pub reason: String,
    pub line: usize,
}

/// Results of timer unit validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerValidation {
    pub unit: String,
    /// No matching service unit exists.
    pub missing_service: bool,
    pub service_name: String,
    pub invalid_calendar: Vec<InvalidTimerDirective>,
    pub invalid_timers: Vec<InvalidTimerDirective>,
    /// No trigger directive at all.
    pub no_trigger: bool,
    pub issues: Vec<String>,
    pub valid: bool,
}

const TRIGGER_DIRECTIVES: &[&str] = &[
    "OnCalendar",
    "OnActiveSec",
    "OnBootSec",
    "OnStartupSec",
    "OnUnitActiveSec",
    "OnUnitInactiveSec",
];

/// Validate a timer unit against the full unit set.
pub fn validate_timer(unit: &UnitFile, all_units: &UnitSet) -> TimerValidation {
    let mut result = TimerValidation {
        unit: unit.name.clone(),
        missing_service: false,
        service_name: String::new(),
        invalid_calendar: Vec::new(),
        invalid_timers: Vec::new(),
        no_trigger: false,
        issues: Vec::new(),
        valid: true,
    };

    if !unit.is_timer() {
        return result;
    }

    if unit.section("Timer").is_none() {
        result.valid = false;
        result
            .issues
            .push("Timer unit has no [Timer] section".to_string());
        return result;
    }

    result.service_name = timer_service(unit);
    if !all_units.contains_key(&result.service_name) {
        result.missing_service = true;
        result.valid = false;
    }

    let mut has_trigger = false;
    for directive in TRIGGER_DIRECTIVES {
        for d in unit.directives("Timer", directive) {
            has_trigger = true;
            if *directive == "OnCalendar" {
                if let Some(reason) = validate_calendar_expression(&d.value) {
                    result.invalid_calendar.push(InvalidTimerDirective {
                        directive: directive.to_string(),
                        value: d.value.clone(),
                        reason,
                        line: d.line,
                    });
                }
            } else if let Some(reason) = validate_time_span(&d.value) {
                result.invalid_timers.push(InvalidTimerDirective {
                    directive: directive.to_string(),
                    value: d.value.clone(),
                    reason,
                    line: d.line,
                });
            }
        }
    }

    if !has_trigger {
        result.no_trigger = true;
        result
            .issues
            .push("Timer unit has no trigger directives (OnCalendar, OnBootSec, etc.)".to_string());
        result.valid = false;
    }

    if !result.invalid_calendar.is_empty() || !result.invalid_timers.is_empty() {
        result.valid = false;
    }

    result
}

const CALENDAR_SHORTHANDS: &[&str] = &[
    "minutely",
    "hourly",
    "daily",
    "monthly",
    "weekly",
    "yearly",
    "annually",
    "quarterly",
    "semiannually",
    "*-*-* *:*:*",
];

const DAY_NAMES: &[&str] = &[
    "sun", "sunday", "mon", "monday", "tue", "tuesday", "wed", "wednesday", "thu", "thursday",
    "fri", "friday", "sat", "saturday",
];

/// Validate an `OnCalendar=` expression. Deliberately lenient: calendar
/// expressions have many valid forms, so only the empty expression is
/// rejected. Returns the rejection reason.
fn validate_calendar_expression(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return Some("Empty calendar expression".to_string());
    }

    if CALENDAR_SHORTHANDS.contains(&value.to_ascii_lowercase().as_str()) {
        return None;
    }

    let mut parts: Vec<&str> = value.split_whitespace().collect();
    if parts.is_empty() {
        return Some("Empty calendar expression".to_string());
    }

    // An optional leading day-of-week component.
    let first = parts[0].trim_end_matches(',').to_ascii_lowercase();
    if DAY_NAMES.contains(&first.as_str()) || first.contains("..") {
        parts.remove(0);
    }

    // Remaining date/time parts accept wildcards, ranges and commas;
    // detailed validation is deferred to the manager.
    None
}

static TIME_SPAN_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\d+(\.\d+)?\s*(usec|us|msec|ms|seconds|second|sec|s|minutes|minute|min|m|hours|hour|hr|h|days|day|d|weeks|week|w|months|month|years|year|y)?(\s+\d+(\.\d+)?\s*(usec|us|msec|ms|seconds|second|sec|s|minutes|minute|min|m|hours|hour|hr|h|days|day|d|weeks|week|w|months|month|years|year|y)?)*$",
    )
    .expect("time span regex is valid")
});

/// Validate an `On*Sec=` value against the time span grammar. Returns
/// the rejection reason.
fn validate_time_span(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return Some("Empty value".to_string());
    }

    if value.parse::<f64>().is_ok() {
        return None;
    }

    // Compound forms like 1h30min have no whitespace; normalize by
    // checking the whole string against the repeated number+unit shape.
    let compact_ok = {
        let mut rest = value;
        let mut ok = true;
        while !rest.is_empty() {
            match TIME_SPAN_RE_ONE.find(rest) {
                Some(m) if m.start() == 0 && m.len() > 0 => {
                    rest = rest[m.end()..].trim_start();
                }
                _ => {
                    ok = false;
                    break;
                }
            }
        }
        ok
    };

    if TIME_SPAN_VALUE_RE.is_match(value) || compact_ok {
        return None;
    }

    Some(format!("Invalid time span format: {value}"))
}

static TIME_SPAN_RE_ONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\d+(\.\d+)?\s*(usec|us|msec|ms|seconds|second|sec|s|minutes|minute|min|m|hours|hour|hr|h|days|day|d|weeks|week|w|months|month|years|year|y)?",
    )
    .expect("time span regex is valid")
});

/// Validate every timer unit in a set.
pub fn validate_all_timers(units: &UnitSet) -> Vec<TimerValidation> {
    units
        .values()
        .filter(|u| u.is_timer())
        .map(|u| validate_timer(u, units))
        .collect()
}
