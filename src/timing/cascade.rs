//! Cascade-risk detection: timeout configurations that interact badly
//! with dependency chains.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, Graph};
use crate::types::Severity;

use super::{format_duration, CriticalPathResult, TimeoutConfig};

/// A potential timeout cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeRisk {
    pub unit: String,
    /// Time to reach this unit through dependencies.
    pub critical_path: Duration,
    pub own_timeout: Duration,
    pub risk: Severity,
    pub description: String,
    pub recommendation: String,
    pub file: String,
}

/// All detected cascade risks with severity counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeResult {
    pub risks: Vec<CascadeRisk>,
    pub total_risks: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
}

/// Detect cascade risks in four families: critical path versus job
/// timeout, network dependencies with tight timeouts, very long chains,
/// and restart cycles that approach the start timeout.
pub fn detect_cascades(
    graph: &Graph,
    paths: &CriticalPathResult,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> CascadeResult {
    let mut risks = Vec::new();
    risks.extend(detect_path_timeout_exceeded(graph, paths, timeouts));
    risks.extend(detect_network_dependency_risks(graph, timeouts));
    risks.extend(detect_long_chains(paths, timeouts));
    risks.extend(detect_restart_loop_risks(graph, paths, timeouts));

    risks.sort_by(|a, b| {
        Reverse(a.risk)
            .cmp(&Reverse(b.risk))
            .then_with(|| a.unit.cmp(&b.unit))
    });

    let mut result = CascadeResult {
        total_risks: risks.len(),
        critical_count: 0,
        high_count: 0,
        medium_count: 0,
        low_count: 0,
        risks,
    };
    for risk in &result.risks {
        match risk.risk {
            Severity::Critical => result.critical_count += 1,
            Severity::High => result.high_count += 1,
            Severity::Medium => result.medium_count += 1,
            Severity::Low => result.low_count += 1,
            Severity::Info => {}
        }
    }
    result
}

/// Dependency time exceeding `JobTimeoutSec`: the job may expire while
/// the unit is still waiting.
fn detect_path_timeout_exceeded(
    graph: &Graph,
    paths: &CriticalPathResult,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> Vec<CascadeRisk> {
    let mut risks = Vec::new();

    for (unit_name, path) in &paths.paths {
        if path.path.len() <= 1 {
            continue;
        }
        let Some(tc) = timeouts.get(unit_name) else {
            continue;
        };

        let dep_time = path.total_time.saturating_sub(tc.timeout_start_sec);
        if tc.job_timeout_sec == Duration::ZERO || dep_time <= tc.job_timeout_sec {
            continue;
        }

        let risk = if dep_time < tc.job_timeout_sec * 2 {
            Severity::High
        } else {
            Severity::Critical
        };

        let file = graph
            .unit(unit_name)
            .map(|u| u.path.clone())
            .unwrap_or_default();

        risks.push(CascadeRisk {
            unit: unit_name.clone(),
            critical_path: dep_time,
            own_timeout: tc.job_timeout_sec,
            risk,
            description: format!(
                "Critical path to {unit_name} takes {}, but JobTimeoutSec is {}. \
                 The job may timeout waiting for dependencies.",
                format_duration(dep_time),
                format_duration(tc.job_timeout_sec)
            ),
            recommendation: "Increase JobTimeoutSec or reduce dependency chain length"
                .to_string(),
            file,
        });
    }

    risks
}

const NETWORK_TARGETS: &[&str] = &["network-online.target", "network.target"];

/// Network-dependent units with start timeouts under 30 seconds:
/// network initialization routinely takes longer on slow links.
fn detect_network_dependency_risks(
    graph: &Graph,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> Vec<CascadeRisk> {
    let mut risks = Vec::new();

    for unit in graph.units() {
        let network_target = graph.edges_from(&unit.name).iter().find_map(|e| {
            let wanted = matches!(
                e.kind,
                EdgeType::After | EdgeType::Requires | EdgeType::Wants
            );
            if wanted && NETWORK_TARGETS.contains(&e.to.as_str()) {
                Some(e.to.clone())
            } else {
                None
            }
        });
        let Some(network_target) = network_target else {
            continue;
        };
        let Some(tc) = timeouts.get(&unit.name) else {
            continue;
        };

        let ts = tc.timeout_start_sec;
        if ts == Duration::ZERO || ts >= Duration::from_secs(30) {
            continue;
        }

        let risk = if ts < Duration::from_secs(10) {
            Severity::Critical
        } else if ts >= Duration::from_secs(20) {
            Severity::Medium
        } else {
            Severity::High
        };

        risks.push(CascadeRisk {
            unit: unit.name.clone(),
            critical_path: Duration::ZERO,
            own_timeout: ts,
            risk,
            description: format!(
                "{} depends on {network_target} but has TimeoutStartSec={}. Network \
                 initialization can take 30+ seconds on slow/unreliable networks.",
                unit.name,
                format_duration(ts)
            ),
            recommendation: "Increase TimeoutStartSec to at least 60s for network-dependent services"
                .to_string(),
            file: tc.source.clone(),
        });
    }

    risks
}

const LONG_CHAIN: usize = 10;
const VERY_LONG_CHAIN: usize = 20;

/// Dependency chains of ten or more units.
fn detect_long_chains(
    paths: &CriticalPathResult,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> Vec<CascadeRisk> {
    let mut risks = Vec::new();

    for (unit_name, path) in &paths.paths {
        let chain_len = path.path.len();
        if chain_len < LONG_CHAIN {
            continue;
        }

        let tc = timeouts.get(unit_name).cloned().unwrap_or_default();
        let risk = if chain_len >= VERY_LONG_CHAIN {
            Severity::Medium
        } else {
            Severity::Low
        };

        risks.push(CascadeRisk {
            unit: unit_name.clone(),
            critical_path: path.total_time,
            own_timeout: tc.timeout_start_sec,
            risk,
            description: format!(
                "{unit_name} has a dependency chain of {chain_len} units (critical \
                 path: {}). Long chains increase boot time and timeout risk.",
                format_duration(path.total_time)
            ),
            recommendation: "Review dependency chain for unnecessary ordering constraints"
                .to_string(),
            file: tc.source,
        });
    }

    risks
}

/// Restart cycle time (RestartSec plus dependency time) approaching the
/// start timeout: rapid failures could exhaust the timeout mid-restart.
fn detect_restart_loop_risks(
    graph: &Graph,
    paths: &CriticalPathResult,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> Vec<CascadeRisk> {
    let mut risks = Vec::new();

    for unit in graph.units() {
        if !unit.is_service() {
            continue;
        }
        let Some(tc) = timeouts.get(&unit.name) else {
            continue;
        };

        let policy = unit.directive("Service", "Restart");
        if policy.is_empty() || policy == "no" {
            continue;
        }

        let Some(path) = paths.paths.get(&unit.name) else {
            continue;
        };

        let dep_time = path.total_time.saturating_sub(tc.timeout_start_sec);
        let cycle = tc.restart_sec + dep_time;
        let ts = tc.timeout_start_sec;

        if ts == Duration::ZERO || cycle <= ts / 2 {
            continue;
        }

        let risk = if cycle >= ts {
            Severity::High
        } else if cycle >= ts * 3 / 4 {
            Severity::Medium
        } else {
            Severity::Low
        };

        let pct = if ts > Duration::ZERO {
            format!("{:.0}%", cycle.as_secs_f64() / ts.as_secs_f64() * 100.0)
        } else {
            "N/A".to_string()
        };

        risks.push(CascadeRisk {
            unit: unit.name.clone(),
            critical_path: dep_time,
            own_timeout: ts,
            risk,
            description: format!(
                "{} has Restart={policy} with RestartSec={}. Dependency startup time \
                 ({}) + RestartSec = {}, which is {pct} of TimeoutStartSec ({}). \
                 Rapid failures could exhaust timeout during restart cycles.",
                unit.name,
                format_duration(tc.restart_sec),
                format_duration(dep_time),
                format_duration(cycle),
                format_duration(ts)
            ),
            recommendation: "Increase TimeoutStartSec or reduce RestartSec/dependency chain"
                .to_string(),
            file: tc.source.clone(),
        });
    }

    risks
}
