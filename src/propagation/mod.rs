//! Failure propagation analysis.
//!
//! Each edge type carries fixed propagation semantics (does a start
//! failure of the target reach the dependent, does a stop). The
//! simulator is a conservative static approximation: it walks the
//! dependent side of the graph and records everything that could be
//! dragged down.

mod deadlock;
mod restart_storm;

pub use deadlock::{
    detect_deadlocks, detect_timeout_deadlocks, detect_wait_deadlocks, DeadlockResult,
    RestartDeadlock, TimeoutDeadlock, WaitDeadlock,
};
pub use restart_storm::{
    detect_restart_storms, restart_behavior, RestartBehavior, RestartStorm, RestartStormResult,
    StormEdge,
};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, Graph};
use crate::types::{Severity, UnitSet};

/// How failures travel across one edge type.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PropagationSemantics {
    /// Does a start failure of the target propagate to the dependent?
    pub start_failure: bool,
    /// Does a stop of the target propagate to the dependent?
    pub stop_propagates: bool,
    /// Is propagation immediate (Requisite, Conflicts)?
    pub immediate: bool,
    pub description: &'static str,
}

/// The semantics for an edge type. The booleans come straight from the
/// [`EdgeType`] predicate methods so there is a single source of truth.
pub fn semantics(kind: EdgeType) -> PropagationSemantics {
    let description = match kind {
        EdgeType::Requires => "Start failure propagates to dependent; stop does not propagate",
        EdgeType::Requisite => "Dependency must already be active; failure is immediate",
        EdgeType::BindsTo => "Start failure propagates; stop also propagates (strongest binding)",
        EdgeType::Wants => "Soft dependency; failures do not propagate",
        EdgeType::PartOf => "Stop propagates (for grouped services); start failure does not",
        EdgeType::Conflicts => "Mutually exclusive; starting one stops the other",
        _ => "No propagation defined",
    };
    PropagationSemantics {
        start_failure: kind.propagates_start_failure(),
        stop_propagates: kind.propagates_stop(),
        immediate: kind.is_immediate(),
        description,
    }
}

/// What a failure does to a dependent unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactKind {
    FailToStart,
    Stop,
}

/// A unit affected by a simulated failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedUnit {
    pub name: String,
    pub impact: ImpactKind,
    /// The path the failure took, starting at the failed unit.
    pub propagation_path: Vec<String>,
    pub edge_type: EdgeType,
    pub severity: Severity,
}

/// Result of simulating a unit failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureImpact {
    pub failed_unit: String,
    pub affected: Vec<AffectedUnit>,
    pub total_affected: usize,
    /// The longest propagation path of severity high or above.
    pub critical_chain: Vec<String>,
}

/// Simulate what happens when a unit fails.
///
/// The `fail` sweep runs first along start-failure edges; the `stop`
/// sweep follows along stop-propagation edges with the visited set
/// reset. If both sweeps reach a unit, only the first-found path is
/// reported.
pub fn simulate_failure(graph: &Graph, failed_unit: &str) -> FailureImpact {
    let mut affected = Vec::new();

    let mut visited: FxHashSet<String> = FxHashSet::default();
    propagate(
        graph,
        failed_unit,
        &[failed_unit.to_string()],
        ImpactKind::FailToStart,
        &mut visited,
        &mut affected,
    );

    let mut visited: FxHashSet<String> = FxHashSet::default();
    visited.insert(failed_unit.to_string());
    propagate(
        graph,
        failed_unit,
        &[failed_unit.to_string()],
        ImpactKind::Stop,
        &mut visited,
        &mut affected,
    );

    let mut critical_chain: Vec<String> = Vec::new();
    for unit in &affected {
        if unit.severity >= Severity::High && unit.propagation_path.len() > critical_chain.len() {
            critical_chain = unit.propagation_path.clone();
        }
    }

    FailureImpact {
        failed_unit: failed_unit.to_string(),
        total_affected: affected.len(),
        affected,
        critical_chain,
    }
}

fn propagate(
    graph: &Graph,
    unit: &str,
    path: &[String],
    impact: ImpactKind,
    visited: &mut FxHashSet<String>,
    affected: &mut Vec<AffectedUnit>,
) {
    if !visited.insert(unit.to_string()) {
        return;
    }

    for edge in graph.edges_to(unit) {
        let sem = semantics(edge.kind);
        let carries = match impact {
            ImpactKind::FailToStart => sem.start_failure,
            ImpactKind::Stop => sem.stop_propagates,
        };
        if !carries || visited.contains(&edge.from) {
            continue;
        }

        let mut new_path = path.to_vec();
        new_path.push(edge.from.clone());

        let severity = match edge.kind {
            EdgeType::Requisite => Severity::Critical,
            EdgeType::BindsTo | EdgeType::Requires => Severity::High,
            _ => Severity::Medium,
        };

        affected.push(AffectedUnit {
            name: edge.from.clone(),
            impact,
            propagation_path: new_path.clone(),
            edge_type: edge.kind,
            severity,
        });

        propagate(graph, &edge.from, &new_path, impact, visited, affected);
    }
}

/// Default set of units whose silent failure would be serious.
pub const DEFAULT_CRITICAL_UNITS: &[&str] = &[
    "dbus.service",
    "systemd-journald.service",
    "systemd-logind.service",
    "networking.service",
    "network.target",
    "syslog.service",
];

/// A critical unit pulled in only via `Wants=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilentFailure {
    /// The critical unit.
    pub unit: String,
    /// The unit that should require it.
    pub depended_by: String,
    pub edge_type: EdgeType,
    pub risk: Severity,
    pub description: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
}

/// Find critical units pulled in via `Wants=` with no parallel
/// `Requires=`/`BindsTo=`: their failure goes unnoticed.
pub fn detect_silent_failures(graph: &Graph, critical_units: &[String]) -> Vec<SilentFailure> {
    let critical: FxHashSet<&str> = if critical_units.is_empty() {
        DEFAULT_CRITICAL_UNITS.iter().copied().collect()
    } else {
        critical_units.iter().map(String::as_str).collect()
    };

    let mut failures = Vec::new();
    for edge in graph.edges() {
        if edge.kind != EdgeType::Wants || !critical.contains(edge.to.as_str()) {
            continue;
        }

        let has_hard = graph.edges_from(&edge.from).iter().any(|e| {
            e.to == edge.to && matches!(e.kind, EdgeType::Requires | EdgeType::BindsTo)
        });
        if has_hard {
            continue;
        }

        failures.push(SilentFailure {
            unit: edge.to.clone(),
            depended_by: edge.from.clone(),
            edge_type: edge.kind,
            risk: Severity::Medium,
            description: format!(
                "{from} uses Wants={to} for a critical service. If {to} fails, \
                 {from} will not be notified. Consider using Requires=.",
                from = edge.from,
                to = edge.to
            ),
            file: edge.file.clone(),
            line: edge.line,
        });
    }
    failures
}

/// A `BindsTo=` whose stop semantics can fire before stop ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOrderInversion {
    pub unit: String,
    pub bound_to: String,
    pub description: String,
    pub severity: Severity,
}

/// Find `BindsTo=` edges lacking the `After=` that orders a stop.
pub fn detect_stop_order_inversions(graph: &Graph) -> Vec<StopOrderInversion> {
    let mut inversions = Vec::new();
    for edge in graph.edges() {
        if edge.kind != EdgeType::BindsTo {
            continue;
        }

        let has_after = graph
            .edges_from(&edge.from)
            .iter()
            .any(|e| e.to == edge.to && e.kind == EdgeType::After);
        if has_after {
            continue;
        }

        inversions.push(StopOrderInversion {
            unit: edge.from.clone(),
            bound_to: edge.to.clone(),
            description: format!(
                "{from} has BindsTo={to} without After=. When {to} stops, {from} \
                 will stop immediately, potentially before its own stop ordering \
                 is honored.",
                from = edge.from,
                to = edge.to
            ),
            severity: Severity::High,
        });
    }
    inversions
}

/// Summary of propagation hazards in a unit set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationAnalysis {
    pub silent_failures: Vec<SilentFailure>,
    pub stop_order_inversions: Vec<StopOrderInversion>,
    /// Units whose failure would drag down many dependents.
    pub high_risk_units: Vec<String>,
}

/// Run the full propagation analysis.
pub fn analyze(graph: &Graph, _units: &UnitSet) -> PropagationAnalysis {
    let silent_failures = detect_silent_failures(graph, &[]);
    let stop_order_inversions = detect_stop_order_inversions(graph);

    // Units with many strong dependents are high risk.
    let mut strong_dependents: std::collections::BTreeMap<&str, usize> = Default::default();
    for edge in graph.edges() {
        if matches!(edge.kind, EdgeType::Requires | EdgeType::BindsTo) {
            *strong_dependents.entry(edge.to.as_str()).or_insert(0) += 1;
        }
    }
    let high_risk_units: Vec<String> = strong_dependents
        .into_iter()
        .filter(|&(_, count)| count >= 5)
        .map(|(unit, _)| unit.to_string())
        .collect();

    PropagationAnalysis {
        silent_failures,
        stop_order_inversions,
        high_risk_units,
    }
}
