//! Deadlock pattern detection: dependency shapes that can leave units
//! unable to start or restart.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, Graph};
use crate::types::{Severity, UnitSet};

/// A scenario where units cannot restart properly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartDeadlock {
    pub unit_a: String,
    pub unit_b: String,
    pub scenario: String,
    pub severity: Severity,
    /// Suggested fix.
    pub resolution: String,
}

/// All detected restart deadlocks with severity counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockResult {
    pub deadlocks: Vec<RestartDeadlock>,
    pub total_deadlocks: usize,
    pub critical_count: usize,
    pub high_count: usize,
}

/// Detect restart deadlock patterns.
///
/// 1. `a After=b` + `a BindsTo=b` + `b Requires=a`: if b restarts, a
///    stops and cannot come back until b is active, but b needs a.
/// 2. Symmetric `After=` between `BindsTo=`-linked units.
/// 3. Mutual `BindsTo=` with `After=` ordering.
/// 4. Transitive: `a BindsTo=b`, `b After=c`, `c Requires=a`.
/// 5. Impossible state: `a BindsTo=b`, `a Conflicts=x`, `b Requires=x`.
pub fn detect_deadlocks(graph: &Graph, _units: &UnitSet) -> DeadlockResult {
    let mut after: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut binds_to: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut requires: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut conflicts: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for edge in graph.edges() {
        let index = match edge.kind {
            EdgeType::After => &mut after,
            EdgeType::BindsTo => &mut binds_to,
            EdgeType::Requires => &mut requires,
            EdgeType::Conflicts => &mut conflicts,
            _ => continue,
        };
        index
            .entry(edge.from.as_str())
            .or_default()
            .insert(edge.to.as_str());
    }

    let has = |index: &BTreeMap<&str, BTreeSet<&str>>, from: &str, to: &str| {
        index.get(from).map(|set| set.contains(to)).unwrap_or(false)
    };

    let mut deadlocks = Vec::new();

    // Patterns 1-3: a has both BindsTo=b and After=b.
    for (&unit_a, bound) in &binds_to {
        for &unit_b in bound {
            if !has(&after, unit_a, unit_b) {
                continue;
            }

            if has(&requires, unit_b, unit_a) {
                deadlocks.push(RestartDeadlock {
                    unit_a: unit_a.to_string(),
                    unit_b: unit_b.to_string(),
                    scenario: format!(
                        "{a} has After={b} and BindsTo={b}. {b} has Requires={a}. \
                         If {b} restarts: {a} stops (BindsTo), {a} can't restart \
                         until {b} is active (After), but {b} needs {a} (Requires). \
                         Potential deadlock.",
                        a = unit_a,
                        b = unit_b
                    ),
                    severity: Severity::Critical,
                    resolution: "Remove circular dependency or change BindsTo to Requires"
                        .to_string(),
                });
            }

            if has(&after, unit_b, unit_a) {
                deadlocks.push(RestartDeadlock {
                    unit_a: unit_a.to_string(),
                    unit_b: unit_b.to_string(),
                    scenario: format!(
                        "{a} has After={b} and BindsTo={b}. {b} has After={a}. \
                         Mutual After= creates ordering deadlock on restart.",
                        a = unit_a,
                        b = unit_b
                    ),
                    severity: Severity::High,
                    resolution: "Break the circular After= dependency".to_string(),
                });
            }

            if has(&binds_to, unit_b, unit_a) {
                deadlocks.push(RestartDeadlock {
                    unit_a: unit_a.to_string(),
                    unit_b: unit_b.to_string(),
                    scenario: format!(
                        "Mutual BindsTo between {a} and {b} with After= ordering. \
                         If either stops, both stop and may not restart correctly.",
                        a = unit_a,
                        b = unit_b
                    ),
                    severity: Severity::Critical,
                    resolution: "Use Requires instead of BindsTo for one direction".to_string(),
                });
            }
        }
    }

    // Pattern 4: transitive deadlock through a third unit.
    for (&unit_a, bound) in &binds_to {
        for &unit_b in bound {
            let Some(waits) = after.get(unit_b) else {
                continue;
            };
            for &unit_c in waits {
                if unit_c == unit_a {
                    continue;
                }
                if has(&requires, unit_c, unit_a) {
                    deadlocks.push(RestartDeadlock {
                        unit_a: unit_a.to_string(),
                        unit_b: unit_b.to_string(),
                        scenario: format!(
                            "Transitive deadlock: {a} BindsTo {b}, {b} After {c}, \
                             {c} Requires {a}. If {b} stops, {a} stops. {b} can't \
                             start until {c} which needs {a}.",
                            a = unit_a,
                            b = unit_b,
                            c = unit_c
                        ),
                        severity: Severity::High,
                        resolution: "Simplify the dependency chain".to_string(),
                    });
                }
            }
        }
    }

    // Pattern 5: BindsTo + Conflicts impossible state.
    for (&unit_a, bound) in &binds_to {
        for &unit_b in bound {
            let (Some(conflicted), Some(required)) =
                (conflicts.get(unit_a), requires.get(unit_b))
            else {
                continue;
            };
            for &unit_x in conflicted {
                if required.contains(unit_x) {
                    deadlocks.push(RestartDeadlock {
                        unit_a: unit_a.to_string(),
                        unit_b: unit_b.to_string(),
                        scenario: format!(
                            "{a} BindsTo {b}, but {a} Conflicts with {x} which {b} \
                             Requires. This creates an impossible state.",
                            a = unit_a,
                            b = unit_b,
                            x = unit_x
                        ),
                        severity: Severity::Critical,
                        resolution: "Remove the conflicting dependency".to_string(),
                    });
                }
            }
        }
    }

    deadlocks.sort_by(|a, b| {
        Reverse(a.severity)
            .cmp(&Reverse(b.severity))
            .then_with(|| a.unit_a.cmp(&b.unit_a))
            .then_with(|| a.unit_b.cmp(&b.unit_b))
    });

    // Deduplicate: a-b and b-a describe the same deadlock.
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    deadlocks.retain(|d| {
        let key = if d.unit_a <= d.unit_b {
            (d.unit_a.clone(), d.unit_b.clone())
        } else {
            (d.unit_b.clone(), d.unit_a.clone())
        };
        seen.insert(key)
    });

    let mut result = DeadlockResult {
        total_deadlocks: deadlocks.len(),
        critical_count: 0,
        high_count: 0,
        deadlocks,
    };
    for d in &result.deadlocks {
        match d.severity {
            Severity::Critical => result.critical_count += 1,
            Severity::High => result.high_count += 1,
            _ => {}
        }
    }
    result
}

/// A unit that might wait indefinitely on a requisite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitDeadlock {
    pub unit: String,
    pub waits_for: String,
    pub reason: String,
    pub severity: Severity,
}

/// Find `Requisite=` edges that can never (or may never) be satisfied:
/// targets that do not exist, or targets gated behind `Condition*`
/// directives that may fail.
pub fn detect_wait_deadlocks(graph: &Graph, units: &UnitSet) -> Vec<WaitDeadlock> {
    let mut deadlocks = Vec::new();

    for edge in graph.edges() {
        if edge.kind != EdgeType::Requisite {
            continue;
        }

        let Some(req_unit) = units.get(&edge.to) else {
            deadlocks.push(WaitDeadlock {
                unit: edge.from.clone(),
                waits_for: edge.to.clone(),
                reason: format!(
                    "{from} has Requisite={to} but {to} doesn't exist. {from} will \
                     never start.",
                    from = edge.from,
                    to = edge.to
                ),
                severity: Severity::Critical,
            });
            continue;
        };

        if let Some(section) = req_unit.section("Unit") {
            if let Some(cond_key) = section
                .directives
                .keys()
                .find(|key| key.starts_with("Condition"))
            {
                deadlocks.push(WaitDeadlock {
                    unit: edge.from.clone(),
                    waits_for: edge.to.clone(),
                    reason: format!(
                        "{from} has Requisite={to}, but {to} has {cond} conditions. \
                         If conditions fail, {from} cannot start.",
                        from = edge.from,
                        to = edge.to,
                        cond = cond_key
                    ),
                    severity: Severity::Medium,
                });
            }
        }
    }

    deadlocks
}

/// A job-level timeout that may expire while waiting on dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutDeadlock {
    pub unit: String,
    pub description: String,
    pub severity: Severity,
}

/// Find units whose `JobTimeoutSec=` budget is consumed by a long
/// dependency chain: the job timeout starts at transaction begin, not
/// when the unit begins activating.
pub fn detect_timeout_deadlocks(graph: &Graph, units: &UnitSet) -> Vec<TimeoutDeadlock> {
    let mut deadlocks = Vec::new();

    for (name, unit) in units {
        let job_timeout = unit.directive("Unit", "JobTimeoutSec");
        if job_timeout.is_empty() {
            continue;
        }

        let after_count = graph
            .edges_from(name)
            .iter()
            .filter(|e| e.kind == EdgeType::After)
            .count();
        let transitive = graph.transitive_dependencies(name);

        if transitive.len() >= 10 && after_count >= 3 {
            deadlocks.push(TimeoutDeadlock {
                unit: name.clone(),
                description: format!(
                    "{name} has JobTimeoutSec={job_timeout} but {deps} transitive \
                     dependencies ({after_count} direct After=). Job timeout starts \
                     at transaction begin, so waiting for dependencies consumes the \
                     timeout budget.",
                    deps = transitive.len()
                ),
                severity: Severity::Medium,
            });
        }
    }

    deadlocks
}
