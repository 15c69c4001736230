//! Restart storm detection: configurations where one failure can cause
//! cascading restarts through `BindsTo=` and restart policies.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, Graph};
use crate::types::{Severity, UnitSet};

/// An edge contributing to a restart storm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StormEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeType,
    pub reason: String,
}

/// A potential cascading restart scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartStorm {
    pub units: Vec<String>,
    /// Initial failure point.
    pub trigger: String,
    /// The cycle path, if cyclic.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cycle: Vec<String>,
    pub severity: Severity,
    pub description: String,
    pub evidence: Vec<StormEdge>,
}

/// All detected restart storms with severity counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartStormResult {
    pub storms: Vec<RestartStorm>,
    pub total_storms: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
}

/// Detect restart storm patterns.
///
/// 1. Mutual `BindsTo=` where at least one side restarts.
/// 2. Any dependency cycle containing `BindsTo=` plus a restarting member.
/// 3. `BindsTo=` onto an aggressively restarting unit from a unit with
///    no restart policy of its own.
pub fn detect_restart_storms(graph: &Graph, units: &UnitSet) -> RestartStormResult {
    // Restart policy per service unit (empty/`no` means none).
    let mut restart_policy: BTreeMap<&str, &str> = BTreeMap::new();
    for (name, unit) in units {
        if !unit.is_service() {
            continue;
        }
        let policy = unit.directive("Service", "Restart");
        if !policy.is_empty() && policy != "no" {
            restart_policy.insert(name.as_str(), policy);
        }
    }

    // BindsTo adjacency, both directions, deterministically ordered.
    let mut binds_to: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        if edge.kind == EdgeType::BindsTo {
            binds_to
                .entry(edge.from.as_str())
                .or_default()
                .insert(edge.to.as_str());
        }
    }

    let mut storms = Vec::new();

    // Pattern 1: mutual BindsTo with restart.
    let mut checked: BTreeSet<(String, String)> = BTreeSet::new();
    for (&unit_a, bound) in &binds_to {
        for &unit_b in bound {
            let mutual = binds_to
                .get(unit_b)
                .map(|set| set.contains(unit_a))
                .unwrap_or(false);
            if !mutual {
                continue;
            }
            let key = pair_key(unit_a, unit_b);
            if !checked.insert(key) {
                continue;
            }

            let restart_a = restart_policy.get(unit_a).copied();
            let restart_b = restart_policy.get(unit_b).copied();
            if restart_a.is_none() && restart_b.is_none() {
                continue;
            }

            let severity = if restart_a.is_some() && restart_b.is_some() {
                Severity::Critical
            } else {
                Severity::High
            };

            let mut evidence = vec![
                StormEdge {
                    from: unit_a.to_string(),
                    to: unit_b.to_string(),
                    kind: EdgeType::BindsTo,
                    reason: "BindsTo triggers stop on failure".to_string(),
                },
                StormEdge {
                    from: unit_b.to_string(),
                    to: unit_a.to_string(),
                    kind: EdgeType::BindsTo,
                    reason: "BindsTo triggers stop on failure".to_string(),
                },
            ];
            if let Some(policy) = restart_a {
                evidence.push(StormEdge {
                    from: unit_a.to_string(),
                    to: unit_a.to_string(),
                    kind: EdgeType::BindsTo,
                    reason: format!("Restart={policy} causes restart on failure"),
                });
            }
            if let Some(policy) = restart_b {
                evidence.push(StormEdge {
                    from: unit_b.to_string(),
                    to: unit_b.to_string(),
                    kind: EdgeType::BindsTo,
                    reason: format!("Restart={policy} causes restart on failure"),
                });
            }

            storms.push(RestartStorm {
                units: vec![unit_a.to_string(), unit_b.to_string()],
                trigger: unit_a.to_string(),
                cycle: vec![
                    unit_a.to_string(),
                    unit_b.to_string(),
                    unit_a.to_string(),
                ],
                severity,
                description: format!(
                    "Mutual BindsTo between {unit_a} and {unit_b} with Restart= \
                     enabled. If either fails, both will stop and attempt to \
                     restart, potentially causing a restart loop."
                ),
                evidence,
            });
        }
    }

    // Pattern 2: BindsTo cycle with restart.
    for scc in graph.find_cycles() {
        let has_binds_to = scc.edge_types.contains(&EdgeType::BindsTo);
        let restarting: Vec<&String> = scc
            .units
            .iter()
            .filter(|u| restart_policy.contains_key(u.as_str()))
            .collect();
        if !has_binds_to || restarting.is_empty() {
            continue;
        }

        // Mutual pairs are already covered by pattern 1.
        if scc.units.len() == 2 {
            let key = pair_key(&scc.units[0], &scc.units[1]);
            if checked.contains(&key) {
                continue;
            }
        }

        let severity = if restarting.len() > 1 {
            Severity::Critical
        } else {
            Severity::High
        };

        let evidence: Vec<StormEdge> = scc
            .edges
            .iter()
            .filter(|e| e.kind == EdgeType::BindsTo)
            .map(|e| StormEdge {
                from: e.from.clone(),
                to: e.to.clone(),
                kind: e.kind,
                reason: "BindsTo propagates stop".to_string(),
            })
            .collect();

        let mut cycle = scc.units.clone();
        cycle.push(scc.units[0].clone());

        storms.push(RestartStorm {
            trigger: scc.units[0].clone(),
            description: format!(
                "Dependency cycle involving {} units with BindsTo and Restart=. \
                 Units: {}. A failure in this cycle could cause cascading restarts.",
                scc.units.len(),
                scc.units.join(", ")
            ),
            units: scc.units,
            cycle,
            severity,
            evidence,
        });
    }

    // Pattern 3: BindsTo to an aggressively restarting unit.
    for (&unit_a, bound) in &binds_to {
        for &unit_b in bound {
            let Some(&policy) = restart_policy.get(unit_b) else {
                continue;
            };
            if !matches!(policy, "always" | "on-failure" | "on-abnormal") {
                continue;
            }
            // A restarting dependent is handled by the mutual check.
            if restart_policy.contains_key(unit_a) {
                continue;
            }

            storms.push(RestartStorm {
                units: vec![unit_a.to_string(), unit_b.to_string()],
                trigger: unit_b.to_string(),
                cycle: Vec::new(),
                severity: Severity::Medium,
                description: format!(
                    "{unit_a} has BindsTo={unit_b}, and {unit_b} has Restart={policy}. \
                     If {unit_b} fails and restarts, {unit_a} will be stopped but has \
                     no Restart= policy to automatically recover."
                ),
                evidence: vec![
                    StormEdge {
                        from: unit_a.to_string(),
                        to: unit_b.to_string(),
                        kind: EdgeType::BindsTo,
                        reason: format!("BindsTo causes stop when {unit_b} stops"),
                    },
                    StormEdge {
                        from: unit_b.to_string(),
                        to: unit_b.to_string(),
                        kind: EdgeType::BindsTo,
                        reason: format!("Restart={policy}"),
                    },
                ],
            });
        }
    }

    storms.sort_by(|a, b| {
        Reverse(a.severity)
            .cmp(&Reverse(b.severity))
            .then_with(|| a.units.cmp(&b.units))
    });

    let mut result = RestartStormResult {
        total_storms: storms.len(),
        critical_count: 0,
        high_count: 0,
        medium_count: 0,
        storms,
    };
    for storm in &result.storms {
        match storm.severity {
            Severity::Critical => result.critical_count += 1,
            Severity::High => result.high_count += 1,
            Severity::Medium => result.medium_count += 1,
            _ => {}
        }
    }
    result
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Restart configuration of a single unit, with its storm exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartBehavior {
    pub unit: String,
    pub restart_policy: String,
    pub restart_sec: String,
    pub start_limit_burst: String,
    pub start_limit_interval: String,
    pub bound_to: Vec<String>,
    pub bound_by: Vec<String>,
    pub storm_risk: Option<Severity>,
    pub description: String,
}

/// Detailed restart analysis for one unit. `None` if the unit is
/// unknown.
pub fn restart_behavior(unit_name: &str, graph: &Graph, units: &UnitSet) -> Option<RestartBehavior> {
    let unit = units.get(unit_name)?;

    let (restart_policy, restart_sec) = if unit.is_service() {
        (
            unit.directive("Service", "Restart").to_string(),
            unit.directive("Service", "RestartSec").to_string(),
        )
    } else {
        (String::new(), String::new())
    };

    let start_limit_burst = unit.directive("Unit", "StartLimitBurst").to_string();
    let mut start_limit_interval = unit.directive("Unit", "StartLimitIntervalSec").to_string();
    if start_limit_interval.is_empty() {
        start_limit_interval = unit.directive("Unit", "StartLimitInterval").to_string();
    }

    let bound_to: Vec<String> = graph
        .edges_from(unit_name)
        .iter()
        .filter(|e| e.kind == EdgeType::BindsTo)
        .map(|e| e.to.clone())
        .collect();
    let bound_by: Vec<String> = graph
        .edges_to(unit_name)
        .iter()
        .filter(|e| e.kind == EdgeType::BindsTo)
        .map(|e| e.from.clone())
        .collect();

    let restarts = !restart_policy.is_empty() && restart_policy != "no";
    let storm_risk = if restarts && !bound_to.is_empty() {
        if bound_by.is_empty() {
            Some(Severity::Medium)
        } else {
            Some(Severity::High)
        }
    } else {
        None
    };

    let description = if storm_risk.is_some() {
        let mut desc = format!("{unit_name} has Restart={restart_policy} with BindsTo dependencies. ");
        if !bound_to.is_empty() {
            desc.push_str(&format!("Bound to: {}. ", bound_to.join(", ")));
        }
        if !bound_by.is_empty() {
            desc.push_str(&format!("Bound by: {}. ", bound_by.join(", ")));
        }
        desc.push_str("This could lead to restart cascades.");
        desc
    } else {
        String::new()
    };

    Some(RestartBehavior {
        unit: unit_name.to_string(),
        restart_policy,
        restart_sec,
        start_limit_burst,
        start_limit_interval,
        bound_to,
        bound_by,
        storm_risk,
        description,
    })
}
