//! Critical-path computation over the `After=` subgraph.
//!
//! For every unit, the longest chain of cumulative start timeouts back
//! through its `After=` predecessors. Depth-first with memoization; a
//! per-recursion visited set breaks cycles, which contribute an empty
//! path (cycles are reported separately).

use std::collections::BTreeMap;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, Graph};

use super::{TimeoutConfig, DEFAULT_TIMEOUT_START};

/// One unit on a critical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub unit: String,
    /// The unit's own start timeout.
    pub timeout: Duration,
    /// Running total up to and including this unit.
    pub cumulative: Duration,
}

/// The longest startup chain reaching a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriticalPath {
    pub unit: String,
    /// Sum of timeouts along the path.
    pub total_time: Duration,
    /// Units in start order; the unit itself is last.
    pub path: Vec<PathNode>,
    /// The unit on the path contributing the most time.
    pub bottleneck: String,
}

impl CriticalPath {
    /// `a -> b -> c` rendering of the path.
    pub fn description(&self) -> String {
        if self.path.is_empty() {
            return format!("{} (no dependencies)", self.unit);
        }
        self.path
            .iter()
            .map(|n| n.unit.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Critical paths for every unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriticalPathResult {
    pub paths: BTreeMap<String, CriticalPath>,
    pub longest_path: CriticalPath,
    /// Units ranked by how often they are a bottleneck.
    pub bottleneck_units: Vec<String>,
}

impl CriticalPathResult {
    /// Paths whose total exceeds a threshold, longest first.
    pub fn paths_exceeding(&self, threshold: Duration) -> Vec<&CriticalPath> {
        let mut paths: Vec<&CriticalPath> = self
            .paths
            .values()
            .filter(|p| p.total_time > threshold)
            .collect();
        paths.sort_by(|a, b| b.total_time.cmp(&a.total_time).then_with(|| a.unit.cmp(&b.unit)));
        paths
    }

    pub fn path_for(&self, unit: &str) -> Option<&CriticalPath> {
        self.paths.get(unit)
    }
}

/// Compute the worst-case startup chain for every unit.
pub fn compute_critical_paths(
    graph: &Graph,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> CriticalPathResult {
    // What must start before each unit, in deterministic order.
    let mut after_deps: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        if edge.kind == EdgeType::After {
            after_deps
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
        }
    }
    for deps in after_deps.values_mut() {
        deps.sort();
        deps.dedup();
    }

    let mut memo: FxHashMap<String, CriticalPath> = FxHashMap::default();

    let mut result = CriticalPathResult::default();
    for unit in graph.units() {
        let mut visited = FxHashSet::default();
        let path = compute(
            &unit.name,
            &after_deps,
            timeouts,
            &mut memo,
            &mut visited,
        );
        if path.total_time > result.longest_path.total_time {
            result.longest_path = path.clone();
        }
        result.paths.insert(unit.name.clone(), path);
    }

    // Bottleneck frequency ranking: count descending, then name.
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for path in result.paths.values() {
        if !path.bottleneck.is_empty() {
            *counts.entry(path.bottleneck.as_str()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    result.bottleneck_units = ranked.into_iter().map(|(unit, _)| unit.to_string()).collect();

    result
}

fn compute(
    unit: &str,
    after_deps: &BTreeMap<&str, Vec<&str>>,
    timeouts: &BTreeMap<String, TimeoutConfig>,
    memo: &mut FxHashMap<String, CriticalPath>,
    visited: &mut FxHashSet<String>,
) -> CriticalPath {
    if let Some(path) = memo.get(unit) {
        return path.clone();
    }

    // Cycle member: contributes nothing.
    if !visited.insert(unit.to_string()) {
        return CriticalPath {
            unit: unit.to_string(),
            ..Default::default()
        };
    }

    let timeout = timeouts
        .get(unit)
        .map(|tc| tc.timeout_start_sec)
        .unwrap_or(DEFAULT_TIMEOUT_START);

    let mut longest_dep = CriticalPath::default();
    if let Some(deps) = after_deps.get(unit) {
        for dep in deps {
            let dep_path = compute(dep, after_deps, timeouts, memo, visited);
            if dep_path.total_time > longest_dep.total_time {
                longest_dep = dep_path;
            }
        }
    }

    visited.remove(unit);

    let total = longest_dep.total_time + timeout;
    let mut path_nodes = longest_dep.path;
    path_nodes.push(PathNode {
        unit: unit.to_string(),
        timeout,
        cumulative: total,
    });

    let bottleneck = path_nodes
        .iter()
        .max_by_key(|n| n.timeout)
        .map(|n| n.unit.clone())
        .unwrap_or_default();

    let path = CriticalPath {
        unit: unit.to_string(),
        total_time: total,
        path: path_nodes,
        bottleneck,
    };
    memo.insert(unit.to_string(), path.clone());
    path
}

/// Units on the critical path to the common boot targets.
pub fn boot_critical_units(
    graph: &Graph,
    timeouts: &BTreeMap<String, TimeoutConfig>,
) -> Vec<String> {
    let paths = compute_critical_paths(graph, timeouts);

    let boot_targets = [
        "default.target",
        "multi-user.target",
        "graphical.target",
        "basic.target",
    ];

    let mut critical: std::collections::BTreeSet<String> = Default::default();
    for target in boot_targets {
        if let Some(path) = paths.paths.get(target) {
            for node in &path.path {
                critical.insert(node.unit.clone());
            }
        }
    }
    critical.into_iter().collect()
}
