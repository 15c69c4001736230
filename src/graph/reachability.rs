//! Reachability analysis: which units can ever be pulled in by a target.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::{EdgeType, Graph};

/// Traversal direction for [`Graph::reachable_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow outgoing edges: what does this unit depend on?
    Forward,
    /// Follow incoming edges: what depends on this unit?
    Backward,
}

/// Units partitioned by reachability from the target roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityResult {
    /// Units reachable from some target, sorted.
    pub reachable: Vec<String>,
    /// Units never pulled in by any target (dead or orphaned), sorted.
    pub unreachable: Vec<String>,
    /// The `.target` roots used, sorted.
    pub targets: Vec<String>,
}

impl Graph {
    /// Walk from every target in both directions along requirement and
    /// trigger edges. Following incoming edges captures `WantedBy=`/
    /// `RequiredBy=` reverse semantics uniformly; following outgoing
    /// edges captures what a target pulls in.
    pub fn analyze_reachability(&self) -> ReachabilityResult {
        let mut targets: Vec<String> = Vec::new();
        for unit in self.units() {
            if unit.kind == crate::types::UnitKind::Target {
                targets.push(unit.name.clone());
            }
        }
        // Placeholder nodes that are clearly targets count as roots too.
        for name in self.node_names() {
            if name.ends_with(".target") && !targets.iter().any(|t| t == name) {
                targets.push(name.to_string());
            }
        }
        targets.sort();

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for t in &targets {
            if visited.insert(t.as_str()) {
                queue.push_back(t.as_str());
            }
        }

        while let Some(current) = queue.pop_front() {
            for edge in self.edges_to(current) {
                if follows(edge.kind) && visited.insert(edge.from.as_str()) {
                    queue.push_back(&edge.from);
                }
            }
            for edge in self.edges_from(current) {
                if follows(edge.kind) && visited.insert(edge.to.as_str()) {
                    queue.push_back(&edge.to);
                }
            }
        }

        let mut reachable = Vec::new();
        let mut unreachable = Vec::new();
        for unit in self.units() {
            if visited.contains(unit.name.as_str()) {
                reachable.push(unit.name.clone());
            } else {
                unreachable.push(unit.name.clone());
            }
        }

        ReachabilityResult {
            reachable,
            unreachable,
            targets,
        }
    }

    /// Whether a unit is reachable from any target.
    pub fn is_reachable(&self, unit: &str) -> bool {
        self.analyze_reachability()
            .reachable
            .iter()
            .any(|u| u == unit)
    }

    /// Units not reachable from any target.
    pub fn unreachable_units(&self) -> Vec<String> {
        self.analyze_reachability().unreachable
    }

    /// All units reachable from `unit` following edges of any type in
    /// the given direction. The starting unit is excluded.
    pub fn reachable_from(&self, unit: &str, direction: Direction) -> Vec<String> {
        let mut visited: FxHashSet<String> = FxHashSet::default();
        visited.insert(unit.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(unit.to_string());

        while let Some(current) = queue.pop_front() {
            let next: Vec<String> = match direction {
                Direction::Forward => self
                    .edges_from(&current)
                    .iter()
                    .map(|e| e.to.clone())
                    .collect(),
                Direction::Backward => self
                    .edges_to(&current)
                    .iter()
                    .map(|e| e.from.clone())
                    .collect(),
            };
            for target in next {
                if !visited.contains(&target) {
                    visited.insert(target.clone());
                    queue.push_back(target);
                }
            }
        }

        visited.remove(unit);
        let mut result: Vec<String> = visited.into_iter().collect();
        result.sort();
        result
    }

    /// Everything this unit transitively depends on.
    pub fn transitive_dependencies(&self, unit: &str) -> Vec<String> {
        self.reachable_from(unit, Direction::Forward)
    }

    /// Everything that transitively depends on this unit.
    pub fn transitive_dependents(&self, unit: &str) -> Vec<String> {
        self.reachable_from(unit, Direction::Backward)
    }

    /// BFS-shortest forward path between two units, endpoints included.
    /// `None` if unreachable.
    pub fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut parent: rustc_hash::FxHashMap<String, String> = Default::default();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(from.to_string());
        queue.push_back(from.to_string());

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to.to_string()];
                while path.last().map(String::as_str) != Some(from) {
                    let prev = parent[path.last().expect("path is non-empty")].clone();
                    path.push(prev);
                }
                path.reverse();
                return Some(path);
            }
            for edge in self.edges_from(&current) {
                if !visited.contains(&edge.to) {
                    visited.insert(edge.to.clone());
                    parent.insert(edge.to.clone(), current.clone());
                    queue.push_back(edge.to.clone());
                }
            }
        }

        None
    }
}

fn follows(kind: EdgeType) -> bool {
    kind.is_requirement() || kind == EdgeType::TriggeredBy
}
