//! Typed dependency multigraph over unit names.
//!
//! Nodes are unit names; units that are referenced but never defined are
//! kept as placeholder nodes so dangling references stay visible. Edges
//! are typed by the relationship that produced them, and parallel edges
//! of different types between the same endpoints are preserved.

mod analysis;
mod builder;
mod dot;
mod reachability;
mod tarjan;

pub use analysis::{
    BindingIssue, ConflictIssue, DanglingRef, GraphStats, OrderingIssue, OrderingIssueKind,
};
pub use builder::{build_graph, path_service, socket_service, timer_service, GraphBuilder};
pub use dot::{DotOptions, to_dot};
pub use reachability::{Direction, ReachabilityResult};
pub use tarjan::Scc;

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::UnitFile;

/// Kind of relationship between two units. The ordinal order is the
/// canonical sort order for deterministic output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EdgeType {
    Requires,
    Requisite,
    Wants,
    BindsTo,
    PartOf,
    Conflicts,
    After,
    Before,
    TriggeredBy,
    PropagatesReloadTo,
    ReloadPropagatedFrom,
}

/// `[Unit]` directives that translate directly into edges.
pub const DIRECTIVE_EDGES: &[(&str, EdgeType)] = &[
    ("Requires", EdgeType::Requires),
    ("Requisite", EdgeType::Requisite),
    ("Wants", EdgeType::Wants),
    ("BindsTo", EdgeType::BindsTo),
    ("PartOf", EdgeType::PartOf),
    ("Conflicts", EdgeType::Conflicts),
    ("After", EdgeType::After),
    ("Before", EdgeType::Before),
    ("PropagatesReloadTo", EdgeType::PropagatesReloadTo),
    ("ReloadPropagatedFrom", EdgeType::ReloadPropagatedFrom),
];

impl EdgeType {
    /// Requirement edges pull the target into the transaction.
    pub fn is_requirement(&self) -> bool {
        matches!(
            self,
            EdgeType::Requires | EdgeType::Requisite | EdgeType::Wants | EdgeType::BindsTo
        )
    }

    /// Ordering edges only constrain start/stop order.
    pub fn is_ordering(&self) -> bool {
        matches!(self, EdgeType::After | EdgeType::Before)
    }

    /// Whether a start failure of the target propagates to the source.
    pub fn propagates_start_failure(&self) -> bool {
        matches!(
            self,
            EdgeType::Requires | EdgeType::Requisite | EdgeType::BindsTo
        )
    }

    /// Whether a stop of the target propagates to the source.
    pub fn propagates_stop(&self) -> bool {
        matches!(self, EdgeType::BindsTo | EdgeType::PartOf)
    }

    /// Requisite fails immediately instead of queueing a start job.
    pub fn is_immediate(&self) -> bool {
        matches!(self, EdgeType::Requisite | EdgeType::Conflicts)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Requires => "Requires",
            EdgeType::Requisite => "Requisite",
            EdgeType::Wants => "Wants",
            EdgeType::BindsTo => "BindsTo",
            EdgeType::PartOf => "PartOf",
            EdgeType::Conflicts => "Conflicts",
            EdgeType::After => "After",
            EdgeType::Before => "Before",
            EdgeType::TriggeredBy => "TriggeredBy",
            EdgeType::PropagatesReloadTo => "PropagatesReloadTo",
            EdgeType::ReloadPropagatedFrom => "ReloadPropagatedFrom",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, directed edge between two units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeType,
    /// Path of the unit file that produced this edge.
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
    /// True for auto-derived edges (socket/timer/path activation).
    #[serde(default)]
    pub implicit: bool,
}

impl Edge {
    fn sort_key(&self) -> (&str, &str, EdgeType, Option<usize>) {
        (&self.from, &self.to, self.kind, self.line)
    }
}

/// The dependency graph. Immutable once built.
#[derive(Debug, Default)]
pub struct Graph {
    /// Unit name to record; `None` marks a placeholder for a unit that
    /// was referenced but never parsed.
    units: BTreeMap<String, Option<UnitFile>>,
    /// Dense node id assignment, append-only.
    node_ids: FxHashMap<String, usize>,
    node_names: Vec<String>,
    edges: Vec<Edge>,
    outgoing: FxHashMap<String, Vec<usize>>,
    incoming: FxHashMap<String, Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parsed unit as a node. Replaces a placeholder if one
    /// exists for the same name.
    pub fn add_unit(&mut self, unit: UnitFile) {
        self.ensure_node(&unit.name);
        self.units.insert(unit.name.clone(), Some(unit));
    }

    /// Add an edge, creating placeholder nodes for unknown endpoints.
    /// The outgoing/incoming indices stay consistent with `edges`.
    pub fn add_edge(&mut self, edge: Edge) {
        self.ensure_node(&edge.from);
        self.ensure_node(&edge.to);
        let idx = self.edges.len();
        self.outgoing
            .entry(edge.from.clone())
            .or_default()
            .push(idx);
        self.incoming.entry(edge.to.clone()).or_default().push(idx);
        self.edges.push(edge);
    }

    fn ensure_node(&mut self, name: &str) {
        if !self.node_ids.contains_key(name) {
            let id = self.node_names.len();
            self.node_ids.insert(name.to_string(), id);
            self.node_names.push(name.to_string());
        }
        self.units.entry(name.to_string()).or_insert(None);
    }

    /// Parsed units, sorted by name.
    pub fn units(&self) -> Vec<&UnitFile> {
        self.units.values().filter_map(|u| u.as_ref()).collect()
    }

    /// The record for a unit, or `None` for placeholders and unknowns.
    pub fn unit(&self, name: &str) -> Option<&UnitFile> {
        self.units.get(name).and_then(|u| u.as_ref())
    }

    /// Whether a parsed unit record exists for this name.
    pub fn has_unit(&self, name: &str) -> bool {
        self.unit(name).is_some()
    }

    /// All node names (parsed units and placeholders), sorted.
    pub fn node_names(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    pub fn node_id(&self, name: &str) -> Option<usize> {
        self.node_ids.get(name).copied()
    }

    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.values().filter(|u| u.is_some()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn raw_edges(&self) -> &[Edge] {
        &self.edges
    }

    pub(crate) fn name_of(&self, id: usize) -> &str {
        &self.node_names[id]
    }

    /// All edges, sorted by (from, to, type, line).
    pub fn edges(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().collect();
        edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        edges
    }

    /// Outgoing edges of a unit, sorted by (to, type, line).
    pub fn edges_from(&self, name: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .outgoing
            .get(name)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default();
        edges.sort_by(|a, b| {
            (&a.to, a.kind, a.line).cmp(&(&b.to, b.kind, b.line))
        });
        edges
    }

    /// Incoming edges of a unit, sorted by (from, type, line).
    pub fn edges_to(&self, name: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .incoming
            .get(name)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default();
        edges.sort_by(|a, b| {
            (&a.from, a.kind, a.line).cmp(&(&b.from, b.kind, b.line))
        });
        edges
    }
}
