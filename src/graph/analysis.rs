//! Structural diagnostics over the dependency graph: dangling
//! references, ordering and binding inconsistencies, contradictory
//! dependencies, and aggregate statistics.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::Severity;

use super::{Edge, EdgeType, Graph};

/// A reference to a unit that was never parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DanglingRef {
    pub from: String,
    pub to: String,
    pub kind: EdgeType,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
}

impl DanglingRef {
    /// A missing hard dependency is worse than a missing ordering hint.
    pub fn severity(&self) -> Severity {
        match self.kind {
            EdgeType::Requires | EdgeType::Requisite | EdgeType::BindsTo => Severity::High,
            EdgeType::Wants => Severity::Medium,
            EdgeType::After | EdgeType::Before => Severity::Low,
            _ => Severity::Info,
        }
    }
}

/// Kind of ordering inconsistency between a pair of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingIssueKind {
    /// `After=` with no requirement edge: ordering is only honored if
    /// both units happen to start.
    AfterWithoutRequires,
    /// `Requires=`/`BindsTo=` with no `After=`: units start in
    /// parallel, which may race.
    RequiresWithoutAfter,
}

/// An ordering inconsistency between two units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingIssue {
    pub unit: String,
    pub related: String,
    pub kind: OrderingIssueKind,
    pub description: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
}

/// A `BindsTo=` without the `After=` that makes its stop semantics safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingIssue {
    pub unit: String,
    pub bound_to: String,
    pub description: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
}

/// A unit that both requires and conflicts with the same target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictIssue {
    pub unit: String,
    pub target: String,
    pub description: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
}

/// Aggregate graph statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_units: usize,
    pub total_edges: usize,
    /// Includes placeholder nodes for dangling references.
    pub total_nodes: usize,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    pub units_by_kind: BTreeMap<String, usize>,
    pub cycle_count: usize,
    pub dangling_count: usize,
}

impl Graph {
    /// Every edge whose target has no parsed unit record, sorted by
    /// severity, then (from, to).
    pub fn find_dangling_refs(&self) -> Vec<DanglingRef> {
        let mut dangling: Vec<DanglingRef> = self
            .raw_edges()
            .iter()
            .filter(|e| !self.has_unit(&e.to))
            .map(|e| DanglingRef {
                from: e.from.clone(),
                to: e.to.clone(),
                kind: e.kind,
                file: e.file.clone(),
                line: e.line,
            })
            .collect();

        dangling.sort_by(|a, b| {
            severity_rank(a.kind)
                .cmp(&severity_rank(b.kind))
                .then_with(|| a.from.cmp(&b.from))
                .then_with(|| a.to.cmp(&b.to))
        });
        dangling
    }

    /// Ordering inconsistencies for every (from, to) pair.
    pub fn find_ordering_issues(&self) -> Vec<OrderingIssue> {
        let pair_types = self.pair_type_index();
        let mut issues = Vec::new();

        for edge in self.raw_edges() {
            let types = &pair_types[&(edge.from.as_str(), edge.to.as_str())];

            match edge.kind {
                EdgeType::After => {
                    if !types.iter().any(|t| t.is_requirement()) {
                        issues.push(OrderingIssue {
                            unit: edge.from.clone(),
                            related: edge.to.clone(),
                            kind: OrderingIssueKind::AfterWithoutRequires,
                            description: format!(
                                "{} has After={} but no Requires= or Wants=. \
                                 Ordering is only honored if both units happen to start.",
                                edge.from, edge.to
                            ),
                            file: edge.file.clone(),
                            line: edge.line,
                        });
                    }
                }
                EdgeType::Requires | EdgeType::BindsTo => {
                    if !types.contains(&EdgeType::After) {
                        issues.push(OrderingIssue {
                            unit: edge.from.clone(),
                            related: edge.to.clone(),
                            kind: OrderingIssueKind::RequiresWithoutAfter,
                            description: format!(
                                "{} has {}={} but no After=. Units will start in \
                                 parallel, which may cause race conditions.",
                                edge.from, edge.kind, edge.to
                            ),
                            file: edge.file.clone(),
                            line: edge.line,
                        });
                    }
                }
                _ => {}
            }
        }

        issues.sort_by(|a, b| {
            a.unit
                .cmp(&b.unit)
                .then_with(|| a.related.cmp(&b.related))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        issues
    }

    /// `BindsTo=` edges lacking an `After=` between the same endpoints.
    pub fn find_binding_issues(&self) -> Vec<BindingIssue> {
        let pair_types = self.pair_type_index();
        let mut issues = Vec::new();

        for edge in self.raw_edges() {
            if edge.kind != EdgeType::BindsTo {
                continue;
            }
            let types = &pair_types[&(edge.from.as_str(), edge.to.as_str())];
            if !types.contains(&EdgeType::After) {
                issues.push(BindingIssue {
                    unit: edge.from.clone(),
                    bound_to: edge.to.clone(),
                    description: format!(
                        "{from} has BindsTo={to} without After=. If {to} stops or \
                         restarts, {from} will stop immediately, potentially \
                         violating stop ordering.",
                        from = edge.from,
                        to = edge.to
                    ),
                    file: edge.file.clone(),
                    line: edge.line,
                });
            }
        }

        issues.sort_by(|a, b| a.unit.cmp(&b.unit).then_with(|| a.bound_to.cmp(&b.bound_to)));
        issues
    }

    /// Pairs with both a requirement edge and a `Conflicts=` edge.
    pub fn find_conflicting_dependencies(&self) -> Vec<ConflictIssue> {
        let pair_types = self.pair_type_index();
        let mut issues = Vec::new();

        for ((from, to), types) in &pair_types {
            let has_requirement = types.iter().any(|t| t.is_requirement());
            let has_conflict = types.contains(&EdgeType::Conflicts);
            if !(has_requirement && has_conflict) {
                continue;
            }

            let conflict_edge = self
                .raw_edges()
                .iter()
                .find(|e| e.from == *from && e.to == *to && e.kind == EdgeType::Conflicts)
                .expect("conflict edge exists in pair index");

            issues.push(ConflictIssue {
                unit: (*from).to_string(),
                target: (*to).to_string(),
                description: format!(
                    "{from} has both a requirement (Requires/Wants/BindsTo) and \
                     Conflicts= to {to}. These are contradictory."
                ),
                file: conflict_edge.file.clone(),
                line: conflict_edge.line,
            });
        }

        issues.sort_by(|a, b| a.unit.cmp(&b.unit).then_with(|| a.target.cmp(&b.target)));
        issues
    }

    /// Aggregate statistics over the graph.
    pub fn stats(&self) -> GraphStats {
        let mut edges_by_type: BTreeMap<EdgeType, usize> = BTreeMap::new();
        for edge in self.raw_edges() {
            *edges_by_type.entry(edge.kind).or_insert(0) += 1;
        }

        let mut units_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for unit in self.units() {
            *units_by_kind.entry(unit.kind.to_string()).or_insert(0) += 1;
        }

        GraphStats {
            total_units: self.unit_count(),
            total_edges: self.edge_count(),
            total_nodes: self.node_count(),
            edges_by_type,
            units_by_kind,
            cycle_count: self.find_cycles().len(),
            dangling_count: self.find_dangling_refs().len(),
        }
    }

    /// (from, to) pair to the set of edge types between them.
    fn pair_type_index(&self) -> FxHashMap<(&str, &str), Vec<EdgeType>> {
        let mut index: FxHashMap<(&str, &str), Vec<EdgeType>> = FxHashMap::default();
        for edge in self.raw_edges() {
            index
                .entry((edge.from.as_str(), edge.to.as_str()))
                .or_default()
                .push(edge.kind);
        }
        index
    }
}

fn severity_rank(kind: EdgeType) -> usize {
    match kind {
        EdgeType::Requires | EdgeType::Requisite | EdgeType::BindsTo => 0,
        EdgeType::Wants => 1,
        EdgeType::After | EdgeType::Before => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::parser::parse_unit_str;
    use crate::types::UnitSet;

    fn units_from(files: &[(&str, &str)]) -> UnitSet {
        let mut set = UnitSet::new();
        for (name, content) in files {
            let unit = parse_unit_str(&format!("/etc/systemd/system/{name}"), content);
            set.insert(unit.name.clone(), unit);
        }
        set
    }

    #[test]
    fn test_dangling_requires_is_high() {
        let units = units_from(&[(
            "app.service",
            "[Unit]\nRequires=missing-db.service\n[Service]\nExecStart=/bin/app\n",
        )]);
        let g = build_graph(&units);
        let dangling = g.find_dangling_refs();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].from, "app.service");
        assert_eq!(dangling[0].to, "missing-db.service");
        assert_eq!(dangling[0].kind, EdgeType::Requires);
        assert_eq!(dangling[0].severity(), Severity::High);
    }

    #[test]
    fn test_dangling_severity_by_edge_type() {
        let units = units_from(&[(
            "app.service",
            "[Unit]\nWants=a.service\nAfter=b.service\nPartOf=c.service\n",
        )]);
        let g = build_graph(&units);
        let dangling = g.find_dangling_refs();
        assert_eq!(dangling.len(), 3);
        // Sorted by severity rank: Wants (medium), After (low), PartOf (info).
        assert_eq!(dangling[0].kind, EdgeType::Wants);
        assert_eq!(dangling[0].severity(), Severity::Medium);
        assert_eq!(dangling[1].kind, EdgeType::After);
        assert_eq!(dangling[1].severity(), Severity::Low);
        assert_eq!(dangling[2].severity(), Severity::Info);
    }

    #[test]
    fn test_ordering_issues_both_kinds() {
        let units = units_from(&[
            ("web.service", "[Unit]\nAfter=database.service\n"),
            ("app.service", "[Unit]\nRequires=cache.service\n"),
            ("database.service", "[Service]\nExecStart=/bin/db\n"),
            ("cache.service", "[Service]\nExecStart=/bin/cache\n"),
        ]);
        let g = build_graph(&units);
        let issues = g.find_ordering_issues();
        assert_eq!(issues.len(), 2);

        let after_issue = issues
            .iter()
            .find(|i| i.kind == OrderingIssueKind::AfterWithoutRequires)
            .unwrap();
        assert_eq!(after_issue.unit, "web.service");
        assert_eq!(after_issue.related, "database.service");

        let requires_issue = issues
            .iter()
            .find(|i| i.kind == OrderingIssueKind::RequiresWithoutAfter)
            .unwrap();
        assert_eq!(requires_issue.unit, "app.service");
        assert_eq!(requires_issue.related, "cache.service");
    }

    #[test]
    fn test_paired_after_and_requires_is_clean() {
        let units = units_from(&[
            (
                "web.service",
                "[Unit]\nRequires=db.service\nAfter=db.service\n",
            ),
            ("db.service", "[Service]\nExecStart=/bin/db\n"),
        ]);
        let g = build_graph(&units);
        assert!(g.find_ordering_issues().is_empty());
    }

    #[test]
    fn test_binding_issue() {
        let units = units_from(&[
            ("a.service", "[Unit]\nBindsTo=b.service\n"),
            ("b.service", "[Service]\nExecStart=/bin/b\n"),
        ]);
        let g = build_graph(&units);
        let issues = g.find_binding_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].unit, "a.service");
        assert_eq!(issues[0].bound_to, "b.service");
    }

    #[test]
    fn test_conflicting_dependencies() {
        let units = units_from(&[
            (
                "a.service",
                "[Unit]\nRequires=b.service\nConflicts=b.service\n",
            ),
            ("b.service", "[Service]\nExecStart=/bin/b\n"),
        ]);
        let g = build_graph(&units);
        let issues = g.find_conflicting_dependencies();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].unit, "a.service");
        assert_eq!(issues[0].target, "b.service");
    }

    #[test]
    fn test_stats() {
        let units = units_from(&[
            (
                "a.service",
                "[Unit]\nRequires=b.service\nAfter=b.service\nWants=ghost.service\n",
            ),
            ("b.service", "[Service]\nExecStart=/bin/b\n"),
            ("c.timer", "[Timer]\nOnCalendar=daily\n"),
        ]);
        let g = build_graph(&units);
        let stats = g.stats();
        assert_eq!(stats.total_units, 3);
        // a->b Requires, a->b After, a->ghost Wants, c.timer->c.service trigger.
        assert_eq!(stats.total_edges, 4);
        // Nodes include ghost.service and c.service placeholders.
        assert_eq!(stats.total_nodes, 5);
        assert_eq!(stats.edges_by_type[&EdgeType::Requires], 1);
        assert_eq!(stats.units_by_kind["service"], 2);
        assert_eq!(stats.units_by_kind["timer"], 1);
        assert_eq!(stats.cycle_count, 0);
        assert_eq!(stats.dangling_count, 2);
    }
}
