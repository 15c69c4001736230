//! Cycle detection via Tarjan's strongly connected components.

use serde::{Deserialize, Serialize};

use crate::types::Severity;

use super::{Edge, EdgeType, Graph};

/// A strongly connected component. A cycle when it has more than one
/// member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scc {
    /// Member unit names, sorted.
    pub units: Vec<String>,
    /// Every edge whose endpoints both lie in the component.
    pub edges: Vec<Edge>,
    /// Distinct edge types among those edges, sorted by ordinal.
    pub edge_types: Vec<EdgeType>,
}

impl Scc {
    /// Cycles held together by hard requirements are the most severe.
    pub fn severity(&self) -> Severity {
        if self.edge_types.iter().any(|et| {
            matches!(
                et,
                EdgeType::Requires | EdgeType::BindsTo | EdgeType::Requisite
            )
        }) {
            return Severity::Critical;
        }
        if self.edge_types.contains(&EdgeType::Wants) {
            return Severity::High;
        }
        Severity::Medium
    }

    /// Human-readable cycle description, e.g. `a -> b -> c -> a`.
    pub fn description(&self) -> String {
        if self.units.is_empty() {
            return "empty cycle".to_string();
        }
        let mut desc = self.units.join(" -> ");
        desc.push_str(" -> ");
        desc.push_str(&self.units[0]);
        desc
    }
}

impl Graph {
    /// All non-trivial SCCs (cycles), sorted by first member name.
    pub fn find_cycles(&self) -> Vec<Scc> {
        let n = self.node_count();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for e in self.raw_edges() {
            let from = self.node_id(&e.from).expect("edge endpoints are nodes");
            let to = self.node_id(&e.to).expect("edge endpoints are nodes");
            adj[from].push(to);
        }

        let components = tarjan_scc(&adj);

        let mut cycles = Vec::new();
        for component in components {
            if component.len() <= 1 {
                continue;
            }

            let mut units: Vec<String> = component
                .iter()
                .map(|&id| self.name_of(id).to_string())
                .collect();
            units.sort();

            let member: rustc_hash::FxHashSet<&str> =
                units.iter().map(String::as_str).collect();

            let mut edges: Vec<Edge> = self
                .raw_edges()
                .iter()
                .filter(|e| member.contains(e.from.as_str()) && member.contains(e.to.as_str()))
                .cloned()
                .collect();
            edges.sort_by(|a, b| {
                (&a.from, &a.to, a.kind, a.line).cmp(&(&b.from, &b.to, b.kind, b.line))
            });

            let mut edge_types: Vec<EdgeType> = edges.iter().map(|e| e.kind).collect();
            edge_types.sort();
            edge_types.dedup();

            cycles.push(Scc {
                units,
                edges,
                edge_types,
            });
        }

        cycles.sort_by(|a, b| a.units.first().cmp(&b.units.first()));
        cycles
    }

    /// True iff any SCC has more than one member.
    pub fn has_cycles(&self) -> bool {
        !self.find_cycles().is_empty()
    }

    /// Cycles that contain a specific unit.
    pub fn cycles_involving(&self, unit: &str) -> Vec<Scc> {
        self.find_cycles()
            .into_iter()
            .filter(|scc| scc.units.iter().any(|u| u == unit))
            .collect()
    }
}

/// Iterative Tarjan SCC over a dense adjacency list. O(V+E).
fn tarjan_scc(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink: Vec<usize> = vec![0; n];
    let mut on_stack: Vec<bool> = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components: Vec<Vec<usize>> = Vec::new();

    // Explicit call stack of (node, next child offset) to avoid deep
    // recursion on long chains.
    for start in 0..n {
        if index[start].is_some() {
            continue;
        }

        let mut call_stack: Vec<(usize, usize)> = vec![(start, 0)];
        while !call_stack.is_empty() {
            let (v, child) = *call_stack.last().expect("loop guard");
            if child == 0 {
                index[v] = Some(next_index);
                lowlink[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }

            if child < adj[v].len() {
                let w = adj[v][child];
                call_stack.last_mut().expect("loop guard").1 += 1;
                match index[w] {
                    None => call_stack.push((w, 0)),
                    Some(w_index) => {
                        if on_stack[w] {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                    }
                }
                continue;
            }

            // All children visited: close v.
            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v].expect("v was indexed") {
                let mut component = Vec::new();
                loop {
                    let w = stack.pop().expect("stack holds the component");
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}
