//! Graphviz DOT export of the dependency graph.

use rustc_hash::FxHashSet;

use super::{EdgeType, Graph};

/// Options for DOT rendering.
#[derive(Debug, Clone)]
pub struct DotOptions {
    pub title: String,
    /// Only include these edge types; `None` means all.
    pub include: Option<Vec<EdgeType>>,
    /// Render placeholder nodes for missing units.
    pub show_missing: bool,
    /// Fill units that are members of a cycle.
    pub highlight_cycles: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            title: "Unit dependencies".to_string(),
            include: None,
            show_missing: true,
            highlight_cycles: true,
        }
    }
}

/// Render the graph in Graphviz DOT format.
pub fn to_dot(graph: &Graph, opts: &DotOptions) -> String {
    let mut out = String::new();
    out.push_str("digraph units {\n");
    out.push_str(&format!("  label=\"{}\";\n", opts.title));
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=filled, fillcolor=white, fontname=\"monospace\"];\n");
    out.push('\n');

    let cycle_members: FxHashSet<String> = if opts.highlight_cycles {
        graph
            .find_cycles()
            .into_iter()
            .flat_map(|scc| scc.units)
            .collect()
    } else {
        FxHashSet::default()
    };

    let missing: FxHashSet<&str> = graph
        .node_names()
        .into_iter()
        .filter(|name| !graph.has_unit(name))
        .collect();

    for name in graph.node_names() {
        if missing.contains(name) {
            if opts.show_missing {
                out.push_str(&format!(
                    "  \"{name}\" [style=\"filled,dashed\", fillcolor=\"#ffdddd\", color=red];\n"
                ));
            }
        } else if cycle_members.contains(name) {
            out.push_str(&format!("  \"{name}\" [fillcolor=\"#ffcc66\"];\n"));
        } else {
            out.push_str(&format!("  \"{name}\";\n"));
        }
    }

    out.push('\n');

    for edge in graph.edges() {
        if let Some(include) = &opts.include {
            if !include.contains(&edge.kind) {
                continue;
            }
        }
        if !opts.show_missing && missing.contains(edge.to.as_str()) {
            continue;
        }
        let (color, style) = edge_style(edge.kind);
        out.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\", color=\"{}\", style={}];\n",
            edge.from, edge.to, edge.kind, color, style
        ));
    }

    out.push_str("}\n");
    out
}

fn edge_style(kind: EdgeType) -> (&'static str, &'static str) {
    match kind {
        EdgeType::Requires | EdgeType::Requisite => ("black", "solid"),
        EdgeType::BindsTo => ("red", "solid"),
        EdgeType::Wants => ("gray40", "solid"),
        EdgeType::PartOf => ("purple", "solid"),
        EdgeType::Conflicts => ("red", "dashed"),
        EdgeType::After | EdgeType::Before => ("blue", "dotted"),
        EdgeType::TriggeredBy => ("darkgreen", "dashed"),
        EdgeType::PropagatesReloadTo | EdgeType::ReloadPropagatedFrom => ("gray70", "dotted"),
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
    fn test_dot_structure() {
        let units = units_from(&[
            ("a.service", "[Unit]\nRequires=b.service\n"),
            ("b.service", "[Service]\nExecStart=/bin/b\n"),
        ]);
        let g = build_graph(&units);
        let dot = to_dot(&g, &DotOptions::default());
        assert!(dot.starts_with("digraph units {"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("\"a.service\" -> \"b.service\" [label=\"Requires\""));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_dot_missing_units_dashed() {
        let units = units_from(&[("a.service", "[Unit]\nRequires=ghost.service\n")]);
        let g = build_graph(&units);
        let dot = to_dot(&g, &DotOptions::default());
        assert!(dot.contains("\"ghost.service\" [style=\"filled,dashed\""));
    }

    #[test]
    fn test_dot_cycle_highlight() {
        let units = units_from(&[
            ("a.service", "[Unit]\nRequires=b.service\n"),
            ("b.service", "[Unit]\nRequires=a.service\n"),
        ]);
        let g = build_graph(&units);
        let dot = to_dot(&g, &DotOptions::default());
        assert!(dot.contains("\"a.service\" [fillcolor=\"#ffcc66\"]"));
    }

    #[test]
    fn test_dot_edge_filter() {
        let units = units_from(&[(
            "a.service",
            "[Unit]\nRequires=b.service\nAfter=b.service\n",
        )]);
        let g = build_graph(&units);
        let opts = DotOptions {
            include: Some(vec![EdgeType::Requires]),
            ..Default::default()
        };
        let dot = to_dot(&g, &opts);
        assert!(dot.contains("label=\"Requires\""));
        assert!(!dot.contains("label=\"After\""));
    }
}
