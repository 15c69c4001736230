//! Graph construction from a set of parsed units.
//!
//! Units are processed in lexicographic order so edge insertion order
//! (and therefore node id assignment) is deterministic.

use crate::types::{split_value, UnitFile, UnitKind, UnitSet};

use super::{Edge, EdgeType, Graph, DIRECTIVE_EDGES};

/// Builds a [`Graph`] from parsed unit files.
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
        }
    }

    /// Construct the dependency graph from a unit set.
    pub fn build_from_units(mut self, units: &UnitSet) -> Graph {
        // First pass: all units become nodes. UnitSet is a BTreeMap, so
        // iteration is already lexicographic.
        for unit in units.values() {
            self.graph.add_unit(unit.clone());
        }

        // Second pass: extract edges.
        for unit in units.values() {
            self.extract_edges(unit);
        }

        self.graph
    }

    fn extract_edges(&mut self, unit: &UnitFile) {
        // [Unit] section dependencies.
        for &(directive, kind) in DIRECTIVE_EDGES {
            for d in unit.directives("Unit", directive) {
                for target in split_value(&d.value) {
                    self.graph.add_edge(Edge {
                        from: unit.name.clone(),
                        to: target.to_string(),
                        kind,
                        file: unit.path.clone(),
                        line: Some(d.line),
                        implicit: false,
                    });
                }
            }
        }

        // [Install] section: reverse edges.
        for d in unit.directives("Install", "WantedBy") {
            for target in split_value(&d.value) {
                self.graph.add_edge(Edge {
                    from: target.to_string(),
                    to: unit.name.clone(),
                    kind: EdgeType::Wants,
                    file: unit.path.clone(),
                    line: Some(d.line),
                    implicit: false,
                });
            }
        }
        for d in unit.directives("Install", "RequiredBy") {
            for target in split_value(&d.value) {
                self.graph.add_edge(Edge {
                    from: target.to_string(),
                    to: unit.name.clone(),
                    kind: EdgeType::Requires,
                    file: unit.path.clone(),
                    line: Some(d.line),
                    implicit: false,
                });
            }
        }

        // Implicit activation edges.
        match unit.kind {
            UnitKind::Socket => {
                let service = socket_service(unit);
                let line = first_line(unit, "Socket", &["ListenStream", "ListenDatagram"]);
                self.add_trigger_edge(unit, service, line);
            }
            UnitKind::Timer => {
                let service = timer_service(unit);
                let line = first_line(unit, "Timer", &["OnCalendar", "OnBootSec"]);
                self.add_trigger_edge(unit, service, line);
            }
            UnitKind::Path => {
                let service = path_service(unit);
                let line = first_line(
                    unit,
                    "Path",
                    &[
                        "PathExists",
                        "PathExistsGlob",
                        "PathChanged",
                        "PathModified",
                        "DirectoryNotEmpty",
                    ],
                );
                self.add_trigger_edge(unit, service, line);
            }
            _ => {}
        }
    }

    fn add_trigger_edge(&mut self, unit: &UnitFile, service: String, line: Option<usize>) {
        if service.is_empty() {
            return;
        }
        self.graph.add_edge(Edge {
            from: unit.name.clone(),
            to: service,
            kind: EdgeType::TriggeredBy,
            file: unit.path.clone(),
            line,
            implicit: true,
        });
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a graph from units. Convenience wrapper.
pub fn build_graph(units: &UnitSet) -> Graph {
    GraphBuilder::new().build_from_units(units)
}

/// Service a socket unit activates: `Service=` or `<basename>.service`.
pub fn socket_service(unit: &UnitFile) -> String {
    let explicit = unit.directive("Socket", "Service");
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    sibling_service(&unit.name, ".socket")
}

/// Service a timer unit activates: `Unit=` or `<basename>.service`.
pub fn timer_service(unit: &UnitFile) -> String {
    let explicit = unit.directive("Timer", "Unit");
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    sibling_service(&unit.name, ".timer")
}

/// Service a path unit activates: `Unit=` or `<basename>.service`.
pub fn path_service(unit: &UnitFile) -> String {
    let explicit = unit.directive("Path", "Unit");
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    sibling_service(&unit.name, ".path")
}

fn sibling_service(name: &str, suffix: &str) -> String {
    let base = name.strip_suffix(suffix).unwrap_or(name);
    format!("{base}.service")
}

fn first_line(unit: &UnitFile, section: &str, keys: &[&str]) -> Option<usize> {
    for key in keys {
        if let Some(d) = unit.directives(section, key).first() {
            return Some(d.line);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit_str;

    fn units_from(files: &[(&str, &str)]) -> UnitSet {
        let mut set = UnitSet::new();
        for (name, content) in files {
            let unit = parse_unit_str(&format!("/etc/systemd/system/{name}"), content);
            set.insert(unit.name.clone(), unit);
        }
        set
    }

    #[test]
    fn test_unit_section_edges() {
        let units = units_from(&[(
            "web.service",
            "[Unit]\nRequires=db.service cache.service\nAfter=db.service\n",
        )]);
        let g = build_graph(&units);

        let out = g.edges_from("web.service");
        assert_eq!(out.len(), 3);
        assert!(out
            .iter()
            .any(|e| e.to == "db.service" && e.kind == EdgeType::Requires));
        assert!(out
            .iter()
            .any(|e| e.to == "cache.service" && e.kind == EdgeType::Requires));
        assert!(out
            .iter()
            .any(|e| e.to == "db.service" && e.kind == EdgeType::After));
    }

    #[test]
    fn test_install_reverse_edges() {
        let units = units_from(&[(
            "app.service",
            "[Install]\nWantedBy=multi-user.target\nRequiredBy=custom.target\n",
        )]);
        let g = build_graph(&units);

        let incoming = g.edges_to("app.service");
        assert!(incoming
            .iter()
            .any(|e| e.from == "multi-user.target" && e.kind == EdgeType::Wants));
        assert!(incoming
            .iter()
            .any(|e| e.from == "custom.target" && e.kind == EdgeType::Requires));
    }

    #[test]
    fn test_socket_implicit_trigger() {
        let units = units_from(&[("app.socket", "[Socket]\nListenStream=8080\n")]);
        let g = build_graph(&units);

        let out = g.edges_from("app.socket");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, "app.service");
        assert_eq!(out[0].kind, EdgeType::TriggeredBy);
        assert!(out[0].implicit);
    }

    #[test]
    fn test_socket_explicit_service() {
        let units = units_from(&[(
            "app.socket",
            "[Socket]\nListenStream=8080\nService=other.service\n",
        )]);
        let g = build_graph(&units);
        assert_eq!(g.edges_from("app.socket")[0].to, "other.service");
    }

    #[test]
    fn test_timer_and_path_triggers() {
        let units = units_from(&[
            ("backup.timer", "[Timer]\nOnCalendar=daily\n"),
            ("watch.path", "[Path]\nPathChanged=/etc/app.conf\n"),
        ]);
        let g = build_graph(&units);
        assert_eq!(g.edges_from("backup.timer")[0].to, "backup.service");
        assert_eq!(g.edges_from("watch.path")[0].to, "watch.service");
    }

    #[test]
    fn test_edge_lines_recorded() {
        let units = units_from(&[("a.service", "[Unit]\nDescription=x\nRequires=b.service\n")]);
        let g = build_graph(&units);
        assert_eq!(g.edges_from("a.service")[0].line, Some(3));
    }
}
