//! End-to-end graph analysis scenarios over parsed unit sets.

use unitlint::graph::{build_graph, EdgeType, OrderingIssueKind};
use unitlint::parser::parse_unit_str;
use unitlint::propagation;
use unitlint::types::{Severity, UnitSet};

fn units_from(files: &[(&str, &str)]) -> UnitSet {
    let mut set = UnitSet::new();
    for (name, content) in files {
        let unit = parse_unit_str(&format!("/etc/systemd/system/{name}"), content);
        set.insert(unit.name.clone(), unit);
    }
    set
}

/// Three units, each requiring the next: exactly one critical cycle.
#[test]
fn test_three_unit_cycle() {
    let units = units_from(&[
        ("a.service", "[Unit]\nRequires=b.service\n"),
        ("b.service", "[Unit]\nRequires=c.service\n"),
        ("c.service", "[Unit]\nRequires=a.service\n"),
    ]);
    let graph = build_graph(&units);

    assert!(graph.has_cycles());
    let cycles = graph.find_cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].units.len(), 3);
    assert_eq!(
        cycles[0].units,
        vec!["a.service", "b.service", "c.service"]
    );
    assert_eq!(cycles[0].severity(), Severity::Critical);
}

/// A Requires= to a unit that was never parsed is a high-severity
/// dangling reference.
#[test]
fn test_missing_dependency() {
    let units = units_from(&[(
        "app.service",
        "[Unit]\nRequires=missing-db.service\n[Service]\nExecStart=/usr/bin/app\n",
    )]);
    let graph = build_graph(&units);

    let dangling = graph.find_dangling_refs();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].from, "app.service");
    assert_eq!(dangling[0].to, "missing-db.service");
    assert_eq!(dangling[0].kind, EdgeType::Requires);
    assert_eq!(dangling[0].severity(), Severity::High);
}

/// After= without a requirement and Requires= without After= are two
/// distinct ordering findings.
#[test]
fn test_ordering_mismatch() {
    let units = units_from(&[
        ("web.service", "[Unit]\nAfter=database.service\n"),
        ("app.service", "[Unit]\nRequires=cache.service\n"),
        ("database.service", "[Service]\nExecStart=/usr/bin/db\n"),
        ("cache.service", "[Service]\nExecStart=/usr/bin/cache\n"),
    ]);
    let graph = build_graph(&units);

    let issues = graph.find_ordering_issues();
    assert_eq!(issues.len(), 2);

    let after = issues
        .iter()
        .find(|i| i.kind == OrderingIssueKind::AfterWithoutRequires)
        .expect("after_without_requires issue");
    assert_eq!((after.unit.as_str(), after.related.as_str()), ("web.service", "database.service"));

    let requires = issues
        .iter()
        .find(|i| i.kind == OrderingIssueKind::RequiresWithoutAfter)
        .expect("requires_without_after issue");
    assert_eq!(
        (requires.unit.as_str(), requires.related.as_str()),
        ("app.service", "cache.service")
    );
}

/// Mutual BindsTo= plus Restart=on-failure on both sides is a critical
/// restart storm covering both units.
#[test]
fn test_restart_storm() {
    let units = units_from(&[
        (
            "a.service",
            "[Unit]\nBindsTo=b.service\n[Service]\nRestart=on-failure\n",
        ),
        (
            "b.service",
            "[Unit]\nBindsTo=a.service\n[Service]\nRestart=on-failure\n",
        ),
    ]);
    let graph = build_graph(&units);

    let result = propagation::detect_restart_storms(&graph, &units);
    assert_eq!(result.critical_count, 1);
    let storm = result
        .storms
        .iter()
        .find(|s| s.severity == Severity::Critical)
        .expect("critical storm");
    assert!(storm.units.contains(&"a.service".to_string()));
    assert!(storm.units.contains(&"b.service".to_string()));
}

/// Reachability: units pulled in by targets are reachable, everything
/// else is dead.
#[test]
fn test_reachability_partition() {
    let units = units_from(&[
        ("multi-user.target", "[Unit]\nDescription=multi-user\n"),
        (
            "web.service",
            "[Service]\nExecStart=/usr/bin/web\n[Install]\nWantedBy=multi-user.target\n",
        ),
        ("forgotten.service", "[Service]\nExecStart=/usr/bin/old\n"),
    ]);
    let graph = build_graph(&units);

    let result = graph.analyze_reachability();
    assert!(result.reachable.contains(&"web.service".to_string()));
    assert!(result
        .unreachable
        .contains(&"forgotten.service".to_string()));
    assert!(graph.is_reachable("web.service"));
    assert!(!graph.is_reachable("forgotten.service"));
}

/// Failure simulation: a database failure drags down requiring units
/// transitively, and the critical chain reflects the longest path.
#[test]
fn test_failure_simulation() {
    let units = units_from(&[
        ("api.service", "[Unit]\nRequires=app.service\n"),
        ("app.service", "[Unit]\nRequires=db.service\n"),
        ("db.service", "[Service]\nExecStart=/usr/bin/db\n"),
        ("observer.service", "[Unit]\nWants=db.service\n"),
    ]);
    let graph = build_graph(&units);

    let impact = propagation::simulate_failure(&graph, "db.service");
    assert_eq!(impact.total_affected, 2);
    let names: Vec<&str> = impact.affected.iter().map(|a| a.name.as_str()).collect();
    assert!(names.contains(&"app.service"));
    assert!(names.contains(&"api.service"));
    // Wants= does not carry failure.
    assert!(!names.contains(&"observer.service"));
    assert_eq!(
        impact.critical_chain,
        vec!["db.service", "app.service", "api.service"]
    );
}

/// Graph statistics count placeholder nodes separately from parsed
/// units.
#[test]
fn test_graph_stats() {
    let units = units_from(&[
        (
            "app.service",
            "[Unit]\nRequires=ghost.service\nAfter=ghost.service\n",
        ),
        ("app.socket", "[Socket]\nListenStream=8080\n"),
    ]);
    let graph = build_graph(&units);

    let stats = graph.stats();
    assert_eq!(stats.total_units, 2);
    assert_eq!(stats.total_nodes, 3);
    assert_eq!(stats.total_edges, 3);
    assert_eq!(stats.dangling_count, 2);
    assert_eq!(stats.cycle_count, 0);
    assert_eq!(stats.edges_by_type[&EdgeType::TriggeredBy], 1);
}

/// Every edge is indexed under its endpoints.
#[test]
fn test_edge_index_invariant() {
    let units = units_from(&[
        (
            "a.service",
            "[Unit]\nRequires=b.service\nAfter=b.service\nWants=c.service\n",
        ),
        ("b.service", "[Unit]\nConflicts=c.service\n"),
        ("c.service", "[Service]\nExecStart=/bin/c\n"),
    ]);
    let graph = build_graph(&units);

    for edge in graph.edges() {
        assert!(graph.edges_from(&edge.from).iter().any(|e| e == &edge));
        assert!(graph.edges_to(&edge.to).iter().any(|e| e == &edge));
    }
}
