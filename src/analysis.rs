//! Deep analysis aggregation: graph diagnostics, propagation, timing,
//! and per-type validation over one unit set.

use serde::Serialize;

use crate::graph::{
    build_graph, BindingIssue, ConflictIssue, DanglingRef, Graph, GraphStats, OrderingIssue,
    ReachabilityResult, Scc,
};
use crate::propagation::{
    self, DeadlockResult, PropagationAnalysis, RestartStormResult, TimeoutDeadlock, WaitDeadlock,
};
use crate::timing::{
    compute_critical_paths, detect_cascades, parse_all_timeouts, CascadeResult,
    CriticalPathResult,
};
use crate::types::UnitSet;
use crate::validation::{
    detect_port_conflicts, find_deprecated_directives, validate_directives, validate_mount,
    validate_path, validate_service, validate_socket, validate_target, validate_timer,
    DeprecatedDirective, DirectiveValidation, FileSystem, MountValidation, PathValidation,
    PortConflict, ServiceValidation, SocketValidation, TargetValidation, TimerValidation,
};

/// Per-type validation records for a unit set.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub services: Vec<ServiceValidation>,
    pub sockets: Vec<SocketValidation>,
    pub timers: Vec<TimerValidation>,
    pub mounts: Vec<MountValidation>,
    pub paths: Vec<PathValidation>,
    pub targets: Vec<TargetValidation>,
    pub directives: Vec<DirectiveValidation>,
    pub deprecated: Vec<DeprecatedDirective>,
    pub port_conflicts: Vec<PortConflict>,
}

/// Everything the deep analyses produce for one unit set.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub stats: GraphStats,
    pub cycles: Vec<Scc>,
    pub reachability: ReachabilityResult,
    pub dangling_refs: Vec<DanglingRef>,
    pub ordering_issues: Vec<OrderingIssue>,
    pub binding_issues: Vec<BindingIssue>,
    pub conflicting_dependencies: Vec<ConflictIssue>,
    pub propagation: PropagationAnalysis,
    pub restart_storms: RestartStormResult,
    pub deadlocks: DeadlockResult,
    pub wait_deadlocks: Vec<WaitDeadlock>,
    pub timeout_deadlocks: Vec<TimeoutDeadlock>,
    pub critical_paths: CriticalPathResult,
    pub cascade_risks: CascadeResult,
    pub validation: ValidationReport,
}

/// Run every analysis over a unit set. The graph is built once and
/// shared; outputs follow the documented sort orders.
pub fn analyze(units: &UnitSet, fs: &dyn FileSystem) -> AnalysisReport {
    let graph = build_graph(units);
    analyze_with_graph(&graph, units, fs)
}

/// Like [`analyze`], for callers that already built the graph.
pub fn analyze_with_graph(graph: &Graph, units: &UnitSet, fs: &dyn FileSystem) -> AnalysisReport {
    let timeouts = parse_all_timeouts(units, None);
    let critical_paths = compute_critical_paths(graph, &timeouts);
    let cascade_risks = detect_cascades(graph, &critical_paths, &timeouts);

    AnalysisReport {
        stats: graph.stats(),
        cycles: graph.find_cycles(),
        reachability: graph.analyze_reachability(),
        dangling_refs: graph.find_dangling_refs(),
        ordering_issues: graph.find_ordering_issues(),
        binding_issues: graph.find_binding_issues(),
        conflicting_dependencies: graph.find_conflicting_dependencies(),
        propagation: propagation::analyze(graph, units),
        restart_storms: propagation::detect_restart_storms(graph, units),
        deadlocks: propagation::detect_deadlocks(graph, units),
        wait_deadlocks: propagation::detect_wait_deadlocks(graph, units),
        timeout_deadlocks: propagation::detect_timeout_deadlocks(graph, units),
        critical_paths,
        cascade_risks,
        validation: validate_units(units, fs),
    }
}

/// Run every per-type validator over a unit set.
pub fn validate_units(units: &UnitSet, fs: &dyn FileSystem) -> ValidationReport {
    let mut report = ValidationReport {
        services: Vec::new(),
        sockets: Vec::new(),
        timers: Vec::new(),
        mounts: Vec::new(),
        paths: Vec::new(),
        targets: Vec::new(),
        directives: Vec::new(),
        deprecated: find_deprecated_directives(units),
        port_conflicts: detect_port_conflicts(units),
    };

    for unit in units.values() {
        match unit.kind {
            crate::types::UnitKind::Service => report.services.push(validate_service(unit, fs)),
            crate::types::UnitKind::Socket => report.sockets.push(validate_socket(unit, units)),
            crate::types::UnitKind::Timer => report.timers.push(validate_timer(unit, units)),
            crate::types::UnitKind::Mount => report.mounts.push(validate_mount(unit, fs)),
            crate::types::UnitKind::Path => report.paths.push(validate_path(unit, units)),
            crate::types::UnitKind::Target => report.targets.push(validate_target(unit, units)),
            _ => {}
        }
        report.directives.push(validate_directives(unit, fs));
    }

    report
}
