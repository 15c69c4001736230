//! Performance rules: boot path and startup latency (PERF001-PERF005).

use crate::types::{Category, Issue, Severity};

use super::{Context, Registry, Rule, StaticRule};

pub(super) fn register(registry: &mut Registry) {
    registry.register(Box::new(StaticRule {
        id: "PERF001",
        name: "Boot-critical service not optimized",
        description: "Services in the default target should consider socket activation.",
        category: Category::Performance,
        severity: Severity::Low,
        tags: &["boot", "socket-activation"],
        suggestion: "Consider socket activation for faster boot.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.socket.html"],
        check: perf001_socket_activation,
    }));

    registry.register(Box::new(StaticRule {
        id: "PERF002",
        name: "Excessive ExecStartPre commands",
        description: "Too many pre-start commands slow down service start.",
        category: Category::Performance,
        severity: Severity::Low,
        tags: &["startup", "slow"],
        suggestion: "Consolidate ExecStartPre commands or move them to an ExecStart script.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#ExecStartPre="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() {
                return Vec::new();
            }
            let pre = unit.directives("Service", "ExecStartPre");
            if pre.len() > 3 {
                return vec![rule.issue(
                    unit,
                    format!("Service has {} ExecStartPre commands.", pre.len()),
                )];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "PERF003",
        name: "Consider Type=notify for readiness",
        description: "Services with significant startup time should use Type=notify.",
        category: Category::Performance,
        severity: Severity::Info,
        tags: &["startup", "notify"],
        suggestion: "Use Type=notify if the service supports sd_notify.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#Type="],
        // Advisory only: whether the app supports sd_notify is unknowable here.
        check: |_rule, _ctx| Vec::new(),
    }));

    registry.register(Box::new(StaticRule {
        id: "PERF004",
        name: "Type=simple may block dependencies",
        description: "Type=simple marks the service ready immediately, which may be premature.",
        category: Category::Performance,
        severity: Severity::Info,
        tags: &["startup", "type"],
        suggestion: "Use Type=exec, notify, or forking if startup readiness matters.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#Type="],
        // Advisory only.
        check: |_rule, _ctx| Vec::new(),
    }));

    registry.register(Box::new(StaticRule {
        id: "PERF005",
        name: "TimeoutStartSec excessively long",
        description: "Very long start timeouts delay failure detection.",
        category: Category::Performance,
        severity: Severity::Low,
        tags: &["timeout", "startup"],
        suggestion: "Reduce TimeoutStartSec to a reasonable value.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#TimeoutStartSec="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() {
                return Vec::new();
            }
            let timeout = unit.directive("Service", "TimeoutStartSec");
            if timeout.is_empty() || timeout == "infinity" {
                return Vec::new();
            }
            let seconds = crate::timing::parse_duration(timeout).as_secs_f64();
            if seconds > 300.0 {
                return vec![rule.issue(
                    unit,
                    format!("TimeoutStartSec={timeout} is very long."),
                )];
            }
            Vec::new()
        },
    }));
}

fn perf001_socket_activation(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    if !unit.is_service() {
        return Vec::new();
    }

    let wanted_by = unit.directive("Install", "WantedBy");
    if !wanted_by.contains("multi-user.target") && !wanted_by.contains("default.target") {
        return Vec::new();
    }

    let socket_name = format!(
        "{}.socket",
        unit.name.strip_suffix(".service").unwrap_or(&unit.name)
    );
    if ctx.all_units.contains_key(&socket_name) {
        return Vec::new();
    }

    if unit.directive("Service", "Type") == "oneshot" {
        return Vec::new();
    }

    vec![rule.issue(unit, "Boot-path service could use socket activation.".to_string())]
}
