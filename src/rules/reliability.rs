//! Reliability rules: restart behavior, dependency hygiene, shutdown
//! semantics (REL001-REL010).

use rustc_hash::FxHashSet;

use crate::types::{split_value, Category, Issue, Severity};

use super::{Context, Registry, Rule, StaticRule};

pub(super) fn register(registry: &mut Registry) {
    registry.register(Box::new(StaticRule {
        id: "REL001",
        name: "Restart policy not configured",
        description: "Long-running services should have a Restart= policy to recover from crashes.",
        category: Category::Reliability,
        severity: Severity::High,
        tags: &["availability", "resilience", "recovery"],
        suggestion: "Add 'Restart=on-failure' or 'Restart=always' to the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#Restart="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() || unit.directive("Service", "Type") == "oneshot" {
                return Vec::new();
            }
            match unit.directive("Service", "Restart") {
                "" | "no" => vec![rule.issue(
                    unit,
                    "Service has no restart policy. It will not recover from crashes.".to_string(),
                )],
                _ => Vec::new(),
            }
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "REL002",
        name: "RestartSec too short",
        description: "RestartSec should be at least 1 second to prevent restart loops.",
        category: Category::Reliability,
        severity: Severity::Medium,
        tags: &["availability", "restart-loop"],
        suggestion: "Set 'RestartSec=1' or higher in the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#RestartSec="],
        check: rel002_restart_sec,
    }));

    registry.register(Box::new(StaticRule {
        id: "REL003",
        name: "Missing WantedBy or RequiredBy",
        description: "Services should specify how they integrate with targets.",
        category: Category::Reliability,
        severity: Severity::Medium,
        tags: &["install", "targets"],
        suggestion: "Add 'WantedBy=multi-user.target' to the [Install] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#WantedBy="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() {
                return Vec::new();
            }
            if unit.directive("Install", "WantedBy").is_empty()
                && unit.directive("Install", "RequiredBy").is_empty()
            {
                return vec![rule.issue(
                    unit,
                    "Service has no WantedBy or RequiredBy, won't start automatically.".to_string(),
                )];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "REL004",
        name: "Potential circular dependency",
        description: "Units should not have circular dependencies.",
        category: Category::Reliability,
        severity: Severity::Critical,
        tags: &["dependency", "boot"],
        suggestion: "Review the dependency chain and remove cycles.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#Requires="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if ctx.all_units.is_empty() {
                return Vec::new();
            }
            for directive in ["Requires", "Wants", "After", "Before", "BindsTo"] {
                for d in unit.directives("Unit", directive) {
                    if split_value(&d.value).iter().any(|dep| *dep == unit.name) {
                        return vec![rule.issue(
                            unit,
                            "Unit references itself in dependencies.".to_string(),
                        )];
                    }
                }
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "REL005",
        name: "After without Requires or Wants",
        description: "After= only orders startup, it doesn't ensure the dependency starts.",
        category: Category::Reliability,
        severity: Severity::Low,
        tags: &["dependency", "ordering"],
        suggestion: "Add a corresponding Requires= or Wants= for After= dependencies.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#After="],
        check: rel005_after_without_requires,
    }));

    registry.register(Box::new(StaticRule {
        id: "REL006",
        name: "StartLimitBurst not configured",
        description: "Services with restart policies should configure start rate limiting.",
        category: Category::Reliability,
        severity: Severity::Medium,
        tags: &["restart-loop", "rate-limiting"],
        suggestion: "Add 'StartLimitBurst=5' and 'StartLimitIntervalSec=10' to [Unit].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#StartLimitBurst="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() {
                return Vec::new();
            }
            let restart = unit.directive("Service", "Restart");
            if restart.is_empty() || restart == "no" {
                return Vec::new();
            }
            if unit.directive("Unit", "StartLimitBurst").is_empty()
                && unit.directive("Unit", "StartLimitIntervalSec").is_empty()
            {
                return vec![rule.issue(
                    unit,
                    "Service has restart but no start rate limiting.".to_string(),
                )];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "REL007",
        name: "Missing ExecStop for graceful shutdown",
        description: "Long-running services may need explicit stop commands.",
        category: Category::Reliability,
        severity: Severity::Low,
        tags: &["shutdown", "graceful"],
        suggestion: "Consider adding ExecStop= if SIGTERM isn't sufficient.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#ExecStop="],
        // Advisory only: most services handle SIGTERM fine.
        check: |_rule, _ctx| Vec::new(),
    }));

    registry.register(Box::new(StaticRule {
        id: "REL008",
        name: "KillMode set to none",
        description: "KillMode=none leaves processes orphaned.",
        category: Category::Reliability,
        severity: Severity::High,
        tags: &["shutdown", "orphan"],
        suggestion: "Use KillMode=control-group or mixed instead of none.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.kill.html#KillMode="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() {
                return Vec::new();
            }
            if unit.directive("Service", "KillMode") == "none" {
                return vec![rule.issue(
                    unit,
                    "KillMode=none leaves child processes orphaned on stop.".to_string(),
                )];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "REL009",
        name: "Dependency on missing unit",
        description: "The unit depends on another unit that doesn't exist.",
        category: Category::Reliability,
        severity: Severity::High,
        tags: &["dependency", "missing"],
        suggestion: "Remove or fix the dependency on the missing unit.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#Requires="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if ctx.all_units.is_empty() {
                return Vec::new();
            }
            for d in unit.directives("Unit", "Requires") {
                for dep in split_value(&d.value) {
                    if dep.ends_with(".service") && !ctx.all_units.contains_key(dep) {
                        return vec![rule.issue(unit, format!("Required unit not found: {dep}"))];
                    }
                }
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "REL010",
        name: "BindsTo without After",
        description: "BindsTo should usually be paired with After.",
        category: Category::Reliability,
        severity: Severity::Medium,
        tags: &["dependency", "ordering"],
        suggestion: "Add After= for units listed in BindsTo=.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#BindsTo="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            let after: FxHashSet<&str> = unit
                .directives("Unit", "After")
                .iter()
                .flat_map(|d| split_value(&d.value))
                .collect();
            for d in unit.directives("Unit", "BindsTo") {
                for bound in split_value(&d.value) {
                    if !after.contains(bound) {
                        return vec![rule.issue(
                            unit,
                            format!("BindsTo={bound} without corresponding After=."),
                        )];
                    }
                }
            }
            Vec::new()
        },
    }));
}

fn rel002_restart_sec(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    if !unit.is_service() {
        return Vec::new();
    }

    let restart = unit.directive("Service", "Restart");
    if restart.is_empty() || restart == "no" {
        return Vec::new();
    }

    let restart_sec = unit.directive("Service", "RestartSec");
    if restart_sec.is_empty() {
        return Vec::new();
    }

    let seconds = crate::timing::parse_duration(restart_sec).as_secs_f64();
    let mut min = ctx.config.thresholds.restart_sec_min;
    if min == 0.0 {
        min = 1.0;
    }

    if seconds < min {
        return vec![rule.issue(
            unit,
            format!("RestartSec={restart_sec} may cause rapid restart loops."),
        )];
    }
    Vec::new()
}

/// Targets that are pulled in by the transaction anyway and don't need
/// an explicit requirement.
const IMPLICIT_TARGETS: &[&str] = &[
    "network.target",
    "network-online.target",
    "local-fs.target",
    "remote-fs.target",
    "sysinit.target",
    "basic.target",
    "multi-user.target",
];

fn rel005_after_without_requires(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;

    let mut ensured: FxHashSet<&str> = FxHashSet::default();
    for directive in ["Requires", "Wants", "BindsTo"] {
        for d in unit.directives("Unit", directive) {
            ensured.extend(split_value(&d.value));
        }
    }

    for d in unit.directives("Unit", "After") {
        for dep in split_value(&d.value) {
            if ensured.contains(dep)
                || IMPLICIT_TARGETS.contains(&dep)
                || dep.ends_with(".target")
            {
                continue;
            }
            return vec![rule.issue(
                unit,
                format!("After={dep} without Requires/Wants may not start the dependency."),
            )];
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::parser::parse_unit_str;
    use crate::rules::registry;
    use crate::validation::MockFileSystem;
    use crate::types::{UnitFile, UnitSet};

    fn check_with(id: &str, content: &str, all: &UnitSet) -> Vec<Issue> {
        let unit: UnitFile = parse_unit_str("/etc/systemd/system/app.service", content);
        let config = RuleConfig::new();
        let fs = MockFileSystem::new();
        let ctx = Context::new(&unit, all, &config, &fs);
        registry().get(id).unwrap().check(&ctx)
    }

    fn check(id: &str, content: &str) -> Vec<Issue> {
        check_with(id, content, &UnitSet::new())
    }

    #[test]
    fn test_rel001_restart_policy() {
        assert_eq!(check("REL001", "[Service]\nExecStart=/bin/app\n").len(), 1);
        assert_eq!(check("REL001", "[Service]\nRestart=no\n").len(), 1);
        assert!(check("REL001", "[Service]\nRestart=on-failure\n").is_empty());
        assert!(check("REL001", "[Service]\nType=oneshot\n").is_empty());
    }

    #[test]
    fn test_rel002_restart_sec() {
        assert_eq!(
            check("REL002", "[Service]\nRestart=always\nRestartSec=100ms\n").len(),
            1
        );
        assert!(check("REL002", "[Service]\nRestart=always\nRestartSec=5\n").is_empty());
        // No RestartSec set: the default is judged elsewhere.
        assert!(check("REL002", "[Service]\nRestart=always\n").is_empty());
        assert!(check("REL002", "[Service]\nRestartSec=0.1\n").is_empty());
    }

    #[test]
    fn test_rel003_install_section() {
        assert_eq!(check("REL003", "[Service]\nExecStart=/bin/app\n").len(), 1);
        assert!(check(
            "REL003",
            "[Service]\nExecStart=/bin/app\n[Install]\nWantedBy=multi-user.target\n"
        )
        .is_empty());
    }

    #[test]
    fn test_rel004_self_reference() {
        let mut all = UnitSet::new();
        let unit = parse_unit_str(
            "/etc/systemd/system/app.service",
            "[Unit]\nRequires=app.service\n",
        );
        all.insert(unit.name.clone(), unit);
        assert_eq!(
            check_with("REL004", "[Unit]\nRequires=app.service\n", &all).len(),
            1
        );
        assert!(check_with("REL004", "[Unit]\nRequires=db.service\n", &all).is_empty());
    }

    #[test]
    fn test_rel005_after_without_requires() {
        assert_eq!(check("REL005", "[Unit]\nAfter=db.service\n").len(), 1);
        assert!(check(
            "REL005",
            "[Unit]\nAfter=db.service\nRequires=db.service\n"
        )
        .is_empty());
        // Common targets are exempt.
        assert!(check("REL005", "[Unit]\nAfter=network.target\n").is_empty());
        assert!(check("REL005", "[Unit]\nAfter=custom.target\n").is_empty());
    }

    #[test]
    fn test_rel006_rate_limiting() {
        assert_eq!(check("REL006", "[Service]\nRestart=always\n").len(), 1);
        assert!(check(
            "REL006",
            "[Unit]\nStartLimitBurst=5\n[Service]\nRestart=always\n"
        )
        .is_empty());
        assert!(check("REL006", "[Service]\nExecStart=/bin/app\n").is_empty());
    }

    #[test]
    fn test_rel008_killmode_none() {
        assert_eq!(check("REL008", "[Service]\nKillMode=none\n").len(), 1);
        assert!(check("REL008", "[Service]\nKillMode=mixed\n").is_empty());
        assert!(check("REL008", "[Service]\nExecStart=/bin/app\n").is_empty());
    }

    #[test]
    fn test_rel009_missing_required_unit() {
        let mut all = UnitSet::new();
        let db = parse_unit_str("/etc/systemd/system/db.service", "[Service]\nExecStart=/bin/db\n");
        all.insert(db.name.clone(), db);

        assert!(check_with("REL009", "[Unit]\nRequires=db.service\n", &all).is_empty());
        assert_eq!(
            check_with("REL009", "[Unit]\nRequires=ghost.service\n", &all).len(),
            1
        );
        // Non-service targets are not checked here.
        assert!(check_with("REL009", "[Unit]\nRequires=ghost.target\n", &all).is_empty());
    }

    #[test]
    fn test_rel010_binds_to_without_after() {
        assert_eq!(check("REL010", "[Unit]\nBindsTo=db.service\n").len(), 1);
        assert!(check(
            "REL010",
            "[Unit]\nBindsTo=db.service\nAfter=db.service\n"
        )
        .is_empty());
    }
}
