//! Security rules: sandboxing and privilege hardening (SEC001-SEC015).

use crate::types::{Category, Issue, Severity};

use super::{absent_or_no, Context, Registry, Rule, StaticRule};

pub(super) fn register(registry: &mut Registry) {
    registry.register(Box::new(StaticRule {
        id: "SEC001",
        name: "NoNewPrivileges not set",
        description: "Services should set NoNewPrivileges=yes to prevent privilege escalation through setuid/setgid binaries.",
        category: Category::Security,
        severity: Severity::High,
        tags: &["hardening", "privilege-escalation", "sandbox"],
        suggestion: "Add 'NoNewPrivileges=yes' to the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#NoNewPrivileges="],
        check: |rule, ctx| {
            absent_or_no(
                ctx,
                rule,
                "NoNewPrivileges",
                "Service does not set NoNewPrivileges=yes, allowing potential privilege escalation.",
            )
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC002",
        name: "PrivateTmp not enabled",
        description: "Services should enable PrivateTmp=yes to use a private /tmp namespace.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "isolation", "sandbox"],
        suggestion: "Add 'PrivateTmp=yes' to the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#PrivateTmp="],
        check: |rule, ctx| {
            absent_or_no(
                ctx,
                rule,
                "PrivateTmp",
                "Service does not enable PrivateTmp, exposing it to symlink attacks through /tmp.",
            )
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC003",
        name: "ProtectSystem not set or weak",
        description: "Services should set ProtectSystem=strict to make system directories read-only.",
        category: Category::Security,
        severity: Severity::High,
        tags: &["hardening", "filesystem", "sandbox"],
        suggestion: "Add 'ProtectSystem=strict' to the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#ProtectSystem="],
        check: sec003_protect_system,
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC004",
        name: "ProtectHome not enabled",
        description: "Services should enable ProtectHome to prevent access to user home directories.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "filesystem", "privacy"],
        suggestion: "Add 'ProtectHome=yes' to the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#ProtectHome="],
        check: |rule, ctx| {
            absent_or_no(
                ctx,
                rule,
                "ProtectHome",
                "Service does not protect home directories from access.",
            )
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC005",
        name: "Service running as root without hardening",
        description: "Services running as root should have comprehensive security hardening.",
        category: Category::Security,
        severity: Severity::Critical,
        tags: &["hardening", "privilege", "root"],
        suggestion: "Use 'User=' to run as non-root, or 'DynamicUser=yes', or add comprehensive hardening.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#User="],
        check: sec005_root_service,
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC006",
        name: "CapabilityBoundingSet too permissive",
        description: "Services should restrict capabilities to only those needed.",
        category: Category::Security,
        severity: Severity::High,
        tags: &["hardening", "capabilities"],
        suggestion: "Set 'CapabilityBoundingSet=' to only the capabilities the service needs, or use '~CAP_SYS_ADMIN' to drop dangerous ones.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#CapabilityBoundingSet="],
        check: sec006_capability_bounding,
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC007",
        name: "PrivateDevices not set",
        description: "Services should use PrivateDevices=yes.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "isolation"],
        suggestion: "Add 'PrivateDevices=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#PrivateDevices="],
        check: |rule, ctx| {
            absent_or_no(ctx, rule, "PrivateDevices", "Service has access to physical devices.")
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC008",
        name: "ProtectKernelTunables not enabled",
        description: "Services should protect kernel tunables.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "kernel"],
        suggestion: "Add 'ProtectKernelTunables=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#ProtectKernelTunables="],
        check: |rule, ctx| {
            absent_or_no(ctx, rule, "ProtectKernelTunables", "Service can modify kernel tunables.")
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC009",
        name: "ProtectKernelModules not enabled",
        description: "Services should not load kernel modules.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "kernel"],
        suggestion: "Add 'ProtectKernelModules=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#ProtectKernelModules="],
        check: |rule, ctx| {
            absent_or_no(ctx, rule, "ProtectKernelModules", "Service can load kernel modules.")
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC010",
        name: "ProtectControlGroups not enabled",
        description: "Services should protect the cgroup hierarchy.",
        category: Category::Security,
        severity: Severity::Low,
        tags: &["hardening", "cgroups"],
        suggestion: "Add 'ProtectControlGroups=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#ProtectControlGroups="],
        check: |rule, ctx| {
            absent_or_no(ctx, rule, "ProtectControlGroups", "Service can modify control groups.")
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC011",
        name: "RestrictSUIDSGID not set",
        description: "Services should restrict SUID/SGID file creation.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "suid"],
        suggestion: "Add 'RestrictSUIDSGID=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#RestrictSUIDSGID="],
        check: |rule, ctx| {
            absent_or_no(ctx, rule, "RestrictSUIDSGID", "Service can create SUID/SGID files.")
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC012",
        name: "RestrictNamespaces not configured",
        description: "Services should restrict namespace creation.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "namespaces"],
        suggestion: "Add 'RestrictNamespaces=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#RestrictNamespaces="],
        check: |rule, ctx| {
            if !ctx.unit.is_service() {
                return Vec::new();
            }
            if ctx.unit.directive("Service", "RestrictNamespaces").is_empty() {
                return vec![rule.issue(ctx.unit, "Service can create new namespaces.".to_string())];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC013",
        name: "SystemCallFilter not configured",
        description: "Services should filter system calls.",
        category: Category::Security,
        severity: Severity::High,
        tags: &["hardening", "seccomp", "syscalls"],
        suggestion: "Add 'SystemCallFilter=@system-service' or a specific filter to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#SystemCallFilter="],
        check: |rule, ctx| {
            if !ctx.unit.is_service() {
                return Vec::new();
            }
            if ctx.unit.directive("Service", "SystemCallFilter").is_empty() {
                return vec![rule.issue(ctx.unit, "Service has no syscall filtering (seccomp).".to_string())];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC014",
        name: "MemoryDenyWriteExecute not set",
        description: "Services should prevent writable-executable memory mappings.",
        category: Category::Security,
        severity: Severity::Medium,
        tags: &["hardening", "memory"],
        suggestion: "Add 'MemoryDenyWriteExecute=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#MemoryDenyWriteExecute="],
        check: |rule, ctx| {
            absent_or_no(
                ctx,
                rule,
                "MemoryDenyWriteExecute",
                "Service allows writable-executable memory.",
            )
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "SEC015",
        name: "LockPersonality not set",
        description: "Services should lock the execution personality.",
        category: Category::Security,
        severity: Severity::Low,
        tags: &["hardening"],
        suggestion: "Add 'LockPersonality=yes' to [Service].",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#LockPersonality="],
        check: |rule, ctx| {
            absent_or_no(ctx, rule, "LockPersonality", "Service execution personality not locked.")
        },
    }));
}

fn sec003_protect_system(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    if !ctx.unit.is_service() {
        return Vec::new();
    }
    match ctx.unit.directive("Service", "ProtectSystem") {
        "strict" | "full" => Vec::new(),
        "yes" | "true" => {
            let mut issue = rule.issue(
                ctx.unit,
                "Service uses ProtectSystem=yes which only protects /usr and /boot. Consider 'strict'."
                    .to_string(),
            );
            issue.severity = Severity::Low;
            vec![issue]
        }
        _ => vec![rule.issue(
            ctx.unit,
            "Service does not set ProtectSystem, allowing modification of system directories."
                .to_string(),
        )],
    }
}

/// Hardening directives and the values that count toward the score.
const HARDENING_CHECKS: &[(&str, &[&str])] = &[
    ("NoNewPrivileges", &["yes", "true"]),
    ("ProtectSystem", &["strict", "full"]),
    ("ProtectHome", &["yes", "true", "read-only", "tmpfs"]),
    ("PrivateTmp", &["yes", "true"]),
    ("PrivateDevices", &["yes", "true"]),
    ("ProtectKernelTunables", &["yes", "true"]),
    ("ProtectKernelModules", &["yes", "true"]),
];

fn sec005_root_service(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    if !unit.is_service() {
        return Vec::new();
    }

    let user = unit.directive("Service", "User");
    let dynamic_user = unit.directive("Service", "DynamicUser");
    if (!user.is_empty() && user != "root") || dynamic_user == "yes" || dynamic_user == "true" {
        return Vec::new();
    }

    let score = HARDENING_CHECKS
        .iter()
        .filter(|(directive, good)| good.contains(&unit.directive("Service", directive)))
        .count();
    if score >= 4 {
        return Vec::new();
    }

    vec![rule.issue(
        unit,
        "Service runs as root without adequate security hardening.".to_string(),
    )]
}

const DANGEROUS_CAPABILITIES: &[&str] = &[
    "CAP_SYS_ADMIN",
    "CAP_NET_ADMIN",
    "CAP_SYS_PTRACE",
    "CAP_SYS_MODULE",
];

fn sec006_capability_bounding(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    if !unit.is_service() {
        return Vec::new();
    }

    let value = unit.directive("Service", "CapabilityBoundingSet");
    if value.is_empty() {
        return vec![rule.issue(unit, "Service does not restrict Linux capabilities.".to_string())];
    }

    for cap in DANGEROUS_CAPABILITIES {
        if value.contains(cap) && !value.contains(&format!("~{cap}")) {
            let mut issue = rule.issue(unit, format!("Service allows dangerous capability: {cap}"));
            issue.severity = Severity::Medium;
            return vec![issue];
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

    fn check(id: &str, content: &str) -> Vec<Issue> {
        let unit: UnitFile = parse_unit_str("/etc/systemd/system/app.service", content);
        let all = UnitSet::new();
        let config = RuleConfig::new();
        let fs = MockFileSystem::new();
        let ctx = Context::new(&unit, &all, &config, &fs);
        registry().get(id).unwrap().check(&ctx)
    }

    #[test]
    fn test_sec001_flags_missing() {
        assert_eq!(check("SEC001", "[Service]\nExecStart=/bin/app\n").len(), 1);
        assert_eq!(
            check("SEC001", "[Service]\nNoNewPrivileges=no\n").len(),
            1
        );
        assert!(check("SEC001", "[Service]\nNoNewPrivileges=yes\n").is_empty());
    }

    #[test]
    fn test_sec003_weak_value_downgraded() {
        let issues = check("SEC003", "[Service]\nProtectSystem=yes\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Low);

        assert!(check("SEC003", "[Service]\nProtectSystem=strict\n").is_empty());
        let issues = check("SEC003", "[Service]\nExecStart=/bin/app\n");
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn test_sec005_root_without_hardening() {
        assert_eq!(check("SEC005", "[Service]\nExecStart=/bin/app\n").len(), 1);
        assert!(check("SEC005", "[Service]\nUser=www-data\n").is_empty());
        assert!(check("SEC005", "[Service]\nDynamicUser=yes\n").is_empty());

        // Four hardening options score the unit out of the finding.
        let hardened = "[Service]\nNoNewPrivileges=yes\nProtectSystem=strict\n\
                        PrivateTmp=yes\nPrivateDevices=yes\n";
        assert!(check("SEC005", hardened).is_empty());
    }

    #[test]
    fn test_sec006_dangerous_capability() {
        let issues = check(
            "SEC006",
            "[Service]\nCapabilityBoundingSet=CAP_SYS_ADMIN CAP_CHOWN\n",
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Medium);

        assert!(check(
            "SEC006",
            "[Service]\nCapabilityBoundingSet=~CAP_SYS_ADMIN\n"
        )
        .is_empty());
        assert_eq!(check("SEC006", "[Service]\nExecStart=/bin/app\n").len(), 1);
    }

    #[test]
    fn test_sec012_explicit_no_is_accepted() {
        // RestrictNamespaces=no is an explicit decision; only the unset
        // case is flagged.
        assert!(check("SEC012", "[Service]\nRestrictNamespaces=no\n").is_empty());
        assert_eq!(check("SEC012", "[Service]\nExecStart=/bin/app\n").len(), 1);
    }

    #[test]
    fn test_non_service_units_skipped() {
        let unit = parse_unit_str("/etc/systemd/system/app.socket", "[Socket]\nListenStream=1\n");
        let all = UnitSet::new();
        let config = RuleConfig::new();
        let fs = MockFileSystem::new();
        let ctx = Context::new(&unit, &all, &config, &fs);
        for id in ["SEC001", "SEC005", "SEC013"] {
            assert!(registry().get(id).unwrap().check(&ctx).is_empty());
        }
    }
}
