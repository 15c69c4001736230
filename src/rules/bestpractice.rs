//! Best practice rules: documentation, maintainability, and naming
//! hygiene (BP001-BP010).

use crate::types::{Category, Issue, Severity};
use crate::validation::deprecated_replacement;

use super::{Context, Registry, Rule, StaticRule};

pub(super) fn register(registry: &mut Registry) {
    registry.register(Box::new(StaticRule {
        id: "BP001",
        name: "Full override in /etc instead of drop-in",
        description: "Prefer drop-ins over full overrides for maintainability.",
        category: Category::BestPractice,
        severity: Severity::Info,
        tags: &["override", "maintainability"],
        suggestion: "Use /etc/systemd/system/unit.d/*.conf drop-ins instead.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html"],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if unit.path.starts_with("/etc/systemd/system/")
                && !unit.path.contains(".d/")
                && ctx.all_units.contains_key(&unit.name)
            {
                return vec![rule.issue(
                    unit,
                    "Full override in /etc, consider a drop-in instead.".to_string(),
                )];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "BP002",
        name: "Deprecated directive used",
        description: "Some directives are deprecated in newer manager versions.",
        category: Category::BestPractice,
        severity: Severity::Medium,
        tags: &["deprecated"],
        suggestion: "Update to the current directive name.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.directives.html"],
        check: bp002_deprecated,
    }));

    registry.register(Box::new(StaticRule {
        id: "BP003",
        name: "ExecStart not using absolute path",
        description: "ExecStart should use absolute paths for reliability.",
        category: Category::BestPractice,
        severity: Severity::Medium,
        tags: &["paths", "reliability"],
        suggestion: "Use an absolute path in ExecStart=.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#ExecStart="],
        check: bp003_absolute_path,
    }));

    registry.register(Box::new(StaticRule {
        id: "BP004",
        name: "Missing Documentation directive",
        description: "Units should include Documentation= for discoverability.",
        category: Category::BestPractice,
        severity: Severity::Info,
        tags: &["documentation"],
        suggestion: "Add Documentation= to the [Unit] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#Documentation="],
        check: |rule, ctx| {
            if ctx.unit.directive("Unit", "Documentation").is_empty() {
                return vec![rule.issue(ctx.unit, "Unit has no Documentation directive.".to_string())];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "BP005",
        name: "Environment variables in unit file",
        description: "Consider using EnvironmentFile= for maintainability.",
        category: Category::BestPractice,
        severity: Severity::Info,
        tags: &["environment", "maintainability"],
        suggestion: "Move environment variables to an EnvironmentFile=.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#EnvironmentFile="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() {
                return Vec::new();
            }
            if unit.directives("Service", "Environment").len() > 3 {
                return vec![rule.issue(
                    unit,
                    "Service has many inline Environment= directives.".to_string(),
                )];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "BP006",
        name: "Hardcoded paths instead of specifiers",
        description: "Use specifiers like %t and %h instead of hardcoded paths.",
        category: Category::BestPractice,
        severity: Severity::Info,
        tags: &["specifiers", "portability"],
        suggestion: "Use %t for the runtime dir, %h for home, etc.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#Specifiers"],
        // Advisory only: hard to detect reliably.
        check: |_rule, _ctx| Vec::new(),
    }));

    registry.register(Box::new(StaticRule {
        id: "BP007",
        name: "WorkingDirectory not set",
        description: "Consider setting an explicit WorkingDirectory.",
        category: Category::BestPractice,
        severity: Severity::Info,
        tags: &["paths"],
        suggestion: "Add WorkingDirectory= to the [Service] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#WorkingDirectory="],
        // Advisory only.
        check: |_rule, _ctx| Vec::new(),
    }));

    registry.register(Box::new(StaticRule {
        id: "BP008",
        name: "Missing Description",
        description: "Units should have a Description for clarity.",
        category: Category::BestPractice,
        severity: Severity::Info,
        tags: &["documentation"],
        suggestion: "Add Description= to the [Unit] section.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.unit.html#Description="],
        check: |rule, ctx| {
            if ctx.unit.directive("Unit", "Description").is_empty() {
                return vec![rule.issue(ctx.unit, "Unit has no Description.".to_string())];
            }
            Vec::new()
        },
    }));

    registry.register(Box::new(StaticRule {
        id: "BP009",
        name: "User or Group may not exist",
        description: "The specified User/Group should exist on the system.",
        category: Category::BestPractice,
        severity: Severity::High,
        tags: &["user", "permissions"],
        suggestion: "Ensure the user/group exists or use DynamicUser=yes.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.exec.html#User="],
        check: bp009_user_exists,
    }));

    registry.register(Box::new(StaticRule {
        id: "BP010",
        name: "Type=oneshot without RemainAfterExit",
        description: "Oneshot services may need RemainAfterExit for dependency tracking.",
        category: Category::BestPractice,
        severity: Severity::Low,
        tags: &["oneshot"],
        suggestion: "Consider adding RemainAfterExit=yes.",
        references: &["https://www.freedesktop.org/software/systemd/man/systemd.service.html#RemainAfterExit="],
        check: |rule, ctx| {
            let unit = ctx.unit;
            if !unit.is_service() || unit.directive("Service", "Type") != "oneshot" {
                return Vec::new();
            }
            if unit.directive("Service", "RemainAfterExit").is_empty() {
                return vec![rule.issue(
                    unit,
                    "Oneshot service without RemainAfterExit.".to_string(),
                )];
            }
            Vec::new()
        },
    }));
}

/// BP002 consults the same deprecation table the common-directive
/// validator uses, including value-specific `StandardOutput=`/
/// `StandardError=` deprecations.
fn bp002_deprecated(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    for section in unit.sections.values() {
        for (key, entries) in &section.directives {
            if let Some(replacement) = deprecated_replacement(key) {
                return vec![rule.issue(
                    unit,
                    format!("{key} is deprecated. Replace with {replacement}."),
                )];
            }
            if key == "StandardOutput" || key == "StandardError" {
                for d in entries {
                    let pair = format!("{key}={}", d.value);
                    if let Some(replacement) = deprecated_replacement(&pair) {
                        return vec![rule.issue(
                            unit,
                            format!("{pair} is deprecated. Replace with {replacement}."),
                        )];
                    }
                }
            }
        }
    }
    Vec::new()
}

fn bp003_absolute_path(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    if !unit.is_service() {
        return Vec::new();
    }

    let exec_start = unit.directive("Service", "ExecStart");
    if exec_start.is_empty() {
        return Vec::new();
    }

    let stripped = exec_start.trim_start_matches(['-', '+', '!', '@', '|', ':']);
    let Some(cmd) = stripped.split_whitespace().next() else {
        return Vec::new();
    };
    if !cmd.starts_with('/') && !cmd.contains('%') {
        return vec![rule.issue(
            unit,
            format!("ExecStart does not use an absolute path: {cmd}"),
        )];
    }
    Vec::new()
}

/// Identity checks go through the context's probe; offline probes
/// answer every lookup with true, so this rule passes automatically
/// when the target's user database is unavailable.
fn bp009_user_exists(rule: &StaticRule, ctx: &Context) -> Vec<Issue> {
    let unit = ctx.unit;
    if !unit.is_service() {
        return Vec::new();
    }

    let user = unit.directive("Service", "User");
    if !user.is_empty() && user != "root" && !ctx.fs.user_exists(user) {
        return vec![rule.issue(unit, format!("User '{user}' may not exist."))];
    }

    let group = unit.directive("Service", "Group");
    if !group.is_empty() && group != "root" && !ctx.fs.group_exists(group) {
        return vec![rule.issue(unit, format!("Group '{group}' may not exist."))];
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
        check_with_fs(id, content, &MockFileSystem::new())
    }

    fn check_with_fs(id: &str, content: &str, fs: &MockFileSystem) -> Vec<Issue> {
        let unit: UnitFile = parse_unit_str("/etc/systemd/system/app.service", content);
        let all = UnitSet::new();
        let config = RuleConfig::new();
        let ctx = Context::new(&unit, &all, &config, fs);
        registry().get(id).unwrap().check(&ctx)
    }

    #[test]
    fn test_bp002_deprecated_directives() {
        assert_eq!(
            check("BP002", "[Service]\nPermissionsStartOnly=true\n").len(),
            1
        );
        assert_eq!(
            check("BP002", "[Service]\nStartLimitInterval=10\n").len(),
            1
        );
        // The full deprecation table applies, not just the classics.
        assert_eq!(check("BP002", "[Service]\nMemoryLimit=512M\n").len(), 1);
        assert_eq!(check("BP002", "[Service]\nCPUShares=1024\n").len(), 1);
        assert_eq!(
            check("BP002", "[Service]\nStandardOutput=syslog\n").len(),
            1
        );
        assert!(check("BP002", "[Service]\nStandardOutput=journal\n").is_empty());
        assert!(check("BP002", "[Unit]\nStartLimitIntervalSec=10\n").is_empty());
    }

    #[test]
    fn test_bp003_absolute_path() {
        assert_eq!(check("BP003", "[Service]\nExecStart=app --serve\n").len(), 1);
        assert!(check("BP003", "[Service]\nExecStart=/usr/bin/app\n").is_empty());
        assert!(check("BP003", "[Service]\nExecStart=-/usr/bin/app\n").is_empty());
        assert!(check("BP003", "[Service]\nExecStart=%h/bin/app\n").is_empty());
    }

    #[test]
    fn test_bp004_documentation() {
        assert_eq!(check("BP004", "[Unit]\nDescription=x\n").len(), 1);
        assert!(check("BP004", "[Unit]\nDocumentation=man:app(8)\n").is_empty());
    }

    #[test]
    fn test_bp005_inline_environment() {
        let many = "[Service]\nEnvironment=A=1\nEnvironment=B=2\nEnvironment=C=3\nEnvironment=D=4\n";
        assert_eq!(check("BP005", many).len(), 1);
        assert!(check("BP005", "[Service]\nEnvironment=A=1\n").is_empty());
    }

    #[test]
    fn test_bp008_description() {
        assert_eq!(check("BP008", "[Service]\nExecStart=/bin/app\n").len(), 1);
        assert!(check("BP008", "[Unit]\nDescription=My app\n").is_empty());
    }

    #[test]
    fn test_bp009_user_and_group_via_probe() {
        let mut fs = MockFileSystem::new();
        fs.add_user("appuser").add_group("appgroup");

        assert!(check_with_fs("BP009", "[Service]\nUser=root\n", &fs).is_empty());
        assert!(check_with_fs("BP009", "[Service]\nExecStart=/bin/app\n", &fs).is_empty());
        assert!(check_with_fs("BP009", "[Service]\nUser=appuser\n", &fs).is_empty());
        assert!(check_with_fs(
            "BP009",
            "[Service]\nUser=appuser\nGroup=appgroup\n",
            &fs
        )
        .is_empty());
        assert_eq!(
            check_with_fs("BP009", "[Service]\nUser=ghost\n", &fs).len(),
            1
        );
        assert_eq!(
            check_with_fs("BP009", "[Service]\nUser=appuser\nGroup=phantom\n", &fs).len(),
            1
        );
    }

    #[test]
    fn test_bp010_oneshot_remain_after_exit() {
        assert_eq!(check("BP010", "[Service]\nType=oneshot\n").len(), 1);
        assert!(check(
            "BP010",
            "[Service]\nType=oneshot\nRemainAfterExit=yes\n"
        )
        .is_empty());
        assert!(check("BP010", "[Service]\nType=simple\n").is_empty());
    }
}
