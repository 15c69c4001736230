//! Service unit validation: exec paths, user/group existence,
//! contradictory sandboxing, and Type= consistency.

use serde::{Deserialize, Serialize};

use crate::types::{Severity, UnitFile};

use super::FileSystem;

/// A missing or non-executable command path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingExec {
    /// `ExecStart`, `ExecStop`, ...
    pub directive: String,
    pub path: String,
    /// Prefixed with `-`: failure is tolerated.
    pub optional: bool,
    pub line: usize,
}

/// Contradictory sandboxing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    /// e.g. `PrivateNetwork=yes`
    pub setting: String,
    /// e.g. `ExecStart uses curl`
    pub conflicts_with: String,
    pub severity: Severity,
    pub description: String,
}

/// Results of service unit validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceValidation {
    pub unit: String,
    pub exec_start_missing: bool,
    pub exec_not_found: Vec<MissingExec>,
    pub exec_not_executable: Vec<MissingExec>,
    pub user_not_found: Option<String>,
    pub group_not_found: Option<String>,
    pub contradictory_sandbox: Vec<Contradiction>,
    pub type_issues: Vec<String>,
    pub valid: bool,
}

impl ServiceValidation {
    fn clean(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            exec_start_missing: false,
            exec_not_found: Vec::new(),
            exec_not_executable: Vec::new(),
            user_not_found: None,
            group_not_found: None,
            contradictory_sandbox: Vec::new(),
            type_issues: Vec::new(),
            valid: true,
        }
    }
}

const EXEC_DIRECTIVES: &[&str] = &[
    "ExecStart",
    "ExecStartPre",
    "ExecStartPost",
    "ExecStop",
    "ExecStopPost",
    "ExecReload",
];

/// Validate a service unit against the filesystem probe.
pub fn validate_service(unit: &UnitFile, fs: &dyn FileSystem) -> ServiceValidation {
    let mut result = ServiceValidation::clean(&unit.name);
    if !unit.is_service() {
        return result;
    }

    let Some(service) = unit.section("Service") else {
        result.valid = false;
        return result;
    };

    let service_type = service.directive("Type");

    // Type=oneshot may omit ExecStart.
    if service.directive_entries("ExecStart").is_empty() && service_type != "oneshot" {
        result.exec_start_missing = true;
        result.valid = false;
    }

    for directive in EXEC_DIRECTIVES {
        for d in service.directive_entries(directive) {
            let (missing, not_exec) = validate_exec_path(&d.value, directive, d.line, fs);
            result.exec_not_found.extend(missing);
            result.exec_not_executable.extend(not_exec);
        }
    }

    let user = service.directive("User");
    if !user.is_empty() && !fs.user_exists(user) {
        result.user_not_found = Some(user.to_string());
        result.valid = false;
    }
    let group = service.directive("Group");
    if !group.is_empty() && !fs.group_exists(group) {
        result.group_not_found = Some(group.to_string());
        result.valid = false;
    }

    result.contradictory_sandbox = check_contradictory_sandboxing(unit);
    result.type_issues = validate_service_type(unit);

    if !result.exec_not_found.is_empty()
        || !result.contradictory_sandbox.is_empty()
        || !result.type_issues.is_empty()
    {
        result.valid = false;
    }

    result
}

/// Validate a single `Exec*` value: strip prefix characters, take the
/// first token as the executable, and check existence/executability.
/// Values carrying `%` specifiers cannot be resolved and are skipped.
pub(crate) fn validate_exec_path(
    value: &str,
    directive: &str,
    line: usize,
    fs: &dyn FileSystem,
) -> (Vec<MissingExec>, Vec<MissingExec>) {
    // Empty value resets the directive.
    if value.is_empty() {
        return (Vec::new(), Vec::new());
    }

    // Prefixes: - (failure tolerated), @ ! | + : (execution modifiers).
    let mut cmd = value;
    let mut optional = false;
    loop {
        match cmd.bytes().next() {
            Some(b'-') => {
                optional = true;
                cmd = &cmd[1..];
            }
            Some(b'@') | Some(b'!') | Some(b'|') | Some(b'+') | Some(b':') => {
                cmd = &cmd[1..];
            }
            _ => break,
        }
    }

    let Some(exec_path) = cmd.split_whitespace().next() else {
        return (Vec::new(), Vec::new());
    };

    if exec_path.contains('%') {
        return (Vec::new(), Vec::new());
    }

    if !fs.exists(exec_path) {
        return (
            vec![MissingExec {
                directive: directive.to_string(),
                path: exec_path.to_string(),
                optional,
                line,
            }],
            Vec::new(),
        );
    }

    if !fs.is_executable(exec_path) {
        return (
            Vec::new(),
            vec![MissingExec {
                directive: directive.to_string(),
                path: exec_path.to_string(),
                optional,
                line,
            }],
        );
    }

    (Vec::new(), Vec::new())
}

const NETWORK_BINARIES: &[&str] = &["curl", "wget", "ping", "ssh", "nc", "netcat", "socat"];

fn check_contradictory_sandboxing(unit: &UnitFile) -> Vec<Contradiction> {
    let mut contradictions = Vec::new();

    let is_on =
        |key: &str| matches!(unit.directive("Service", key), "yes" | "true");

    let mut exec_values: Vec<&str> = Vec::new();
    for directive in ["ExecStart", "ExecStartPre", "ExecReload"] {
        for d in unit.directives("Service", directive) {
            exec_values.push(&d.value);
        }
    }

    if is_on("PrivateNetwork") {
        for exec in &exec_values {
            for bin in NETWORK_BINARIES {
                if exec.contains(&format!("/{bin}")) || exec.starts_with(&format!("{bin} ")) {
                    contradictions.push(Contradiction {
                        setting: "PrivateNetwork=yes".to_string(),
                        conflicts_with: format!("ExecStart uses {bin}"),
                        severity: Severity::High,
                        description: format!(
                            "PrivateNetwork=yes but ExecStart uses {bin} which requires network access"
                        ),
                    });
                }
            }
        }
    }

    if is_on("PrivateUsers") {
        let user = unit.directive("Service", "User");
        if !user.is_empty()
            && user != "root"
            && user != "nobody"
            && user.parse::<u32>().is_err()
        {
            contradictions.push(Contradiction {
                setting: "PrivateUsers=yes".to_string(),
                conflicts_with: format!("User={user}"),
                severity: Severity::Medium,
                description: "PrivateUsers=yes may cause User= lookup to fail if user doesn't exist in private namespace"
                    .to_string(),
            });
        }
    }

    let protect_system = unit.directive("Service", "ProtectSystem");
    if protect_system == "strict" || protect_system == "full" {
        for exec in &exec_values {
            if exec.contains(">/") || exec.contains(">> /") {
                contradictions.push(Contradiction {
                    setting: format!("ProtectSystem={protect_system}"),
                    conflicts_with: "Command appears to write to filesystem".to_string(),
                    severity: Severity::Medium,
                    description: "ProtectSystem may prevent write operations in ExecStart"
                        .to_string(),
                });
            }
        }
    }

    let work_dir = unit.directive("Service", "WorkingDirectory");
    if !work_dir.is_empty() {
        for d in unit.directives("Service", "ReadOnlyPaths") {
            if work_dir.starts_with(&d.value) {
                contradictions.push(Contradiction {
                    setting: format!("ReadOnlyPaths={}", d.value),
                    conflicts_with: format!("WorkingDirectory={work_dir}"),
                    severity: Severity::Medium,
                    description: "WorkingDirectory is under a ReadOnlyPaths path".to_string(),
                });
            }
        }
        for d in unit.directives("Service", "InaccessiblePaths") {
            if work_dir.starts_with(&d.value) {
                contradictions.push(Contradiction {
                    setting: format!("InaccessiblePaths={}", d.value),
                    conflicts_with: format!("WorkingDirectory={work_dir}"),
                    severity: Severity::High,
                    description: "WorkingDirectory is under an InaccessiblePaths path"
                        .to_string(),
                });
            }
        }
    }

    contradictions
}

fn validate_service_type(unit: &UnitFile) -> Vec<String> {
    let mut issues = Vec::new();

    let mut service_type = unit.directive("Service", "Type");
    if service_type.is_empty() {
        service_type = "simple";
    }

    let has_exec_start = !unit.directives("Service", "ExecStart").is_empty();
    let bus_name = unit.directive("Service", "BusName");
    let pid_file = unit.directive("Service", "PIDFile");

    match service_type {
        "simple" => {
            if !has_exec_start {
                issues.push("Type=simple but no ExecStart= defined".to_string());
            }
        }
        "exec" => {
            if !has_exec_start {
                issues.push("Type=exec but no ExecStart= defined".to_string());
            }
        }
        "forking" => {
            if pid_file.is_empty() {
                issues.push(
                    "Type=forking without PIDFile= may cause the manager to lose track of the process"
                        .to_string(),
                );
            }
        }
        "dbus" => {
            if bus_name.is_empty() {
                issues.push("Type=dbus requires BusName= to be set".to_string());
            }
        }
        "oneshot" | "notify" | "notify-reload" | "idle" => {}
        other => issues.push(format!("Unknown Type={other}")),
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit_str;
    use crate::validation::MockFileSystem;

    fn service(content: &str) -> UnitFile {
        parse_unit_str("/etc/systemd/system/app.service", content)
    }

    fn probe() -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        fs.add_executable("/usr/bin/app")
            .add_user("appuser")
            .add_group("appgroup");
        fs
    }

    #[test]
    fn test_valid_service() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\n");
        let result = validate_service(&unit, &probe());
        assert!(result.valid);
        assert!(!result.exec_start_missing);
    }

    #[test]
    fn test_missing_exec_start() {
        let unit = service("[Service]\nUser=appuser\n");
        let result = validate_service(&unit, &probe());
        assert!(result.exec_start_missing);
        assert!(!result.valid);
    }

    #[test]
    fn test_oneshot_may_omit_exec_start() {
        let unit = service("[Service]\nType=oneshot\nExecStop=/usr/bin/app\n");
        let result = validate_service(&unit, &probe());
        assert!(!result.exec_start_missing);
    }

    #[test]
    fn test_exec_path_not_found() {
        let unit = service("[Service]\nExecStart=/usr/bin/missing --arg\n");
        let result = validate_service(&unit, &probe());
        assert_eq!(result.exec_not_found.len(), 1);
        assert_eq!(result.exec_not_found[0].path, "/usr/bin/missing");
        assert!(!result.exec_not_found[0].optional);
        assert!(!result.valid);
    }

    #[test]
    fn test_optional_prefix() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nExecStartPre=-/usr/bin/missing\n");
        let result = validate_service(&unit, &probe());
        assert_eq!(result.exec_not_found.len(), 1);
        assert!(result.exec_not_found[0].optional);
    }

    #[test]
    fn test_prefix_characters_stripped() {
        let unit = service("[Service]\nExecStart=!@/usr/bin/app\n");
        let result = validate_service(&unit, &probe());
        assert!(result.exec_not_found.is_empty());
    }

    #[test]
    fn test_specifier_paths_skipped() {
        let unit = service("[Service]\nExecStart=%h/bin/tool\n");
        let result = validate_service(&unit, &probe());
        assert!(result.exec_not_found.is_empty());
    }

    #[test]
    fn test_not_executable() {
        let mut fs = probe();
        fs.add_file("/etc/data.conf");
        let unit = service("[Service]\nExecStart=/etc/data.conf\n");
        let result = validate_service(&unit, &fs);
        assert_eq!(result.exec_not_executable.len(), 1);
    }

    #[test]
    fn test_unknown_user_and_group() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nUser=ghost\nGroup=phantom\n");
        let result = validate_service(&unit, &probe());
        assert_eq!(result.user_not_found.as_deref(), Some("ghost"));
        assert_eq!(result.group_not_found.as_deref(), Some("phantom"));
        assert!(!result.valid);
    }

    #[test]
    fn test_private_network_with_curl() {
        let unit = service(
            "[Service]\nExecStart=/usr/bin/curl https://example.com\nPrivateNetwork=yes\n",
        );
        let result = validate_service(&unit, &probe());
        let c = result
            .contradictory_sandbox
            .iter()
            .find(|c| c.setting == "PrivateNetwork=yes")
            .unwrap();
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn test_private_users_with_named_user() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nPrivateUsers=yes\nUser=appuser\n");
        let result = validate_service(&unit, &probe());
        assert!(result
            .contradictory_sandbox
            .iter()
            .any(|c| c.setting == "PrivateUsers=yes" && c.severity == Severity::Medium));
    }

    #[test]
    fn test_private_users_numeric_uid_ok() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nPrivateUsers=yes\nUser=1000\n");
        let result = validate_service(&unit, &probe());
        // Numeric UIDs work inside the private namespace; the probe does
        // not know uid 1000, which is a separate finding.
        assert!(!result
            .contradictory_sandbox
            .iter()
            .any(|c| c.setting == "PrivateUsers=yes"));
    }

    #[test]
    fn test_protect_system_with_redirect() {
        let unit = service(
            "[Service]\nExecStart=/bin/sh -c 'echo hi >/var/log/app.log'\nProtectSystem=strict\n",
        );
        let result = validate_service(&unit, &probe());
        assert!(result
            .contradictory_sandbox
            .iter()
            .any(|c| c.setting == "ProtectSystem=strict"));
    }

    #[test]
    fn test_workdir_under_readonly() {
        let unit = service(
            "[Service]\nExecStart=/usr/bin/app\nWorkingDirectory=/srv/app/data\nReadOnlyPaths=/srv/app\n",
        );
        let result = validate_service(&unit, &probe());
        assert!(result
            .contradictory_sandbox
            .iter()
            .any(|c| c.severity == Severity::Medium && c.conflicts_with.contains("WorkingDirectory")));
    }

    #[test]
    fn test_workdir_under_inaccessible_is_high() {
        let unit = service(
            "[Service]\nExecStart=/usr/bin/app\nWorkingDirectory=/secret/data\nInaccessiblePaths=/secret\n",
        );
        let result = validate_service(&unit, &probe());
        assert!(result
            .contradictory_sandbox
            .iter()
            .any(|c| c.severity == Severity::High));
    }

    #[test]
    fn test_forking_without_pidfile() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nType=forking\n");
        let result = validate_service(&unit, &probe());
        assert!(result.type_issues[0].contains("PIDFile"));
    }

    #[test]
    fn test_dbus_requires_busname() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nType=dbus\n");
        let result = validate_service(&unit, &probe());
        assert!(result.type_issues[0].contains("BusName"));

        let unit = service(
            "[Service]\nExecStart=/usr/bin/app\nType=dbus\nBusName=org.example.App\n",
        );
        let result = validate_service(&unit, &probe());
        assert!(result.type_issues.is_empty());
    }

    #[test]
    fn test_unknown_type() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nType=bogus\n");
        let result = validate_service(&unit, &probe());
        assert!(result.type_issues[0].contains("Unknown Type=bogus"));
    }

    #[test]
    fn test_non_service_passes_through() {
        let unit = parse_unit_str("/etc/systemd/system/app.socket", "[Socket]\nListenStream=80\n");
        let result = validate_service(&unit, &probe());
        assert!(result.valid);
    }
}
