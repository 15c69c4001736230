//! Common-directive validation that applies across unit types: exec
//! paths, environment files, working directories, runtime directory
//! names, and deprecated directives.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{UnitFile, UnitSet};

use super::service::validate_exec_path;
use super::{FileSystem, MissingExec};

/// A missing file reference (e.g. `EnvironmentFile=`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingFile {
    pub directive: String,
    pub path: String,
    /// Prefixed with `-`: absence is tolerated.
    pub optional: bool,
    pub line: usize,
}

/// Results of common directive validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveValidation {
    pub unit: String,
    pub missing_executables: Vec<MissingExec>,
    pub not_executable: Vec<MissingExec>,
    pub missing_env_files: Vec<MissingFile>,
    pub missing_work_dir: Option<String>,
    pub invalid_directories: Vec<String>,
    pub valid: bool,
}

const SERVICE_EXEC_DIRECTIVES: &[&str] = &[
    "ExecStart",
    "ExecStartPre",
    "ExecStartPost",
    "ExecStop",
    "ExecStopPost",
    "ExecReload",
    "ExecCondition",
];

const SOCKET_EXEC_DIRECTIVES: &[&str] =
    &["ExecStartPre", "ExecStartPost", "ExecStopPre", "ExecStopPost"];

const RESOURCE_DIRECTORY_DIRECTIVES: &[&str] = &[
    "RuntimeDirectory",
    "StateDirectory",
    "CacheDirectory",
    "LogsDirectory",
    "ConfigurationDirectory",
];

/// Validate directives common to every unit type.
pub fn validate_directives(unit: &UnitFile, fs: &dyn FileSystem) -> DirectiveValidation {
    let mut result = DirectiveValidation {
        unit: unit.name.clone(),
        missing_executables: Vec::new(),
        not_executable: Vec::new(),
        missing_env_files: Vec::new(),
        missing_work_dir: None,
        invalid_directories: Vec::new(),
        valid: true,
    };

    if unit.section("Service").is_some() {
        for directive in SERVICE_EXEC_DIRECTIVES {
            for d in unit.directives("Service", directive) {
                let (missing, not_exec) = validate_exec_path(&d.value, directive, d.line, fs);
                result.missing_executables.extend(missing);
                result.not_executable.extend(not_exec);
            }
        }

        for d in unit.directives("Service", "EnvironmentFile") {
            if let Some(missing) = validate_environment_file(&d.value, d.line, fs) {
                result.missing_env_files.push(missing);
            }
        }

        let work_dir = unit.directive("Service", "WorkingDirectory");
        if !work_dir.is_empty() && !working_directory_ok(work_dir, fs) {
            result.missing_work_dir = Some(work_dir.to_string());
            result.valid = false;
        }

        for directive in RESOURCE_DIRECTORY_DIRECTIVES {
            for d in unit.directives("Service", directive) {
                result
                    .invalid_directories
                    .extend(validate_directory_names(&d.value));
            }
        }
    }

    if unit.section("Socket").is_some() {
        for directive in SOCKET_EXEC_DIRECTIVES {
            for d in unit.directives("Socket", directive) {
                let (missing, not_exec) = validate_exec_path(&d.value, directive, d.line, fs);
                result.missing_executables.extend(missing);
                result.not_executable.extend(not_exec);
            }
        }
    }

    let required_missing = result.missing_executables.iter().any(|m| !m.optional);
    let required_env_missing = result.missing_env_files.iter().any(|m| !m.optional);
    if required_missing
        || required_env_missing
        || result.missing_work_dir.is_some()
        || !result.invalid_directories.is_empty()
    {
        result.valid = false;
    }

    result
}

fn validate_environment_file(value: &str, line: usize, fs: &dyn FileSystem) -> Option<MissingFile> {
    if value.is_empty() {
        return None;
    }

    let (optional, path) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    if path.contains('%') {
        return None;
    }

    if fs.exists(path) {
        return None;
    }

    Some(MissingFile {
        directive: "EnvironmentFile".to_string(),
        path: path.to_string(),
        optional,
        line,
    })
}

fn working_directory_ok(value: &str, fs: &dyn FileSystem) -> bool {
    // ~ is the user home; a - prefix tolerates absence.
    if value == "~" || value == "-" || value.starts_with('-') {
        return true;
    }
    if value.contains('%') {
        return true;
    }
    fs.is_directory(value)
}

static DIRECTORY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_.-]*$").expect("name regex is valid"));

/// `RuntimeDirectory=` and friends accept relative names, optionally
/// with a `:NNNN` mode suffix, never absolute paths or `..`.
fn validate_directory_names(value: &str) -> Vec<String> {
    let mut invalid = Vec::new();

    for raw_name in value.split_whitespace() {
        let name = match raw_name.find(':') {
            Some(idx) if idx > 0 => &raw_name[..idx],
            _ => raw_name,
        };

        if name.starts_with('/') {
            invalid.push(format!("{name} (must not be absolute path)"));
            continue;
        }
        if name.contains("..") {
            invalid.push(format!("{name} (must not contain ..)"));
            continue;
        }

        for segment in name.split('/') {
            if !segment.is_empty() && !DIRECTORY_NAME_RE.is_match(segment) {
                invalid.push(format!("{name} (invalid characters)"));
                break;
            }
        }
    }

    invalid
}

/// A deprecated directive occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecatedDirective {
    pub unit: String,
    pub directive: String,
    pub replacement: String,
    pub line: usize,
}

/// Deprecated directive replacement, if any. Some deprecations are
/// value-specific and looked up as `Key=value`. This table is the
/// single source of truth; the BP002 rule consults it too.
pub(crate) fn deprecated_replacement(key: &str) -> Option<&'static str> {
    match key {
        "StartLimitInterval" => Some("StartLimitIntervalSec (in [Unit] section)"),
        "BlockIOWeight" => Some("IOWeight (cgroup v2)"),
        "BlockIODeviceWeight" => Some("IODeviceWeight (cgroup v2)"),
        "BlockIOReadBandwidth" => Some("IOReadBandwidthMax (cgroup v2)"),
        "BlockIOWriteBandwidth" => Some("IOWriteBandwidthMax (cgroup v2)"),
        "MemoryLimit" => Some("MemoryMax (cgroup v2)"),
        "CPUShares" => Some("CPUWeight (cgroup v2)"),
        "StartupCPUShares" => Some("StartupCPUWeight (cgroup v2)"),
        "PermissionsStartOnly" => Some("the '+' prefix in ExecStart="),
        "StandardOutput=syslog" => Some("StandardOutput=journal"),
        "StandardError=syslog" => Some("StandardError=journal"),
        "StandardOutput=syslog+console" => Some("StandardOutput=journal+console"),
        "StandardError=syslog+console" => Some("StandardError=journal+console"),
        _ => None,
    }
}

/// Find every use of a deprecated directive across a unit set, sorted
/// by (unit, directive, line).
pub fn find_deprecated_directives(units: &UnitSet) -> Vec<DeprecatedDirective> {
    let mut deprecated = Vec::new();

    for (unit_name, unit) in units {
        for section in unit.sections.values() {
            for (key, entries) in &section.directives {
                if let Some(replacement) = deprecated_replacement(key) {
                    for d in entries {
                        deprecated.push(DeprecatedDirective {
                            unit: unit_name.clone(),
                            directive: key.clone(),
                            replacement: replacement.to_string(),
                            line: d.line,
                        });
                    }
                }

                if key == "StandardOutput" || key == "StandardError" {
                    for d in entries {
                        let pair = format!("{key}={}", d.value);
                        if let Some(replacement) = deprecated_replacement(&pair) {
                            deprecated.push(DeprecatedDirective {
                                unit: unit_name.clone(),
                                directive: pair,
                                replacement: replacement.to_string(),
                                line: d.line,
                            });
                        }
                    }
                }
            }
        }
    }

    deprecated.sort_by(|a, b| {
        a.unit
            .cmp(&b.unit)
            .then_with(|| a.directive.cmp(&b.directive))
            .then_with(|| a.line.cmp(&b.line))
    });
    deprecated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit_str;
    use crate::validation::MockFileSystem;

    fn probe() -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        fs.add_executable("/usr/bin/app")
            .add_file("/etc/app/env")
            .add_directory("/srv/app");
        fs
    }

    fn service(content: &str) -> UnitFile {
        parse_unit_str("/etc/systemd/system/app.service", content)
    }

    #[test]
    fn test_env_file_missing() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nEnvironmentFile=/etc/app/missing\n");
        let result = validate_directives(&unit, &probe());
        assert_eq!(result.missing_env_files.len(), 1);
        assert!(!result.missing_env_files[0].optional);
        assert!(!result.valid);
    }

    #[test]
    fn test_env_file_optional() {
        let unit =
            service("[Service]\nExecStart=/usr/bin/app\nEnvironmentFile=-/etc/app/missing\n");
        let result = validate_directives(&unit, &probe());
        assert_eq!(result.missing_env_files.len(), 1);
        assert!(result.missing_env_files[0].optional);
        assert!(result.valid);
    }

    #[test]
    fn test_env_file_specifier_skipped() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nEnvironmentFile=%h/.env\n");
        let result = validate_directives(&unit, &probe());
        assert!(result.missing_env_files.is_empty());
    }

    #[test]
    fn test_working_directory() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nWorkingDirectory=/srv/app\n");
        let result = validate_directives(&unit, &probe());
        assert!(result.missing_work_dir.is_none());

        let unit = service("[Service]\nExecStart=/usr/bin/app\nWorkingDirectory=/nope\n");
        let result = validate_directives(&unit, &probe());
        assert_eq!(result.missing_work_dir.as_deref(), Some("/nope"));
        assert!(!result.valid);
    }

    #[test]
    fn test_working_directory_special_values() {
        for value in ["~", "-", "-/might/not/exist", "%t/app"] {
            let unit = service(&format!(
                "[Service]\nExecStart=/usr/bin/app\nWorkingDirectory={value}\n"
            ));
            let result = validate_directives(&unit, &probe());
            assert!(result.missing_work_dir.is_none(), "{value} should be fine");
        }
    }

    #[test]
    fn test_runtime_directory_names() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nRuntimeDirectory=app app/cache\n");
        let result = validate_directives(&unit, &probe());
        assert!(result.invalid_directories.is_empty());

        let unit = service("[Service]\nExecStart=/usr/bin/app\nRuntimeDirectory=/absolute\n");
        let result = validate_directives(&unit, &probe());
        assert_eq!(result.invalid_directories.len(), 1);
        assert!(result.invalid_directories[0].contains("absolute"));

        let unit = service("[Service]\nExecStart=/usr/bin/app\nStateDirectory=app/../etc\n");
        let result = validate_directives(&unit, &probe());
        assert!(result.invalid_directories[0].contains(".."));

        let unit = service("[Service]\nExecStart=/usr/bin/app\nCacheDirectory=bad$name\n");
        let result = validate_directives(&unit, &probe());
        assert!(result.invalid_directories[0].contains("invalid characters"));
    }

    #[test]
    fn test_runtime_directory_mode_suffix() {
        let unit = service("[Service]\nExecStart=/usr/bin/app\nRuntimeDirectory=app:0755\n");
        let result = validate_directives(&unit, &probe());
        assert!(result.invalid_directories.is_empty());
    }

    #[test]
    fn test_socket_exec_directives_checked() {
        let unit = parse_unit_str(
            "/etc/systemd/system/app.socket",
            "[Socket]\nListenStream=8080\nExecStartPre=/usr/bin/prepare\n",
        );
        let result = validate_directives(&unit, &probe());
        assert_eq!(result.missing_executables.len(), 1);
        assert_eq!(result.missing_executables[0].path, "/usr/bin/prepare");
    }

    #[test]
    fn test_deprecated_directives() {
        let mut set = UnitSet::new();
        let unit = parse_unit_str(
            "/etc/systemd/system/old.service",
            "[Service]\nMemoryLimit=512M\nCPUShares=1024\nStandardOutput=syslog\n",
        );
        set.insert(unit.name.clone(), unit);

        let deprecated = find_deprecated_directives(&set);
        assert_eq!(deprecated.len(), 3);
        assert_eq!(deprecated[0].directive, "CPUShares");
        assert_eq!(deprecated[1].directive, "MemoryLimit");
        assert!(deprecated[1].replacement.contains("MemoryMax"));
        assert_eq!(deprecated[2].directive, "StandardOutput=syslog");
    }

    #[test]
    fn test_deprecated_none_in_modern_unit() {
        let mut set = UnitSet::new();
        let unit = parse_unit_str(
            "/etc/systemd/system/new.service",
            "[Service]\nMemoryMax=512M\nStandardOutput=journal\n",
        );
        set.insert(unit.name.clone(), unit);
        assert!(find_deprecated_directives(&set).is_empty());
    }
}
