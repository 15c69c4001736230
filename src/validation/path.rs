//! Path and target unit validation.

use serde::{Deserialize, Serialize};

use crate::graph::path_service;
use crate::types::{split_value, UnitFile, UnitKind, UnitSet};

/// Results of path unit validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathValidation {
    pub unit: String,
    /// No matching service unit exists.
    pub missing_service: bool,
    pub service_name: String,
    /// No `PathExists=`/`PathChanged=`/... directive at all.
    pub no_path_directive: bool,
    pub invalid_paths: Vec<String>,
    pub watched_paths: Vec<String>,
    pub issues: Vec<String>,
    pub valid: bool,
}

const PATH_DIRECTIVES: &[&str] = &[
    "PathExists",
    "PathExistsGlob",
    "PathChanged",
    "PathModified",
    "DirectoryNotEmpty",
];

/// Validate a path unit against the full unit set.
pub fn validate_path(unit: &UnitFile, all_units: &UnitSet) -> PathValidation {
    let mut result = PathValidation {
        unit: unit.name.clone(),
        missing_service: false,
        service_name: String::new(),
        no_path_directive: false,
        invalid_paths: Vec::new(),
        watched_paths: Vec::new(),
        issues: Vec::new(),
        valid: true,
    };

    if unit.kind != UnitKind::Path {
        return result;
    }

    if unit.section("Path").is_none() {
        result.valid = false;
        result
            .issues
            .push("Path unit has no [Path] section".to_string());
        return result;
    }

    result.service_name = path_service(unit);
    if !all_units.contains_key(&result.service_name) {
        result.missing_service = true;
        result.valid = false;
    }

    let mut has_path_directive = false;
    for directive in PATH_DIRECTIVES {
        for d in unit.directives("Path", directive) {
            has_path_directive = true;
            result.watched_paths.push(d.value.clone());
            if let Some(problem) = validate_watched_path(directive, &d.value) {
                result.invalid_paths.push(problem);
            }
        }
    }

    if !has_path_directive {
        result.no_path_directive = true;
        result.valid = false;
        result
            .issues
            .push("Path unit has no path directives (PathExists, PathChanged, etc.)".to_string());
    }

    if !result.invalid_paths.is_empty() {
        result.valid = false;
    }

    result
}

fn validate_watched_path(directive: &str, value: &str) -> Option<String> {
    if value.is_empty() {
        return Some(format!("Empty path for {directive}"));
    }

    // Glob patterns are valid as-is.
    if directive == "PathExistsGlob" {
        return None;
    }

    if !value.starts_with('/') {
        return Some(format!("{value} is not an absolute path"));
    }

    if value == "/" {
        return Some("Watching root directory (/) is likely unintended".to_string());
    }

    // /proc and /sys are fine to watch.
    if value.starts_with("/proc") || value.starts_with("/sys") {
        return None;
    }

    if value.contains("..") {
        return Some(format!("{value} contains parent directory reference (..)"));
    }

    None
}

/// Validate every path unit in a set.
pub fn validate_all_paths(units: &UnitSet) -> Vec<PathValidation> {
    units
        .values()
        .filter(|u| u.kind == UnitKind::Path)
        .map(|u| validate_path(u, units))
        .collect()
}

/// Results of target unit validation. Targets are permissive; the only
/// hard finding is a contradictory pull-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetValidation {
    pub unit: String,
    pub conflicts: Vec<String>,
    pub required_by: Vec<String>,
    pub wanted_by: Vec<String>,
    /// Units this target pulls in via Requires/Wants.
    pub pulls_in: Vec<String>,
    pub is_default_target: bool,
    pub issues: Vec<String>,
    pub valid: bool,
}

/// Validate a target unit.
pub fn validate_target(unit: &UnitFile, _all_units: &UnitSet) -> TargetValidation {
    let mut result = TargetValidation {
        unit: unit.name.clone(),
        conflicts: Vec::new(),
        required_by: Vec::new(),
        wanted_by: Vec::new(),
        pulls_in: Vec::new(),
        is_default_target: unit.name == "default.target",
        issues: Vec::new(),
        valid: true,
    };

    if unit.kind != UnitKind::Target {
        return result;
    }

    for d in unit.directives("Unit", "Conflicts") {
        result
            .conflicts
            .extend(split_value(&d.value).into_iter().map(str::to_string));
    }
    for directive in ["Requires", "Wants"] {
        for d in unit.directives("Unit", directive) {
            result
                .pulls_in
                .extend(split_value(&d.value).into_iter().map(str::to_string));
        }
    }
    for d in unit.directives("Install", "RequiredBy") {
        result
            .required_by
            .extend(split_value(&d.value).into_iter().map(str::to_string));
    }
    for d in unit.directives("Install", "WantedBy") {
        result
            .wanted_by
            .extend(split_value(&d.value).into_iter().map(str::to_string));
    }

    for conflict in &result.conflicts {
        if result.pulls_in.contains(conflict) {
            result
                .issues
                .push(format!("Target both Conflicts with and Requires/Wants {conflict}"));
            result.valid = false;
        }
    }

    result
}
