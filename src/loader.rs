//! Unit file discovery and loading.
//!
//! Directory scans are best-effort: unreadable or malformed files are
//! skipped with a warning. Loading a single explicit file surfaces the
//! first failure.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, UnitLintError};
use crate::parser::parse_unit_file;
use crate::types::{UnitFile, UnitSet};

/// File suffixes that identify unit files.
pub const UNIT_SUFFIXES: &[&str] = &[
    ".service",
    ".socket",
    ".timer",
    ".mount",
    ".automount",
    ".swap",
    ".target",
    ".path",
    ".slice",
    ".scope",
];

/// Default search paths for system units.
pub fn default_unit_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/etc/systemd/system"),
        PathBuf::from("/run/systemd/system"),
        PathBuf::from("/lib/systemd/system"),
        PathBuf::from("/usr/lib/systemd/system"),
    ]
}

/// Whether a file name has a recognized unit suffix.
pub fn is_unit_file(name: &str) -> bool {
    UNIT_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Load all unit files from one directory (non-recursive). Files that
/// fail to parse are skipped.
pub fn load_units_from_directory<P: AsRef<Path>>(dir: P) -> Result<UnitSet> {
    let dir = dir.as_ref();

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_unit_file(&e.file_name().to_string_lossy()))
        .map(|e| e.path().to_path_buf())
        .collect();

    debug!("found {} unit files in {}", files.len(), dir.display());

    let parsed: Vec<Option<UnitFile>> = files
        .par_iter()
        .map(|path| match parse_unit_file(path) {
            Ok(unit) => Some(unit),
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    let mut units = UnitSet::new();
    for unit in parsed.into_iter().flatten() {
        units.insert(unit.name.clone(), unit);
    }
    Ok(units)
}

/// Load units from a list of directories. Paths that do not exist are
/// skipped; earlier paths win on name collisions, mirroring systemd's
/// unit search order.
pub fn load_units_from_paths(paths: &[PathBuf]) -> UnitSet {
    let mut all = UnitSet::new();
    for path in paths {
        if !path.is_dir() {
            debug!("skipping missing unit path {}", path.display());
            continue;
        }
        match load_units_from_directory(path) {
            Ok(units) => {
                for (name, unit) in units {
                    all.entry(name).or_insert(unit);
                }
            }
            Err(e) => warn!("failed to scan {}: {}", path.display(), e),
        }
    }
    all
}

/// Load a single explicit unit file; failures are surfaced.
pub fn load_unit_file<P: AsRef<Path>>(path: P) -> Result<UnitFile> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(UnitLintError::access(path, "no such file"));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !is_unit_file(&name) {
        return Err(UnitLintError::not_a_unit_file(path));
    }
    parse_unit_file(path)
}

/// Load explicit files and/or directories. Single files surface the
/// first failure; directory contents are best-effort.
pub fn load_explicit_paths(paths: &[PathBuf]) -> Result<UnitSet> {
    let mut all = UnitSet::new();
    for path in paths {
        if path.is_dir() {
            for (name, unit) in load_units_from_directory(path)? {
                all.insert(name, unit);
            }
        } else {
            let unit = load_unit_file(path)?;
            all.insert(unit.name.clone(), unit);
        }
    }
    Ok(all)
}
