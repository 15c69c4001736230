//! Type-specific unit validation.
//!
//! Validators take a unit plus ancillary inputs (the full unit set or a
//! filesystem probe) and return structured validation records. Findings
//! are never errors.

mod directive;
mod mount;
mod path;
mod service;
mod socket;
mod timer;

pub use directive::{
    find_deprecated_directives, validate_directives, DeprecatedDirective, DirectiveValidation,
    MissingFile,
};
pub(crate) use directive::deprecated_replacement;
pub use mount::{
    mount_unit_name_to_path, path_to_mount_unit_name, validate_all_mounts, validate_mount,
    MountValidation,
};
pub use path::{
    validate_all_paths, validate_path, validate_target, PathValidation, TargetValidation,
};
pub use service::{validate_service, Contradiction, MissingExec, ServiceValidation};
pub use socket::{
    detect_port_conflicts, validate_socket, InvalidListen, PortConflict, SocketValidation,
};
pub use timer::{validate_all_timers, validate_timer, InvalidTimerDirective, TimerValidation};

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

/// Filesystem and identity probe used by the validators.
///
/// Implementations must be thread-safe; validators run in parallel.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn is_executable(&self, path: &str) -> bool;
    fn is_directory(&self, path: &str) -> bool;
    fn user_exists(&self, name: &str) -> bool;
    fn group_exists(&self, name: &str) -> bool;
}

/// Probe backed by the real filesystem. An optional root prefix enables
/// offline analysis of an extracted tree; identity lookups always
/// succeed in offline mode because the target's user database is not
/// available.
pub struct RealFileSystem {
    root: Option<PathBuf>,
    users: FxHashSet<String>,
    groups: FxHashSet<String>,
}

impl RealFileSystem {
    pub fn new() -> Self {
        Self {
            root: None,
            users: read_names("/etc/passwd"),
            groups: read_names("/etc/group"),
        }
    }

    /// Offline probe: filesystem lookups are prefixed with `root`.
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
            users: FxHashSet::default(),
            groups: FxHashSet::default(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn is_executable(&self, path: &str) -> bool {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(self.resolve(path))
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    fn is_directory(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn user_exists(&self, name: &str) -> bool {
        if self.root.is_some() {
            return true;
        }
        self.users.contains(name)
    }

    fn group_exists(&self, name: &str) -> bool {
        if self.root.is_some() {
            return true;
        }
        self.groups.contains(name)
    }
}

/// First field of each line of a passwd-format file.
fn read_names<P: AsRef<Path>>(path: P) -> FxHashSet<String> {
    std::fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .filter_map(|line| line.split(':').next())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// In-memory probe for tests. Read-only after setup.
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: FxHashSet<String>,
    executables: FxHashSet<String>,
    directories: FxHashSet<String>,
    users: FxHashSet<String>,
    groups: FxHashSet<String>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str) -> &mut Self {
        self.files.insert(path.to_string());
        self
    }

    pub fn add_executable(&mut self, path: &str) -> &mut Self {
        self.files.insert(path.to_string());
        self.executables.insert(path.to_string());
        self
    }

    pub fn add_directory(&mut self, path: &str) -> &mut Self {
        self.files.insert(path.to_string());
        self.directories.insert(path.to_string());
        self
    }

    pub fn add_user(&mut self, name: &str) -> &mut Self {
        self.users.insert(name.to_string());
        self
    }

    pub fn add_group(&mut self, name: &str) -> &mut Self {
        self.groups.insert(name.to_string());
        self
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn is_executable(&self, path: &str) -> bool {
        self.executables.contains(path)
    }

    fn is_directory(&self, path: &str) -> bool {
        self.directories.contains(path)
    }

    fn user_exists(&self, name: &str) -> bool {
        self.users.contains(name)
    }

    fn group_exists(&self, name: &str) -> bool {
        self.groups.contains(name)
    }
}
