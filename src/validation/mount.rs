//! Mount unit validation: unit name versus `Where=`, required
//! directives, device presence, and filesystem types.

use serde::{Deserialize, Serialize};

use crate::types::{UnitFile, UnitSet};

use super::FileSystem;

/// Results of mount unit validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountValidation {
    pub unit: String,
    /// Unit name does not match `Where=`.
    pub name_mismatch: bool,
    pub expected_name: String,
    pub what_missing: bool,
    pub where_missing: bool,
    pub what_value: String,
    pub where_value: String,
    /// `What=` device absent (informational; the device may appear later).
    pub device_not_found: bool,
    pub invalid_fs_type: bool,
    pub fs_type: String,
    pub issues: Vec<String>,
    pub valid: bool,
}

/// Validate a mount unit against the filesystem probe.
pub fn validate_mount(unit: &UnitFile, fs: &dyn FileSystem) -> MountValidation {
    let mut result = MountValidation {
        unit: unit.name.clone(),
        name_mismatch: false,
        expected_name: String::new(),
        what_missing: false,
        where_missing: false,
        what_value: String::new(),
        where_value: String::new(),
        device_not_found: false,
        invalid_fs_type: false,
        fs_type: String::new(),
        issues: Vec::new(),
        valid: true,
    };

    if unit.kind != crate::types::UnitKind::Mount {
        return result;
    }

    if unit.section("Mount").is_none() {
        result.valid = false;
        result
            .issues
            .push("Mount unit has no [Mount] section".to_string());
        return result;
    }

    result.what_value = unit.directive("Mount", "What").to_string();
    result.where_value = unit.directive("Mount", "Where").to_string();
    result.fs_type = unit.directive("Mount", "Type").to_string();

    if result.what_value.is_empty() {
        result.what_missing = true;
        result.valid = false;
        result
            .issues
            .push("Mount unit missing required What= directive".to_string());
    }
    if result.where_value.is_empty() {
        result.where_missing = true;
        result.valid = false;
        result
            .issues
            .push("Mount unit missing required Where= directive".to_string());
    }

    if !result.where_value.is_empty() {
        let expected = path_to_mount_unit_name(&result.where_value);
        result.expected_name = expected.clone();
        if unit.name != expected {
            result.name_mismatch = true;
            result.valid = false;
            result.issues.push(format!(
                "Unit name doesn't match Where= path. Expected: {expected}"
            ));
        }
    }

    if !result.what_value.is_empty()
        && !is_network_fs(&result.fs_type)
        && !is_special_device(&result.what_value)
        && !fs.exists(&result.what_value)
    {
        result.device_not_found = true;
    }

    if !result.fs_type.is_empty() && !is_valid_fs_type(&result.fs_type) {
        result.invalid_fs_type = true;
        result
            .issues
            .push(format!("Unknown filesystem type: {}", result.fs_type));
    }

    result
}

/// Translate a mount point path to the canonical mount unit name:
/// `/home/user` becomes `home-user.mount`, `/` becomes `-.mount`.
/// Characters outside `[A-Za-z0-9_-]` are escaped as `\xHH`.
pub fn path_to_mount_unit_name(path: &str) -> String {
    if path == "/" {
        return "-.mount".to_string();
    }

    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    let name: String = trimmed
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    format!("{}.mount", escape_unit_name(&name))
}

/// Inverse of [`path_to_mount_unit_name`] for names whose segments did
/// not need escaping.
pub fn mount_unit_name_to_path(name: &str) -> String {
    let base = name.strip_suffix(".mount").unwrap_or(name);
    if base == "-" {
        return "/".to_string();
    }
    let unescaped = unescape_unit_name(base);
    format!("/{}", unescaped.replace('-', "/"))
}

fn escape_unit_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("\\x{byte:02x}"));
            }
        }
    }
    out
}

fn unescape_unit_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            if let Ok(byte) = u8::from_str_radix(&s[i + 2..i + 4], 16) {
                out.push(byte as char);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

const NETWORK_FS_TYPES: &[&str] = &[
    "nfs",
    "nfs4",
    "cifs",
    "smb",
    "smbfs",
    "sshfs",
    "fuse.sshfs",
    "glusterfs",
    "ceph",
    "lustre",
    "9p",
];

fn is_network_fs(fs_type: &str) -> bool {
    NETWORK_FS_TYPES.contains(&fs_type.to_ascii_lowercase().as_str())
}

const PSEUDO_DEVICES: &[&str] = &[
    "tmpfs",
    "proc",
    "sysfs",
    "devtmpfs",
    "devpts",
    "cgroup",
    "cgroup2",
    "hugetlbfs",
    "mqueue",
    "securityfs",
    "debugfs",
    "tracefs",
    "configfs",
    "fusectl",
    "pstore",
    "efivarfs",
    "bpf",
];

/// UUID/LABEL references and pseudo-filesystem names are not paths.
fn is_special_device(what: &str) -> bool {
    if what.starts_with("UUID=")
        || what.starts_with("LABEL=")
        || what.starts_with("PARTUUID=")
        || what.starts_with("PARTLABEL=")
    {
        return true;
    }
    PSEUDO_DEVICES
        .iter()
        .any(|p| what == *p || what.starts_with(&format!("{p}:")))
}

const KNOWN_FS_TYPES: &[&str] = &[
    // Linux native
    "ext2", "ext3", "ext4", "xfs", "btrfs", "f2fs", "jfs", "reiserfs",
    // FAT/NTFS
    "vfat", "fat", "msdos", "ntfs", "ntfs-3g", "exfat",
    // Network
    "nfs", "nfs4", "cifs", "smb", "sshfs", "fuse.sshfs", "glusterfs",
    // Pseudo
    "tmpfs", "ramfs", "devtmpfs", "proc", "sysfs", "devpts", "cgroup", "cgroup2",
    "securityfs", "debugfs", "tracefs", "hugetlbfs", "mqueue", "configfs", "fusectl",
    "pstore", "efivarfs", "bpf",
    // Other
    "iso9660", "udf", "squashfs", "overlay", "overlayfs", "fuse", "fuseblk",
    "autofs", "nfsd", "swap",
];

fn is_valid_fs_type(fs_type: &str) -> bool {
    let lower = fs_type.to_ascii_lowercase();
    if lower.starts_with("fuse.") {
        return true;
    }
    KNOWN_FS_TYPES.contains(&lower.as_str())
}

/// Validate every mount unit in a set.
pub fn validate_all_mounts(units: &UnitSet, fs: &dyn FileSystem) -> Vec<MountValidation> {
    units
        .values()
        .filter(|u| u.kind == crate::types::UnitKind::Mount)
        .map(|u| validate_mount(u, fs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit_str;
    use crate::validation::MockFileSystem;

    #[test]
    fn test_path_to_mount_unit_name() {
        assert_eq!(path_to_mount_unit_name("/"), "-.mount");
        assert_eq!(path_to_mount_unit_name("/home"), "home.mount");
        assert_eq!(path_to_mount_unit_name("/home/user"), "home-user.mount");
        assert_eq!(path_to_mount_unit_name("/mnt/data"), "mnt-data.mount");
        assert_eq!(path_to_mount_unit_name("/mnt/data/"), "mnt-data.mount");
    }

    #[test]
    fn test_path_escaping() {
        assert_eq!(path_to_mount_unit_name("/mnt/my data"), "mnt-my\\x20data.mount");
        assert_eq!(path_to_mount_unit_name("/srv/a.b"), "srv-a\\x2eb.mount");
    }

    #[test]
    fn test_mount_name_round_trip() {
        for path in ["/home", "/home/user", "/mnt/data", "/var/lib/app_cache"] {
            let name = path_to_mount_unit_name(path);
            assert_eq!(mount_unit_name_to_path(&name), path);
        }
        assert_eq!(mount_unit_name_to_path("-.mount"), "/");
    }

    fn mount(name: &str, content: &str) -> UnitFile {
        parse_unit_str(&format!("/etc/systemd/system/{name}"), content)
    }

    #[test]
    fn test_valid_mount() {
        let mut fs = MockFileSystem::new();
        fs.add_file("/dev/sdb1");
        let unit = mount(
            "mnt-data.mount",
            "[Mount]\nWhat=/dev/sdb1\nWhere=/mnt/data\nType=ext4\n",
        );
        let result = validate_mount(&unit, &fs);
        assert!(result.valid);
        assert!(!result.name_mismatch);
        assert!(!result.device_not_found);
    }

    #[test]
    fn test_name_mismatch() {
        let unit = mount(
            "wrong-name.mount",
            "[Mount]\nWhat=/dev/sdb1\nWhere=/mnt/data\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(result.name_mismatch);
        assert_eq!(result.expected_name, "mnt-data.mount");
        assert!(!result.valid);
    }

    #[test]
    fn test_missing_what_where() {
        let unit = mount("mnt-data.mount", "[Mount]\nOptions=defaults\n");
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(result.what_missing);
        assert!(result.where_missing);
        assert!(!result.valid);
    }

    #[test]
    fn test_missing_device_is_informational() {
        let unit = mount(
            "mnt-data.mount",
            "[Mount]\nWhat=/dev/sdz9\nWhere=/mnt/data\nType=ext4\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(result.device_not_found);
        // Not flagged invalid: the device might be created later.
        assert!(result.valid);
    }

    #[test]
    fn test_uuid_device_not_probed() {
        let unit = mount(
            "mnt-data.mount",
            "[Mount]\nWhat=UUID=abcd-1234\nWhere=/mnt/data\nType=ext4\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(!result.device_not_found);
    }

    #[test]
    fn test_network_fs_not_probed() {
        let unit = mount(
            "mnt-share.mount",
            "[Mount]\nWhat=server:/export\nWhere=/mnt/share\nType=nfs\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(!result.device_not_found);
    }

    #[test]
    fn test_tmpfs_not_probed() {
        let unit = mount(
            "run-scratch.mount",
            "[Mount]\nWhat=tmpfs\nWhere=/run/scratch\nType=tmpfs\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(!result.device_not_found);
        assert!(!result.invalid_fs_type);
    }

    #[test]
    fn test_unknown_fs_type() {
        let unit = mount(
            "mnt-data.mount",
            "[Mount]\nWhat=/dev/sdb1\nWhere=/mnt/data\nType=weirdfs\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(result.invalid_fs_type);
    }

    #[test]
    fn test_fuse_subtypes_allowed() {
        let unit = mount(
            "mnt-remote.mount",
            "[Mount]\nWhat=remote:/data\nWhere=/mnt/remote\nType=fuse.rclone\n",
        );
        let result = validate_mount(&unit, &MockFileSystem::new());
        assert!(!result.invalid_fs_type);
    }
}
