//! Socket unit validation: listen directive grammar, matching service,
//! and cross-socket port conflicts.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::socket_service;
use crate::types::{UnitFile, UnitSet};

/// An invalid listen directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidListen {
    pub directive: String,
    pub value: String,
    pub reason: String,
    pub line: usize,
}

/// Two sockets listening on the same port for the same directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConflict {
    pub directive: String,
    pub port: String,
    pub socket: String,
    pub other_socket: String,
}

/// Results of socket unit validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketValidation {
    pub unit: String,
    /// No matching `.service` unit exists.
    pub missing_service: bool,
    pub service_name: String,
    pub invalid_listen: Vec<InvalidListen>,
    pub issues: Vec<String>,
    pub valid: bool,
}

const LISTEN_DIRECTIVES: &[&str] = &[
    "ListenStream",
    "ListenDatagram",
    "ListenSequentialPacket",
    "ListenFIFO",
    "ListenSpecial",
    "ListenNetlink",
    "ListenMessageQueue",
    "ListenUSBFunction",
];

/// Maximum length of a Unix socket path (sun_path).
const MAX_UNIX_PATH: usize = 108;

/// Validate a socket unit against the full unit set.
pub fn validate_socket(unit: &UnitFile, all_units: &UnitSet) -> SocketValidation {
    let mut result = SocketValidation {
        unit: unit.name.clone(),
        missing_service: false,
        service_name: String::new(),
        invalid_listen: Vec::new(),
        issues: Vec::new(),
        valid: true,
    };

    if !unit.is_socket() {
        return result;
    }

    if unit.section("Socket").is_none() {
        result.valid = false;
        result
            .issues
            .push("Socket unit has no [Socket] section".to_string());
        return result;
    }

    result.service_name = socket_service(unit);
    if !all_units.contains_key(&result.service_name) {
        result.missing_service = true;
        result.valid = false;
    }

    let mut has_listen = false;
    for directive in LISTEN_DIRECTIVES {
        for d in unit.directives("Socket", directive) {
            has_listen = true;
            if let Some(invalid) = validate_listen_value(directive, &d.value, d.line) {
                result.invalid_listen.push(invalid);
            }
        }
    }

    if !has_listen {
        result
            .issues
            .push("Socket unit has no Listen* directives".to_string());
        result.valid = false;
    }

    if !result.invalid_listen.is_empty() {
        result.valid = false;
    }

    result
}

fn validate_listen_value(directive: &str, value: &str, line: usize) -> Option<InvalidListen> {
    let invalid = |reason: String| {
        Some(InvalidListen {
            directive: directive.to_string(),
            value: value.to_string(),
            reason,
            line,
        })
    };

    if value.is_empty() {
        return invalid("Empty value".to_string());
    }

    match directive {
        "ListenStream" | "ListenDatagram" | "ListenSequentialPacket" => {
            validate_network_listen(directive, value, line)
        }
        "ListenFIFO" | "ListenSpecial" => {
            if !value.starts_with('/') {
                return invalid("Must be an absolute path".to_string());
            }
            None
        }
        "ListenNetlink" => validate_netlink_listen(directive, value, line),
        _ => None,
    }
}

/// `ListenStream=`/`ListenDatagram=`/`ListenSequentialPacket=` accept a
/// bare port, `host:port`, a bracketed IPv6 address with port, a Unix
/// socket path, or an abstract socket `@name`.
fn validate_network_listen(directive: &str, value: &str, line: usize) -> Option<InvalidListen> {
    let invalid = |reason: String| {
        Some(InvalidListen {
            directive: directive.to_string(),
            value: value.to_string(),
            reason,
            line,
        })
    };

    // Unix socket path or abstract socket.
    if value.starts_with('/') {
        if value.len() > MAX_UNIX_PATH {
            return invalid(format!(
                "Unix socket path exceeds maximum length ({MAX_UNIX_PATH} characters)"
            ));
        }
        return None;
    }
    if value.starts_with('@') {
        return None;
    }

    // Bare port.
    if let Ok(port) = value.parse::<u64>() {
        if !(1..=65535).contains(&port) {
            return invalid(format!("Port {port} is out of valid range (1-65535)"));
        }
        return None;
    }

    // Bracketed IPv6 with port: [::1]:8080.
    if let Some(rest) = value.strip_prefix('[') {
        let Some((_, port_part)) = rest.split_once("]:") else {
            return invalid("Malformed IPv6 address (expected [addr]:port)".to_string());
        };
        return check_port(directive, value, port_part, line);
    }

    match value.matches(':').count() {
        0 => {
            // A host or address with no port cannot be bound.
            invalid("Host without port".to_string())
        }
        1 => {
            let (_host, port_part) = value.split_once(':').expect("one colon present");
            check_port(directive, value, port_part, line)
        }
        _ => invalid("IP address without port".to_string()),
    }
}

fn check_port(directive: &str, value: &str, port: &str, line: usize) -> Option<InvalidListen> {
    // Non-numeric ports are service names like "http".
    let Ok(port_num) = port.parse::<u64>() else {
        return None;
    };
    if !(1..=65535).contains(&port_num) {
        return Some(InvalidListen {
            directive: directive.to_string(),
            value: value.to_string(),
            reason: format!("Port {port_num} is out of valid range (1-65535)"),
            line,
        });
    }
    None
}

const NETLINK_FAMILIES: &[&str] = &[
    "route",
    "firewall",
    "inet-diag",
    "nflog",
    "xfrm",
    "selinux",
    "iscsi",
    "audit",
    "fib-lookup",
    "connector",
    "netfilter",
    "ip6-firewall",
    "dnrtmsg",
    "kobject-uevent",
    "generic",
    "scsitransport",
    "ecryptfs",
    "rdma",
    "crypto",
];

fn validate_netlink_listen(directive: &str, value: &str, line: usize) -> Option<InvalidListen> {
    let Some(family) = value.split_whitespace().next() else {
        return Some(InvalidListen {
            directive: directive.to_string(),
            value: value.to_string(),
            reason: "Empty netlink family".to_string(),
            line,
        });
    };

    let family_lower = family.to_ascii_lowercase();
    if NETLINK_FAMILIES.contains(&family_lower.as_str()) {
        return None;
    }
    // Numeric family ids are allowed.
    if family_lower.parse::<u32>().is_ok() {
        return None;
    }

    Some(InvalidListen {
        directive: directive.to_string(),
        value: value.to_string(),
        reason: format!("Unknown netlink family: {family}"),
        line,
    })
}

static TRAILING_PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?::(\d+)$|^(\d+)$)").expect("port regex is valid"));

/// Find distinct sockets listening on the same (directive, port) key.
pub fn detect_port_conflicts(units: &UnitSet) -> Vec<PortConflict> {
    let mut conflicts = Vec::new();
    let mut port_map: BTreeMap<(String, String), String> = BTreeMap::new();

    for (name, unit) in units {
        if !unit.is_socket() {
            continue;
        }

        for directive in ["ListenStream", "ListenDatagram"] {
            for d in unit.directives("Socket", directive) {
                let Some(caps) = TRAILING_PORT_RE.captures(&d.value) else {
                    continue;
                };
                let port = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string());
                let Some(port) = port else { continue };

                let key = (directive.to_string(), port.clone());
                match port_map.get(&key) {
                    Some(existing) if existing != name => {
                        conflicts.push(PortConflict {
                            directive: directive.to_string(),
                            port,
                            socket: name.clone(),
                            other_socket: existing.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        port_map.insert(key, name.clone());
                    }
                }
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit_str;

    fn socket_set(files: &[(&str, &str)]) -> UnitSet {
        let mut set = UnitSet::new();
        for (name, content) in files {
            let unit = parse_unit_str(&format!("/etc/systemd/system/{name}"), content);
            set.insert(unit.name.clone(), unit);
        }
        set
    }

    fn validate(content: &str, with_service: bool) -> SocketValidation {
        let mut files = vec![("app.socket", content)];
        if with_service {
            files.push(("app.service", "[Service]\nExecStart=/bin/app\n"));
        }
        let set = socket_set(&files);
        validate_socket(&set["app.socket"], &set)
    }

    #[test]
    fn test_valid_port() {
        let result = validate("[Socket]\nListenStream=8080\n", true);
        assert!(result.valid);
        assert!(result.invalid_listen.is_empty());
    }

    #[test]
    fn test_port_out_of_range() {
        let result = validate("[Socket]\nListenStream=99999\n", true);
        assert_eq!(result.invalid_listen.len(), 1);
        assert!(result.invalid_listen[0].reason.contains("out of valid range"));
    }

    #[test]
    fn test_ipv6_with_port() {
        let result = validate("[Socket]\nListenStream=[::1]:8080\n", true);
        assert!(result.invalid_listen.is_empty());
    }

    #[test]
    fn test_ipv4_with_port() {
        let result = validate("[Socket]\nListenStream=127.0.0.1:8080\n", true);
        assert!(result.invalid_listen.is_empty());
    }

    #[test]
    fn test_unix_path_and_abstract() {
        let result = validate(
            "[Socket]\nListenStream=/run/app.sock\nListenStream=@abstract\n",
            true,
        );
        assert!(result.invalid_listen.is_empty());
    }

    #[test]
    fn test_unix_path_too_long() {
        let long = format!("/run/{}", "x".repeat(120));
        let result = validate(&format!("[Socket]\nListenStream={long}\n"), true);
        assert_eq!(result.invalid_listen.len(), 1);
        assert!(result.invalid_listen[0].reason.contains("maximum length"));
    }

    #[test]
    fn test_bare_ipv6_flagged() {
        let result = validate("[Socket]\nListenStream=::1\n", true);
        assert_eq!(result.invalid_listen.len(), 1);
    }

    #[test]
    fn test_bare_host_flagged() {
        let result = validate("[Socket]\nListenStream=localhost\n", true);
        assert_eq!(result.invalid_listen.len(), 1);
        assert!(result.invalid_listen[0].reason.contains("without port"));
    }

    #[test]
    fn test_named_service_port_ok() {
        let result = validate("[Socket]\nListenStream=0.0.0.0:http\n", true);
        assert!(result.invalid_listen.is_empty());
    }

    #[test]
    fn test_fifo_requires_absolute_path() {
        let result = validate("[Socket]\nListenFIFO=relative/path\n", true);
        assert_eq!(result.invalid_listen.len(), 1);
        assert!(result.invalid_listen[0].reason.contains("absolute path"));

        let result = validate("[Socket]\nListenFIFO=/run/app.fifo\n", true);
        assert!(result.invalid_listen.is_empty());
    }

    #[test]
    fn test_netlink_families() {
        let result = validate("[Socket]\nListenNetlink=audit 1\n", true);
        assert!(result.invalid_listen.is_empty());

        let result = validate("[Socket]\nListenNetlink=16\n", true);
        assert!(result.invalid_listen.is_empty());

        let result = validate("[Socket]\nListenNetlink=bogus-family\n", true);
        assert_eq!(result.invalid_listen.len(), 1);
    }

    #[test]
    fn test_no_listen_directive() {
        let result = validate("[Socket]\nAccept=yes\n", true);
        assert!(!result.valid);
        assert!(result.issues[0].contains("no Listen"));
    }

    #[test]
    fn test_missing_service() {
        let result = validate("[Socket]\nListenStream=8080\n", false);
        assert!(result.missing_service);
        assert_eq!(result.service_name, "app.service");
        assert!(!result.valid);
    }

    #[test]
    fn test_explicit_service_name() {
        let set = socket_set(&[
            (
                "app.socket",
                "[Socket]\nListenStream=8080\nService=backend.service\n",
            ),
            ("backend.service", "[Service]\nExecStart=/bin/backend\n"),
        ]);
        let result = validate_socket(&set["app.socket"], &set);
        assert_eq!(result.service_name, "backend.service");
        assert!(!result.missing_service);
    }

    #[test]
    fn test_port_conflicts() {
        let set = socket_set(&[
            (
                "a.socket",
                "[Socket]\nListenStream=8080\n",
            ),
            (
                "b.socket",
                "[Socket]\nListenStream=0.0.0.0:8080\n",
            ),
            (
                "c.socket",
                "[Socket]\nListenDatagram=8080\n",
            ),
        ]);
        let conflicts = detect_port_conflicts(&set);
        // Stream 8080 is shared by a and b; the datagram use is distinct.
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].port, "8080");
        assert_eq!(conflicts[0].directive, "ListenStream");
        assert_eq!(conflicts[0].other_socket, "a.socket");
        assert_eq!(conflicts[0].socket, "b.socket");
    }

    #[test]
    fn test_no_conflict_for_unix_paths() {
        let set = socket_set(&[
            ("a.socket", "[Socket]\nListenStream=/run/a.sock\n"),
            ("b.socket", "[Socket]\nListenStream=/run/a.sock\n"),
        ]);
        assert!(detect_port_conflicts(&set).is_empty());
    }
}
