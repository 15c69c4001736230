//! Parsed unit file model.
//!
//! A unit is an immutable bag of sections; each section maps directive
//! keys to the ordered list of values that appeared in the file. Order
//! matters for repeated directives like `ExecStartPre=`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unit type, derived from the file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Service,
    Socket,
    Timer,
    Mount,
    Automount,
    Swap,
    Target,
    Path,
    Slice,
    Scope,
    Unknown,
}

impl UnitKind {
    /// Derive the unit kind from a unit file name (e.g. `nginx.service`).
    pub fn from_name(name: &str) -> Self {
        match name.rsplit('.').next() {
            Some("service") => UnitKind::Service,
            Some("socket") => UnitKind::Socket,
            Some("timer") => UnitKind::Timer,
            Some("mount") => UnitKind::Mount,
            Some("automount") => UnitKind::Automount,
            Some("swap") => UnitKind::Swap,
            Some("target") => UnitKind::Target,
            Some("path") => UnitKind::Path,
            Some("slice") => UnitKind::Slice,
            Some("scope") => UnitKind::Scope,
            _ => UnitKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Service => "service",
            UnitKind::Socket => "socket",
            UnitKind::Timer => "timer",
            UnitKind::Mount => "mount",
            UnitKind::Automount => "automount",
            UnitKind::Swap => "swap",
            UnitKind::Target => "target",
            UnitKind::Path => "path",
            UnitKind::Slice => "slice",
            UnitKind::Scope => "scope",
            UnitKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single `Key=Value` entry with its source line for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// A section of a unit file, e.g. `[Service]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    /// Directive key to the ordered list of occurrences.
    pub directives: BTreeMap<String, Vec<Directive>>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directives: BTreeMap::new(),
        }
    }

    /// First value for a directive, or the empty string.
    pub fn directive(&self, key: &str) -> &str {
        self.directives
            .get(key)
            .and_then(|d| d.first())
            .map(|d| d.value.as_str())
            .unwrap_or("")
    }

    /// All occurrences of a directive, in file order.
    pub fn directive_entries(&self, key: &str) -> &[Directive] {
        self.directives.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A parsed systemd unit file. Immutable after parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFile {
    /// e.g. `nginx.service`
    pub name: String,
    /// e.g. `/lib/systemd/system/nginx.service`
    pub path: String,
    pub kind: UnitKind,
    pub sections: BTreeMap<String, Section>,
    /// Raw file contents.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub raw: String,
}

impl UnitFile {
    /// First value for a directive in a section, or the empty string when
    /// the section or key is absent. Never an error.
    pub fn directive(&self, section: &str, key: &str) -> &str {
        self.sections
            .get(section)
            .map(|s| s.directive(key))
            .unwrap_or("")
    }

    /// All occurrences of a directive in a section, in file order.
    pub fn directives(&self, section: &str, key: &str) -> &[Directive] {
        self.sections
            .get(section)
            .map(|s| s.directive_entries(key))
            .unwrap_or(&[])
    }

    /// Whether a directive key appears at all in a section.
    pub fn has_directive(&self, section: &str, key: &str) -> bool {
        self.sections
            .get(section)
            .map(|s| s.directives.contains_key(key))
            .unwrap_or(false)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn is_service(&self) -> bool {
        self.kind == UnitKind::Service
    }

    pub fn is_socket(&self) -> bool {
        self.kind == UnitKind::Socket
    }

    pub fn is_timer(&self) -> bool {
        self.kind == UnitKind::Timer
    }
}

/// Split a space-separated directive value into target names.
pub fn split_value(value: &str) -> Vec<&str> {
    value.split_whitespace().filter(|s| !s.is_empty()).collect()
}
