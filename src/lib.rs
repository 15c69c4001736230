//! unitlint - static analysis for systemd unit files.
//!
//! The library audits a collection of unit files and reports
//! misconfigurations, security weaknesses, reliability hazards, and
//! timing risks. The analysis core is a typed dependency multigraph
//! over units (cycles, reachability, critical paths, failure
//! propagation) plus a rule engine running a catalog of checks with
//! filterable metadata.
//!
//! # Example
//!
//! ```no_run
//! use unitlint::scanner::{ScanOptions, Scanner};
//!
//! let scanner = Scanner::new();
//! let result = scanner.scan(&ScanOptions::default()).unwrap();
//!
//! for issue in &result.issues {
//!     println!("[{}] {} {}: {}", issue.severity, issue.rule_id, issue.unit, issue.description);
//! }
//! ```
//!
//! The core never modifies unit files and does not require a running
//! service manager; it operates on files alone, optionally against an
//! offline root.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod output;
pub mod parser;
pub mod propagation;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod timing;
pub mod types;
pub mod validation;

pub use error::{Result, UnitLintError};
pub use report::{ScanResult, Summary};
pub use types::{Category, Issue, Severity, UnitFile, UnitKind, UnitSet};

use std::path::PathBuf;

use config::RuleConfig;
use scanner::{ScanOptions, Scanner};

/// Scan the given unit directories (or the system defaults when empty)
/// with the default configuration.
pub fn scan_paths(paths: &[PathBuf], opts: &ScanOptions) -> Result<ScanResult> {
    let mut scanner = Scanner::new().with_config(RuleConfig::default());
    if !paths.is_empty() {
        scanner = scanner.with_unit_paths(paths.to_vec());
    }
    scanner.scan(opts)
}

/// Check specific unit files with the default configuration.
pub fn check_files(paths: &[PathBuf], opts: &ScanOptions) -> Result<ScanResult> {
    Scanner::new().check_files(paths, opts)
}
