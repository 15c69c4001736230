//! Scan orchestration: load units, run the rule engine per unit in
//! parallel, and assemble the sorted result.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::RuleConfig;
use crate::error::Result;
use crate::loader;
use crate::report::ScanResult;
use crate::rules::{self, Context};
use crate::types::{Category, Issue, Severity, UnitSet};
use crate::validation::{FileSystem, RealFileSystem};

/// Filters applied to a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub category: Option<Category>,
    pub min_severity: Option<Severity>,
    pub tags: Vec<String>,
}

impl ScanOptions {
    fn is_filtered(&self) -> bool {
        self.category.is_some() || self.min_severity.is_some() || !self.tags.is_empty()
    }
}

/// Orchestrates the scanning of unit files.
pub struct Scanner {
    config: RuleConfig,
    unit_paths: Vec<PathBuf>,
    fs: Box<dyn FileSystem>,
}

impl Scanner {
    /// Scanner over the default system unit paths with a live
    /// filesystem probe.
    pub fn new() -> Self {
        Self {
            config: RuleConfig::default(),
            unit_paths: loader::default_unit_paths(),
            fs: Box::new(RealFileSystem::new()),
        }
    }

    pub fn with_config(mut self, config: RuleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_unit_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.unit_paths = paths;
        self
    }

    /// Replace the filesystem/identity probe, e.g. with an offline
    /// probe rooted at an extracted tree.
    pub fn with_filesystem(mut self, fs: Box<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Full scan of the configured unit paths.
    pub fn scan(&self, opts: &ScanOptions) -> Result<ScanResult> {
        let units = loader::load_units_from_paths(&self.unit_paths);
        info!("loaded {} units", units.len());
        Ok(self.run(units, opts))
    }

    /// Check specific unit files or directories. Errors on individual
    /// files surface; directories are best-effort.
    pub fn check_files(&self, paths: &[PathBuf], opts: &ScanOptions) -> Result<ScanResult> {
        let units = loader::load_explicit_paths(paths)?;
        Ok(self.run(units, opts))
    }

    /// Run the rule engine over an already-loaded unit set.
    pub fn run(&self, units: UnitSet, opts: &ScanOptions) -> ScanResult {
        let unit_list: Vec<_> = units.values().collect();

        // Per-unit rule checks are independent; run them on the pool
        // and sort afterwards so output is deterministic.
        let issues: Vec<Issue> = unit_list
            .par_iter()
            .map(|unit| {
                let ctx = Context::new(unit, &units, &self.config, &*self.fs);
                let issues = if opts.is_filtered() {
                    rules::run_filtered(&ctx, opts.category, opts.min_severity, &opts.tags)
                } else {
                    rules::run_all(&ctx)
                };
                debug!("{}: {} issues", unit.name, issues.len());
                issues
            })
            .flatten()
            .collect();

        let owned_units: Vec<_> = units.values().cloned().collect();
        ScanResult::assemble(owned_units, issues, rules::registry().count())
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}
