//! Scan result structures consumed by the reporters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Category, Issue, Severity, UnitFile};

/// Aggregate statistics for a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_units: usize,
    pub total_issues: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub rules_checked: usize,
}

/// The result of a scan: units sorted by name, issues sorted by
/// descending severity then unit name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub units: Vec<UnitFile>,
    pub issues: Vec<Issue>,
    pub summary: Summary,
}

impl ScanResult {
    /// Assemble a result from units and raw issues, applying the
    /// canonical sort orders and computing the summary.
    pub fn assemble(mut units: Vec<UnitFile>, mut issues: Vec<Issue>, rules_checked: usize) -> Self {
        units.sort_by(|a, b| a.name.cmp(&b.name));
        issues.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.unit.cmp(&b.unit))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
                .then_with(|| a.line.cmp(&b.line))
        });

        let mut summary = Summary {
            total_units: units.len(),
            total_issues: issues.len(),
            rules_checked,
            ..Default::default()
        };
        for issue in &issues {
            *summary.by_severity.entry(issue.severity).or_insert(0) += 1;
            *summary.by_category.entry(issue.category).or_insert(0) += 1;
        }

        Self {
            units,
            issues,
            summary,
        }
    }

    /// The highest severity among the issues, if any.
    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    /// Whether any issue is at or above the given severity.
    pub fn has_issues_at_least(&self, severity: Severity) -> bool {
        self.highest_severity()
            .map(|s| s >= severity)
            .unwrap_or(false)
    }
}
