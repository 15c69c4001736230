//! Rule execution configuration: disabled rules, severity overrides,
//! and tunable thresholds.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// Tunable threshold values consulted by rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub security_score_max: f64,
    /// Seconds.
    pub boot_critical_chain_max: f64,
    /// Seconds.
    pub restart_sec_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            security_score_max: 5.0,
            boot_critical_chain_max: 30.0,
            restart_sec_min: 1.0,
        }
    }
}

/// Configuration for rule execution. Read-only during a run.
#[derive(Debug, Clone, Default)]
pub struct RuleConfig {
    pub disabled_rules: FxHashSet<String>,
    pub severity_overrides: FxHashMap<String, Severity>,
    pub thresholds: Thresholds,
}

impl RuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable_rule(&mut self, id: &str) -> &mut Self {
        self.disabled_rules.insert(id.to_string());
        self
    }

    pub fn override_severity(&mut self, id: &str, severity: Severity) -> &mut Self {
        self.severity_overrides.insert(id.to_string(), severity);
        self
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled_rules.contains(id)
    }

    pub fn severity_override(&self, id: &str) -> Option<Severity> {
        self.severity_overrides.get(id).copied()
    }
}
