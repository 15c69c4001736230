//! The rule engine: rule contract, process-wide registry, execution
//! context, and filtered execution.
//!
//! Rules are registered once by [`registry`] through explicit
//! registration functions; registering two rules with the same id is a
//! programmer error and panics at startup. Iteration is always by
//! ascending rule id.

mod bestpractice;
mod performance;
mod reliability;
mod security;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::RuleConfig;
use crate::types::{Category, Issue, Severity, UnitFile, UnitSet};
use crate::validation::FileSystem;

/// Information about the target system, when available.
#[derive(Debug, Clone, Default)]
pub struct SystemInfo {
    pub hostname: String,
    pub manager_version: String,
    pub os_release: String,
    pub is_running: bool,
}

/// Execution context handed to every rule. Read-only.
pub struct Context<'a> {
    /// The unit under check.
    pub unit: &'a UnitFile,
    /// All units, for cross-unit checks.
    pub all_units: &'a UnitSet,
    pub system_info: Option<&'a SystemInfo>,
    pub config: &'a RuleConfig,
    /// Filesystem/identity probe. Offline probes answer identity
    /// lookups with true, so probe-backed rules pass automatically.
    pub fs: &'a dyn FileSystem,
}

impl<'a> Context<'a> {
    pub fn new(
        unit: &'a UnitFile,
        all_units: &'a UnitSet,
        config: &'a RuleConfig,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            unit,
            all_units,
            system_info: None,
            config,
            fs,
        }
    }
}

/// The contract every rule satisfies. Rules are referentially
/// transparent over the context: identical input, identical issues.
pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> Category;
    fn severity(&self) -> Severity;
    fn tags(&self) -> &'static [&'static str];
    fn suggestion(&self) -> &'static str;
    fn references(&self) -> &'static [&'static str];
    fn check(&self, ctx: &Context) -> Vec<Issue>;

    /// Build an issue carrying this rule's metadata.
    fn issue(&self, unit: &UnitFile, description: String) -> Issue {
        Issue {
            rule_id: self.id().to_string(),
            rule_name: self.name().to_string(),
            severity: self.severity(),
            category: self.category(),
            tags: self.tags().iter().map(|t| t.to_string()).collect(),
            unit: unit.name.clone(),
            file: unit.path.clone(),
            line: None,
            description,
            suggestion: self.suggestion().to_string(),
            references: self.references().iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// A catalog rule: static metadata plus a check function.
pub struct StaticRule {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub tags: &'static [&'static str],
    pub suggestion: &'static str,
    pub references: &'static [&'static str],
    pub check: fn(&StaticRule, &Context) -> Vec<Issue>,
}

impl Rule for StaticRule {
    fn id(&self) -> &'static str {
        self.id
    }
    fn name(&self) -> &'static str {
        self.name
    }
    fn description(&self) -> &'static str {
        self.description
    }
    fn category(&self) -> Category {
        self.category
    }
    fn severity(&self) -> Severity {
        self.severity
    }
    fn tags(&self) -> &'static [&'static str] {
        self.tags
    }
    fn suggestion(&self) -> &'static str {
        self.suggestion
    }
    fn references(&self) -> &'static [&'static str] {
        self.references
    }
    fn check(&self, ctx: &Context) -> Vec<Issue> {
        (self.check)(self, ctx)
    }
}

/// The rule registry: id to rule, iterated in ascending id order.
#[derive(Default)]
pub struct Registry {
    rules: BTreeMap<&'static str, Box<dyn Rule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Panics on a duplicate id: two rules claiming
    /// the same id is a programmer error.
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        let id = rule.id();
        if self.rules.insert(id, rule).is_some() {
            panic!("rule already registered: {id}");
        }
    }

    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules.get(id).map(|rule| &**rule)
    }

    /// All rules, ascending by id.
    pub fn all(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.values().map(|rule| &**rule)
    }

    pub fn count(&self) -> usize {
        self.rules.len()
    }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let mut registry = Registry::new();
    security::register(&mut registry);
    reliability::register(&mut registry);
    performance::register(&mut registry);
    bestpractice::register(&mut registry);
    registry
});

/// The process-wide registry, populated on first use.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Run every enabled rule against the context, applying severity
/// overrides.
pub fn run_all(ctx: &Context) -> Vec<Issue> {
    run_filtered(ctx, None, None, &[])
}

/// Run rules matching the filters: category, minimum default severity,
/// and tag intersection.
pub fn run_filtered(
    ctx: &Context,
    category: Option<Category>,
    min_severity: Option<Severity>,
    tags: &[String],
) -> Vec<Issue> {
    let mut all_issues = Vec::new();

    for rule in registry().all() {
        if ctx.config.is_disabled(rule.id()) {
            continue;
        }
        if let Some(category) = category {
            if rule.category() != category {
                continue;
            }
        }
        if let Some(min) = min_severity {
            if rule.severity() < min {
                continue;
            }
        }
        if !tags.is_empty() && !rule.tags().iter().any(|t| tags.iter().any(|q| q == t)) {
            continue;
        }

        let mut issues = rule.check(ctx);
        if let Some(override_severity) = ctx.config.severity_override(rule.id()) {
            for issue in &mut issues {
                issue.severity = override_severity;
            }
        }
        all_issues.extend(issues);
    }

    all_issues
}

/// Shared helper: flag a hardening directive that is unset or
/// explicitly off.
fn absent_or_no(ctx: &Context, rule: &StaticRule, key: &str, description: &str) -> Vec<Issue> {
    if !ctx.unit.is_service() {
        return Vec::new();
    }
    match ctx.unit.directive("Service", key) {
        "" | "no" | "false" => vec![rule.issue(ctx.unit, description.to_string())],
        _ => Vec::new(),
    }
}
