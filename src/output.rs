//! Reporters: human text, JSON, and SARIF 2.1.0.

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::report::ScanResult;
use crate::rules::registry;
use crate::types::Severity;

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "sarif" => Some(OutputFormat::Sarif),
            _ => None,
        }
    }
}

/// Render a scan result in the requested format.
pub fn render(result: &ScanResult, format: OutputFormat, color: bool) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(result, color)),
        OutputFormat::Json => render_json(result),
        OutputFormat::Sarif => render_sarif(result),
    }
}

fn severity_label(severity: Severity, color: bool) -> String {
    let label = severity.as_str().to_uppercase();
    if !color {
        return format!("[{label}]");
    }
    let painted = match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.cyan(),
        Severity::Info => label.dimmed(),
    };
    format!("[{painted}]")
}

/// Human-readable report.
pub fn render_text(result: &ScanResult, color: bool) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Scanned {} units with {} rules: {} issues\n\n",
        result.summary.total_units, result.summary.rules_checked, result.summary.total_issues
    ));

    for issue in &result.issues {
        out.push_str(&format!(
            "{} {} {}: {}\n",
            severity_label(issue.severity, color),
            issue.rule_id,
            issue.unit,
            issue.description
        ));
        if let Some(line) = issue.line {
            out.push_str(&format!("    at {}:{}\n", issue.file, line));
        } else {
            out.push_str(&format!("    at {}\n", issue.file));
        }
        if !issue.suggestion.is_empty() {
            out.push_str(&format!("    fix: {}\n", issue.suggestion));
        }
    }

    if !result.issues.is_empty() {
        out.push('\n');
    }

    out.push_str("By severity:");
    let mut counts: Vec<_> = result.summary.by_severity.iter().collect();
    counts.reverse();
    for (severity, count) in counts {
        out.push_str(&format!(" {}={count}", severity.as_str()));
    }
    out.push('\n');

    out
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    version: &'static str,
    timestamp: String,
    summary: &'a crate::report::Summary,
    issues: &'a [crate::types::Issue],
}

/// Machine-readable JSON report.
pub fn render_json(result: &ScanResult) -> Result<String> {
    let output = JsonOutput {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        summary: &result.summary,
        issues: &result.issues,
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

// SARIF 2.1.0 structures.

#[derive(Serialize)]
struct SarifLog {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    #[serde(rename = "informationUri")]
    information_uri: &'static str,
    rules: Vec<SarifRuleDescriptor>,
}

#[derive(Serialize)]
struct SarifRuleDescriptor {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "fullDescription")]
    full_description: SarifMessage,
    #[serde(rename = "helpUri", skip_serializing_if = "Option::is_none")]
    help_uri: Option<String>,
    #[serde(rename = "defaultConfiguration")]
    default_configuration: SarifConfiguration,
}

#[derive(Serialize)]
struct SarifConfiguration {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    #[serde(rename = "ruleIndex")]
    rule_index: usize,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<SarifRegion>,
}

#[derive(Serialize)]
struct SarifArtifactLocation {
    uri: String,
}

#[derive(Serialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

/// SARIF 2.1.0 report for code-scanning integrations.
pub fn render_sarif(result: &ScanResult) -> Result<String> {
    // Rule descriptors for every rule that produced an issue, in first
    // appearance order; results refer to them by index.
    let mut rule_ids: Vec<&str> = Vec::new();
    for issue in &result.issues {
        if !rule_ids.contains(&issue.rule_id.as_str()) {
            rule_ids.push(&issue.rule_id);
        }
    }

    let descriptors: Vec<SarifRuleDescriptor> = rule_ids
        .iter()
        .map(|id| {
            let (name, description, help_uri, level) = match registry().get(id) {
                Some(rule) => (
                    rule.name().to_string(),
                    rule.description().to_string(),
                    rule.references().first().map(|r| r.to_string()),
                    sarif_level(rule.severity()),
                ),
                None => ((*id).to_string(), String::new(), None, "note"),
            };
            SarifRuleDescriptor {
                id: (*id).to_string(),
                name: name.clone(),
                short_description: SarifMessage { text: name },
                full_description: SarifMessage { text: description },
                help_uri,
                default_configuration: SarifConfiguration { level },
            }
        })
        .collect();

    let results: Vec<SarifResult> = result
        .issues
        .iter()
        .map(|issue| SarifResult {
            rule_id: issue.rule_id.clone(),
            rule_index: rule_ids
                .iter()
                .position(|id| *id == issue.rule_id)
                .expect("issue rule id was collected"),
            level: sarif_level(issue.severity),
            message: SarifMessage {
                text: format!("{} ({})", issue.description, issue.unit),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation {
                        uri: issue.file.clone(),
                    },
                    region: issue.line.map(|line| SarifRegion { start_line: line }),
                },
            }],
        })
        .collect();

    let log = SarifLog {
        schema: "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        version: "2.1.0",
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "unitlint",
                    version: env!("CARGO_PKG_VERSION"),
                    information_uri: "https://github.com/unitlint/unitlint",
                    rules: descriptors,
                },
            },
            results,
        }],
    };

    Ok(serde_json::to_string_pretty(&log)?)
}

/// Plain listing of the rule catalog for `list-rules`.
pub fn render_rule_list() -> String {
    let mut out = String::new();
    for rule in registry().all() {
        out.push_str(&format!(
            "{:<8} {:<12} {:<9} {}\n",
            rule.id(),
            rule.category().as_str(),
            rule.severity().as_str(),
            rule.name()
        ));
    }
    out
}
