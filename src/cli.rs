//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Static analyzer for systemd unit files.
#[derive(Debug, Parser)]
#[command(name = "unitlint", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format: text, json, sarif
    #[arg(short, long, global = true, default_value = "text")]
    pub format: String,

    /// Minimum rule severity: info, low, medium, high, critical
    #[arg(short = 's', long, global = true)]
    pub min_severity: Option<String>,

    /// Filter rules by category: security, performance, reliability, bestpractice
    #[arg(short, long, global = true)]
    pub category: Option<String>,

    /// Filter rules by tags (comma-separated)
    #[arg(short, long, global = true)]
    pub tags: Option<String>,

    /// Rule ids to disable (comma-separated)
    #[arg(long, global = true)]
    pub disable: Option<String>,

    /// Offline analysis: treat this directory as the filesystem root
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Exit non-zero when issues at or above this severity are found
    #[arg(long, global = true)]
    pub fail_on: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the system unit directories (or the given paths)
    Scan {
        /// Unit directories to scan instead of the defaults
        #[arg(long = "path", value_name = "DIR")]
        paths: Vec<PathBuf>,
    },
    /// Check specific unit files or directories
    Check {
        /// Unit files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List all registered rules
    ListRules,
    /// Run the deep analyses (graph, propagation, timing, validation)
    /// and print the JSON report
    Analyze {
        /// Unit directories to load instead of the defaults
        #[arg(long = "path", value_name = "DIR")]
        paths: Vec<PathBuf>,
    },
    /// Export the dependency graph in Graphviz DOT format
    Graph {
        /// Unit directories to load instead of the defaults
        #[arg(long = "path", value_name = "DIR")]
        paths: Vec<PathBuf>,
        /// Write the DOT output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Args {
    /// Comma-separated tag list, split and trimmed.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Comma-separated disabled rule id list.
    pub fn disabled_rules(&self) -> Vec<String> {
        self.disable
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
