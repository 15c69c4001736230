use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use unitlint::cli::{Args, Command};
use unitlint::config::RuleConfig;
use unitlint::graph::{build_graph, to_dot, DotOptions};
use unitlint::loader;
use unitlint::output::{self, OutputFormat};
use unitlint::scanner::{ScanOptions, Scanner};
use unitlint::types::{Category, Severity};
use unitlint::validation::{FileSystem, RealFileSystem};

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.no_color {
        colored::control::set_override(false);
    }

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let format = OutputFormat::parse(&args.format)
        .with_context(|| format!("unknown format: {}", args.format))?;

    let opts = ScanOptions {
        category: match &args.category {
            Some(c) => Some(
                Category::parse(c).with_context(|| format!("unknown category: {c}"))?,
            ),
            None => None,
        },
        min_severity: match &args.min_severity {
            Some(s) => Some(
                Severity::parse(s).with_context(|| format!("unknown severity: {s}"))?,
            ),
            None => None,
        },
        tags: args.tag_list(),
    };

    let mut config = RuleConfig::new();
    for id in args.disabled_rules() {
        config.disable_rule(&id);
    }

    let fail_on = match &args.fail_on {
        Some(s) => Some(Severity::parse(s).with_context(|| format!("unknown severity: {s}"))?),
        None => None,
    };

    match &args.command {
        Command::Scan { paths } => {
            let mut scanner = Scanner::new()
                .with_config(config)
                .with_filesystem(probe(&args.root));
            if !paths.is_empty() {
                scanner = scanner.with_unit_paths(paths.clone());
            }
            let result = scanner.scan(&opts)?;
            print!("{}", output::render(&result, format, !args.no_color)?);
            Ok(exit_code(&result, fail_on))
        }
        Command::Check { files } => {
            let scanner = Scanner::new()
                .with_config(config)
                .with_filesystem(probe(&args.root));
            let result = scanner.check_files(files, &opts)?;
            print!("{}", output::render(&result, format, !args.no_color)?);
            Ok(exit_code(&result, fail_on))
        }
        Command::ListRules => {
            print!("{}", output::render_rule_list());
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { paths } => {
            let units = if paths.is_empty() {
                loader::load_units_from_paths(&loader::default_unit_paths())
            } else {
                loader::load_explicit_paths(paths)?
            };
            if units.is_empty() {
                bail!("no units found");
            }
            let fs = probe(&args.root);
            let report = unitlint::analysis::analyze(&units, fs.as_ref());
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Graph { paths, output } => {
            let units = if paths.is_empty() {
                loader::load_units_from_paths(&loader::default_unit_paths())
            } else {
                loader::load_explicit_paths(paths)?
            };
            if units.is_empty() {
                bail!("no units found");
            }
            let graph = build_graph(&units);
            let dot = to_dot(&graph, &DotOptions::default());
            match output {
                Some(path) => std::fs::write(path, &dot)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => print!("{dot}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn probe(root: &Option<std::path::PathBuf>) -> Box<dyn FileSystem> {
    match root {
        Some(root) => Box::new(RealFileSystem::with_root(root)),
        None => Box::new(RealFileSystem::new()),
    }
}

fn exit_code(result: &unitlint::report::ScanResult, fail_on: Option<Severity>) -> ExitCode {
    match fail_on {
        Some(severity) if result.has_issues_at_least(severity) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}
