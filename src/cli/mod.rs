//! CLI definition and handler

use crate::config::{load_config, load_config_file, EngineConfig};
use crate::detectors::{default_detectors, ProgressCallback};
use crate::models::SignalKind;
use crate::pipeline::{run_scan, RunOutput};
use crate::source::{load_dir, BillingSource};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Claimscan - healthcare billing fraud signal scanner
///
/// Reads transactions.csv, exclusions.csv and identities.csv from a data
/// directory, runs every enabled fraud signal and writes the scored
/// providers as JSON.
#[derive(Parser, Debug)]
#[command(name = "claimscan")]
#[command(
    version,
    about = "Fraud signal detection and provider risk scoring over healthcare billing data",
    after_help = "\
Examples:
  claimscan --data-dir ./data                       Scan and print JSON to stdout
  claimscan --data-dir ./data -o results.json       Write results to a file
  claimscan --data-dir ./data --config scan.toml    Use an explicit config file
  claimscan --data-dir ./data --workers 4 --log-level debug
  claimscan --list-signals                          Show every signal and its config key"
)]
pub struct Cli {
    /// Directory holding transactions.csv, exclusions.csv and identities.csv
    #[arg(long, env = "CLAIMSCAN_DATA_DIR", required_unless_present = "list_signals")]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: claimscan.toml or .claimscanrc.json in the data directory)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Number of parallel workers (1-64, default: from config, else auto)
    #[arg(long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print each signal's config key, category and description, then exit
    #[arg(long)]
    pub list_signals: bool,
}

/// Create bar progress style
fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

/// One line per registered detector: config key, category, description
fn signal_listing() -> String {
    let mut out = String::new();
    for detector in default_detectors() {
        out.push_str(&format!(
            "{:<28} {:<13} {}\n",
            detector.signal().config_key(),
            detector.category(),
            detector.description()
        ));
    }
    out
}

fn resolve_config(cli: &Cli, data_dir: &Path) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_config(data_dir)?,
    };
    if let Some(workers) = cli.workers {
        config.engine.workers = workers;
    }
    if let Some(limit) = &config.source.memory_limit {
        debug!("Source memory limit: {}", limit);
    }
    Ok(config)
}

fn write_output(output: &RunOutput, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(output).context("Failed to serialize results")?;
    match path {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

/// Run a scan as described by the parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    if cli.list_signals {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{}", signal_listing())?;
        return Ok(());
    }
    let data_dir = cli.data_dir.as_deref().context("--data-dir is required")?;
    let config = resolve_config(&cli, data_dir)?;
    let source = load_dir(data_dir)
        .with_context(|| format!("Failed to load data from {}", data_dir.display()))?;
    info!(
        "Loaded {} transactions from {}",
        source.transaction_count(),
        data_dir.display()
    );
    let source: Arc<dyn BillingSource> = Arc::new(source);

    let enabled = SignalKind::ALL
        .iter()
        .filter(|k| config.is_signal_enabled(**k))
        .count();
    let bar = ProgressBar::new(enabled as u64);
    bar.set_style(create_bar_style());
    bar.set_message("Running detectors...");
    let progress: ProgressCallback = {
        let bar = bar.clone();
        Box::new(move |name: &str, done: usize, _total: usize| {
            bar.set_position(done as u64);
            bar.set_message(name.to_string());
        })
    };

    let output = run_scan(source, config, Some(progress))?;
    bar.finish_with_message(format!(
        "{} providers flagged, ${:.2} estimated overpayment",
        output.statistics.providers_flagged, output.statistics.total_estimated_overpayment
    ));

    write_output(&output, cli.output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("4"), Ok(4));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "claimscan",
            "--data-dir",
            "/tmp/data",
            "--workers",
            "3",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/data")));
        assert_eq!(cli.workers, Some(3));
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_workers_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "claimscan",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--workers",
            "2",
        ])
        .unwrap();
        let config = resolve_config(&cli, dir.path()).unwrap();
        assert_eq!(config.engine.workers, 2);
    }

    #[test]
    fn test_data_dir_required_unless_listing() {
        assert!(Cli::try_parse_from(["claimscan"]).is_err());
        let cli = Cli::try_parse_from(["claimscan", "--list-signals"]).unwrap();
        assert!(cli.list_signals);
        assert!(cli.data_dir.is_none());
    }

    #[test]
    fn test_signal_listing() {
        let listing = signal_listing();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), SignalKind::ALL.len());
        assert!(lines[0].starts_with("excluded-provider"));
        assert!(lines[0].contains("core"));
        assert!(lines[0].contains("exclusion took effect"));
        assert!(listing
            .lines()
            .any(|l| l.starts_with("rate-anomaly") && l.contains("supplemental")));
    }
}
