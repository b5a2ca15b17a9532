//! ICMP echo metrics CLI.
//!
//! Filters per-node dissection exports down to ICMP, parses ping records and
//! computes per-node echo metrics.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use env_logger::Env;
use log::info;

use icmp_metrics::{analysis, config_loader, orchestrator};

#[derive(Parser, Debug)]
#[command(name = "icmp-metrics")]
#[command(about = "Per-node ICMP echo metrics from packet captures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration (defaults to the four-node registry)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the per-node capture files
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Output directory for reports
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep only the ICMP packets of each node's dissection export
    Filter,

    /// Parse filtered dissections into parsed summaries
    Parse,

    /// Compute metrics from parsed summaries
    Compute,

    /// Filter, parse and compute in one pass
    Run {
        /// Also write the filtered and parsed summary files
        #[arg(long)]
        keep_intermediate: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = config_loader::load_or_default(cli.config.as_deref())?;
    let registry = config.registry().context("Invalid node registry")?;
    info!("Analyzing {} nodes from {}", registry.len(), cli.data_dir.display());

    match cli.command {
        Commands::Filter => {
            let filtered = orchestrator::filter_all(&config, &registry, &cli.data_dir)?;
            info!("Filtered captures for {} of {} nodes", filtered, registry.len());
        }
        Commands::Parse => {
            let packets = orchestrator::parse_all(&config, &registry, &cli.data_dir)?;
            info!("Wrote parsed summaries for {} nodes", packets.len());
        }
        Commands::Compute => {
            let packets = orchestrator::load_summaries(&config, &registry, &cli.data_dir)?;
            let report = orchestrator::build_report(&registry, &packets, &cli.data_dir)?;
            orchestrator::write_reports(&config, &report, &cli.output)?;
            analysis::print_summary(&report);
        }
        Commands::Run { keep_intermediate } => {
            let packets = orchestrator::ingest_all(&config, &registry, &cli.data_dir, keep_intermediate)?;
            let report = orchestrator::build_report(&registry, &packets, &cli.data_dir)?;
            orchestrator::write_reports(&config, &report, &cli.output)?;
            analysis::print_summary(&report);
        }
    }

    info!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["icmp-metrics", "compute"]);
        assert!(matches!(cli.command, Commands::Compute));
        assert_eq!(cli.data_dir, PathBuf::from("."));
        assert_eq!(cli.config, None);
        assert_eq!(cli.threads, 0);
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "icmp-metrics",
            "--config", "nodes.yaml",
            "-d", "captures",
            "-j", "4",
            "run",
            "--keep-intermediate",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("nodes.yaml")));
        assert_eq!(cli.data_dir, PathBuf::from("captures"));
        assert_eq!(cli.threads, 4);
        assert!(matches!(cli.command, Commands::Run { keep_intermediate: true }));
    }
}
