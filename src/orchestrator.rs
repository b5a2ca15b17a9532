//! Pipeline orchestrator.
//!
//! Runs the per-node stages (capture filtering, parsing, metrics) over every
//! configured node in parallel and assembles the final report.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use rayon::prelude::*;

use crate::analysis::{self, MetricsReport, NodeRegistry, PacketRecord, ReportMetadata};
use crate::capture::{self, filter, parser};
use crate::config::Config;

/// Packet records of each node that had input
pub type PacketsByNode = HashMap<String, Vec<PacketRecord>>;

/// Resolved per-node paths under a data directory
#[derive(Debug, Clone)]
pub struct NodeFiles {
    pub node_id: String,
    pub capture_text: PathBuf,
    pub capture_pcap: PathBuf,
    pub filtered: PathBuf,
    pub summary: PathBuf,
}

impl NodeFiles {
    pub fn resolve(config: &Config, data_dir: &Path, node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            capture_text: data_dir.join(config.files.capture_text_for(node_id)),
            capture_pcap: data_dir.join(config.files.capture_pcap_for(node_id)),
            filtered: data_dir.join(config.files.filtered_for(node_id)),
            summary: data_dir.join(config.files.summary_for(node_id)),
        }
    }
}

fn node_files(config: &Config, registry: &NodeRegistry, data_dir: &Path) -> Vec<NodeFiles> {
    registry
        .node_ids()
        .map(|node_id| NodeFiles::resolve(config, data_dir, node_id))
        .collect()
}

fn missing(paths: &[&Path]) -> Option<PathBuf> {
    paths.iter().find(|p| !p.exists()).map(|p| p.to_path_buf())
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Write each node's ICMP-only dissection. Returns the number of nodes filtered.
pub fn filter_all(config: &Config, registry: &NodeRegistry, data_dir: &Path) -> Result<usize> {
    log::info!("Filtering captures for {} nodes in parallel...", registry.len());

    let filtered: Vec<bool> = node_files(config, registry, data_dir)
        .par_iter()
        .map(|files| -> Result<bool> {
            if let Some(path) = missing(&[files.capture_text.as_path(), files.capture_pcap.as_path()]) {
                log::warn!("Skipping {}: {} not found", files.node_id, path.display());
                return Ok(false);
            }
            create_parent_dir(&files.filtered)?;
            let kept = filter::filter_node_capture(&files.capture_text, &files.capture_pcap, Some(files.filtered.as_path()))?;
            log::debug!("Filtered {}: {} ICMP sections", files.node_id, kept.len());
            Ok(true)
        })
        .collect::<Result<_>>()?;

    Ok(filtered.into_iter().filter(|done| *done).count())
}

/// Parse each node's filtered dissection and write its parsed summary
pub fn parse_all(config: &Config, registry: &NodeRegistry, data_dir: &Path) -> Result<PacketsByNode> {
    log::info!("Parsing filtered captures for {} nodes in parallel...", registry.len());

    let results: Vec<Option<(String, Vec<PacketRecord>)>> = node_files(config, registry, data_dir)
        .par_iter()
        .map(|files| -> Result<Option<(String, Vec<PacketRecord>)>> {
            if let Some(path) = missing(&[files.filtered.as_path()]) {
                log::warn!("Skipping {}: {} not found", files.node_id, path.display());
                return Ok(None);
            }
            let records = parser::parse_filtered_file(&files.filtered, &config.headers)?;
            create_parent_dir(&files.summary)?;
            parser::write_summary_file(&files.summary, &records)?;
            Ok(Some((files.node_id.clone(), records)))
        })
        .collect::<Result<_>>()?;

    Ok(collect_packets(results))
}

/// Read each node's parsed summary
pub fn load_summaries(config: &Config, registry: &NodeRegistry, data_dir: &Path) -> Result<PacketsByNode> {
    log::info!("Loading parsed summaries for {} nodes...", registry.len());

    let results: Vec<Option<(String, Vec<PacketRecord>)>> = node_files(config, registry, data_dir)
        .par_iter()
        .map(|files| -> Result<Option<(String, Vec<PacketRecord>)>> {
            if let Some(path) = missing(&[files.summary.as_path()]) {
                log::warn!("Skipping {}: {} not found", files.node_id, path.display());
                return Ok(None);
            }
            let records = parser::read_summary_file(&files.summary)?;
            Ok(Some((files.node_id.clone(), records)))
        })
        .collect::<Result<_>>()?;

    Ok(collect_packets(results))
}

/// Filter and parse every node's capture in one pass. Intermediate files are
/// written only when `keep_intermediate` is set.
pub fn ingest_all(
    config: &Config,
    registry: &NodeRegistry,
    data_dir: &Path,
    keep_intermediate: bool,
) -> Result<PacketsByNode> {
    log::info!("Ingesting captures for {} nodes in parallel...", registry.len());

    let results: Vec<Option<(String, Vec<PacketRecord>)>> = node_files(config, registry, data_dir)
        .par_iter()
        .map(|files| -> Result<Option<(String, Vec<PacketRecord>)>> {
            if let Some(path) = missing(&[files.capture_text.as_path(), files.capture_pcap.as_path()]) {
                log::warn!("Skipping {}: {} not found", files.node_id, path.display());
                return Ok(None);
            }

            let filtered_out = if keep_intermediate {
                create_parent_dir(&files.filtered)?;
                Some(files.filtered.as_path())
            } else {
                None
            };
            let sections = filter::filter_node_capture(&files.capture_text, &files.capture_pcap, filtered_out)?;
            let records = capture::parse_sections(&sections, &config.headers);

            if keep_intermediate {
                create_parent_dir(&files.summary)?;
                parser::write_summary_file(&files.summary, &records)?;
            }

            log::debug!("Ingested {}: {} ping records", files.node_id, records.len());
            Ok(Some((files.node_id.clone(), records)))
        })
        .collect::<Result<_>>()?;

    Ok(collect_packets(results))
}

fn collect_packets(results: Vec<Option<(String, Vec<PacketRecord>)>>) -> PacketsByNode {
    let packets: PacketsByNode = results.into_iter().flatten().collect();
    let total: usize = packets.values().map(Vec::len).sum();
    log::info!("Loaded {} nodes, {} total packet records", packets.len(), total);
    packets
}

/// Compute every node's metrics and wrap them in a report
pub fn build_report(registry: &NodeRegistry, packets: &PacketsByNode, data_dir: &Path) -> Result<MetricsReport> {
    let nodes = analysis::compute_all(registry, packets).context("Failed to compute node metrics")?;

    Ok(MetricsReport {
        metadata: ReportMetadata {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            data_dir: data_dir.display().to_string(),
            total_nodes: nodes.len(),
            total_packets: nodes.iter().map(|n| n.packets_analyzed).sum(),
        },
        nodes,
    })
}

/// Write the configured reports into `output_dir`
pub fn write_reports(config: &Config, report: &MetricsReport, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    analysis::generate_text_report(report, &output_dir.join(&config.output.text_report))?;
    if let Some(json) = &config.output.json_report {
        analysis::generate_json_report(report, &output_dir.join(json))?;
    }
    Ok(())
}
