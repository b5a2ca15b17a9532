//! Report generation for echo metrics.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::types::*;

/// Heading for a node: a trailing number is separated by a space
/// ("Node1" becomes "Node 1").
pub fn node_heading(node_id: &str) -> String {
    let digits = node_id.len() - node_id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits == node_id.len() {
        return node_id.to_string();
    }
    let (name, number) = node_id.split_at(node_id.len() - digits);
    if name.ends_with(' ') {
        node_id.to_string()
    } else {
        format!("{} {}", name, number)
    }
}

/// Render the text report for all nodes
pub fn render_text_report(report: &MetricsReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    for node in &report.nodes {
        let values = node.metrics.labeled_values();
        let join_labels = |range: std::ops::Range<usize>| {
            values[range].iter().map(|(label, _)| *label).collect::<Vec<_>>().join(",")
        };
        let join_values = |range: std::ops::Range<usize>| {
            values[range].iter().map(|(_, value)| value.to_string()).collect::<Vec<_>>().join(",")
        };

        lines.push(node_heading(&node.node_id));
        lines.push(String::new());

        // Counts, then request volume sent and received
        for range in [0..4, 4..6, 6..8] {
            lines.push(join_labels(range.clone()));
            lines.push(join_values(range));
        }
        lines.push(String::new());

        for (label, value) in &values[8..] {
            lines.push(format!("{},{}", label, value));
        }
        lines.push(String::new());
    }

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

/// Generate human-readable text report
pub fn generate_text_report(report: &MetricsReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Generate JSON report
pub fn generate_json_report(report: &MetricsReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &MetricsReport) {
    println!("\n=== ICMP ECHO METRICS SUMMARY ===\n");
    println!("Nodes: {}", report.metadata.total_nodes);
    println!("Packets: {}", report.metadata.total_packets);
    println!();
    println!(
        "{:<12} {:<16} {:>6} {:>6} {:>10} {:>10} {:>12} {:>6}",
        "Node", "Address", "Req", "Rep", "RTT(ms)", "Tput(kB/s)", "Delay(us)", "Hops"
    );

    for node in &report.nodes {
        let m = &node.metrics;
        println!(
            "{:<12} {:<16} {:>6} {:>6} {:>10.2} {:>10.2} {:>12.2} {:>6.2}",
            node.node_id,
            node.address,
            m.echo_requests_sent,
            m.echo_replies_received,
            m.average_rtt_ms,
            m.request_throughput_kbps,
            m.average_reply_delay_us,
            m.average_hop_count
        );
    }

    println!();
}
