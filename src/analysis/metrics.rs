//! Echo metrics engine.
//!
//! Partitions a node's packets by role, matches replies to requests by
//! `(sequence, peer address)` and derives the thirteen per-node statistics.
//! Computation is pure; per-node runs are independent and are fanned out
//! with rayon by [`compute_all`].

use std::collections::HashMap;

use rayon::prelude::*;

use super::types::*;

const MILLIS_PER_SEC: f64 = 1_000.0;
const MICROS_PER_SEC: f64 = 1_000_000.0;
const BYTES_PER_KB: f64 = 1_024.0;

/// Decimal places kept for every averaged or ratio metric
pub const METRIC_DECIMALS: usize = 2;

/// Role of a packet relative to one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    RequestSent,
    RequestReceived,
    ReplySent,
    ReplyReceived,
}

/// Classify a packet relative to `address`.
///
/// Rules are tried in a fixed order and the first match wins, so a packet
/// addressed from and to the node itself counts only once.
pub fn classify(packet: &PacketRecord, address: &str) -> Option<Role> {
    match packet.kind {
        EchoKind::EchoRequest if packet.source == address => Some(Role::RequestSent),
        EchoKind::EchoRequest if packet.destination == address => Some(Role::RequestReceived),
        EchoKind::EchoReply if packet.source == address => Some(Role::ReplySent),
        EchoKind::EchoReply if packet.destination == address => Some(Role::ReplyReceived),
        _ => None,
    }
}

/// Round to `decimals` places.
///
/// The exact binary value is rounded, so 2.675 (stored just below the
/// midpoint) becomes 2.67. Exact midpoints go to the even digit.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn rounded_mean(values: &[f64]) -> f64 {
    mean(values).map(|m| round_to(m, METRIC_DECIMALS)).unwrap_or(0.0)
}

/// A node's packets split into the four roles
#[derive(Debug, Default)]
struct RoleBuckets<'a> {
    requests_sent: Vec<&'a PacketRecord>,
    requests_received: Vec<&'a PacketRecord>,
    replies_sent: Vec<&'a PacketRecord>,
    replies_received: Vec<&'a PacketRecord>,
}

impl<'a> RoleBuckets<'a> {
    fn partition(packets: &'a [PacketRecord], address: &str) -> Self {
        let mut buckets = Self::default();
        for packet in packets {
            match classify(packet, address) {
                Some(Role::RequestSent) => buckets.requests_sent.push(packet),
                Some(Role::RequestReceived) => buckets.requests_received.push(packet),
                Some(Role::ReplySent) => buckets.replies_sent.push(packet),
                Some(Role::ReplyReceived) => buckets.replies_received.push(packet),
                None => {}
            }
        }
        buckets
    }
}

/// Elapsed time between each reply and its request, scaled by `scale`.
///
/// Requests are keyed by `(sequence, request_peer(request))`, replies are
/// looked up by `(sequence, reply_peer(reply))`. A later request with the
/// same key replaces an earlier one. Replies without a request are skipped.
fn matched_deltas(
    requests: &[&PacketRecord],
    replies: &[&PacketRecord],
    request_peer: fn(&PacketRecord) -> &str,
    reply_peer: fn(&PacketRecord) -> &str,
    scale: f64,
) -> Vec<f64> {
    let sent_at: HashMap<(u16, &str), CaptureTime> = requests
        .iter()
        .map(|p| ((p.sequence, request_peer(p)), p.timestamp))
        .collect();

    replies
        .iter()
        .filter_map(|reply| {
            sent_at
                .get(&(reply.sequence, reply_peer(reply)))
                .map(|requested| (reply.timestamp - requested) * scale)
        })
        .collect()
}

fn source_of(p: &PacketRecord) -> &str {
    &p.source
}

fn destination_of(p: &PacketRecord) -> &str {
    &p.destination
}

/// Compute the metrics of one node over its captured packets.
///
/// Fails only when `node_id` is not in the registry. Empty or unmatched
/// traffic yields zeroed fields.
pub fn compute_metrics(
    node_id: &str,
    registry: &NodeRegistry,
    packets: &[PacketRecord],
) -> Result<NodeMetrics, AnalysisError> {
    let address = registry.address_of(node_id)?;
    let buckets = RoleBuckets::partition(packets, address);

    let request_bytes_sent: u64 = buckets.requests_sent.iter().map(|p| p.frame_length as u64).sum();
    let request_data_sent: u64 = buckets.requests_sent.iter().map(|p| p.payload_length as u64).sum();
    let request_bytes_received: u64 =
        buckets.requests_received.iter().map(|p| p.frame_length as u64).sum();
    let request_data_received: u64 =
        buckets.requests_received.iter().map(|p| p.payload_length as u64).sum();

    // Outbound: our requests answered by peers, keyed on the request's destination
    let rtts_ms = matched_deltas(
        &buckets.requests_sent,
        &buckets.replies_received,
        destination_of,
        source_of,
        MILLIS_PER_SEC,
    );

    // Sum of round trips stands in for transmit time, back in seconds
    let duration_sec = if !buckets.requests_sent.is_empty() && !buckets.replies_received.is_empty() {
        rtts_ms.iter().sum::<f64>() / MILLIS_PER_SEC
    } else {
        0.0
    };
    let (throughput, goodput) = if duration_sec != 0.0 {
        (
            round_to(request_bytes_sent as f64 / BYTES_PER_KB / duration_sec, METRIC_DECIMALS),
            round_to(request_data_sent as f64 / BYTES_PER_KB / duration_sec, METRIC_DECIMALS),
        )
    } else {
        (0.0, 0.0)
    };

    // Inbound: peers' requests we answered, keyed on the request's source
    let reply_delays_us = matched_deltas(
        &buckets.requests_received,
        &buckets.replies_sent,
        source_of,
        destination_of,
        MICROS_PER_SEC,
    );

    // Highest observed TTL is taken as the peers' initial TTL
    let average_hop_count = match buckets.replies_received.iter().map(|p| p.ttl).max() {
        Some(starting_ttl) => {
            let hops: Vec<f64> = buckets
                .replies_received
                .iter()
                .map(|p| (starting_ttl - p.ttl) as f64 + 1.0)
                .collect();
            rounded_mean(&hops)
        }
        None => 0.0,
    };

    Ok(NodeMetrics {
        echo_requests_sent: buckets.requests_sent.len() as u64,
        echo_requests_received: buckets.requests_received.len() as u64,
        echo_replies_sent: buckets.replies_sent.len() as u64,
        echo_replies_received: buckets.replies_received.len() as u64,
        request_bytes_sent,
        request_data_sent,
        request_bytes_received,
        request_data_received,
        average_rtt_ms: rounded_mean(&rtts_ms),
        request_throughput_kbps: throughput,
        request_goodput_kbps: goodput,
        average_reply_delay_us: rounded_mean(&reply_delays_us),
        average_hop_count,
    })
}

/// Compute metrics for every registered node in parallel.
///
/// Results follow registry order. A node without an entry in
/// `packets_by_node` reports zeroed metrics; an entry for a node that is
/// not registered is an error.
pub fn compute_all(
    registry: &NodeRegistry,
    packets_by_node: &HashMap<String, Vec<PacketRecord>>,
) -> Result<Vec<NodeReport>, AnalysisError> {
    if let Some(unknown) = packets_by_node.keys().find(|id| registry.address_of(id).is_err()) {
        return Err(AnalysisError::UnknownNodeId { node_id: unknown.clone() });
    }

    log::info!("Computing metrics for {} nodes in parallel...", registry.len());

    let node_ids: Vec<&str> = registry.node_ids().collect();
    let reports = node_ids
        .par_iter()
        .map(|&node_id| -> Result<NodeReport, AnalysisError> {
            let packets = packets_by_node.get(node_id).map(Vec::as_slice).unwrap_or(&[]);
            let metrics = compute_metrics(node_id, registry, packets)?;
            log::debug!(
                "Computed {}: {} requests sent, {} replies received, avg RTT {:.2}ms",
                node_id,
                metrics.echo_requests_sent,
                metrics.echo_replies_received,
                metrics.average_rtt_ms
            );
            Ok(NodeReport {
                node_id: node_id.to_string(),
                address: registry.address_of(node_id)?.to_string(),
                packets_analyzed: packets.len(),
                metrics,
            })
        })
        .collect::<Result<Vec<_>, AnalysisError>>()?;

    Ok(reports)
}
