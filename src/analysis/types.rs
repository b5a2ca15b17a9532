//! Core data types for ICMP echo analysis.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Capture timestamp in seconds. Only differences between timestamps are used.
pub type CaptureTime = f64;

/// Errors raised while building records or computing metrics
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Malformed packet record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Unknown node id: {node_id}")]
    UnknownNodeId { node_id: String },

    #[error("Invalid node registry: {0}")]
    InvalidRegistry(String),
}

impl AnalysisError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AnalysisError::MalformedRecord { reason: reason.into() }
    }
}

/// ICMP echo message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EchoKind {
    /// Type 8
    EchoRequest,
    /// Type 0
    EchoReply,
}

impl EchoKind {
    pub const REQUEST_TYPE: u8 = 8;
    pub const REPLY_TYPE: u8 = 0;

    /// Resolve an ICMP type number. Anything other than 8 or 0 is rejected.
    pub fn from_icmp_type(icmp_type: u8) -> Result<Self, AnalysisError> {
        match icmp_type {
            Self::REQUEST_TYPE => Ok(EchoKind::EchoRequest),
            Self::REPLY_TYPE => Ok(EchoKind::EchoReply),
            other => Err(AnalysisError::malformed(format!(
                "ICMP type {} is not an echo request or reply",
                other
            ))),
        }
    }

    pub fn icmp_type(self) -> u8 {
        match self {
            EchoKind::EchoRequest => Self::REQUEST_TYPE,
            EchoKind::EchoReply => Self::REPLY_TYPE,
        }
    }
}

/// One observed ICMP echo packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub timestamp: CaptureTime,
    pub source: String,
    pub destination: String,
    pub kind: EchoKind,
    /// Echo sequence number, unique only within one (kind, peer pair) stream
    pub sequence: u16,
    /// IP total length (frame length minus link header)
    pub ip_length: u32,
    pub frame_length: u32,
    pub payload_length: u32,
    pub ttl: u8,
}

/// Column names of the parsed summary format, in order
pub const SUMMARY_COLUMNS: [&str; 9] = [
    "time", "src", "dst", "type", "seq", "total_len", "frame", "payload", "ttl",
];

fn parse_field<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AnalysisError> {
    raw.parse::<T>()
        .map_err(|_| AnalysisError::malformed(format!("{} value '{}' is not valid", name, raw)))
}

impl PacketRecord {
    /// Build a record from one parsed summary row
    /// (`time src dst type seq total_len frame payload ttl`).
    pub fn from_summary_line(line: &str) -> Result<Self, AnalysisError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < SUMMARY_COLUMNS.len() {
            return Err(AnalysisError::malformed(format!(
                "expected {} columns, found {}",
                SUMMARY_COLUMNS.len(),
                parts.len()
            )));
        }

        let timestamp: f64 = parse_field("time", parts[0])?;
        if !timestamp.is_finite() {
            return Err(AnalysisError::malformed(format!("time value '{}' is not finite", parts[0])));
        }

        Ok(PacketRecord {
            timestamp,
            source: parts[1].to_string(),
            destination: parts[2].to_string(),
            kind: EchoKind::from_icmp_type(parse_field("type", parts[3])?)?,
            sequence: parse_field("seq", parts[4])?,
            ip_length: parse_field("total_len", parts[5])?,
            frame_length: parse_field("frame", parts[6])?,
            payload_length: parse_field("payload", parts[7])?,
            ttl: parse_field("ttl", parts[8])?,
        })
    }

    /// Render the record as one parsed summary row
    pub fn to_summary_line(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {}",
            self.timestamp,
            self.source,
            self.destination,
            self.kind.icmp_type(),
            self.sequence,
            self.ip_length,
            self.frame_length,
            self.payload_length,
            self.ttl
        )
    }
}

/// Mapping from node identifier to network address.
///
/// Built once and only read afterwards, so it can be shared between threads
/// by reference. Addresses are matched exactly against packet addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, String>,
}

impl NodeRegistry {
    /// Build a registry, rejecting empty ids, unparsable and duplicated addresses
    pub fn new<I, K, V>(entries: I) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut nodes = BTreeMap::new();
        for (id, addr) in entries {
            let id = id.into();
            let addr = addr.into();

            if id.trim().is_empty() {
                return Err(AnalysisError::InvalidRegistry("node id cannot be empty".to_string()));
            }
            if addr.parse::<IpAddr>().is_err() {
                return Err(AnalysisError::InvalidRegistry(format!(
                    "address '{}' for node {} is not a valid IP address",
                    addr, id
                )));
            }
            if let Some((other, _)) = nodes.iter().find(|(_, a)| **a == addr) {
                return Err(AnalysisError::InvalidRegistry(format!(
                    "address {} is assigned to both {} and {}",
                    addr, other, id
                )));
            }
            if nodes.insert(id.clone(), addr).is_some() {
                return Err(AnalysisError::InvalidRegistry(format!("duplicate node id {}", id)));
            }
        }

        Ok(Self { nodes })
    }

    /// Address of a node, or `UnknownNodeId`
    pub fn address_of(&self, node_id: &str) -> Result<&str, AnalysisError> {
        self.nodes
            .get(node_id)
            .map(String::as_str)
            .ok_or_else(|| AnalysisError::UnknownNodeId { node_id: node_id.to_string() })
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeRegistry {
    /// The four-node reference deployment
    fn default() -> Self {
        Self {
            nodes: [
                ("Node1", "192.168.100.1"),
                ("Node2", "192.168.100.2"),
                ("Node3", "192.168.200.1"),
                ("Node4", "192.168.200.2"),
            ]
            .into_iter()
            .map(|(id, addr)| (id.to_string(), addr.to_string()))
            .collect(),
        }
    }
}

/// Thirteen summary statistics for one node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub echo_requests_sent: u64,
    pub echo_requests_received: u64,
    pub echo_replies_sent: u64,
    pub echo_replies_received: u64,
    pub request_bytes_sent: u64,
    pub request_data_sent: u64,
    pub request_bytes_received: u64,
    pub request_data_received: u64,
    /// Milliseconds
    pub average_rtt_ms: f64,
    /// kB/sec
    pub request_throughput_kbps: f64,
    /// kB/sec
    pub request_goodput_kbps: f64,
    /// Microseconds
    pub average_reply_delay_us: f64,
    pub average_hop_count: f64,
}

/// A single metric value, integral or fractional.
///
/// Ratios print in shortest round-trip form with at least one decimal
/// ("50.0", "1.91"); a zero ratio prints as "0".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(u64),
    Ratio(f64),
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Count(v) => write!(f, "{}", v),
            MetricValue::Ratio(v) if *v == 0.0 => write!(f, "0"),
            MetricValue::Ratio(v) => write!(f, "{:?}", v),
        }
    }
}

impl NodeMetrics {
    pub const LABELS: [&'static str; 13] = [
        "Echo Requests Sent",
        "Echo Requests Received",
        "Echo Replies Sent",
        "Echo Replies Received",
        "Echo Request Bytes Sent (bytes)",
        "Echo Request Data Sent (bytes)",
        "Echo Request Bytes Received (bytes)",
        "Echo Request Data Received (bytes)",
        "Average RTT (ms)",
        "Echo Request Throughput (kB/sec)",
        "Echo Request Goodput (kB/sec)",
        "Average Reply Delay (us)",
        "Average Echo Request Hop Count",
    ];

    /// All thirteen fields with their report labels, in report order
    pub fn labeled_values(&self) -> [(&'static str, MetricValue); 13] {
        let values = [
            MetricValue::Count(self.echo_requests_sent),
            MetricValue::Count(self.echo_requests_received),
            MetricValue::Count(self.echo_replies_sent),
            MetricValue::Count(self.echo_replies_received),
            MetricValue::Count(self.request_bytes_sent),
            MetricValue::Count(self.request_data_sent),
            MetricValue::Count(self.request_bytes_received),
            MetricValue::Count(self.request_data_received),
            MetricValue::Ratio(self.average_rtt_ms),
            MetricValue::Ratio(self.request_throughput_kbps),
            MetricValue::Ratio(self.request_goodput_kbps),
            MetricValue::Ratio(self.average_reply_delay_us),
            MetricValue::Ratio(self.average_hop_count),
        ];
        std::array::from_fn(|i| (Self::LABELS[i], values[i]))
    }
}

/// Metrics for one node as written to reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: String,
    pub address: String,
    pub packets_analyzed: usize,
    pub metrics: NodeMetrics,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub data_dir: String,
    pub total_nodes: usize,
    pub total_packets: usize,
}

/// Complete metrics report across all nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub metadata: ReportMetadata,
    pub nodes: Vec<NodeReport>,
}
