//! # icmp-metrics - per-node ICMP echo metrics
//!
//! This library derives network performance metrics for a fixed set of named
//! nodes from captures of ICMP echo request/reply traffic.
//!
//! ## Overview
//!
//! Each node contributes a plain-text dissection export and the matching
//! pcap. Processing runs in three stages:
//!
//! 1. **Filter**: keep the dissection sections whose frame is IPv4 ICMP
//! 2. **Parse**: turn ping summary lines into [`analysis::PacketRecord`]s
//! 3. **Compute**: partition records by role, match replies to requests by
//!    `(sequence, peer address)` and derive thirteen statistics per node
//!
//! ## Metrics
//!
//! Per node: echo requests sent/received, echo replies sent/received,
//! request bytes and payload sent/received, average RTT (ms), request
//! throughput and goodput (kB/sec), average reply delay (us) and average
//! hop count. Empty samples yield zero rather than an error.
//!
//! ## Architecture
//!
//! - `analysis`: packet record model, metrics engine and reports
//! - `capture`: ICMP filtering and ping line parsing
//! - `config` / `config_loader`: YAML configuration and node registry
//! - `orchestrator`: parallel per-node pipeline
//!
//! ## Example Usage
//!
//! ```rust
//! use icmp_metrics::analysis::{compute_metrics, EchoKind, NodeRegistry, PacketRecord};
//!
//! let registry = NodeRegistry::new([("Node1", "192.168.100.1"), ("Node4", "192.168.200.2")])?;
//! let packet = |ts: f64, src: &str, dst: &str, kind| PacketRecord {
//!     timestamp: ts,
//!     source: src.to_string(),
//!     destination: dst.to_string(),
//!     kind,
//!     sequence: 1,
//!     ip_length: 84,
//!     frame_length: 98,
//!     payload_length: 56,
//!     ttl: 64,
//! };
//! let packets = vec![
//!     packet(0.0, "192.168.100.1", "192.168.200.2", EchoKind::EchoRequest),
//!     packet(0.05, "192.168.200.2", "192.168.100.1", EchoKind::EchoReply),
//! ];
//!
//! let metrics = compute_metrics("Node1", &registry, &packets)?;
//! assert_eq!(metrics.average_rtt_ms, 50.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library modules define `thiserror` enums ([`analysis::AnalysisError`],
//! [`config::ValidationError`]); file and pipeline functions return
//! `color_eyre::eyre::Result` with context.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod config_loader;
pub mod orchestrator;
