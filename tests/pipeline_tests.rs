#[cfg(test)]
mod pipeline_tests {
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::Duration;

    use pcap_file::pcap::{PcapPacket, PcapWriter};
    use tempfile::TempDir;

    use icmp_metrics::analysis::{self, AnalysisError, EchoKind, NodeMetrics, NodeRegistry};
    use icmp_metrics::config::Config;
    use icmp_metrics::orchestrator;

    const NODE1: &str = "192.168.100.1";
    const NODE4: &str = "192.168.200.2";

    /// Ethernet + IPv4 frame of `frame_len` bytes carrying `protocol`
    fn ipv4_frame(protocol: u8, src: [u8; 4], dst: [u8; 4], ttl: u8, icmp_type: u8, frame_len: usize) -> Vec<u8> {
        let ip_total = (frame_len - 14) as u16;
        let mut frame = Vec::with_capacity(frame_len);
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 0x02, 0x08, 0x00]);
        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&ip_total.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, ttl, protocol, 0x00, 0x00]);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&dst);
        if protocol == 17 {
            let udp_len = (frame_len - 34) as u16;
            frame.extend_from_slice(&[0x00, 0x35, 0x00, 0x35]);
            frame.extend_from_slice(&udp_len.to_be_bytes());
            frame.extend_from_slice(&[0x00, 0x00]);
        } else {
            frame.extend_from_slice(&[icmp_type, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]);
        }
        frame.resize(frame_len, 0);
        frame
    }

    fn write_pcap(path: &Path, frames: &[Vec<u8>]) {
        let file = File::create(path).unwrap();
        let mut writer = PcapWriter::new(file).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            let packet = PcapPacket::new(Duration::from_millis(i as u64 * 25), frame.len() as u32, frame);
            writer.write_packet(&packet).unwrap();
        }
    }

    fn section(no: usize, time: &str, src: &str, dst: &str, proto: &str, len: u32, info: &str) -> String {
        format!(
            "No.     Time           Source                Destination           Protocol Length Info\n\
             {:>7} {}       {:<21} {:<21} {:<8} {:<6} {}\n\
             \n\
             Frame {}: {} bytes on wire ({} bits), {} bytes captured ({} bits)\n\
             \n",
            no, time, src, dst, proto, len, info, no, len, len * 8, len, len * 8
        )
    }

    /// Writes a three-frame capture for `node_id`: request, a UDP frame whose
    /// text looks like a ping, and the reply
    fn write_node_capture(dir: &Path, node_id: &str) {
        let text = [
            section(1, "0.000000", NODE1, NODE4, "ICMP", 98,
                "Echo (ping) request  id=0x0001, seq=1/256, ttl=128 (reply in 3)"),
            section(2, "0.025000", NODE1, NODE4, "DNS", 98,
                "Echo (ping) request  id=0x0001, seq=2/512, ttl=128 (bogus)"),
            section(3, "0.050000", NODE4, NODE1, "ICMP", 98,
                "Echo (ping) reply    id=0x0001, seq=1/256, ttl=64 (request in 1)"),
        ]
        .concat();
        fs::write(dir.join(format!("{}.txt", node_id)), text).unwrap();

        let frames = vec![
            ipv4_frame(1, [192, 168, 100, 1], [192, 168, 200, 2], 128, 8, 98),
            ipv4_frame(17, [192, 168, 100, 1], [192, 168, 200, 2], 128, 0, 98),
            ipv4_frame(1, [192, 168, 200, 2], [192, 168, 100, 1], 64, 0, 98),
        ];
        write_pcap(&dir.join(format!("{}.pcap", node_id)), &frames);
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_node_capture(dir.path(), "Node1");
        write_node_capture(dir.path(), "Node4");
        dir
    }

    #[test]
    fn test_ingest_filters_non_icmp_frames() {
        let dir = setup();
        let config = Config::default();
        let registry = config.registry().unwrap();

        let packets = orchestrator::ingest_all(&config, &registry, dir.path(), false).unwrap();
        assert_eq!(packets.len(), 2);

        let node1 = &packets["Node1"];
        assert_eq!(node1.len(), 2);
        assert_eq!(node1[0].kind, EchoKind::EchoRequest);
        assert_eq!(node1[0].sequence, 1);
        assert_eq!(node1[0].payload_length, 56);
        assert_eq!(node1[1].kind, EchoKind::EchoReply);
        assert_eq!(node1[1].ttl, 64);

        // Intermediate files are not written
        assert!(!dir.path().join("Node1_filtered.txt").exists());
        assert!(!dir.path().join("Node1_parsed_summary.txt").exists());
    }

    #[test]
    fn test_end_to_end_metrics() {
        let dir = setup();
        let config = Config::default();
        let registry = config.registry().unwrap();

        let packets = orchestrator::ingest_all(&config, &registry, dir.path(), true).unwrap();
        let report = orchestrator::build_report(&registry, &packets, dir.path()).unwrap();

        let ids: Vec<&str> = report.nodes.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["Node1", "Node2", "Node3", "Node4"]);
        assert_eq!(report.metadata.total_packets, 4);

        let node1 = &report.nodes[0].metrics;
        assert_eq!(node1.echo_requests_sent, 1);
        assert_eq!(node1.echo_replies_received, 1);
        assert_eq!(node1.request_bytes_sent, 98);
        assert_eq!(node1.request_data_sent, 56);
        assert_eq!(node1.average_rtt_ms, 50.0);
        assert_eq!(node1.request_throughput_kbps, 1.91);
        assert_eq!(node1.request_goodput_kbps, 1.09);
        assert_eq!(node1.average_hop_count, 1.0);

        // Nodes without captures report zeros
        assert_eq!(report.nodes[1].metrics, NodeMetrics::default());
        assert_eq!(report.nodes[2].metrics, NodeMetrics::default());

        let node4 = &report.nodes[3].metrics;
        assert_eq!(node4.echo_requests_received, 1);
        assert_eq!(node4.echo_replies_sent, 1);
        assert_eq!(node4.request_bytes_received, 98);
        assert_eq!(node4.average_reply_delay_us, 50000.0);
        assert_eq!(node4.average_rtt_ms, 0.0);

        assert!(dir.path().join("Node1_filtered.txt").exists());
        assert!(dir.path().join("Node4_parsed_summary.txt").exists());
    }

    #[test]
    fn test_staged_pipeline_matches_single_pass() {
        let dir = setup();
        let config = Config::default();
        let registry = config.registry().unwrap();

        assert_eq!(orchestrator::filter_all(&config, &registry, dir.path()).unwrap(), 2);
        let parsed = orchestrator::parse_all(&config, &registry, dir.path()).unwrap();
        let loaded = orchestrator::load_summaries(&config, &registry, dir.path()).unwrap();
        let single = orchestrator::ingest_all(&config, &registry, dir.path(), false).unwrap();

        assert_eq!(parsed, loaded);
        assert_eq!(loaded, single);
    }

    #[test]
    fn test_reports_written() {
        let dir = setup();
        let mut config = Config::default();
        config.output.json_report = Some("metrics.json".to_string());
        let registry = config.registry().unwrap();

        let packets = orchestrator::ingest_all(&config, &registry, dir.path(), false).unwrap();
        let report = orchestrator::build_report(&registry, &packets, dir.path()).unwrap();
        let out = dir.path().join("out");
        orchestrator::write_reports(&config, &report, &out).unwrap();

        let text = fs::read_to_string(out.join("metrics.txt")).unwrap();
        assert!(text.starts_with("Node 1\n\n"));
        assert!(text.contains("Average RTT (ms),50.0\n"));
        assert!(text.contains("Average Reply Delay (us),50000.0\n"));
        assert!(text.contains("Node 3\n\nEcho Requests Sent,Echo Requests Received,Echo Replies Sent,Echo Replies Received\n0,0,0,0\n"));
        assert!(text.contains("Node 3\n\n") && text.contains("Average RTT (ms),0\n"));

        let json = fs::read_to_string(out.join("metrics.json")).unwrap();
        assert!(json.contains("\"average_rtt_ms\": 50.0"));
    }

    #[test]
    fn test_unknown_node_is_not_zeroed() {
        let registry = NodeRegistry::default();
        let err = analysis::compute_metrics("Node7", &registry, &[]).unwrap_err();
        assert_eq!(err, AnalysisError::UnknownNodeId { node_id: "Node7".to_string() });
    }

    #[test]
    fn test_missing_captures_are_skipped() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let registry = config.registry().unwrap();

        let packets = orchestrator::ingest_all(&config, &registry, dir.path(), false).unwrap();
        assert!(packets.is_empty());

        let report = orchestrator::build_report(&registry, &packets, dir.path()).unwrap();
        assert!(report.nodes.iter().all(|n| n.metrics == NodeMetrics::default()));
    }
}
