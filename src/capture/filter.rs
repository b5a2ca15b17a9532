//! ICMP filtering of plain-text dissection exports.
//!
//! A dissection export holds one text section per captured frame, in
//! capture order. The matching pcap tells which frames are ICMP; only the
//! sections at those indices are kept.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use etherparse::{IpNumber, NetSlice, SlicedPacket};
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;

/// Blank lines closing one packet section (summary block, then detail block)
pub const BLANK_LINES_PER_SECTION: usize = 2;

/// Lines of one packet in the dissection export
pub type Section = Vec<String>;

/// Split a dissection export into per-packet sections.
///
/// A section is closed after its second blank line; blank lines stay part of
/// the section. A final section without closing blank lines is kept.
pub fn read_sections<R: BufRead>(reader: R) -> Result<Vec<Section>> {
    let mut sections = Vec::new();
    let mut current: Section = Vec::new();
    let mut blank_lines = 0;

    for line in reader.lines() {
        let line = line.context("Failed to read dissection line")?;
        if line.trim().is_empty() {
            blank_lines += 1;
        }
        current.push(line);

        if blank_lines == BLANK_LINES_PER_SECTION {
            sections.push(std::mem::take(&mut current));
            blank_lines = 0;
        }
    }

    if !current.is_empty() {
        sections.push(current);
    }

    Ok(sections)
}

fn is_icmp_frame(datalink: DataLink, data: &[u8]) -> bool {
    let sliced = match datalink {
        DataLink::RAW | DataLink::IPV4 => SlicedPacket::from_ip(data).map_err(|e| e.to_string()),
        _ => SlicedPacket::from_ethernet(data).map_err(|e| e.to_string()),
    };

    match sliced {
        Ok(packet) => match packet.net {
            Some(NetSlice::Ipv4(ipv4)) => ipv4.header().protocol() == IpNumber::ICMP,
            _ => false,
        },
        Err(e) => {
            log::debug!("Undecodable frame: {}", e);
            false
        }
    }
}

/// Indices of the capture's frames that carry IPv4 ICMP.
///
/// Frames that cannot be decoded are not ICMP but still count towards the
/// index, so indices line up with the dissection sections.
pub fn icmp_frame_indices<R: Read>(reader: R) -> Result<BTreeSet<usize>> {
    let mut pcap = PcapReader::new(reader).context("Failed to read pcap header")?;
    let datalink = pcap.header().datalink;

    let mut indices = BTreeSet::new();
    let mut index = 0usize;

    while let Some(packet) = pcap.next_packet() {
        match packet {
            Ok(packet) => {
                if is_icmp_frame(datalink, &packet.data) {
                    indices.insert(index);
                }
            }
            Err(e) => {
                // A damaged record leaves the stream position unknown
                log::warn!("Stopping at frame {}: {}", index, e);
                break;
            }
        }
        index += 1;
    }

    log::debug!("{} of {} frames are ICMP", indices.len(), index);
    Ok(indices)
}

/// Keep the sections whose index is in `icmp_indices`
pub fn filter_sections(sections: Vec<Section>, icmp_indices: &BTreeSet<usize>) -> Vec<Section> {
    sections
        .into_iter()
        .enumerate()
        .filter(|(i, _)| icmp_indices.contains(i))
        .map(|(_, section)| section)
        .collect()
}

/// Write sections line by line
pub fn write_sections<W: Write>(mut writer: W, sections: &[Section]) -> std::io::Result<()> {
    for line in sections.iter().flatten() {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}

/// Filter one node's dissection export down to its ICMP packets.
///
/// Returns the kept sections; when `out_path` is given they are also
/// written there.
pub fn filter_node_capture(text_path: &Path, pcap_path: &Path, out_path: Option<&Path>) -> Result<Vec<Section>> {
    let text = File::open(text_path)
        .with_context(|| format!("Failed to open dissection export: {}", text_path.display()))?;
    let sections = read_sections(BufReader::with_capacity(64 * 1024, text))
        .with_context(|| format!("Failed to split {}", text_path.display()))?;

    let pcap = File::open(pcap_path)
        .with_context(|| format!("Failed to open capture: {}", pcap_path.display()))?;
    let icmp_indices = icmp_frame_indices(BufReader::new(pcap))
        .with_context(|| format!("Failed to read capture: {}", pcap_path.display()))?;

    if let Some(last) = icmp_indices.last() {
        if *last >= sections.len() {
            log::warn!(
                "{} has ICMP frames beyond the {} sections of {}",
                pcap_path.display(),
                sections.len(),
                text_path.display()
            );
        }
    }

    let total = sections.len();
    let kept = filter_sections(sections, &icmp_indices);
    log::debug!("Kept {} of {} sections from {}", kept.len(), total, text_path.display());

    if let Some(out_path) = out_path {
        let file = File::create(out_path)
            .with_context(|| format!("Failed to create filtered file: {}", out_path.display()))?;
        write_sections(BufWriter::new(file), &kept)
            .with_context(|| format!("Failed to write filtered file: {}", out_path.display()))?;
    }

    Ok(kept)
}
