//! Parsing of filtered ping dissections into packet records.
//!
//! Reads the per-packet summary lines of a plain-text dissection export,
//! and reads/writes the whitespace-separated parsed summary format.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

use color_eyre::eyre::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::filter::Section;
use crate::analysis::types::{AnalysisError, EchoKind, PacketRecord, SUMMARY_COLUMNS};

/// Minimum whitespace-separated tokens on a ping summary line
const MIN_LINE_TOKENS: usize = 10;

/// Fixed header sizes used to derive IP and payload lengths from frame length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderLengths {
    pub ethernet: u32,
    pub ip: u32,
    pub icmp: u32,
}

impl Default for HeaderLengths {
    fn default() -> Self {
        Self { ethernet: 14, ip: 20, icmp: 8 }
    }
}

impl HeaderLengths {
    pub fn ip_length(&self, frame_length: u32) -> u32 {
        frame_length.saturating_sub(self.ethernet)
    }

    pub fn payload_length(&self, frame_length: u32) -> u32 {
        self.ip_length(frame_length)
            .saturating_sub(self.ip)
            .saturating_sub(self.icmp)
    }
}

/// Compiled patterns for dissection lines
pub struct LinePatterns {
    /// Match: "Echo (ping) request" / "Echo (ping) reply"
    pub ping_marker: Regex,
    /// Match: "seq=91/23296," capturing "91"
    pub seq: Regex,
    /// Match: "ttl=64)" capturing "64)"
    pub ttl: Regex,
}

impl LinePatterns {
    pub fn new() -> Self {
        Self {
            ping_marker: Regex::new(r"\(ping\) (?:request|reply)").expect("Invalid ping_marker regex"),
            seq: Regex::new(r"^seq=([^/]*)").expect("Invalid seq regex"),
            ttl: Regex::new(r"^ttl=(.*)$").expect("Invalid ttl regex"),
        }
    }
}

impl Default for LinePatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<LinePatterns> = LazyLock::new(LinePatterns::new);

/// Parse one dissection line.
///
/// Returns `Ok(None)` for lines that are not ping summary lines, and
/// `MalformedRecord` for ping lines whose fields do not parse.
pub fn parse_line(line: &str, headers: &HeaderLengths) -> Result<Option<PacketRecord>, AnalysisError> {
    if !PATTERNS.ping_marker.is_match(line) {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < MIN_LINE_TOKENS {
        return Ok(None);
    }

    let kind = if parts.contains(&"request") {
        EchoKind::EchoRequest
    } else if parts.contains(&"reply") {
        EchoKind::EchoReply
    } else {
        return Ok(None);
    };

    // Later tokens win, as a line may repeat a field
    let mut seq_raw = None;
    let mut ttl_raw = None;
    for token in &parts {
        if let Some(caps) = PATTERNS.seq.captures(token) {
            seq_raw = caps.get(1).map(|m| m.as_str().trim_end_matches(','));
        }
        if let Some(caps) = PATTERNS.ttl.captures(token) {
            ttl_raw = caps.get(1).map(|m| m.as_str().trim_end_matches([',', ')']));
        }
    }
    let (Some(seq_raw), Some(ttl_raw)) = (seq_raw, ttl_raw) else {
        return Ok(None);
    };

    let timestamp: f64 = parts[1]
        .parse()
        .ok()
        .filter(|t: &f64| t.is_finite())
        .ok_or_else(|| AnalysisError::malformed(format!("time value '{}' is not valid", parts[1])))?;
    let frame_length: u32 = parts[5]
        .parse()
        .map_err(|_| AnalysisError::malformed(format!("frame length '{}' is not valid", parts[5])))?;
    let sequence: u16 = seq_raw
        .parse()
        .map_err(|_| AnalysisError::malformed(format!("seq value '{}' is not valid", seq_raw)))?;
    let ttl: u8 = ttl_raw
        .parse()
        .map_err(|_| AnalysisError::malformed(format!("ttl value '{}' is not valid", ttl_raw)))?;

    Ok(Some(PacketRecord {
        timestamp,
        source: parts[2].to_string(),
        destination: parts[3].to_string(),
        kind,
        sequence,
        ip_length: headers.ip_length(frame_length),
        frame_length,
        payload_length: headers.payload_length(frame_length),
        ttl,
    }))
}

/// Accumulates records line by line, dropping malformed ping lines
struct RecordCollector<'h> {
    headers: &'h HeaderLengths,
    records: Vec<PacketRecord>,
    line_no: usize,
    malformed: usize,
}

impl<'h> RecordCollector<'h> {
    fn new(headers: &'h HeaderLengths) -> Self {
        Self { headers, records: Vec::new(), line_no: 0, malformed: 0 }
    }

    fn push_line(&mut self, line: &str) {
        self.line_no += 1;
        match parse_line(line, self.headers) {
            Ok(Some(record)) => self.records.push(record),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Skipping line {}: {}", self.line_no, e);
                self.malformed += 1;
            }
        }
    }

    fn finish(self) -> Vec<PacketRecord> {
        if self.malformed > 0 {
            log::warn!("Dropped {} malformed ping lines", self.malformed);
        }
        self.records
    }
}

/// Parse every ping line from a filtered dissection, dropping malformed ones
pub fn parse_filtered<R: BufRead>(reader: R, headers: &HeaderLengths) -> Result<Vec<PacketRecord>> {
    let mut collector = RecordCollector::new(headers);
    for line in reader.lines() {
        let line = line.context("Failed to read filtered capture line")?;
        collector.push_line(&line);
    }
    Ok(collector.finish())
}

/// Parse every ping line of already filtered sections
pub fn parse_sections(sections: &[Section], headers: &HeaderLengths) -> Vec<PacketRecord> {
    let mut collector = RecordCollector::new(headers);
    for line in sections.iter().flatten() {
        collector.push_line(line);
    }
    collector.finish()
}

/// Parse a filtered dissection file
pub fn parse_filtered_file(path: &Path, headers: &HeaderLengths) -> Result<Vec<PacketRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open filtered capture: {}", path.display()))?;
    let records = parse_filtered(BufReader::with_capacity(64 * 1024, file), headers)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    log::debug!("Parsed {} ping records from {}", records.len(), path.display());
    Ok(records)
}

/// Write records in the parsed summary format
pub fn write_summary<W: Write>(mut writer: W, records: &[PacketRecord]) -> std::io::Result<()> {
    writeln!(writer, "{}", SUMMARY_COLUMNS.join(" "))?;
    for record in records {
        writeln!(writer, "{}", record.to_summary_line())?;
    }
    writer.flush()
}

/// Read records in the parsed summary format. The header line is skipped,
/// blank lines are ignored and malformed rows are dropped with a warning.
pub fn read_summary<R: BufRead>(reader: R) -> Result<Vec<PacketRecord>> {
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate().skip(1) {
        let line = line.context("Failed to read summary line")?;
        if line.trim().is_empty() {
            continue;
        }
        match PacketRecord::from_summary_line(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping summary row {}: {}", line_no + 1, e),
        }
    }

    Ok(records)
}

pub fn write_summary_file(path: &Path, records: &[PacketRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create summary file: {}", path.display()))?;
    write_summary(BufWriter::new(file), records)
        .with_context(|| format!("Failed to write summary file: {}", path.display()))?;
    log::debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn read_summary_file(path: &Path) -> Result<Vec<PacketRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open summary file: {}", path.display()))?;
    read_summary(BufReader::new(file)).with_context(|| format!("Failed to read {}", path.display()))
}
