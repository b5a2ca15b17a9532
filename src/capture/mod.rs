//! Capture ingestion: ICMP filtering of dissection exports and parsing of
//! ping lines into packet records.

pub mod filter;
pub mod parser;

pub use filter::{filter_node_capture, read_sections, Section};
pub use parser::{
    parse_filtered, parse_filtered_file, parse_sections, read_summary_file, write_summary_file, HeaderLengths,
};
