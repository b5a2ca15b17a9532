//! ICMP echo analysis: packet record model, per-node metrics and reports.

pub mod types;
pub mod metrics;
pub mod report;

pub use types::*;
pub use metrics::{compute_all, compute_metrics};
pub use report::{generate_json_report, generate_text_report, print_summary};
