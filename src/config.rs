use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::types::{AnalysisError, NodeRegistry};
use crate::capture::HeaderLengths;

/// Placeholder replaced by the node id in file name templates
pub const NODE_PLACEHOLDER: &str = "{node}";

/// Analysis configuration. Every section is optional and defaults to the
/// four-node reference deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Node id -> IP address
    pub nodes: BTreeMap<String, String>,
    pub headers: HeaderLengths,
    pub files: FileLayout,
    pub output: OutputConfig,
}

/// Per-node file name templates, relative to the data directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileLayout {
    pub capture_text: String,
    pub capture_pcap: String,
    pub filtered: String,
    pub summary: String,
}

/// Report destinations, relative to the output directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub text_report: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_report: Option<String>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid node configuration: {0}")]
    InvalidNodes(String),
    #[error("Invalid file layout: {0}")]
    InvalidFiles(String),
    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),
}

impl From<AnalysisError> for ValidationError {
    fn from(e: AnalysisError) -> Self {
        ValidationError::InvalidNodes(e.to_string())
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::InvalidNodes("at least one node is required".to_string()));
        }
        // Address format and uniqueness are checked by the registry itself
        self.registry()?;

        for (name, template) in [
            ("capture_text", &self.files.capture_text),
            ("capture_pcap", &self.files.capture_pcap),
            ("filtered", &self.files.filtered),
            ("summary", &self.files.summary),
        ] {
            if !template.contains(NODE_PLACEHOLDER) {
                return Err(ValidationError::InvalidFiles(format!(
                    "{} template '{}' must contain {}",
                    name, template, NODE_PLACEHOLDER
                )));
            }
        }

        if self.output.text_report.trim().is_empty() {
            return Err(ValidationError::InvalidOutput("text_report cannot be empty".to_string()));
        }
        if let Some(json) = &self.output.json_report {
            if json.trim().is_empty() {
                return Err(ValidationError::InvalidOutput("json_report cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Build the node registry from the `nodes` section
    pub fn registry(&self) -> Result<NodeRegistry, AnalysisError> {
        NodeRegistry::new(self.nodes.iter().map(|(id, addr)| (id.clone(), addr.clone())))
    }
}

impl FileLayout {
    fn expand(template: &str, node_id: &str) -> String {
        template.replace(NODE_PLACEHOLDER, node_id)
    }

    pub fn capture_text_for(&self, node_id: &str) -> String {
        Self::expand(&self.capture_text, node_id)
    }

    pub fn capture_pcap_for(&self, node_id: &str) -> String {
        Self::expand(&self.capture_pcap, node_id)
    }

    pub fn filtered_for(&self, node_id: &str) -> String {
        Self::expand(&self.filtered, node_id)
    }

    pub fn summary_for(&self, node_id: &str) -> String {
        Self::expand(&self.summary, node_id)
    }
}

/// Default implementations
impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: NodeRegistry::default()
                .iter()
                .map(|(id, addr)| (id.to_string(), addr.to_string()))
                .collect(),
            headers: HeaderLengths::default(),
            files: FileLayout::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            capture_text: "{node}.txt".to_string(),
            capture_pcap: "{node}.pcap".to_string(),
            filtered: "{node}_filtered.txt".to_string(),
            summary: "{node}_parsed_summary.txt".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            text_report: "metrics.txt".to_string(),
            json_report: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nodes.len(), 4);
        assert_eq!(config.nodes["Node2"], "192.168.100.2");
        assert_eq!(config.files.summary_for("Node2"), "Node2_parsed_summary.txt");
        assert_eq!(config.output.text_report, "metrics.txt");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
nodes:
  alpha: 10.0.0.1
  beta: 10.0.0.2
headers:
  ethernet: 16
output:
  json_report: metrics.json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.headers, HeaderLengths { ethernet: 16, ip: 20, icmp: 8 });
        assert_eq!(config.files.capture_pcap_for("beta"), "beta.pcap");
        assert_eq!(config.output.text_report, "metrics.txt");
        assert_eq!(config.output.json_report.as_deref(), Some("metrics.json"));

        let registry = config.registry().unwrap();
        assert_eq!(registry.address_of("alpha").unwrap(), "10.0.0.1");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.nodes.clear();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNodes(_))));

        let mut config = Config::default();
        config.nodes.insert("Node5".to_string(), "192.168.100.1".to_string());
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNodes(_))));

        let mut config = Config::default();
        config.nodes.insert("Node5".to_string(), "not-an-ip".to_string());
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNodes(_))));

        let mut config = Config::default();
        config.files.filtered = "filtered.txt".to_string();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidFiles(_))));

        let mut config = Config::default();
        config.output.text_report = " ".to_string();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidOutput(_))));
    }
}
