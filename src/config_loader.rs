use crate::config::Config;
use color_eyre::eyre::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and validate configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open configuration: {}", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse configuration: {}", config_path.display()))?;

    config.validate()?;

    info!("Configured {} nodes", config.nodes.len());
    Ok(config)
}

/// Load the configuration file if one was given, otherwise use the
/// reference deployment defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            warn!("No configuration file given, using the default four-node registry");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
nodes:
  Node1: 192.168.100.1
  Node2: 192.168.100.2
files:
  summary: "summaries/{node}.txt"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.files.summary_for("Node1"), "summaries/Node1.txt");
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
nodes:
  Node1: 192.168.100.1
  Node2: 192.168.100.1
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = load_or_default(None).unwrap();
        assert_eq!(config, Config::default());
    }
}
