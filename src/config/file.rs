//! YAML configuration file

use crate::error::{AppError, Result};
use crate::registry::EndpointRegistry;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::str::FromStr;

/// A number that may be written as a YAML number or a string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(u64),
    Text(String),
}

impl Scalar {
    /// Parse the value, treating an empty string as unset
    pub fn value<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr + TryFrom<u64>,
    {
        match self {
            Scalar::Number(n) => T::try_from(*n)
                .map(Some)
                .map_err(|_| AppError::config(format!("Value {} for '{}' is out of range", n, key))),
            Scalar::Text(text) if text.trim().is_empty() => Ok(None),
            Scalar::Text(text) => text
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::config(format!("Invalid value '{}' for '{}'", text, key))),
        }
    }
}

/// Contents of the configuration file; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConfigFile {
    pub test_length: Option<Scalar>,
    pub test_interval: Option<Scalar>,
    pub server_port: Option<Scalar>,
    pub grafana_address: Option<String>,
    pub grafana_port: Option<Scalar>,
    pub influx_url: Option<String>,
    pub tsdb_download_prefix: Option<String>,
    pub tsdb_upload_prefix: Option<String>,
    pub measurement_name: Option<String>,
    /// Single-entry `address: label` maps; the label may be left empty
    pub iperf_servers: Vec<Mapping>,
}

impl ConfigFile {
    /// Read the file, returning `None` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::io(format!(
                    "Failed to read configuration file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::from_yaml(&content)
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid configuration file {}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Endpoints listed under `iperf-servers`, in file order
    pub fn endpoints(&self) -> Result<EndpointRegistry> {
        let mut pairs = Vec::new();
        for entry in &self.iperf_servers {
            for (address, label) in entry {
                let address = scalar_text(address)
                    .ok_or_else(|| AppError::config(format!("Invalid iperf-servers address: {:?}", address)))?;
                pairs.push((address, scalar_text(label)));
            }
        }
        EndpointRegistry::from_pairs(pairs)
    }
}

/// Non-empty optional string
pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Endpoint;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
test-length: 10
test-interval: "120"
server-port: 5202
grafana-address: carbon.example.com
grafana-port: "2003"
tsdb-download-prefix: bw.download
tsdb-upload-prefix: bw.upload
iperf-servers:
  - 192.168.100.10: dc1
  - 172.16.0.5: dc2
  - 10.0.0.9:
"#;

    #[test]
    fn test_parses_original_layout() {
        let file = ConfigFile::from_yaml(SAMPLE).unwrap();

        assert_eq!(file.test_length.unwrap().value::<u64>("test-length").unwrap(), Some(10));
        assert_eq!(file.test_interval.unwrap().value::<u64>("test-interval").unwrap(), Some(120));
        assert_eq!(file.server_port.unwrap().value::<u16>("server-port").unwrap(), Some(5202));
        assert_eq!(file.grafana_address.as_deref(), Some("carbon.example.com"));
        assert_eq!(file.tsdb_download_prefix.as_deref(), Some("bw.download"));
        assert!(file.influx_url.is_none());
    }

    #[test]
    fn test_endpoints_keep_file_order_and_default_labels() {
        let file = ConfigFile::from_yaml(SAMPLE).unwrap();
        let endpoints = file.endpoints().unwrap().into_vec();

        assert_eq!(
            endpoints,
            vec![
                Endpoint::new("192.168.100.10", Some("dc1".to_string())),
                Endpoint::new("172.16.0.5", Some("dc2".to_string())),
                Endpoint::new("10.0.0.9", None),
            ]
        );
        assert_eq!(endpoints[2].label, "10.0.0.9");
    }

    #[test]
    fn test_empty_string_values_are_unset() {
        let file = ConfigFile::from_yaml("test-length: \"\"\n").unwrap();
        assert_eq!(file.test_length.unwrap().value::<u64>("test-length").unwrap(), None);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let file = ConfigFile::from_yaml("server-port: 70000\ntest-length: five\n").unwrap();
        assert!(file.server_port.unwrap().value::<u16>("server-port").is_err());
        assert!(file.test_length.unwrap().value::<u64>("test-length").is_err());
    }

    #[test]
    fn test_empty_document_is_default() {
        let file = ConfigFile::from_yaml("  \n").unwrap();
        assert!(file.iperf_servers.is_empty());
        assert!(file.test_length.is_none());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(ConfigFile::from_yaml("iperf-servers: [unclosed").is_err());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("configuration.yaml");
        assert!(ConfigFile::load(&missing).unwrap().is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loaded = ConfigFile::load(file.path()).unwrap().unwrap();
        assert_eq!(loaded.iperf_servers.len(), 3);
    }
}
