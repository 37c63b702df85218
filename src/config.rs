//! Configuration file management for certcheck.
//!
//! Settings come from three places, later ones winning:
//!
//! 1. Default values
//! 2. Configuration file (`certcheck.toml` or the file given with `--config`)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! hosts = ["example.com", "example.com:8443"]
//! output = "summary"
//! exit_code = 1
//! port = 443
//! method = "HEAD"
//! reject_unauthorized = false
//! timeout_secs = 30
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::validate::parse_port;
use crate::{CheckOptions, RequestMethod, DEFAULT_PORT};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "certcheck.toml";

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One table row per host
    Summary,
    /// A block of lines per host
    Text,
    /// Pretty-printed JSON array
    Json,
}

/// A port as written in a config file: `443` or `"443"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSetting {
    Number(i64),
    Text(String),
}

impl PortSetting {
    fn resolve(&self) -> Result<u16, ConfigError> {
        let raw = match self {
            PortSetting::Number(n) => n.to_string(),
            PortSetting::Text(text) => text.clone(),
        };
        parse_port(&raw).map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

/// Main configuration structure.
///
/// All fields are optional so that partial configurations can be merged.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Hosts to check, as `host`, `host:port` or a URL
    pub hosts: Option<Vec<String>>,
    pub output: Option<OutputFormat>,
    /// Exit code used when any host fails, is untrusted or has expired
    pub exit_code: Option<i32>,
    /// Port for hosts that don't name one
    pub port: Option<PortSetting>,
    pub method: Option<RequestMethod>,
    pub reject_unauthorized: Option<bool>,
    pub timeout_secs: Option<u64>,
    /// PEM bundle of extra trust anchors
    pub ca_file: Option<PathBuf>,
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PrometheusConfig {
    pub enabled: Option<bool>,
    /// Push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Configuration holding every default.
    ///
    /// - `output`: summary
    /// - `exit_code`: 0 (don't fail on bad certificates)
    /// - `port`: 443, `method`: HEAD, `reject_unauthorized`: false
    /// - `timeout_secs`: 30
    /// - `prometheus.enabled`: false, `prometheus.address`: "http://localhost:9091"
    pub fn with_defaults() -> Self {
        Config {
            hosts: None,
            output: Some(OutputFormat::Summary),
            exit_code: Some(0),
            port: Some(PortSetting::Number(i64::from(DEFAULT_PORT))),
            method: Some(RequestMethod::Head),
            reject_unauthorized: Some(false),
            timeout_secs: Some(30),
            ca_file: None,
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }

    /// Merges this configuration with another, `other`'s values winning
    /// wherever they are set.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.hosts.is_some() {
            self.hosts = other.hosts;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.method.is_some() {
            self.method = other.method;
        }
        if other.reject_unauthorized.is_some() {
            self.reject_unauthorized = other.reject_unauthorized;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.ca_file.is_some() {
            self.ca_file = other.ca_file;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Connection options for every host, with unset values at their defaults.
    ///
    /// A `timeout_secs` of 0 disables the timeout.
    pub fn check_options(&self) -> Result<CheckOptions, ConfigError> {
        let mut options = CheckOptions::default();
        if let Some(port) = &self.port {
            options.port = port.resolve()?;
        }
        if let Some(method) = self.method {
            options.method = method;
        }
        if let Some(reject) = self.reject_unauthorized {
            options.reject_unauthorized = reject;
        }
        options.timeout = self
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        options.ca_file = self.ca_file.clone();
        Ok(options)
    }

    /// Address of the push gateway when pushing is enabled.
    pub fn prometheus_address(&self) -> Option<&str> {
        let prometheus = self.prometheus.as_ref()?;
        if prometheus.enabled.unwrap_or(false) {
            prometheus.address.as_deref()
        } else {
            None
        }
    }

    /// Renders a sample configuration file with every option set.
    pub fn example_toml() -> String {
        let example = Config {
            hosts: Some(vec![
                "example.com".to_string(),
                "example.com:8443".to_string(),
                "https://secure.example.com:9443".to_string(),
                "expired.badssl.com".to_string(),
            ]),
            output: Some(OutputFormat::Summary),
            exit_code: Some(1),
            port: Some(PortSetting::Number(443)),
            method: Some(RequestMethod::Head),
            reject_unauthorized: Some(false),
            timeout_secs: Some(30),
            ca_file: Some(PathBuf::from("/etc/ssl/certs/internal-ca.pem")),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found, permission denied, etc.
    #[error("IO Error: {0}")]
    Io(String),
    /// Invalid TOML syntax or type mismatch
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Values that parse but can't be used
    #[error("Validation Error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_config_from_toml() {
        let temp_file = write_config(
            r#"
            hosts = ["jpbd.dev", "google.cl"]
            output = "json"
            exit_code = 1
            port = "8443"
            method = "GET"
            reject_unauthorized = true
            timeout_secs = 5

            [prometheus]
            enabled = true
            address = "http://localhost:9092"
        "#,
        );

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(
            config.hosts,
            Some(vec!["jpbd.dev".to_string(), "google.cl".to_string()])
        );
        assert_eq!(config.output, Some(OutputFormat::Json));
        assert_eq!(config.exit_code, Some(1));
        assert_eq!(config.port, Some(PortSetting::Text("8443".to_string())));
        assert_eq!(config.method, Some(RequestMethod::Get));
        assert_eq!(config.reject_unauthorized, Some(true));
        assert_eq!(config.timeout_secs, Some(5));
        assert_eq!(config.prometheus_address(), Some("http://localhost:9092"));

        let options = config.check_options().unwrap();
        assert_eq!(options.port, 8443);
        assert_eq!(options.method, RequestMethod::Get);
        assert!(options.reject_unauthorized);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_numeric_port() {
        let temp_file = write_config("port = 9443");
        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.port, Some(PortSetting::Number(9443)));
        assert_eq!(config.check_options().unwrap().port, 9443);
    }

    #[test]
    fn test_invalid_port_is_a_validation_error() {
        for content in ["port = -1", "port = \"abc\"", "port = 0", "port = 70000"] {
            let temp_file = write_config(content);
            let config = Config::from_file(temp_file.path()).unwrap();
            match config.check_options() {
                Err(ConfigError::Validation(msg)) => assert!(msg.contains("Invalid port")),
                other => panic!("Expected ValidationError for {}, got {:?}", content, other),
            }
        }
    }

    #[test]
    fn test_config_merge() {
        let base_config = Config {
            hosts: Some(vec!["base.com".to_string()]),
            output: Some(OutputFormat::Text),
            exit_code: Some(0),
            timeout_secs: Some(30),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://base:9091".to_string()),
            }),
            ..Config::default()
        };

        let override_config = Config {
            hosts: Some(vec!["override.com".to_string()]),
            exit_code: Some(1),
            reject_unauthorized: Some(true),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: None,
            }),
            ..Config::default()
        };

        let merged = base_config.merge_with(override_config);

        assert_eq!(merged.hosts, Some(vec!["override.com".to_string()]));
        assert_eq!(merged.output, Some(OutputFormat::Text)); // From base
        assert_eq!(merged.exit_code, Some(1));
        assert_eq!(merged.reject_unauthorized, Some(true));
        assert_eq!(merged.timeout_secs, Some(30)); // From base
        assert_eq!(merged.prometheus_address(), Some("http://base:9091"));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::with_defaults();

        assert_eq!(config.hosts, None);
        assert_eq!(config.output, Some(OutputFormat::Summary));
        assert_eq!(config.exit_code, Some(0));
        assert_eq!(config.prometheus_address(), None);

        let options = config.check_options().unwrap();
        assert_eq!(options.port, 443);
        assert_eq!(options.method, RequestMethod::Head);
        assert!(!options.reject_unauthorized);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = Config {
            timeout_secs: Some(0),
            ..Config::default()
        };
        assert_eq!(config.check_options().unwrap().timeout, None);
    }

    #[test]
    fn test_invalid_toml() {
        let temp_file = write_config("hosts = [invalid toml");

        match Config::from_file(temp_file.path()) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        match Config::from_file("/nonexistent/certcheck.toml") {
            Err(ConfigError::Io(_)) => {}
            other => panic!("Expected IoError, got {:?}", other),
        }
    }

    #[test]
    fn test_example_toml_generation() {
        let example = Config::example_toml();
        let parsed: Config = toml::from_str(&example).unwrap();

        assert!(parsed.hosts.is_some());
        assert_eq!(parsed.output, Some(OutputFormat::Summary));
        assert_eq!(parsed.check_options().unwrap().port, 443);
        assert!(parsed.prometheus_address().is_some());
    }

    #[test]
    fn test_output_format_parsing() {
        use std::str::FromStr;
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Summary.to_string(), "summary");
        assert!(OutputFormat::from_str("xml").is_err());
    }
}
