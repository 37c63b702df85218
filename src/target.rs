//! Host entries as given on the command line or in a config file.
//!
//! Accepted forms are `host`, `host:port` and `scheme://host[:port][/path]`.
//! Only the port is validated here; the host is left to
//! [`check`](crate::check) so that malformed hosts surface as
//! [`CheckError::InvalidHost`].

use std::fmt;

use url::Url;

use crate::error::CheckError;
use crate::validate::parse_port;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Parses an entry, using `default_port` when the entry names none.
    pub fn parse(entry: &str, default_port: u16) -> Result<Target, CheckError> {
        let entry = entry.trim();

        if entry.contains("://") {
            let url = Url::parse(entry).map_err(|_| CheckError::InvalidHost {
                host: entry.to_string(),
            })?;
            let host = url.host_str().unwrap_or_default().to_string();
            let port = url.port_or_known_default().unwrap_or(default_port);
            if port == 0 {
                return Err(CheckError::InvalidPort {
                    port: port.to_string(),
                });
            }
            return Ok(Target { host, port });
        }

        match entry.rsplit_once(':') {
            Some((host, port)) => Ok(Target {
                host: host.to_string(),
                port: parse_port(port)?,
            }),
            None => Ok(Target {
                host: entry.to_string(),
                port: default_port,
            }),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
