//! Checks whether a host's TLS certificate is trusted and how long it has left.
//!
//! ```no_run
//! # async fn run() -> Result<(), certcheck::CheckError> {
//! use certcheck::{check, CheckOptions};
//!
//! let result = check("example.com", &CheckOptions::default()).await?;
//! println!("{} days left, trusted: {}", result.days_remaining, result.valid);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod expiry;
pub mod target;
pub mod transport;
pub mod validate;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub use error::{CheckError, ConnectionCause};
pub use expiry::{days_between, days_remaining};
pub use transport::PeerSession;
pub use validate::{parse_port, validate_host, validate_port};

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 443;

/// Method of the request sent once the handshake completes. No body is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum RequestMethod {
    #[default]
    #[strum(serialize = "HEAD")]
    #[serde(rename = "HEAD")]
    Head,
    #[strum(serialize = "GET")]
    #[serde(rename = "GET")]
    Get,
    #[strum(serialize = "OPTIONS")]
    #[serde(rename = "OPTIONS")]
    Options,
}

/// How a check connects to its host.
///
/// Defaults: port 443, `HEAD`, untrusted chains are reported rather than
/// rejected, no timeout beyond the operating system's, system trust store only.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    pub port: u16,
    pub method: RequestMethod,
    /// When false the connection goes ahead with an untrusted chain and
    /// [`CertificateResult::valid`] carries the verdict instead.
    pub reject_unauthorized: bool,
    /// Applies to connect, read and write separately. Expiry is a
    /// [`CheckError::Connection`] with [`ConnectionCause::Timeout`].
    pub timeout: Option<Duration>,
    /// PEM bundle of extra trust anchors
    pub ca_file: Option<PathBuf>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            port: DEFAULT_PORT,
            method: RequestMethod::Head,
            reject_unauthorized: false,
            timeout: None,
            ca_file: None,
        }
    }
}

impl CheckOptions {
    pub fn with_port(self, port: u16) -> Self {
        CheckOptions { port, ..self }
    }

    pub fn with_method(self, method: RequestMethod) -> Self {
        CheckOptions { method, ..self }
    }

    pub fn with_reject_unauthorized(self, reject_unauthorized: bool) -> Self {
        CheckOptions {
            reject_unauthorized,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        CheckOptions {
            timeout: Some(timeout),
            ..self
        }
    }

    pub fn with_ca_file(self, ca_file: impl Into<PathBuf>) -> Self {
        CheckOptions {
            ca_file: Some(ca_file.into()),
            ..self
        }
    }
}

/// Outcome of one successful check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResult {
    /// Whether the peer chain and host name were verified
    pub valid: bool,
    #[serde(with = "expiry::iso_millis")]
    pub valid_from: DateTime<Utc>,
    #[serde(with = "expiry::iso_millis")]
    pub valid_to: DateTime<Utc>,
    /// Rounded days until `valid_to`, negative once expired
    pub days_remaining: i64,
    pub subject_common_name: Option<String>,
}

impl CertificateResult {
    /// Builds the result for a session, measuring remaining days from `now`.
    pub fn from_session(session: PeerSession, now: DateTime<Utc>) -> Self {
        CertificateResult {
            valid: session.is_authorized(),
            valid_from: session.not_before,
            valid_to: session.not_after,
            days_remaining: days_remaining(now, session.not_after),
            subject_common_name: session.subject_common_name,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.days_remaining < 0
    }
}

/// Checks the certificate served at `host` using the default options.
pub async fn check_default(host: &str) -> Result<CertificateResult, CheckError> {
    check(host, &CheckOptions::default()).await
}

/// Connects to `host`, reads its certificate and reports trust and expiry.
///
/// The host is validated first, then the port; neither failure touches the
/// network. The blocking TLS exchange runs on tokio's blocking pool, so the
/// calling task is suspended rather than blocked. Every transport failure is
/// returned as [`CheckError::Connection`]; nothing is retried.
///
/// # Errors
///
/// * [`CheckError::InvalidHost`] - `host` is not a valid host name
/// * [`CheckError::InvalidPort`] - `options.port` is 0
/// * [`CheckError::Connection`] - resolution, connection, handshake, timeout or request failure
pub async fn check(host: &str, options: &CheckOptions) -> Result<CertificateResult, CheckError> {
    validate_host(host)?;
    validate_port(options.port)?;

    let address = format!("{}:{}", host, options.port);
    let session = {
        let host = host.to_string();
        let options = options.clone();
        tokio::task::spawn_blocking(move || transport::fetch_peer(&host, &options))
            .await
            .map_err(|e| ConnectionCause::Worker(e.to_string()))
            .and_then(|fetched| fetched)
            .map_err(|cause| CheckError::connection(address.clone(), cause))?
    };

    if let Some(reason) = &session.trust_error {
        warn!("Certificate chain for {} is not trusted: {}", address, reason);
    }

    // Measured after the round trip, not when the check started.
    let result = CertificateResult::from_session(session, Utc::now());
    info!(
        "Checked {}: valid={} days_remaining={}",
        address, result.valid, result.days_remaining
    );
    Ok(result)
}
