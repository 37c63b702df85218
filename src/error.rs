//! Error types for certificate checks.
//!
//! A check fails in exactly one of three ways: the host name is malformed, the
//! port is unusable, or the connection to the peer could not produce a
//! certificate. Connection failures keep the underlying cause as their source.

use std::io;

use thiserror::Error;

/// Error returned by [`check`](crate::check) and the input validators.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The host does not follow RFC 1123 host name syntax
    #[error("Invalid host: {host:?}")]
    InvalidHost {
        /// The rejected host
        host: String,
    },

    /// The port is non-numeric, not an integer, out of range or not positive
    #[error("Invalid port: {port}")]
    InvalidPort {
        /// Textual form of the rejected port
        port: String,
    },

    /// The peer could not be reached or did not complete a TLS exchange
    #[error("Connection to {address} failed: {source}")]
    Connection {
        /// The `host:port` that was dialed
        address: String,
        /// What went wrong on the wire
        #[source]
        source: ConnectionCause,
    },
}

impl CheckError {
    pub(crate) fn invalid_host(host: &str) -> Self {
        Self::InvalidHost {
            host: host.to_string(),
        }
    }

    pub(crate) fn invalid_port(port: impl ToString) -> Self {
        Self::InvalidPort {
            port: port.to_string(),
        }
    }

    pub(crate) fn connection(address: String, source: ConnectionCause) -> Self {
        Self::Connection { address, source }
    }

    /// True for the two input validation failures, which never touch the network.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidHost { .. } | Self::InvalidPort { .. })
    }
}

/// Underlying cause of a [`CheckError::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionCause {
    /// Name resolution failed
    #[error("could not resolve host: {0}")]
    Resolve(#[source] io::Error),

    /// Name resolution succeeded but returned nothing
    #[error("host resolved to no addresses")]
    NoAddress,

    /// TCP connection failed (refused, unreachable, reset)
    #[error("TCP connect failed: {0}")]
    Connect(#[source] io::Error),

    /// TLS handshake failed, including chain rejection in verifying mode
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// OpenSSL could not set up the client context or session
    #[error("OpenSSL error: {0}")]
    Tls(#[from] openssl::error::ErrorStack),

    /// A connect, read or write exceeded the configured timeout
    #[error("operation timed out")]
    Timeout,

    /// The handshake completed without a peer certificate
    #[error("peer presented no certificate")]
    NoPeerCertificate,

    /// The peer certificate could not be interpreted
    #[error("unreadable certificate: {0}")]
    Certificate(String),

    /// Sending the request or reading the response failed
    #[error("request failed: {0}")]
    Request(#[source] io::Error),

    /// The blocking worker running the connection did not finish
    #[error("connection worker failed: {0}")]
    Worker(String),
}

impl ConnectionCause {
    /// Maps a socket error, folding the timeout kinds into [`ConnectionCause::Timeout`].
    pub(crate) fn from_io(e: io::Error, wrap: fn(io::Error) -> ConnectionCause) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            _ => wrap(e),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for ConnectionCause {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        use openssl::ssl::HandshakeError;

        // A blocking socket only reports WouldBlock once its timeout expires.
        let timed_out = match &e {
            HandshakeError::WouldBlock(_) => true,
            HandshakeError::Failure(mid) => mid.error().io_error().is_some_and(|io| {
                matches!(io.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
            }),
            HandshakeError::SetupFailure(_) => false,
        };
        if timed_out {
            Self::Timeout
        } else {
            Self::Handshake(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = CheckError::invalid_host("bad host!");
        assert_eq!(err.to_string(), "Invalid host: \"bad host!\"");

        let err = CheckError::invalid_port("abc");
        assert_eq!(err.to_string(), "Invalid port: abc");
    }

    #[test]
    fn test_connection_error_keeps_cause() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = CheckError::connection(
            "localhost:1".to_string(),
            ConnectionCause::from_io(refused, ConnectionCause::Connect),
        );

        assert!(err.to_string().starts_with("Connection to localhost:1 failed"));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("TCP connect failed"));
        assert!(!err.is_invalid_input());
    }

    #[test]
    fn test_timeouts_are_folded() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(
            ConnectionCause::from_io(timed_out, ConnectionCause::Request),
            ConnectionCause::Timeout
        ));

        let would_block = io::Error::new(io::ErrorKind::WouldBlock, "slow");
        assert!(matches!(
            ConnectionCause::from_io(would_block, ConnectionCause::Connect),
            ConnectionCause::Timeout
        ));
    }
}
