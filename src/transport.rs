//! Blocking OpenSSL client used by the checker.
//!
//! One call dials the peer, completes a TLS handshake, reads the peer
//! certificate and the verification verdict, then sends a body-less HTTP
//! request and waits for the status line.

use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use openssl::nid::Nid;
use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::{X509Ref, X509VerifyResult};

use crate::error::ConnectionCause;
use crate::expiry::asn1_to_utc;
use crate::{CheckOptions, RequestMethod};

/// What the peer presented during one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSession {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject_common_name: Option<String>,
    /// Whether OpenSSL judged the chain and host name trustworthy.
    /// `None` means no verdict was reported, which counts as untrusted.
    pub authorized: Option<bool>,
    /// OpenSSL's reason when the chain was not trusted
    pub trust_error: Option<String>,
}

impl PeerSession {
    pub fn is_authorized(&self) -> bool {
        self.authorized.unwrap_or(false)
    }
}

/// Connects to `host:port` and collects the peer certificate details.
pub fn fetch_peer(host: &str, options: &CheckOptions) -> Result<PeerSession, ConnectionCause> {
    let timeout = options.timeout.filter(|t| !t.is_zero());
    let ssl = client_session(host, options)?;
    let tcp = connect_tcp(host, options.port, timeout)?;

    debug!("Starting TLS handshake with {}:{}", host, options.port);
    let mut stream = ssl.connect(tcp)?;

    let session = {
        let ssl = stream.ssl();
        let verdict = ssl.verify_result();
        let cert = ssl
            .peer_certificate()
            .ok_or(ConnectionCause::NoPeerCertificate)?;
        read_certificate(&cert, verdict)?
    };

    let status = send_request(&mut stream, host, options.port, options.method)?;
    debug!("{}:{} answered {:?}", host, options.port, status);
    // The response has been seen; a failed close_notify changes nothing.
    let _ = stream.shutdown();

    Ok(session)
}

/// Client context holding the system trust anchors plus `options.ca_file`.
///
/// A vendored OpenSSL looks for anchors under its own build prefix, which no
/// distribution populates, so the system bundle is located with
/// `openssl-probe` and loaded on top of the compiled-in default paths.
pub fn client_context(options: &CheckOptions) -> Result<SslContext, ConnectionCause> {
    let mut context = SslContext::builder(SslMethod::tls_client())?;
    context.set_default_verify_paths()?;
    load_system_roots(&mut context)?;
    if let Some(ca_file) = &options.ca_file {
        context.set_ca_file(ca_file)?;
    }
    // With NONE the chain is still verified and the verdict recorded, the
    // handshake just doesn't abort on it.
    context.set_verify(if options.reject_unauthorized {
        SslVerifyMode::PEER
    } else {
        SslVerifyMode::NONE
    });
    Ok(context.build())
}

fn load_system_roots(context: &mut SslContextBuilder) -> Result<(), ConnectionCause> {
    let locations = openssl_probe::probe();
    let cert_file = locations.cert_file.as_deref().filter(|p| p.is_file());
    let cert_dir = locations.cert_dir.as_deref().filter(|p| p.is_dir());

    match (cert_file, cert_dir) {
        (None, None) => {
            warn!("No system CA bundle found; only OpenSSL's default paths are used");
            Ok(())
        }
        (file, dir) => {
            debug!("Loading trust anchors from {:?} and {:?}", file, dir);
            context.load_verify_locations(file, dir)?;
            Ok(())
        }
    }
}

fn client_session(host: &str, options: &CheckOptions) -> Result<Ssl, ConnectionCause> {
    let context = client_context(options)?;

    let mut ssl = Ssl::new(&context)?;
    match host.parse::<IpAddr>() {
        Ok(ip) => ssl.param_mut().set_ip(ip)?,
        Err(_) => {
            ssl.set_hostname(host)?;
            ssl.param_mut().set_host(host)?;
        }
    }
    Ok(ssl)
}

/// Tries every resolved address in order and keeps the first that accepts.
fn connect_tcp(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<TcpStream, ConnectionCause> {
    let addresses: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(ConnectionCause::Resolve)?
        .collect();

    let mut last_error = None;
    for address in addresses {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&address, timeout),
            None => TcpStream::connect(address),
        };
        match attempt {
            Ok(stream) => {
                stream
                    .set_read_timeout(timeout)
                    .and_then(|_| stream.set_write_timeout(timeout))
                    .map_err(ConnectionCause::Connect)?;
                debug!("Connected to {}", address);
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connecting to {} failed: {}", address, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => ConnectionCause::from_io(e, ConnectionCause::Connect),
        None => ConnectionCause::NoAddress,
    })
}

fn read_certificate(
    cert: &X509Ref,
    verdict: X509VerifyResult,
) -> Result<PeerSession, ConnectionCause> {
    let subject_common_name = cert
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned());

    let authorized = verdict == X509VerifyResult::OK;
    Ok(PeerSession {
        not_before: asn1_to_utc(cert.not_before())?,
        not_after: asn1_to_utc(cert.not_after())?,
        subject_common_name,
        authorized: Some(authorized),
        trust_error: (!authorized).then(|| verdict.error_string().to_string()),
    })
}

fn request_head(host: &str, port: u16, method: RequestMethod) -> String {
    let authority = if port == 443 {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    };
    format!(
        "{} / HTTP/1.1\r\nHost: {}\r\nUser-Agent: certcheck/{}\r\nConnection: close\r\n\r\n",
        method,
        authority,
        env!("CARGO_PKG_VERSION")
    )
}

fn send_request(
    stream: &mut SslStream<TcpStream>,
    host: &str,
    port: u16,
    method: RequestMethod,
) -> Result<String, ConnectionCause> {
    let io_cause = |e: std::io::Error| ConnectionCause::from_io(e, ConnectionCause::Request);

    stream
        .write_all(request_head(host, port, method).as_bytes())
        .and_then(|_| stream.flush())
        .map_err(io_cause)?;

    let mut status = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut status)
        .map_err(io_cause)?;
    if read == 0 {
        return Err(ConnectionCause::Request(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before a response arrived",
        )));
    }
    Ok(status.trim_end().to_string())
}
