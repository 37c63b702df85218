//! Input validation run before any network I/O.

use crate::error::CheckError;

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Checks `host` against RFC 1123 host name syntax.
///
/// Labels are separated by dots, hold 1 to 63 ASCII letters, digits or
/// hyphens, and never start or end with a hyphen. Dotted IPv4 literals pass
/// because their labels are all digits.
pub fn validate_host(host: &str) -> Result<(), CheckError> {
    if host.is_empty() || host.len() > MAX_HOST_LEN {
        return Err(CheckError::invalid_host(host));
    }
    if host.split('.').all(is_valid_label) {
        Ok(())
    } else {
        Err(CheckError::invalid_host(host))
    }
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

/// Rejects port 0; every other `u16` is usable.
pub fn validate_port(port: u16) -> Result<(), CheckError> {
    if port == 0 {
        return Err(CheckError::invalid_port(port));
    }
    Ok(())
}

/// Coerces a textual port into a `u16`.
///
/// The trimmed text must read as a finite, strictly positive, integral number
/// no larger than 65535, so `"8443"` and `"443.0"` are accepted while `"-1"`,
/// `"0"`, `"abc"` and `"NaN"` are not.
pub fn parse_port(raw: &str) -> Result<u16, CheckError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CheckError::invalid_port(raw))?;

    if !value.is_finite() || value <= 0.0 || value.fract() != 0.0 || value > f64::from(u16::MAX)
    {
        return Err(CheckError::invalid_port(raw));
    }
    Ok(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected_host(host: &str) -> bool {
        matches!(validate_host(host), Err(CheckError::InvalidHost { .. }))
    }

    fn rejected_port(raw: &str) -> bool {
        matches!(parse_port(raw), Err(CheckError::InvalidPort { .. }))
    }

    #[test]
    fn test_accepts_common_hosts() {
        for host in [
            "example.com",
            "localhost",
            "a",
            "xn--bcher-kva.example",
            "my-host.sub.example.co.uk",
            "127.0.0.1",
            "EXAMPLE.COM",
        ] {
            assert!(validate_host(host).is_ok(), "{} should be accepted", host);
        }
    }

    #[test]
    fn test_rejects_malformed_hosts() {
        for host in [
            "",
            "bad host!",
            "-leading.com",
            "trailing-.com",
            "double..dot",
            ".leading-dot.com",
            "trailing-dot.com.",
            "under_score.com",
            "https://example.com",
            "example.com:443",
            "ünicode.com",
        ] {
            assert!(rejected_host(host), "{:?} should be rejected", host);
        }
    }

    #[test]
    fn test_label_and_total_length_limits() {
        let label_63 = "a".repeat(63);
        let label_64 = "a".repeat(64);
        assert!(validate_host(&format!("{}.com", label_63)).is_ok());
        assert!(rejected_host(&format!("{}.com", label_64)));

        let long = vec!["abcdefghi"; 26].join(".");
        assert!(long.len() > 253);
        assert!(rejected_host(&long));
    }

    #[test]
    fn test_port_coercion() {
        assert_eq!(parse_port("443").unwrap(), 443);
        assert_eq!(parse_port(" 8443 ").unwrap(), 8443);
        assert_eq!(parse_port("443.0").unwrap(), 443);
        assert_eq!(parse_port("65535").unwrap(), 65535);

        for raw in ["-1", "0", "abc", "", "NaN", "inf", "1.5", "65536", "-0"] {
            assert!(rejected_port(raw), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_port_zero_is_rejected() {
        assert!(validate_port(443).is_ok());
        match validate_port(0) {
            Err(CheckError::InvalidPort { port }) => assert_eq!(port, "0"),
            other => panic!("Expected InvalidPort, got {:?}", other),
        }
    }
}
