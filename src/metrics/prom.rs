use lazy_static::lazy_static;
use log::{debug, warn};
use prometheus::{labels, register_gauge, Gauge};

use certcheck::target::Target;
use certcheck::CertificateResult;

lazy_static! {
    static ref CERTCHECK_DAYS_REMAINING: Gauge = register_gauge!(
        "certcheck_days_remaining",
        "days before the certificate expires, negative once expired"
    )
    .unwrap();
    static ref CERTCHECK_CERTIFICATE_VALID: Gauge = register_gauge!(
        "certcheck_certificate_valid",
        "1 when the certificate chain is trusted, 0 otherwise"
    )
    .unwrap();
}

/// Pushes one group of gauges per checked host.
///
/// Each push replaces the group keyed by the `host` label, so the gauges can
/// be reused between hosts. Failures are logged and skipped.
///
/// # Arguments
/// * `results` - Hosts with their check results
/// * `prometheus_address` - Push gateway base address
pub fn prometheus_metrics(results: &[(Target, CertificateResult)], prometheus_address: &str) {
    let url = format!("{}/metrics/job", prometheus_address.trim_end_matches('/'));

    for (target, result) in results {
        CERTCHECK_DAYS_REMAINING.set(result.days_remaining as f64);
        CERTCHECK_CERTIFICATE_VALID.set(if result.valid { 1.0 } else { 0.0 });

        let pushed = prometheus::push_metrics(
            "certcheck",
            labels! {
                "instance".to_owned() => "certcheck".to_owned(),
                "host".to_owned() => target.to_string(),
                "subject".to_owned() => result.subject_common_name.clone().unwrap_or_default(),
                "expired".to_owned() => result.is_expired().to_string(),
            },
            &url,
            prometheus::gather(),
            None,
        );

        match pushed {
            Ok(_) => debug!("Pushed metrics for {} to {}", target, url),
            Err(e) => warn!("Failed to push metrics for {} to prometheus: {}", target, e),
        }
    }
}
