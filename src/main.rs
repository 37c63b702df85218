use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use log::{debug, error, LevelFilter};
use serde::Serialize;

use certcheck::config::{
    Config, ConfigError, OutputFormat, PortSetting, PrometheusConfig, DEFAULT_CONFIG_FILE,
};
use certcheck::expiry::iso_millis;
use certcheck::target::Target;
use certcheck::{check, CertificateResult, CheckError, RequestMethod};

mod metrics;

#[derive(Parser, Debug)]
#[command(name = "certcheck", version, author, about, long_about = None)]
struct Args {
    /// Hosts to check: host, host:port or https://host:port
    hosts: Vec<String>,

    /// Output format: summary, text or json
    #[arg(short, long)]
    output: Option<OutputFormat>,

    /// Port for hosts that don't name one
    #[arg(short, long)]
    port: Option<String>,

    /// Request method sent after the handshake: HEAD, GET or OPTIONS
    #[arg(short, long)]
    method: Option<RequestMethod>,

    /// Fail the connection when the chain is not trusted
    #[arg(long)]
    reject_unauthorized: bool,

    /// Connect, read and write timeout in seconds, 0 to disable
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// PEM file with extra trusted certificates
    #[arg(long, value_name = "FILE")]
    ca_file: Option<PathBuf>,

    /// Exit code when any host fails, is untrusted or has expired
    #[arg(long)]
    exit_code: Option<i32>,

    /// Configuration file (defaults to ./certcheck.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Push results to a Prometheus Push Gateway
    #[arg(long)]
    prometheus: bool,

    /// Push Gateway address
    #[arg(long, value_name = "URL")]
    prometheus_address: Option<String>,

    /// Log level (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

impl Args {
    fn to_config(&self) -> Config {
        Config {
            hosts: (!self.hosts.is_empty()).then(|| self.hosts.clone()),
            output: self.output,
            exit_code: self.exit_code,
            port: self.port.clone().map(PortSetting::Text),
            method: self.method,
            reject_unauthorized: self.reject_unauthorized.then_some(true),
            timeout_secs: self.timeout,
            ca_file: self.ca_file.clone(),
            prometheus: Some(PrometheusConfig {
                enabled: self.prometheus.then_some(true),
                address: self.prometheus_address.clone(),
            }),
        }
    }
}

#[derive(Serialize)]
struct HostReport<'a> {
    host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a CertificateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn init_logger(level: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::from_default_env();
    match level {
        Some(level) => {
            builder.filter_level(level);
        }
        None if std::env::var_os("RUST_LOG").is_none() => {
            builder.filter_level(LevelFilter::Warn);
        }
        None => {}
    }
    builder.target(env_logger::Target::Stderr);
    let _ = builder.try_init();
}

fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = Config::with_defaults();

    let file = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    if let Some(path) = file {
        debug!("Loading configuration from {}", path.display());
        config = config.merge_with(Config::from_file(&path)?);
    }

    Ok(config.merge_with(args.to_config()))
}

/// One host entry as given, with what checking it produced.
type Outcome = (String, Result<(Target, CertificateResult), CheckError>);

fn print_summary(outcomes: &[Outcome]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Host", "Subject", "Valid from", "Valid to", "Days left", "Trusted"]);
    for (_, outcome) in outcomes {
        if let Ok((target, cert)) = outcome {
            table.add_row(vec![
                target.to_string(),
                cert.subject_common_name.clone().unwrap_or_default(),
                iso_millis::format(&cert.valid_from),
                iso_millis::format(&cert.valid_to),
                cert.days_remaining.to_string(),
                cert.valid.to_string(),
            ]);
        }
    }
    println!("{table}");

    if let Err(e) = write_failures(outcomes, &mut io::stderr().lock()) {
        error!("Failed to report host errors: {}", e);
    }
}

/// Writes one line per failed host, in input order.
fn write_failures(outcomes: &[Outcome], out: &mut impl Write) -> io::Result<()> {
    for (entry, outcome) in outcomes {
        if let Err(err) = outcome {
            writeln!(out, "Fail to check host: {}  {}", entry, err)?;
        }
    }
    Ok(())
}

fn print_text(outcomes: &[Outcome]) {
    for (entry, outcome) in outcomes {
        match outcome {
            Ok((target, cert)) => {
                println!("--------------------------------------");
                println!("Hostname: {}", target);
                println!(
                    "Common Name: {}",
                    cert.subject_common_name.as_deref().unwrap_or("None")
                );
                println!("Valid from: {}", iso_millis::format(&cert.valid_from));
                println!("Valid to: {}", iso_millis::format(&cert.valid_to));
                println!("Days left: {}", cert.days_remaining);
                println!("Expired: {}", cert.is_expired());
                println!("Trusted: {}", cert.valid);
            }
            Err(err) => eprintln!("Fail to check host: {}  {}", entry, err),
        }
    }
}

fn json_reports(outcomes: &[Outcome]) -> Vec<HostReport<'_>> {
    outcomes
        .iter()
        .map(|(entry, outcome)| match outcome {
            Ok((target, cert)) => HostReport {
                host: target.to_string(),
                result: Some(cert),
                error: None,
            },
            Err(err) => HostReport {
                host: entry.clone(),
                result: None,
                error: Some(err.to_string()),
            },
        })
        .collect()
}

fn print_json(outcomes: &[Outcome]) {
    match serde_json::to_string_pretty(&json_reports(outcomes)) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to render JSON output: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);

    if args.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let (config, options) = match load_config(&args).and_then(|config| {
        let options = config.check_options()?;
        Ok((config, options))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };

    let hosts = config.hosts.clone().unwrap_or_default();
    if hosts.is_empty() {
        eprintln!("No hosts to check. Pass them as arguments or list them in a config file.");
        exit(2);
    }

    let mut outcomes: Vec<Outcome> = Vec::with_capacity(hosts.len());
    for entry in &hosts {
        let outcome = match Target::parse(entry, options.port) {
            Ok(target) => {
                let host_options = options.clone().with_port(target.port);
                check(&target.host, &host_options)
                    .await
                    .map(|cert| (target, cert))
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            debug!("Check of {} failed: {:?}", entry, e);
        }
        outcomes.push((entry.clone(), outcome));
    }

    match config.output.unwrap_or(OutputFormat::Summary) {
        OutputFormat::Summary => print_summary(&outcomes),
        OutputFormat::Text => print_text(&outcomes),
        OutputFormat::Json => print_json(&outcomes),
    }

    let checked: Vec<(Target, CertificateResult)> = outcomes
        .iter()
        .filter_map(|(_, outcome)| outcome.as_ref().ok().cloned())
        .collect();
    let any_failed = checked.len() < outcomes.len();

    if let Some(address) = config.prometheus_address() {
        let address = address.to_string();
        let results = checked.clone();
        // The push client blocks
        let pushed = tokio::task::spawn_blocking(move || {
            metrics::prom::prometheus_metrics(&results, &address)
        })
        .await;
        if let Err(e) = pushed {
            error!("Metrics push did not complete: {}", e);
        }
    }

    let unhealthy = any_failed
        || checked
            .iter()
            .any(|(_, cert)| !cert.valid || cert.is_expired());
    exit(if unhealthy {
        config.exit_code.unwrap_or(0)
    } else {
        0
    });
}
