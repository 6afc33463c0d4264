//! Configuration module for check-tcp.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values, field by field.

use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::exchange::Exchange;
use crate::probe::ProbeRequest;
use crate::report::check_name;
use crate::service::{ExchangeProfile, ServiceCatalog};
use crate::verdict::Thresholds;

/// Command-line arguments for the probe
#[derive(Parser, Debug, Default)]
#[command(name = "check-tcp")]
#[command(author = "check-tcp authors")]
#[command(version = "0.1.0")]
#[command(about = "Check a TCP or TLS service by exchanging a few lines with it", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Service with a default exchange (FTP, POP, SPOP, IMAP, SIMAP, SMTP, SSMTP)
    #[arg(long)]
    pub service: Option<String>,

    /// Host name or IP address
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,

    /// Port number
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// String to send to the server
    #[arg(short, long)]
    pub send: Option<String>,

    /// String to expect at the start of the server response
    #[arg(short, long)]
    pub expect: Option<String>,

    /// String to send the server to initiate a clean close of the connection
    #[arg(short, long)]
    pub quit: Option<String>,

    /// Use SSL/TLS for the connection
    #[arg(short = 'S', long)]
    pub ssl: bool,

    /// Decode \n, \r, \t and \\ in send and quit strings; disables the \r\n added to quit
    #[arg(short = 'E', long)]
    pub escape: bool,

    /// Seconds before connection times out (0 = no timeout) [default: 10]
    #[arg(short, long, value_parser = parse_seconds)]
    pub timeout: Option<f64>,

    /// Maximum number of response bytes to read (0 = 32768)
    #[arg(short, long)]
    pub maxbytes: Option<usize>,

    /// Seconds to wait before connecting
    #[arg(short, long, value_parser = parse_seconds)]
    pub delay: Option<f64>,

    /// Response time to result in warning status (seconds)
    #[arg(short, long, value_parser = parse_seconds)]
    pub warning: Option<f64>,

    /// Response time to result in critical status (seconds)
    #[arg(short, long, value_parser = parse_seconds)]
    pub critical: Option<f64>,

    /// Log level (trace, debug, info, warn, error) [default: warn]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Parse a non-negative number of seconds.
fn parse_seconds(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number of seconds"))?;
    check_seconds(secs)
}

/// Accept only values that convert to a `Duration`.
fn check_seconds(secs: f64) -> Result<f64, String> {
    if !(secs.is_finite() && secs >= 0.0) {
        return Err(format!("{secs} is not a non-negative number of seconds"));
    }
    Duration::try_from_secs_f64(secs)
        .map(|_| secs)
        .map_err(|e| format!("{secs} seconds is out of range: {e}"))
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Custom exchange profiles keyed by service name
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
}

/// Probe options; same names as the long CLI flags
#[derive(Debug, Deserialize, Default)]
pub struct ProbeConfig {
    pub hostname: Option<String>,
    pub service: Option<String>,
    pub port: Option<u16>,
    pub send: Option<String>,
    pub expect: Option<String>,
    pub quit: Option<String>,
    pub ssl: Option<bool>,
    pub escape: Option<bool>,
    pub timeout: Option<f64>,
    pub maxbytes: Option<usize>,
    pub delay: Option<f64>,
    pub warning: Option<f64>,
    pub critical: Option<f64>,
}

/// Custom service profile
#[derive(Debug, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub send: String,
    #[serde(default)]
    pub expect: String,
    #[serde(default)]
    pub quit: String,
    #[serde(default)]
    pub ssl: bool,
}

impl From<ServiceConfig> for ExchangeProfile {
    fn from(svc: ServiceConfig) -> Self {
        Self {
            port: svc.port,
            send: svc.send,
            expect: svc.expect,
            quit: svc.quit,
            tls: svc.ssl,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_timeout() -> f64 {
    10.0 // 10 seconds
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Check name reported to the monitoring host
    pub name: String,
    pub service: Option<String>,
    pub hostname: String,
    /// User-entered exchange, before service defaults are merged in
    pub exchange: Exchange,
    pub escape: bool,
    pub timeout: Option<Duration>,
    pub max_bytes: usize,
    pub delay: Duration,
    pub thresholds: Thresholds,
    pub catalog: ServiceCatalog,
    pub log_level: String,
}

impl Config {
    /// Read the TOML file named by `cli`, if any, and resolve.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::resolve(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    pub fn resolve(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let file = toml_config.probe;

        let timeout = seconds("timeout", cli.timeout.or(file.timeout))?
            .unwrap_or_else(default_timeout);
        let delay = seconds("delay", cli.delay.or(file.delay))?.unwrap_or_default();
        let warning = seconds("warning", cli.warning.or(file.warning))?.unwrap_or_default();
        let critical = seconds("critical", cli.critical.or(file.critical))?.unwrap_or_default();

        if file.port == Some(0) {
            return Err(ConfigError::Invalid(
                "port",
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let user = Exchange {
            port: cli.port,
            send: cli.send,
            expect: cli.expect,
            quit: cli.quit,
            tls: cli.ssl.then_some(true),
        };
        let from_file = Exchange {
            port: file.port,
            send: file.send,
            expect: file.expect,
            quit: file.quit,
            tls: file.ssl,
        };

        let mut catalog = ServiceCatalog::new();
        for (name, svc) in toml_config.services {
            catalog.insert(&name, svc.into());
        }

        let service = cli.service.or(file.service).filter(|s| !s.trim().is_empty());

        Ok(Config {
            name: check_name(service.as_deref()),
            service,
            hostname: cli.hostname.or(file.hostname).unwrap_or_default(),
            exchange: user.or(from_file),
            escape: cli.escape || file.escape.unwrap_or(false),
            timeout: positive(timeout),
            max_bytes: cli.maxbytes.or(file.maxbytes).unwrap_or(0),
            delay: Duration::from_secs_f64(delay),
            thresholds: Thresholds {
                warning: positive(warning),
                critical: positive(critical),
            },
            catalog,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// Merge the selected service's defaults and build the probe request.
    pub fn probe_request(&self) -> ProbeRequest {
        let mut exchange = self.exchange.clone();

        if let Some(service) = &self.service {
            if !self.catalog.is_known(service) {
                warn!(service = %service, "Unknown service, no defaults applied");
            }
            let profile = self.catalog.lookup(service);
            debug!(service = %service, ?profile, "Merging service defaults");
            exchange.merge(&profile);
        }

        ProbeRequest {
            hostname: self.hostname.clone(),
            exchange: exchange.resolve(self.escape),
            timeout: self.timeout,
            max_bytes: self.max_bytes,
            delay: self.delay,
            thresholds: self.thresholds,
        }
    }
}

/// Validate a seconds value taken from either source.
fn seconds(name: &'static str, value: Option<f64>) -> Result<Option<f64>, ConfigError> {
    value
        .map(check_seconds)
        .transpose()
        .map_err(|reason| ConfigError::Invalid(name, reason))
}

/// Zero seconds means "disabled".
fn positive(secs: f64) -> Option<Duration> {
    (secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(field, reason) => {
                write!(f, "Invalid value for '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let mut argv = vec!["check-tcp"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::resolve(CliArgs::default(), TomlConfig::default()).unwrap();
        assert_eq!(config.name, "TCP");
        assert_eq!(config.hostname, "");
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.max_bytes, 0);
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.exchange, Exchange::default());
        assert!(!config.escape);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_cli_parsing() {
        let cli = parse(&[
            "-H", "mail.example.com", "--service", "smtp", "-p", "2525", "-t", "2.5", "-w",
            "1", "-c", "3", "-m", "512", "-E", "-S",
        ]);
        let config = Config::resolve(cli, TomlConfig::default()).unwrap();

        assert_eq!(config.name, "SMTP");
        assert_eq!(config.hostname, "mail.example.com");
        assert_eq!(config.exchange.port, Some(2525));
        assert_eq!(config.exchange.tls, Some(true));
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.thresholds.warning, Some(Duration::from_secs(1)));
        assert_eq!(config.thresholds.critical, Some(Duration::from_secs(3)));
        assert_eq!(config.max_bytes, 512);
        assert!(config.escape);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = Config::resolve(parse(&["-t", "0"]), TomlConfig::default()).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_invalid_cli_values_rejected() {
        assert!(CliArgs::try_parse_from(["check-tcp", "-t", "-1"]).is_err());
        assert!(CliArgs::try_parse_from(["check-tcp", "-t", "soon"]).is_err());
        assert!(CliArgs::try_parse_from(["check-tcp", "-p", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["check-tcp", "-p", "70000"]).is_err());
        assert!(CliArgs::try_parse_from(["check-tcp", "--bogus"]).is_err());
    }

    #[test]
    fn test_huge_seconds_rejected() {
        for flag in ["-t", "-d", "-w", "-c"] {
            let err = CliArgs::try_parse_from(["check-tcp", flag, "1e300"]).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{flag}: {err}");
        }

        let toml_config: TomlConfig = toml::from_str("[probe]\ntimeout = 1e300\n").unwrap();
        let err = Config::resolve(CliArgs::default(), toml_config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("timeout", _)));
    }

    #[test]
    fn test_large_timeout_within_range() {
        let config = Config::resolve(parse(&["-t", "1e19"]), TomlConfig::default()).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs_f64(1e19)));
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [probe]
            hostname = "imap.example.com"
            service = "simap"
            timeout = 5.0
            warning = 0.5

            [logging]
            level = "debug"

            [services.redis]
            port = 6379
            send = "PING\r\n"
            expect = "+PONG"
            quit = "QUIT"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.probe.hostname.as_deref(), Some("imap.example.com"));
        assert_eq!(config.probe.service.as_deref(), Some("simap"));
        assert_eq!(config.probe.timeout, Some(5.0));
        assert_eq!(config.logging.level, "debug");

        let redis = &config.services["redis"];
        assert_eq!(redis.port, 6379);
        assert_eq!(redis.send, "PING\r\n");
        assert!(!redis.ssl);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [probe]
            hostname = "from-file"
            port = 25
            expect = "220"
            timeout = 5.0
            ssl = true

            [logging]
            level = "info"
            "#,
        )
        .unwrap();

        let cli = parse(&["-H", "from-cli", "-p", "26", "--log-level", "trace"]);
        let config = Config::resolve(cli, toml_config).unwrap();

        assert_eq!(config.hostname, "from-cli");
        assert_eq!(config.exchange.port, Some(26));
        assert_eq!(config.exchange.expect.as_deref(), Some("220"));
        assert_eq!(config.exchange.tls, Some(true));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_invalid_toml_values_rejected() {
        let toml_config: TomlConfig = toml::from_str("[probe]\ndelay = -2.0\n").unwrap();
        let err = Config::resolve(CliArgs::default(), toml_config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("delay", _)));

        let toml_config: TomlConfig = toml::from_str("[probe]\nport = 0\n").unwrap();
        let err = Config::resolve(CliArgs::default(), toml_config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("port", _)));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["-C", "/nonexistent/check-tcp.toml"]);
        let err = Config::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
        assert!(err.to_string().contains("/nonexistent/check-tcp.toml"));
    }

    #[test]
    fn test_probe_request_merges_service() {
        let cli = parse(&["-H", "ftp.example.com", "--service", "ftp"]);
        let request = Config::resolve(cli, TomlConfig::default())
            .unwrap()
            .probe_request();

        assert_eq!(request.hostname, "ftp.example.com");
        assert_eq!(request.exchange.port, Some(21));
        assert_eq!(request.exchange.expect, "220");
        assert_eq!(&request.exchange.quit[..], b"QUIT\r\n");
        assert!(!request.exchange.tls);
    }

    #[test]
    fn test_probe_request_tls_service() {
        let cli = parse(&["-H", "mail.example.com", "--service", "SSMTP"]);
        let request = Config::resolve(cli, TomlConfig::default())
            .unwrap()
            .probe_request();

        assert_eq!(request.exchange.port, Some(465));
        assert!(request.exchange.tls);
    }

    #[test]
    fn test_probe_request_escape_no_terminator() {
        let cli = parse(&["-H", "h", "--service", "pop", "-E", "-q", r"QUIT\n"]);
        let request = Config::resolve(cli, TomlConfig::default())
            .unwrap()
            .probe_request();

        assert_eq!(&request.exchange.quit[..], b"QUIT\n");
        assert_eq!(request.exchange.expect, "+OK");
    }

    #[test]
    fn test_probe_request_custom_service() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [services.redis]
            port = 6379
            send = "PING\r\n"
            expect = "+PONG"
            "#,
        )
        .unwrap();

        let cli = parse(&["-H", "cache", "--service", "Redis"]);
        let config = Config::resolve(cli, toml_config).unwrap();
        assert_eq!(config.name, "REDIS");

        let request = config.probe_request();
        assert_eq!(request.exchange.port, Some(6379));
        assert_eq!(&request.exchange.send[..], b"PING\r\n");
        assert_eq!(request.exchange.expect, "+PONG");
        assert!(request.exchange.quit.is_empty());
    }

    #[test]
    fn test_probe_request_without_service() {
        let cli = parse(&["-H", "h", "-p", "7", "-q", "bye"]);
        let request = Config::resolve(cli, TomlConfig::default())
            .unwrap()
            .probe_request();

        assert_eq!(request.exchange.port, Some(7));
        assert_eq!(&request.exchange.quit[..], b"bye\r\n");
        assert!(request.exchange.expect.is_empty());
    }
}
