//! Client configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/wslog/client.toml`
//! - Windows: `%APPDATA%/wslog/client.toml`
//!
//! A missing file means defaults; nothing is written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use wslog_protocol::constants::{DEFAULT_HOST, DEFAULT_LOGS_PATH};
use wslog_protocol::{Endpoint, EndpointError, Scheme};
use wslog_session::SessionOptions;

/// Where normalized lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Plain `[source] text` lines on stdout.
    #[default]
    Stdout,
    /// One `tracing` event per line.
    Log,
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host of the logging service.
    #[serde(default = "default_host")]
    pub host: String,

    /// Explicit port; the scheme's default when absent.
    #[serde(default)]
    pub port: Option<u16>,

    /// Use `wss` instead of `ws`.
    #[serde(default = "default_true")]
    pub secure: bool,

    /// Stream path on the service.
    #[serde(default = "default_path")]
    pub path: String,

    /// Full endpoint URL. Overrides host, port, secure and path.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub output: OutputKind,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Keepalive ping period (0 = off).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Silence before the connection is considered dead (0 = never).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How long teardown waits for the session to finish closing.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}

fn default_true() -> bool {
    true
}

fn default_path() -> String {
    DEFAULT_LOGS_PATH.into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    90
}

fn default_shutdown_grace() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            secure: default_true(),
            path: default_path(),
            url: None,
            output: OutputKind::default(),
            log_level: default_log_level(),
            handshake_timeout_secs: default_handshake_timeout(),
            ping_interval_secs: default_ping_interval(),
            idle_timeout_secs: default_idle_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform default
    /// location when `path` is `None`.
    ///
    /// An explicit path must exist; a missing default file yields
    /// [`Config::default`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => {
                let p = config_path();
                if p.exists() {
                    Self::load_from(&p)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Builds the endpoint this configuration points at.
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        if let Some(url) = &self.url {
            return url.parse();
        }
        let scheme = if self.secure { Scheme::Wss } else { Scheme::Ws };
        Ok(Endpoint::new(scheme, self.host.clone())
            .with_port(self.port)
            .with_path(self.path.clone()))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs.max(1)),
            ping_interval: secs_or_off(self.ping_interval_secs),
            idle_timeout: secs_or_off(self.idle_timeout_secs),
            ..SessionOptions::default()
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn secs_or_off(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("wslog").join("client.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("wslog")
            .join("client.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, None);
        assert!(config.secure);
        assert_eq!(config.path, "/logs");
        assert_eq!(config.output, OutputKind::Stdout);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn default_endpoint_is_wss_logs() {
        let ep = Config::default().endpoint().unwrap();
        assert_eq!(ep.url(), "wss://localhost/logs");
    }

    #[test]
    fn insecure_with_port() {
        let config = Config {
            host: "sensor.lan".into(),
            port: Some(6502),
            secure: false,
            ..Config::default()
        };
        assert_eq!(config.endpoint().unwrap().url(), "ws://sensor.lan:6502/logs");
    }

    #[test]
    fn url_overrides_parts() {
        let config = Config {
            host: "ignored".into(),
            url: Some("ws://10.1.2.3:9000/stream".into()),
            ..Config::default()
        };
        let ep = config.endpoint().unwrap();
        assert_eq!(ep.host(), "10.1.2.3");
        assert_eq!(ep.url(), "ws://10.1.2.3:9000/stream");
    }

    #[test]
    fn bad_url_is_an_error() {
        let config = Config {
            url: Some("ftp://host/logs".into()),
            ..Config::default()
        };
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
            host = "logs.example.com"
            output = "log"
            ping_interval_secs = 0
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "logs.example.com");
        assert_eq!(config.output, OutputKind::Log);
        assert!(config.secure);
        assert_eq!(config.path, "/logs");

        let opts = config.session_options();
        assert_eq!(opts.ping_interval, None);
        assert_eq!(opts.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(opts.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            host: "h".into(),
            port: Some(1234),
            secure: false,
            shutdown_grace_secs: 5,
            ..Config::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.port, Some(1234));
        assert!(!parsed.secure);
        assert_eq!(parsed.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn load_from_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.toml");
        std::fs::write(&path, "host = \"from-file\"\nport = 6502\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.host, "from-file");
        assert_eq!(config.port, Some(6502));
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn load_invalid_toml_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path();
        assert!(path.to_string_lossy().contains("wslog"));
        assert!(path.ends_with("client.toml"));
    }
}
