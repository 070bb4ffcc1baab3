//! Top-level configuration: parsed from TOML, YAML or JSON (dispatched by
//! file extension), with each section independently defaulted.
use std::path::Path;

use anyhow::Context;
use panther_store_etcd::EtcdConfig;
use serde::Deserialize;

/// The HTTP/WebSocket bridge's listen address and static asset root.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebConfig {
    /// Unix domain socket path; currently informational, TCP is what's bound.
    pub socket: String,
    /// Address to bind the HTTP listener to.
    pub address: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Root of the static front-end asset tree served at `GET /*`.
    pub www_root: String,
}

impl WebConfig {
    /// Fill unset fields with their defaults.
    pub fn complete(&mut self) {
        if self.socket.is_empty() {
            self.socket = "/var/run/panther.sock".to_owned();
        }
        if self.address.is_empty() {
            self.address = "0.0.0.0".to_owned();
        }
        if self.port == 0 {
            self.port = 8080;
        }
        if self.www_root.is_empty() {
            self.www_root = "/usr/share/panther/wwwroot".to_owned();
        }
    }

    /// The `address:port` pair to bind the HTTP listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// The worker pool and scheduler's tunables.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExecutorConfig {
    /// A standard 5-field cron expression, or `@daily` and friends.
    pub schedule: String,
    /// Worker count; values of 2 or fewer are rounded up to the default.
    pub workers: usize,
}

impl ExecutorConfig {
    /// Fill unset fields with their defaults.
    pub fn complete(&mut self) {
        if self.schedule.is_empty() {
            self.schedule = "@daily".to_owned();
        }
        if self.workers <= 2 {
            self.workers = 8;
        }
    }
}

/// Logging destination and verbosity.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Directory rolling log files are written under.
    pub output: String,
    /// `1`=DEBUG, `2`=INFO, `3`=WARN, `4`=ERROR; anything else defaults to INFO.
    pub level: u8,
}

impl LogConfig {
    /// Fill unset fields with their defaults.
    pub fn complete(&mut self) {
        if self.output.is_empty() {
            self.output = "/var/log/panther".to_owned();
        }
    }

    /// The `tracing_subscriber::EnvFilter` directive matching `level`.
    pub fn filter_directive(&self) -> &'static str {
        match self.level {
            1 => "debug",
            3 => "warn",
            4 => "error",
            _ => "info",
        }
    }
}

/// The full configuration tree, as parsed from one file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP/WebSocket bridge settings.
    pub web: WebConfig,
    /// Worker pool and scheduler settings.
    pub executor: ExecutorConfig,
    /// etcd connection settings.
    pub database: EtcdConfig,
    /// Logging settings.
    pub log: LogConfig,
}

impl Config {
    /// Fill every section's unset fields with their defaults.
    pub fn complete(&mut self) {
        self.web.complete();
        self.executor.complete();
        self.log.complete();
    }

    /// Parse a configuration file, dispatching on its extension
    /// (`.toml`, `.yaml`/`.yml`, `.json`), and complete its defaults.
    pub fn parse_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        let mut cfg: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&data).context("parsing TOML configuration")?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&data).context("parsing YAML configuration")?,
            Some("json") => serde_json::from_str(&data).context("parsing JSON configuration")?,
            other => anyhow::bail!("unsupported configuration file extension: {:?}", other),
        };
        cfg.complete();
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn applies_defaults_for_empty_sections() {
        let mut cfg = Config::default();
        cfg.complete();
        assert_eq!(cfg.web.port, 8080);
        assert_eq!(cfg.web.www_root, "/usr/share/panther/wwwroot");
        assert_eq!(cfg.executor.schedule, "@daily");
        assert_eq!(cfg.executor.workers, 8);
        assert_eq!(cfg.log.output, "/var/log/panther");
    }

    #[test]
    fn low_worker_counts_round_up() {
        let mut cfg = ExecutorConfig {
            schedule: "@daily".into(),
            workers: 2,
        };
        cfg.complete();
        assert_eq!(cfg.workers, 8);
    }

    #[test]
    fn parses_toml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[executor]\nworkers = 16\nschedule = \"0 0 * * *\"\n").unwrap();
        let cfg = Config::parse_from_file(file.path()).unwrap();
        assert_eq!(cfg.executor.workers, 16);
        assert_eq!(cfg.executor.schedule, "0 0 * * *");
    }

    #[test]
    fn rejects_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(Config::parse_from_file(file.path()).is_err());
    }
}
