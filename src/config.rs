use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::ServiceCatalog;
use crate::error::{MonitorError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Status server port (absent or 0 disables it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_port: Option<u16>,
    #[serde(default)]
    pub scoreboard: ScoreboardConfig,
    pub monitor: MonitorConfig,
    /// Scoreboard column index -> service name
    #[serde(default)]
    pub services: BTreeMap<String, String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreboardConfig {
    /// API root, without the `/api/scoreboard` suffix
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ad.cyberchallenge.it".to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Team identifiers to watch
    pub targets: Vec<String>,
    pub poll_interval_secs: u64,
    /// Send a "Check notification" before the first tick
    #[serde(default)]
    pub notify_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// false: in-memory store, reset after the final report
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("scorewatch.sqlite3")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: true,
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// JSON text webhook; empty means log-only
    #[serde(default)]
    pub webhook_url: String,
}

impl NotifyConfig {
    pub fn webhook(&self) -> Option<&str> {
        let url = self.webhook_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_report_dir")]
    pub output_dir: PathBuf,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_report_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn environment() -> Environment {
    // SCOREWATCH__MONITOR__POLL_INTERVAL_SECS, SCOREWATCH__MONITOR__TARGETS=a,b
    Environment::with_prefix("SCOREWATCH")
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("monitor.targets")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("monitor.notify_on_start", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SCOREWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            .add_source(environment());

        builder.build()?.try_deserialize()
    }

    /// Load one explicit file, still overridable from the environment
    pub fn load_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Documented example written by `init-config`
    pub fn example() -> Self {
        let mut services = BTreeMap::new();
        services.insert("0".to_string(), "CTFe-1".to_string());
        services.insert("1".to_string(), "CTFe-2".to_string());

        Self {
            health_port: None,
            scoreboard: ScoreboardConfig::default(),
            monitor: MonitorConfig {
                targets: vec!["unisa".to_string()],
                poll_interval_secs: 10,
                notify_on_start: true,
            },
            services,
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scoreboard.request_timeout_secs)
    }

    pub fn service_catalog(&self) -> Result<ServiceCatalog> {
        ServiceCatalog::from_config(&self.services)
    }

    /// Enabled status server port
    pub fn health_port(&self) -> Option<u16> {
        self.health_port.filter(|p| *p != 0)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.monitor.targets.is_empty() {
            errors.push("monitor.targets must list at least one team".to_string());
        }
        let mut seen = HashSet::new();
        for target in &self.monitor.targets {
            if target.trim().is_empty() {
                errors.push("monitor.targets contains an empty team name".to_string());
            } else if !seen.insert(target.as_str()) {
                errors.push(format!("monitor.targets lists '{}' twice", target));
            }
        }

        if self.monitor.poll_interval_secs == 0 {
            errors.push("monitor.poll_interval_secs must be positive".to_string());
        }

        if let Err(e) = self.service_catalog() {
            errors.push(match e {
                MonitorError::InvalidConfig(msg) => format!("services: {}", msg),
                other => other.to_string(),
            });
        }

        if url::Url::parse(&self.scoreboard.base_url).is_err() {
            errors.push(format!(
                "scoreboard.base_url '{}' is not a valid URL",
                self.scoreboard.base_url
            ));
        }
        if self.scoreboard.request_timeout_secs == 0 {
            errors.push("scoreboard.request_timeout_secs must be positive".to_string());
        }

        if self.storage.persist && self.storage.database_path.as_os_str().is_empty() {
            errors.push("storage.database_path is required when persist = true".to_string());
        }

        if let Some(url) = self.notify.webhook() {
            if url::Url::parse(url).is_err() {
                errors.push(format!("notify.webhook_url '{}' is not a valid URL", url));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `validate` folded into a single fatal error
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|errors| MonitorError::InvalidConfig(errors.join("; ")))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "scorewatch-config-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scorewatch.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_example_is_valid() {
        let config = AppConfig::example();
        assert!(config.validate().is_ok());
        assert_eq!(config.service_catalog().unwrap().names(), vec!["CTFe-1", "CTFe-2"]);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.health_port(), None);
    }

    #[test]
    fn test_example_round_trips_through_toml() {
        let text = AppConfig::example().to_toml().unwrap();
        assert!(text.contains("[services]"));
        let path = write_config("roundtrip", &text);
        let loaded = AppConfig::load_file(&path).unwrap();
        assert_eq!(loaded.monitor.targets, vec!["unisa"]);
        assert_eq!(loaded.services.len(), 2);
        assert!(loaded.storage.persist);
    }

    #[test]
    fn test_minimal_file_gets_defaults() {
        let path = write_config(
            "minimal",
            r#"
[monitor]
targets = ["acme"]
poll_interval_secs = 5

[services]
"0" = "svc-1"
"#,
        );
        let config = AppConfig::load_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.scoreboard.request_timeout_secs, 10);
        assert!(config.report.enabled);
        assert_eq!(config.notify.webhook(), None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = AppConfig::example();
        config.monitor.targets = vec![];
        config.monitor.poll_interval_secs = 0;
        config.services.clear();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("targets")));
        assert!(errors.iter().any(|e| e.contains("poll_interval_secs")));
        assert!(errors.iter().any(|e| e.starts_with("services")));
    }

    #[test]
    fn test_validate_rejects_bad_service_keys_and_duplicate_targets() {
        let mut config = AppConfig::example();
        config.services.insert("first".to_string(), "svc".to_string());
        config.monitor.targets.push("unisa".to_string());

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("'first'")));
        assert!(errors.iter().any(|e| e.contains("twice")));
    }

    #[test]
    fn test_validated_is_fatal() {
        let mut config = AppConfig::example();
        config.monitor.targets.clear();
        assert!(config.validated().unwrap_err().is_fatal());
    }
}
