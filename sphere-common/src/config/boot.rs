//! The explicit configuration struct handed to every bootstrap phase.

use super::env::{EnvError, EnvParser};
use crate::types::ServiceDependency;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DATABASE_SERVICE: &str = "database";
pub const CACHE_SERVICE: &str = "cache";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("invalid environment configuration: {}", format_env_errors(.0))]
    Env(Vec<EnvError>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Output format of the stderr log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// trace, debug, info, warn, error or off.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to a daily-rolling file here.
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            dir: None,
        }
    }
}

/// Readiness wait tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// Delay between connection attempts.
    pub interval_ms: u64,
    /// Upper bound on the delay when `exponential` is set.
    pub max_interval_ms: u64,
    /// Double the delay after each failed attempt.
    pub exponential: bool,
    /// Give up after this many attempts. `None` waits forever.
    pub max_attempts: Option<u32>,
    /// Timeout for a single connection attempt.
    pub connect_timeout_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_interval_ms: 30_000,
            exponential: false,
            max_attempts: None,
            connect_timeout_ms: 1_000,
        }
    }
}

impl WaitSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Everything the sequencer phases read. Built once at startup and passed
/// explicitly; phases never consult the process environment on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Application root; relative paths below resolve against it.
    pub app_dir: PathBuf,
    /// Python interpreter used for manage.py and module invocations.
    pub python: String,
    /// Project package name (celery `-A` target).
    pub project: String,
    /// Exported as DJANGO_SETTINGS_MODULE for the downstream process.
    pub settings_module: Option<String>,
    /// Owner applied to the working directories.
    pub run_user: Option<String>,
    /// Endpoints waited on, in order.
    pub services: Vec<ServiceDependency>,
    pub wait: WaitSettings,
    /// Hook configuration; its presence enables hook installation.
    pub hook_config: PathBuf,
    /// Fixture file; its presence enables the fixture load step.
    pub fixtures: PathBuf,
    /// Directories created and normalized during setup.
    pub work_dirs: Vec<PathBuf>,
    pub bind_host: String,
    pub server_port: u16,
    pub docs_port: u16,
    pub debug_port: u16,
    /// Reject unrecognized modes instead of falling back to default.
    pub strict_mode: bool,
    pub log: LogSettings,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            app_dir: PathBuf::from("/app"),
            python: "python".to_string(),
            project: "breaksphere".to_string(),
            settings_module: None,
            run_user: None,
            services: vec![
                ServiceDependency::new(DATABASE_SERVICE, "db", 5432),
                ServiceDependency::new(CACHE_SERVICE, "redis", 6379),
            ],
            wait: WaitSettings::default(),
            hook_config: PathBuf::from(".pre-commit-config.yaml"),
            fixtures: PathBuf::from("fixtures/initial_data.json"),
            work_dirs: vec![
                PathBuf::from("logs"),
                PathBuf::from("media"),
                PathBuf::from("static"),
            ],
            bind_host: "0.0.0.0".to_string(),
            server_port: 8000,
            docs_port: 7000,
            debug_port: 5678,
            strict_mode: false,
            log: LogSettings::default(),
        }
    }
}

impl BootConfig {
    /// Defaults, then the optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let overridden = config.apply_env()?;
        if !overridden.is_empty() {
            debug!(vars = ?overridden, "Applied environment overrides");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Apply `SPHERE_*` overrides. Returns the names of the variables that
    /// took effect.
    pub fn apply_env(&mut self) -> Result<Vec<String>, ConfigError> {
        self.apply_env_with(&mut EnvParser::new())
    }

    pub fn apply_env_with(&mut self, parser: &mut EnvParser) -> Result<Vec<String>, ConfigError> {
        let mut applied = Vec::new();
        macro_rules! apply {
            ($sourced:expr, $target:expr) => {{
                let sourced = $sourced;
                if let Some(var) = sourced.var.clone() {
                    applied.push(var);
                    $target = sourced.value;
                }
            }};
        }

        apply!(parser.get_path("APP_DIR", &self.app_dir, false), self.app_dir);
        apply!(parser.get_string("PYTHON", &self.python), self.python);
        apply!(parser.get_string("PROJECT", &self.project), self.project);
        apply!(parser.get_optional_string("SETTINGS_MODULE"), self.settings_module);
        apply!(parser.get_optional_string("RUN_USER"), self.run_user);

        let db = self.service_or_default(DATABASE_SERVICE, "db", 5432);
        let cache = self.service_or_default(CACHE_SERVICE, "redis", 6379);
        let db_host = parser.get_string("DB_HOST", &db.host);
        let db_port = parser.get_port("DB_PORT", db.port);
        let cache_host = parser.get_string("CACHE_HOST", &cache.host);
        let cache_port = parser.get_port("CACHE_PORT", cache.port);
        for (name, host, port) in [
            (DATABASE_SERVICE, db_host, db_port),
            (CACHE_SERVICE, cache_host, cache_port),
        ] {
            if host.is_from_env() || port.is_from_env() {
                applied.extend(host.var.clone());
                applied.extend(port.var.clone());
                self.upsert_service(ServiceDependency::new(name, host.value, port.value));
            }
        }

        let interval = parser.get_duration("WAIT_INTERVAL", self.wait.interval());
        if let Some(var) = interval.var.clone() {
            applied.push(var);
            self.wait.interval_ms = interval.value.as_millis() as u64;
        }
        let max_attempts =
            parser.get_u32_range("WAIT_MAX_ATTEMPTS", self.wait.max_attempts.unwrap_or(0), 0, u32::MAX);
        if let Some(var) = max_attempts.var.clone() {
            applied.push(var);
            // 0 restores the unbounded wait
            self.wait.max_attempts = (max_attempts.value > 0).then_some(max_attempts.value);
        }

        apply!(parser.get_string("BIND_HOST", &self.bind_host), self.bind_host);
        apply!(parser.get_port("SERVER_PORT", self.server_port), self.server_port);
        apply!(parser.get_port("DOCS_PORT", self.docs_port), self.docs_port);
        apply!(parser.get_port("DEBUG_PORT", self.debug_port), self.debug_port);
        apply!(parser.get_bool("STRICT_MODE", self.strict_mode), self.strict_mode);

        let work_dirs = parser.get_string_list("WORK_DIRS", Vec::new());
        if let Some(var) = work_dirs.var.clone() {
            applied.push(var);
            self.work_dirs = work_dirs.value.into_iter().map(PathBuf::from).collect();
        }

        apply!(parser.get_log_level("LOG_LEVEL", &self.log.level), self.log.level);
        let format = parser.get_string("LOG_FORMAT", "");
        if let Some(var) = format.var.clone() {
            match format.value.parse::<LogFormat>() {
                Ok(parsed) => {
                    applied.push(var);
                    self.log.format = parsed;
                }
                Err(_) => parser.record_error(EnvError::InvalidValue {
                    var,
                    expected: "pretty or json".to_string(),
                    value: format.value,
                }),
            }
        }
        let log_dir = parser.get_optional_string("LOG_DIR");
        if let Some(var) = log_dir.var.clone() {
            applied.push(var);
            self.log.dir = log_dir.value.map(PathBuf::from);
        }

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(applied)
    }

    /// Reject combinations no phase can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.python.trim().is_empty() {
            return Err(ConfigError::Invalid("python interpreter must not be empty".into()));
        }
        if self.project.trim().is_empty() {
            return Err(ConfigError::Invalid("project name must not be empty".into()));
        }
        for (label, port) in [
            ("server_port", self.server_port),
            ("docs_port", self.docs_port),
            ("debug_port", self.debug_port),
        ] {
            if port == 0 {
                return Err(ConfigError::Invalid(format!("{label} must be non-zero")));
            }
        }
        for (i, service) in self.services.iter().enumerate() {
            if service.port == 0 || service.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' needs a host and a non-zero port",
                    service.name
                )));
            }
            if self.services[..i].iter().any(|s| s.name == service.name) {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' declared twice",
                    service.name
                )));
            }
        }
        if self.wait.interval_ms == 0 {
            return Err(ConfigError::Invalid("wait.interval_ms must be non-zero".into()));
        }
        if self.wait.exponential && self.wait.max_interval_ms < self.wait.interval_ms {
            return Err(ConfigError::Invalid(
                "wait.max_interval_ms must be >= wait.interval_ms".into(),
            ));
        }
        Ok(())
    }

    /// Resolve a path against the application directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_dir.join(path)
        }
    }

    pub fn hook_config_path(&self) -> PathBuf {
        self.resolve(&self.hook_config)
    }

    pub fn fixtures_path(&self) -> PathBuf {
        self.resolve(&self.fixtures)
    }

    pub fn work_dir_paths(&self) -> Vec<PathBuf> {
        self.work_dirs.iter().map(|dir| self.resolve(dir)).collect()
    }

    fn service_or_default(&self, name: &str, host: &str, port: u16) -> ServiceDependency {
        self.services
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap_or_else(|| ServiceDependency::new(name, host, port))
    }

    fn upsert_service(&mut self, service: ServiceDependency) {
        match self.services.iter_mut().find(|s| s.name == service.name) {
            Some(existing) => *existing = service,
            None => self.services.push(service),
        }
    }
}
