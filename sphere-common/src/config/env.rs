//! Environment variable parsing with type safety.
//!
//! Provides a type-safe parser for `SPHERE_*` environment variables with
//! validation, error collection, and source tracking.

use super::source::Sourced;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Path does not exist.
    #[error("Path not found for {var}: {path}")]
    PathNotFound { var: String, path: PathBuf },

    /// Invalid duration format.
    #[error("Invalid duration for {var}: {value}")]
    InvalidDuration { var: String, value: String },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    /// Invalid log level.
    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
///
/// Collects errors during parsing so all issues can be reported at once.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Create a new parser with the SPHERE_ prefix.
    pub fn new() -> Self {
        Self::with_prefix("SPHERE_")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            errors: Vec::new(),
        }
    }

    /// Get all accumulated errors.
    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Record an error found by a caller-side conversion.
    pub fn record_error(&mut self, error: EnvError) {
        self.errors.push(error);
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Get a string value with default.
    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => Sourced::from_env(value, var_name),
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    /// Get a boolean value with default.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str, default: bool) -> Sourced<bool> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => {
                let parsed = match value.to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" | "" => false,
                    _ => {
                        self.errors.push(EnvError::InvalidValue {
                            var: var_name.clone(),
                            expected: "boolean (true/false/1/0/yes/no)".to_string(),
                            value: value.clone(),
                        });
                        default
                    }
                };
                Sourced::from_env(parsed, var_name)
            }
            Err(_) => Sourced::default_value(default),
        }
    }

    /// Get a TCP port (1..=65535).
    pub fn get_port(&mut self, name: &str, default: u16) -> Sourced<u16> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => match value.trim().parse::<u16>() {
                Ok(0) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: var_name.clone(),
                        value,
                        min: "1".to_string(),
                        max: u16::MAX.to_string(),
                    });
                    Sourced::default_value(default)
                }
                Ok(port) => Sourced::from_env(port, var_name),
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name.clone(),
                        expected: "TCP port number".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            Err(_) => Sourced::default_value(default),
        }
    }

    /// Get a u32 value with default and range validation.
    pub fn get_u32_range(&mut self, name: &str, default: u32, min: u32, max: u32) -> Sourced<u32> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => match value.trim().parse::<u32>() {
                Ok(n) if n >= min && n <= max => Sourced::from_env(n, var_name),
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: var_name.clone(),
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    Sourced::default_value(default)
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name.clone(),
                        expected: "unsigned 32-bit integer".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            Err(_) => Sourced::default_value(default),
        }
    }

    /// Get a duration in humantime notation ("1s", "500ms", "2m").
    pub fn get_duration(&mut self, name: &str, default: Duration) -> Sourced<Duration> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => match humantime::parse_duration(value.trim()) {
                Ok(d) => Sourced::from_env(d, var_name),
                Err(_) => {
                    self.errors.push(EnvError::InvalidDuration {
                        var: var_name.clone(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            Err(_) => Sourced::default_value(default),
        }
    }

    /// Get a path value with ~ expansion.
    ///
    /// If `must_exist` is true, records an error if the path doesn't exist.
    pub fn get_path(&mut self, name: &str, default: &Path, must_exist: bool) -> Sourced<PathBuf> {
        let var_name = self.var_name(name);
        let value = match env::var(&var_name) {
            Ok(v) => v,
            Err(_) => return Sourced::default_value(default.to_path_buf()),
        };

        let expanded = expand_home(&value);
        if must_exist && !expanded.exists() {
            self.errors.push(EnvError::PathNotFound {
                var: var_name.clone(),
                path: expanded.clone(),
            });
        }
        Sourced::from_env(expanded, var_name)
    }

    /// Get a log level value with validation.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => {
                let lower = value.to_lowercase();
                match lower.as_str() {
                    "trace" | "debug" | "info" | "warn" | "error" | "off" => {
                        Sourced::from_env(lower, var_name)
                    }
                    _ => {
                        self.errors.push(EnvError::InvalidLogLevel {
                            var: var_name.clone(),
                            value: value.clone(),
                        });
                        Sourced::default_value(default.to_string())
                    }
                }
            }
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    /// Get a comma-separated list of strings.
    pub fn get_string_list(&mut self, name: &str, default: Vec<String>) -> Sourced<Vec<String>> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) if value.is_empty() => Sourced::from_env(Vec::new(), var_name),
            Ok(value) => {
                let items: Vec<String> = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                Sourced::from_env(items, var_name)
            }
            Err(_) => Sourced::default_value(default),
        }
    }

    /// Get an optional string (None if not set or empty).
    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) if value.is_empty() => Sourced::from_env(None, var_name),
            Ok(value) => Sourced::from_env(Some(value), var_name),
            Err(_) => Sourced::default_value(None),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(stripped) = value.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(value)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;
    use std::env;

    fn cleanup_env(vars: &[&str]) {
        for var in vars {
            // SAFETY: env access is serialized by env_test_lock
            unsafe { env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env access is serialized by env_test_lock
        unsafe { env::set_var(key, value) };
    }

    #[test]
    fn test_get_bool_true_values() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_BOOL_TRUE"];
        cleanup_env(&vars);

        for val in &["1", "true", "yes", "on", "TRUE", "Yes"] {
            set_env("SPHERE_TEST_BOOL_TRUE", val);
            let mut parser = EnvParser::new();
            let result = parser.get_bool("TEST_BOOL_TRUE", false);
            assert!(result.value, "Expected true for '{}'", val);
            assert!(!parser.has_errors());
        }

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_bool_invalid_uses_default() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_BAD_BOOL"];
        cleanup_env(&vars);

        set_env("SPHERE_BAD_BOOL", "maybe");
        let mut parser = EnvParser::new();
        let result = parser.get_bool("BAD_BOOL", false);
        assert!(!result.value);
        assert!(parser.has_errors());

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_port_rejects_zero_and_garbage() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_PORT_ZERO", "SPHERE_TEST_PORT_BAD"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_PORT_ZERO", "0");
        set_env("SPHERE_TEST_PORT_BAD", "http");
        let mut parser = EnvParser::new();
        assert_eq!(parser.get_port("TEST_PORT_ZERO", 5432).value, 5432);
        assert_eq!(parser.get_port("TEST_PORT_BAD", 6379).value, 6379);
        assert_eq!(parser.errors().len(), 2);

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_port_valid() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_PORT_OK"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_PORT_OK", " 15432 ");
        let mut parser = EnvParser::new();
        let port = parser.get_port("TEST_PORT_OK", 5432);
        assert_eq!(port.value, 15432);
        assert!(port.is_from_env());

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_u32_range_out_of_range() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_U32_OOR"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_U32_OOR", "200");
        let mut parser = EnvParser::new();
        let result = parser.get_u32_range("TEST_U32_OOR", 10, 0, 100);
        assert_eq!(result.value, 10);
        assert!(matches!(parser.errors()[0], EnvError::OutOfRange { .. }));

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_duration_humantime() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_DURATION", "SPHERE_TEST_DURATION_BAD"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_DURATION", "250ms");
        set_env("SPHERE_TEST_DURATION_BAD", "soon");
        let mut parser = EnvParser::new();
        let ok = parser.get_duration("TEST_DURATION", Duration::from_secs(1));
        assert_eq!(ok.value, Duration::from_millis(250));
        let bad = parser.get_duration("TEST_DURATION_BAD", Duration::from_secs(1));
        assert_eq!(bad.value, Duration::from_secs(1));
        assert!(matches!(
            parser.errors()[0],
            EnvError::InvalidDuration { .. }
        ));

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_log_level_invalid() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_LEVEL"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_LEVEL", "LOUD");
        let mut parser = EnvParser::new();
        let level = parser.get_log_level("TEST_LEVEL", "info");
        assert_eq!(level.value, "info");
        assert!(parser.has_errors());

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_string_list() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_LIST"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_LIST", "logs, media,,static ");
        let mut parser = EnvParser::new();
        let list = parser.get_string_list("TEST_LIST", Vec::new());
        assert_eq!(list.value, vec!["logs", "media", "static"]);

        cleanup_env(&vars);
    }

    #[test]
    fn test_get_optional_string_empty_is_none() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_OPT"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_OPT", "");
        let mut parser = EnvParser::new();
        let value = parser.get_optional_string("TEST_OPT");
        assert!(value.is_from_env());
        assert_eq!(value.value, None);

        cleanup_env(&vars);
        let value = parser.get_optional_string("TEST_OPT");
        assert!(!value.is_from_env());
    }

    #[test]
    fn test_get_path_must_exist() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_PATH"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_PATH", "/definitely/not/here");
        let mut parser = EnvParser::new();
        let path = parser.get_path("TEST_PATH", Path::new("/app"), true);
        assert_eq!(path.value, PathBuf::from("/definitely/not/here"));
        assert!(matches!(parser.errors()[0], EnvError::PathNotFound { .. }));

        cleanup_env(&vars);
    }

    #[test]
    fn test_take_errors_drains() {
        let _guard = env_test_lock();
        let vars = ["SPHERE_TEST_DRAIN"];
        cleanup_env(&vars);

        set_env("SPHERE_TEST_DRAIN", "x");
        let mut parser = EnvParser::new();
        let _ = parser.get_u32_range("TEST_DRAIN", 1, 0, 5);
        assert_eq!(parser.take_errors().len(), 1);
        assert!(!parser.has_errors());

        cleanup_env(&vars);
    }
}
