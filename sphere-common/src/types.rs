//! Common types used across the bootstrap components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// An external TCP endpoint the container must be able to reach before
/// preparation can run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDependency {
    /// Human-readable name used in progress messages ("database", "cache").
    pub name: String,
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServiceDependency {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port` form accepted by socket connect calls.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ServiceDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

/// Readiness of a single dependency. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// Not probed yet.
    #[default]
    Unknown,
    /// At least one connection attempt failed.
    Waiting,
    /// A connection succeeded.
    Ready,
}

impl ReadinessState {
    /// Move to `next` unless that would be a regression.
    pub fn advance(self, next: ReadinessState) -> ReadinessState {
        self.max(next)
    }

    pub fn is_ready(self) -> bool {
        self == ReadinessState::Ready
    }
}

/// Runtime mode selected by the single invocation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapMode {
    Server,
    CeleryWorker,
    CeleryBeat,
    Jupyter,
    Docs,
    TestWatch,
    TestCoverage,
    Debug,
    Loadtest,
    Shell,
    SecurityCheck,
    Default,
}

/// Returned by strict mode parsing when the token names no mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized bootstrap mode '{0}'")]
pub struct UnknownModeError(pub String);

impl BootstrapMode {
    pub const ALL: [BootstrapMode; 12] = [
        BootstrapMode::Server,
        BootstrapMode::CeleryWorker,
        BootstrapMode::CeleryBeat,
        BootstrapMode::Jupyter,
        BootstrapMode::Docs,
        BootstrapMode::TestWatch,
        BootstrapMode::TestCoverage,
        BootstrapMode::Debug,
        BootstrapMode::Loadtest,
        BootstrapMode::Shell,
        BootstrapMode::SecurityCheck,
        BootstrapMode::Default,
    ];

    /// Invocation token for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::CeleryWorker => "celery_worker",
            Self::CeleryBeat => "celery_beat",
            Self::Jupyter => "jupyter",
            Self::Docs => "docs",
            Self::TestWatch => "test_watch",
            Self::TestCoverage => "test_coverage",
            Self::Debug => "debug",
            Self::Loadtest => "loadtest",
            Self::Shell => "shell",
            Self::SecurityCheck => "security_check",
            Self::Default => "default",
        }
    }

    /// Parse a token, falling back to [`BootstrapMode::Default`] for anything
    /// unrecognized (including the empty string).
    pub fn parse_permissive(token: &str) -> BootstrapMode {
        token.parse().unwrap_or(BootstrapMode::Default)
    }
}

impl FromStr for BootstrapMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Ok(Self::Default);
        }
        if token == "runserver" {
            return Ok(Self::Server);
        }
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == token)
            .ok_or_else(|| UnknownModeError(token.to_string()))
    }
}

impl std::fmt::Display for BootstrapMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one external command: what to run, with which arguments,
/// environment and working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

fn gate_by_default() -> bool {
    true
}

/// Final action of the sequencer: optional blocking prelude commands followed
/// by the long-running process that takes over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlan {
    pub mode: BootstrapMode,
    #[serde(default)]
    pub prelude: Vec<CommandSpec>,
    pub exec: CommandSpec,
    /// When set, a failing prelude step aborts the launch. When cleared,
    /// every prelude step and the exec command run, and the first non-zero
    /// status among them is reported.
    #[serde(default = "gate_by_default")]
    pub gate_on_prelude: bool,
}

impl LaunchPlan {
    pub fn new(mode: BootstrapMode, exec: CommandSpec) -> Self {
        Self {
            mode,
            prelude: Vec::new(),
            exec,
            gate_on_prelude: true,
        }
    }

    /// Run the exec command even when a prelude step fails.
    pub fn run_exec_regardless(mut self) -> Self {
        self.gate_on_prelude = false;
        self
    }

    pub fn with_prelude(mut self, step: CommandSpec) -> Self {
        self.prelude.push(step);
        self
    }

    /// Apply an environment variable to the prelude steps and the exec command.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        for cmd in self.prelude.iter_mut().chain(std::iter::once(&mut self.exec)) {
            cmd.env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mode_round_trips_through_its_token() {
        for mode in BootstrapMode::ALL {
            assert_eq!(mode.as_str().parse::<BootstrapMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_runserver_alias_and_empty_token() {
        assert_eq!(BootstrapMode::parse_permissive("runserver"), BootstrapMode::Server);
        assert_eq!(BootstrapMode::parse_permissive(""), BootstrapMode::Default);
        assert_eq!(BootstrapMode::parse_permissive("  "), BootstrapMode::Default);
    }

    #[test]
    fn test_unknown_token_is_permissive_default_but_strict_error() {
        assert_eq!(BootstrapMode::parse_permissive("bogus"), BootstrapMode::Default);
        let err = "bogus".parse::<BootstrapMode>().unwrap_err();
        assert_eq!(err, UnknownModeError("bogus".to_string()));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_mode_tokens_are_case_sensitive() {
        assert!("SERVER".parse::<BootstrapMode>().is_err());
        assert_eq!(BootstrapMode::parse_permissive("Docs"), BootstrapMode::Default);
    }

    #[test]
    fn test_readiness_never_regresses() {
        let state = ReadinessState::Unknown.advance(ReadinessState::Waiting);
        assert_eq!(state, ReadinessState::Waiting);
        let state = state.advance(ReadinessState::Ready);
        assert!(state.is_ready());
        assert_eq!(state.advance(ReadinessState::Waiting), ReadinessState::Ready);
        assert_eq!(state.advance(ReadinessState::Unknown), ReadinessState::Ready);
    }

    #[test]
    fn test_service_dependency_display() {
        let dep = ServiceDependency::new("database", "db", 5432);
        assert_eq!(dep.address(), "db:5432");
        assert_eq!(dep.to_string(), "database (db:5432)");
    }

    #[test]
    fn test_launch_plan_env_applies_to_prelude_and_exec() {
        let plan = LaunchPlan::new(BootstrapMode::Docs, CommandSpec::new("serve"))
            .with_prelude(CommandSpec::new("build"))
            .with_env("PYTHONUNBUFFERED", "1");
        assert_eq!(plan.prelude[0].env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(plan.exec.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_command_spec_serializes_without_empty_fields() {
        let cmd = CommandSpec::new("python").args(["manage.py", "migrate"]);
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"program":"python","args":["manage.py","migrate"]}"#);
        assert_eq!(cmd.argv(), vec!["python", "manage.py", "migrate"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_parse_permissive_never_panics(s in ".*") {
                let _ = BootstrapMode::parse_permissive(&s);
            }

            #[test]
            fn test_strict_and_permissive_agree_on_known_tokens(s in "[a-z_]{0,16}") {
                match s.parse::<BootstrapMode>() {
                    Ok(mode) => prop_assert_eq!(BootstrapMode::parse_permissive(&s), mode),
                    Err(_) => prop_assert_eq!(BootstrapMode::parse_permissive(&s), BootstrapMode::Default),
                }
            }
        }
    }
}
