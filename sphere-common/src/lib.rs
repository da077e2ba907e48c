//! Shared types and utilities for the BreakSphere bootstrap sequencer.
//!
//! - [`types`]: service dependencies, bootstrap modes, command descriptions
//! - [`config`]: layered configuration (defaults, TOML file, environment)
//! - [`logging`]: tracing subscriber setup shared by every binary
//! - [`util`]: command rendering and secret masking for log output

pub mod config;
pub mod logging;
pub mod types;
pub mod util;

pub use config::{BootConfig, ConfigError, EnvError, EnvParser, LogFormat, LogSettings, WaitSettings};
pub use logging::{LogConfig, LoggingError, LoggingGuards, init_logging};
pub use types::{
    BootstrapMode, CommandSpec, LaunchPlan, ReadinessState, ServiceDependency, UnknownModeError,
};
pub use util::{mask_sensitive_env, render_command};
