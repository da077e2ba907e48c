//! Configuration for the bootstrap sequencer.
//!
//! Values are resolved in layers: built-in defaults, an optional TOML file,
//! then `SPHERE_*` environment variables. CLI flags are applied last by the
//! binary. Environment errors are collected and reported together.

pub mod boot;
pub mod env;
pub mod source;

pub use boot::{BootConfig, ConfigError, LogFormat, LogSettings, WaitSettings};
pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
