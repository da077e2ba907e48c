//! BreakSphere container entrypoint.
//!
//! Waits for backing services, prepares the development environment and the
//! application, logs diagnostics, then hands off to the process selected by
//! the invocation mode.

pub mod dispatch;
pub mod error;
pub mod health;
pub mod launcher;
pub mod prepare;
pub mod readiness;
pub mod runner;
pub mod sequencer;
pub mod setup;
pub mod testing;

pub use dispatch::{dispatch, resolve_mode};
pub use error::BootError;
pub use health::{HealthReport, check_system_health};
pub use launcher::{Handoff, launch};
pub use prepare::{PrepStep, PreparationReport, preparation_steps, run_preparation_commands};
pub use readiness::{
    Backoff, ServiceProbe, TcpProbe, WaitOutcome, WaitPolicy, wait_for_service, wait_for_services,
};
pub use runner::{CommandOutcome, CommandRunner, ProcessRunner};
pub use sequencer::{Bootstrap, BootstrapPlan, Phases};
pub use setup::{SetupReport, normalize_permissions, setup_dev_environment};
