//! Application preparation: static assets, schema migration, cache table
//! and optional fixture load. Each step gates the next.

use crate::dispatch::manage_command;
use crate::error::BootError;
use crate::runner::CommandRunner;
use serde::Serialize;
use sphere_common::{BootConfig, CommandSpec};
use tracing::{debug, info, warn};

/// One preparation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepStep {
    pub name: &'static str,
    pub command: CommandSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreparationReport {
    /// Names of the steps that ran to completion, in order.
    pub completed: Vec<&'static str>,
    pub fixtures_loaded: bool,
}

/// The steps `run_preparation_commands` would execute for `config`, in
/// order. The fixture load is only listed when the fixture file exists.
pub fn preparation_steps(config: &BootConfig) -> Vec<PrepStep> {
    let mut steps = vec![
        PrepStep {
            name: "collectstatic",
            command: manage_command(config, ["collectstatic", "--noinput"]),
        },
        PrepStep {
            name: "migrate",
            command: manage_command(config, ["migrate", "--noinput"]),
        },
        PrepStep {
            name: "createcachetable",
            command: manage_command(config, ["createcachetable"]),
        },
    ];

    let fixtures = config.fixtures_path();
    if fixtures.is_file() {
        steps.push(PrepStep {
            name: "loaddata",
            command: manage_command(
                config,
                ["loaddata".to_string(), config.fixtures.display().to_string()],
            ),
        });
    } else {
        debug!(path = %fixtures.display(), "No fixture file, skipping loaddata");
    }
    steps
}

pub async fn run_preparation_commands<R: CommandRunner>(
    config: &BootConfig,
    runner: &R,
) -> Result<PreparationReport, BootError> {
    let mut report = PreparationReport::default();

    for step in preparation_steps(config) {
        info!(step = step.name, "Running preparation step");
        let outcome = runner
            .run(&step.command)
            .await
            .map_err(|err| BootError::PreparationFailed {
                step: step.name,
                code: None,
                detail: format!("could not start {}: {err}", step.command.program),
            })?;

        if !outcome.success() {
            warn!(step = step.name, code = ?outcome.code, "Preparation step failed");
            return Err(BootError::PreparationFailed {
                step: step.name,
                code: outcome.code,
                detail: outcome.describe(),
            });
        }

        if step.name == "loaddata" {
            report.fixtures_loaded = true;
        }
        report.completed.push(step.name);
    }

    info!(steps = report.completed.len(), "Application prepared");
    Ok(report)
}
