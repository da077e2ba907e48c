//! Handoff to the downstream process selected by dispatch.

use crate::error::BootError;
use crate::runner::exit_code;
use sphere_common::{CommandSpec, LaunchPlan, mask_sensitive_env, render_command};
use std::process::Command;
use tracing::{debug, info, warn};

/// How the exec command takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Replace the current process image. Unix only.
    Exec,
    /// Spawn a child and wait, returning its exit status.
    Spawn,
}

impl Handoff {
    pub fn platform_default() -> Self {
        if cfg!(unix) { Self::Exec } else { Self::Spawn }
    }
}

fn command(cmd: &CommandSpec) -> Command {
    let mut command = Command::new(&cmd.program);
    command.args(&cmd.args).envs(&cmd.env);
    if let Some(dir) = &cmd.cwd {
        command.current_dir(dir);
    }
    command
}

fn spawn_error(cmd: &CommandSpec, source: std::io::Error) -> BootError {
    if source.kind() == std::io::ErrorKind::NotFound {
        BootError::ProgramNotFound {
            program: cmd.program.clone(),
        }
    } else {
        BootError::Spawn {
            program: cmd.program.clone(),
            source,
        }
    }
}

/// Run `cmd` to completion with inherited stdio.
fn run_blocking(cmd: &CommandSpec) -> Result<i32, BootError> {
    let status = command(cmd).status().map_err(|err| spawn_error(cmd, err))?;
    Ok(exit_code(status).unwrap_or(1))
}

/// Run the prelude, then hand off to the exec command. Returns the exit code
/// the bootstrap process should terminate with: the first failing prelude
/// step's code, or the downstream command's code under [`Handoff::Spawn`].
/// A successful [`Handoff::Exec`] never returns.
///
/// For plans that do not gate on the prelude, the exec command still runs
/// after a failed step. It is then spawned rather than exec'd so the earlier
/// failure can be reported when the exec command itself succeeds.
pub fn launch(plan: &LaunchPlan, handoff: Handoff) -> Result<i32, BootError> {
    let mut prelude_failure = None;
    for step in &plan.prelude {
        info!(mode = %plan.mode, command = %render_command(step), "Running prelude step");
        let code = run_blocking(step)?;
        if code != 0 {
            warn!(mode = %plan.mode, program = %step.program, code, "Prelude step failed");
            if plan.gate_on_prelude {
                return Ok(code);
            }
            prelude_failure.get_or_insert(code);
        }
    }

    let exec = &plan.exec;
    let resolved = which::which(&exec.program).map_err(|_| BootError::ProgramNotFound {
        program: exec.program.clone(),
    })?;
    debug!(path = %resolved.display(), env = ?mask_sensitive_env(&exec.env), "Resolved exec program");
    info!(mode = %plan.mode, command = %render_command(exec), "Handing off");

    match (handoff, prelude_failure) {
        (Handoff::Exec, None) => exec_replace(exec),
        (_, None) => run_blocking(exec),
        (_, Some(failed)) => {
            let code = run_blocking(exec)?;
            Ok(if code != 0 { code } else { failed })
        }
    }
}

#[cfg(unix)]
fn exec_replace(cmd: &CommandSpec) -> Result<i32, BootError> {
    use std::os::unix::process::CommandExt;
    let source = command(cmd).exec();
    Err(spawn_error(cmd, source))
}

#[cfg(not(unix))]
fn exec_replace(cmd: &CommandSpec) -> Result<i32, BootError> {
    run_blocking(cmd)
}
