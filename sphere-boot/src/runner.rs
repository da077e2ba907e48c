//! Running external commands during the bootstrap phases.
//!
//! Phases talk to the outside world only through [`CommandRunner`], so tests
//! can script outcomes without spawning processes.

use sphere_common::{CommandSpec, mask_sensitive_env, render_command};
use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use tracing::{debug, info};

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout (empty for inherited stdio).
    pub stdout: String,
    /// Captured stderr (empty for inherited stdio).
    pub stderr: String,
}

impl CommandOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr; some tools print version banners on stderr.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Short human description of how the command ended.
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub trait CommandRunner {
    /// Run with inherited stdio and wait for exit.
    fn run(&self, cmd: &CommandSpec) -> impl Future<Output = io::Result<CommandOutcome>> + Send;

    /// Run with captured stdout/stderr and wait for exit.
    fn capture(&self, cmd: &CommandSpec)
    -> impl Future<Output = io::Result<CommandOutcome>> + Send;
}

impl<R: CommandRunner> CommandRunner for &R {
    fn run(&self, cmd: &CommandSpec) -> impl Future<Output = io::Result<CommandOutcome>> + Send {
        (**self).run(cmd)
    }

    fn capture(
        &self,
        cmd: &CommandSpec,
    ) -> impl Future<Output = io::Result<CommandOutcome>> + Send {
        (**self).capture(cmd)
    }
}

/// Spawns real child processes through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(cmd: &CommandSpec) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&cmd.program);
        command.args(&cmd.args).envs(&cmd.env).kill_on_drop(true);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        command
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &CommandSpec) -> impl Future<Output = io::Result<CommandOutcome>> + Send {
        let mut command = Self::command(cmd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let rendered = render_command(cmd);
        let env = mask_sensitive_env(&cmd.env);

        async move {
            info!(command = %rendered, "Running");
            debug!(env = ?env, "Command environment");
            let status = command.status().await?;
            Ok(CommandOutcome {
                code: exit_code(status),
                ..CommandOutcome::default()
            })
        }
    }

    fn capture(
        &self,
        cmd: &CommandSpec,
    ) -> impl Future<Output = io::Result<CommandOutcome>> + Send {
        let mut command = Self::command(cmd);
        command.stdin(Stdio::null());
        let rendered = render_command(cmd);

        async move {
            debug!(command = %rendered, "Capturing");
            let output = command.output().await?;
            Ok(CommandOutcome {
                code: exit_code(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// Exit code, mapping signal termination to 128 + signal on unix.
pub(crate) fn exit_code(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}
