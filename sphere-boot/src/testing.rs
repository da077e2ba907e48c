//! Scripted stand-ins for the process and network seams.
//!
//! Used by this crate's unit and integration tests to drive the phases
//! without spawning processes or opening sockets.

use crate::readiness::ServiceProbe;
use crate::runner::{CommandOutcome, CommandRunner};
use sphere_common::{CommandSpec, ServiceDependency};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One command seen by [`ScriptedRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: CommandSpec,
    pub rendered: String,
    /// `true` for `capture`, `false` for `run`.
    pub captured: bool,
}

/// Records every command and answers from a script. Rules match when the
/// space-joined argv contains the rule's needle; the first match wins.
/// Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<RecordedCall>>,
    exit_codes: Vec<(String, i32)>,
    outputs: Vec<(String, String)>,
    missing: Vec<String>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` exit with `code`.
    pub fn exit_with(mut self, needle: &str, code: i32) -> Self {
        self.exit_codes.push((needle.to_string(), code));
        self
    }

    /// Captured commands containing `needle` print `stdout`.
    pub fn respond_with(mut self, needle: &str, stdout: &str) -> Self {
        self.outputs.push((needle.to_string(), stdout.to_string()));
        self
    }

    /// `program` fails to spawn with `NotFound`.
    pub fn missing_program(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Space-joined argv of each call, in call order.
    pub fn rendered(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.rendered.clone()).collect()
    }

    /// Number of recorded commands whose argv line contains `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.rendered.contains(needle))
            .count()
    }

    fn answer(&self, cmd: &CommandSpec, captured: bool) -> io::Result<CommandOutcome> {
        let rendered = cmd.argv().join(" ");
        lock(&self.calls).push(RecordedCall {
            command: cmd.clone(),
            rendered: rendered.clone(),
            captured,
        });

        if self.missing.iter().any(|p| *p == cmd.program) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", cmd.program),
            ));
        }

        let code = self
            .exit_codes
            .iter()
            .find(|(needle, _)| rendered.contains(needle.as_str()))
            .map_or(0, |(_, code)| *code);
        let stdout = if captured {
            self.outputs
                .iter()
                .find(|(needle, _)| rendered.contains(needle.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or_default()
        } else {
            String::new()
        };

        Ok(CommandOutcome {
            code: Some(code),
            stdout,
            stderr: String::new(),
        })
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &CommandSpec) -> impl Future<Output = io::Result<CommandOutcome>> + Send {
        let result = self.answer(cmd, false);
        async move { result }
    }

    fn capture(
        &self,
        cmd: &CommandSpec,
    ) -> impl Future<Output = io::Result<CommandOutcome>> + Send {
        let result = self.answer(cmd, true);
        async move { result }
    }
}

/// Probe whose services become reachable after a scripted number of
/// refused connections.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    remaining_failures: Mutex<HashMap<String, u32>>,
    never_ready: Vec<String>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    /// Every service is reachable on the first attempt.
    pub fn ready() -> Self {
        Self::default()
    }

    /// `service` refuses `failures` connections before accepting one.
    pub fn fail_times(self, service: &str, failures: u32) -> Self {
        lock(&self.remaining_failures).insert(service.to_string(), failures);
        self
    }

    /// `service` never accepts a connection.
    pub fn never_ready(mut self, service: &str) -> Self {
        self.never_ready.push(service.to_string());
        self
    }

    /// Number of connection attempts made against `service`.
    pub fn attempts_for(&self, service: &str) -> u32 {
        lock(&self.attempts)
            .iter()
            .filter(|name| name.as_str() == service)
            .count() as u32
    }

    /// Service names in attempt order.
    pub fn attempt_log(&self) -> Vec<String> {
        lock(&self.attempts).clone()
    }

    fn attempt(&self, dep: &ServiceDependency) -> io::Result<()> {
        lock(&self.attempts).push(dep.name.clone());

        if self.never_ready.contains(&dep.name) {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        let mut remaining = lock(&self.remaining_failures);
        match remaining.get_mut(&dep.name) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(io::Error::from(io::ErrorKind::ConnectionRefused))
            }
            _ => Ok(()),
        }
    }
}

impl ServiceProbe for ScriptedProbe {
    fn probe(
        &self,
        dep: &ServiceDependency,
        _timeout: Duration,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let result = self.attempt(dep);
        async move { result }
    }
}
