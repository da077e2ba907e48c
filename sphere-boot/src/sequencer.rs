//! Phase sequencing: wait → setup → prepare → health → dispatch.

use crate::dispatch::dispatch;
use crate::error::BootError;
use crate::health::check_system_health;
use crate::prepare::{PrepStep, preparation_steps, run_preparation_commands};
use crate::readiness::{ServiceProbe, WaitPolicy, wait_for_services};
use crate::runner::CommandRunner;
use crate::setup::{hook_install_command, setup_dev_environment};
use serde::Serialize;
use sphere_common::{BootConfig, BootstrapMode, CommandSpec, LaunchPlan, ServiceDependency};
use std::path::PathBuf;
use tracing::{Instrument, info, info_span, warn};

/// Which of the pre-launch phases run. Dispatch always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Phases {
    pub wait: bool,
    pub setup: bool,
    pub prepare: bool,
    pub health: bool,
}

impl Default for Phases {
    fn default() -> Self {
        Self {
            wait: true,
            setup: true,
            prepare: true,
            health: true,
        }
    }
}

/// Side-effect free description of a bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapPlan {
    pub mode: BootstrapMode,
    pub phases: Phases,
    pub services: Vec<ServiceDependency>,
    pub max_wait_attempts: Option<u32>,
    pub hook_install: Option<CommandSpec>,
    pub directories: Vec<PathBuf>,
    pub preparation: Vec<PrepStep>,
    pub launch: LaunchPlan,
}

/// Runs the bootstrap phases strictly in order against one configuration.
pub struct Bootstrap<'a, P, R> {
    config: &'a BootConfig,
    probe: P,
    runner: R,
    phases: Phases,
    policy: WaitPolicy,
}

impl<'a, P: ServiceProbe, R: CommandRunner> Bootstrap<'a, P, R> {
    pub fn new(config: &'a BootConfig, probe: P, runner: R) -> Self {
        Self {
            config,
            probe,
            runner,
            phases: Phases::default(),
            policy: WaitPolicy::from_settings(&config.wait),
        }
    }

    pub fn with_phases(mut self, phases: Phases) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run phases 1 to 4 and return the launch plan for `mode`.
    pub async fn run(&self, mode: BootstrapMode) -> Result<LaunchPlan, BootError> {
        info!(mode = %mode, "Bootstrapping");

        if self.phases.wait {
            wait_for_services(&self.config.services, &self.policy, &self.probe)
                .instrument(info_span!("wait"))
                .await?;
        }

        if self.phases.setup {
            setup_dev_environment(self.config, &self.runner)
                .instrument(info_span!("setup"))
                .await?;
        }

        if self.phases.prepare {
            run_preparation_commands(self.config, &self.runner)
                .instrument(info_span!("prepare"))
                .await?;
        }

        if self.phases.health {
            let report = check_system_health(self.config, &self.runner)
                .instrument(info_span!("health"))
                .await;
            if !report.is_complete() {
                warn!(failed = report.failures.len(), "Diagnostics incomplete, continuing");
            }
        }

        let _span = info_span!("dispatch", mode = %mode).entered();
        let plan = dispatch(mode, self.config);
        info!(program = %plan.exec.program, prelude = plan.prelude.len(), "Launch plan ready");
        Ok(plan)
    }

    /// Describe what `run` would do without touching the system beyond
    /// checking which optional files exist.
    pub fn plan(&self, mode: BootstrapMode) -> BootstrapPlan {
        let hook_install = (self.phases.setup && self.config.hook_config_path().is_file())
            .then(|| hook_install_command(self.config));
        BootstrapPlan {
            mode,
            phases: self.phases,
            services: if self.phases.wait {
                self.config.services.clone()
            } else {
                Vec::new()
            },
            max_wait_attempts: self.policy.max_attempts,
            hook_install,
            directories: if self.phases.setup {
                self.config.work_dir_paths()
            } else {
                Vec::new()
            },
            preparation: if self.phases.prepare {
                preparation_steps(self.config)
            } else {
                Vec::new()
            },
            launch: dispatch(mode, self.config),
        }
    }
}
