//! BreakSphere container entrypoint.
//!
//! Waits for the database and cache, sets up the development environment,
//! prepares the application, logs diagnostics and finally becomes the
//! process selected by MODE.

use anyhow::{Context, Result};
use clap::Parser;
use sphere_boot::{
    BootError, Bootstrap, Handoff, Phases, ProcessRunner, TcpProbe, launch, resolve_mode,
};
use sphere_common::{BootConfig, LogConfig, init_logging};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "sphere-boot")]
#[command(author, version, about = "BreakSphere container entrypoint")]
struct Cli {
    /// Runtime mode (server, celery_worker, celery_beat, jupyter, docs,
    /// test_watch, test_coverage, debug, loadtest, shell, security_check)
    mode: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "SPHERE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Fail on an unrecognized mode instead of falling back to default
    #[arg(long)]
    strict: bool,

    /// Print the bootstrap plan as JSON and exit
    #[arg(long)]
    dry_run: bool,

    /// Spawn the downstream process and wait instead of exec'ing it
    #[arg(long)]
    no_exec: bool,

    /// Skip waiting for service dependencies
    #[arg(long)]
    skip_wait: bool,

    /// Skip hook installation and directory setup
    #[arg(long)]
    skip_setup: bool,

    /// Skip static collection, migrations, cache table and fixtures
    #[arg(long)]
    skip_prepare: bool,

    /// Skip system diagnostics
    #[arg(long)]
    skip_health: bool,

    /// Give up on a dependency after this many connection attempts
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_wait_attempts: Option<u32>,
}

impl Cli {
    fn phases(&self) -> Phases {
        Phases {
            wait: !self.skip_wait,
            setup: !self.skip_setup,
            prepare: !self.skip_prepare,
            health: !self.skip_health,
        }
    }

    /// Flags take precedence over the file and the environment.
    fn apply_overrides(&self, config: &mut BootConfig) {
        if self.strict {
            config.strict_mode = true;
        }
        if let Some(max) = self.max_wait_attempts {
            config.wait.max_attempts = Some(max);
        }
    }

    fn log_config(&self, config: &BootConfig) -> LogConfig {
        let log_config = LogConfig::from_settings(&config.log).with_stderr();
        if self.verbose {
            log_config.with_forced_level("debug")
        } else {
            log_config
        }
    }

    fn handoff(&self) -> Handoff {
        if self.no_exec {
            Handoff::Spawn
        } else {
            Handoff::platform_default()
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("sphere-boot: {err:#}");
            err.downcast_ref::<BootError>()
                .map_or(1, BootError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let mut config = BootConfig::load(cli.config.as_deref()).map_err(BootError::from)?;
    cli.apply_overrides(&mut config);

    let _logging_guards = init_logging(&cli.log_config(&config))?;
    execute(cli, &config)
}

fn execute(cli: &Cli, config: &BootConfig) -> Result<i32> {
    let mode = resolve_mode(cli.mode.as_deref(), config.strict_mode)?;
    let bootstrap =
        Bootstrap::new(config, TcpProbe, ProcessRunner::new()).with_phases(cli.phases());

    if cli.dry_run {
        let plan = bootstrap.plan(mode);
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(0);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let plan = runtime.block_on(bootstrap.run(mode))?;
    drop(runtime);

    let code = launch(&plan, cli.handoff())?;
    info!(mode = %mode, code, "Downstream process exited");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sphere-boot").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(cli.mode.is_none());
        assert_eq!(cli.phases(), Phases::default());
        assert_eq!(cli.handoff(), Handoff::platform_default());

        let mut config = BootConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, BootConfig::default());
    }

    #[test]
    fn test_skip_flags_map_to_phases() {
        let cli = parse(&["--skip-wait", "--skip-health", "celery_worker"]);
        assert_eq!(cli.mode.as_deref(), Some("celery_worker"));
        assert_eq!(
            cli.phases(),
            Phases {
                wait: false,
                setup: true,
                prepare: true,
                health: false,
            }
        );

        let cli = parse(&["--skip-setup", "--skip-prepare"]);
        assert_eq!(
            cli.phases(),
            Phases {
                wait: true,
                setup: false,
                prepare: false,
                health: true,
            }
        );
    }

    #[test]
    fn test_strict_and_wait_overrides() {
        let cli = parse(&["--strict", "--max-wait-attempts", "7", "shell"]);
        let mut config = BootConfig::default();
        cli.apply_overrides(&mut config);

        assert!(config.strict_mode);
        assert_eq!(config.wait.max_attempts, Some(7));
    }

    #[test]
    fn test_zero_wait_attempts_rejected() {
        assert!(
            Cli::try_parse_from(["sphere-boot", "--max-wait-attempts", "0"]).is_err()
        );
    }

    #[test]
    fn test_no_exec_spawns() {
        assert_eq!(parse(&["--no-exec"]).handoff(), Handoff::Spawn);
    }

    #[test]
    fn test_verbose_forces_debug() {
        let config = BootConfig::default();
        assert_eq!(parse(&["-v"]).log_config(&config).level, "debug");
        assert!(parse(&["-v"]).log_config(&config).force_level);
        assert_eq!(parse(&[]).log_config(&config).level, "info");
        assert!(!parse(&[]).log_config(&config).force_level);
    }

    #[test]
    fn test_dry_run_exits_without_side_effects() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BootConfig {
            app_dir: tmp.path().to_path_buf(),
            ..BootConfig::default()
        };
        let cli = parse(&["--dry-run", "docs"]);

        assert_eq!(execute(&cli, &config).unwrap(), 0);
        assert!(!tmp.path().join("logs").exists());
        assert!(!tmp.path().join("static").exists());
    }

    #[test]
    fn test_strict_unknown_mode_exits_2() {
        let cli = parse(&["--strict", "--dry-run", "bogus"]);
        let mut config = BootConfig::default();
        cli.apply_overrides(&mut config);

        let err = execute(&cli, &config).unwrap_err();
        let code = err.downcast_ref::<BootError>().map_or(1, BootError::exit_code);
        assert_eq!(code, 2);
    }

    #[test]
    fn test_config_file_error_exits_78() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sphere.toml");
        std::fs::write(&path, "server_port = \"not a port\"\n").unwrap();

        let err: anyhow::Error = BootConfig::from_file(&path)
            .map_err(BootError::from)
            .unwrap_err()
            .into();
        let code = err.downcast_ref::<BootError>().map_or(1, BootError::exit_code);
        assert_eq!(code, 78);
    }
}
