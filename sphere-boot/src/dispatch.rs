//! Mode resolution and the mode → launch plan table.

use crate::error::BootError;
use sphere_common::{BootConfig, BootstrapMode, CommandSpec, LaunchPlan};
use tracing::warn;

type Handler = fn(&BootConfig) -> LaunchPlan;

/// Resolve the CLI token into a mode. A missing or empty token is
/// `default`. Unrecognized tokens fall back to `default` with a warning,
/// or fail with [`BootError::UnknownMode`] when `strict` is set.
pub fn resolve_mode(token: Option<&str>, strict: bool) -> Result<BootstrapMode, BootError> {
    let Some(token) = token else {
        return Ok(BootstrapMode::Default);
    };
    if strict {
        return Ok(token.parse()?);
    }
    let mode = BootstrapMode::parse_permissive(token);
    let trimmed = token.trim();
    if mode == BootstrapMode::Default && !trimmed.is_empty() && trimmed != "default" {
        warn!(mode = token, "Unknown mode, falling back to default");
    }
    Ok(mode)
}

/// Build the launch plan for `mode`.
pub fn dispatch(mode: BootstrapMode, config: &BootConfig) -> LaunchPlan {
    let mut plan = handler(mode)(config).with_env("PYTHONUNBUFFERED", "1");
    plan.mode = mode;
    if let Some(settings) = &config.settings_module {
        plan = plan.with_env("DJANGO_SETTINGS_MODULE", settings);
    }
    plan
}

fn handler(mode: BootstrapMode) -> Handler {
    match mode {
        BootstrapMode::Default | BootstrapMode::Server => server,
        BootstrapMode::CeleryWorker => celery_worker,
        BootstrapMode::CeleryBeat => celery_beat,
        BootstrapMode::Jupyter => jupyter,
        BootstrapMode::Docs => docs,
        BootstrapMode::TestWatch => test_watch,
        BootstrapMode::TestCoverage => test_coverage,
        BootstrapMode::Debug => debug,
        BootstrapMode::Loadtest => loadtest,
        BootstrapMode::Shell => shell,
        BootstrapMode::SecurityCheck => security_check,
    }
}

/// `<python> manage.py <args...>` in the app directory.
pub(crate) fn manage_command<I, S>(config: &BootConfig, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new(&config.python)
        .arg("manage.py")
        .args(args)
        .current_dir(&config.app_dir)
}

fn in_app(config: &BootConfig, program: &str) -> CommandSpec {
    CommandSpec::new(program).current_dir(&config.app_dir)
}

fn server_addr(config: &BootConfig) -> String {
    format!("{}:{}", config.bind_host, config.server_port)
}

fn server(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(
        BootstrapMode::Server,
        manage_command(config, ["runserver".to_string(), server_addr(config)]),
    )
}

fn celery(config: &BootConfig, role: &str) -> CommandSpec {
    in_app(config, "celery").args(["-A", &config.project, role, "--loglevel=info"])
}

fn celery_worker(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(BootstrapMode::CeleryWorker, celery(config, "worker"))
}

fn celery_beat(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(BootstrapMode::CeleryBeat, celery(config, "beat"))
}

fn jupyter(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(
        BootstrapMode::Jupyter,
        manage_command(config, ["shell_plus", "--notebook"]),
    )
}

fn docs(config: &BootConfig) -> LaunchPlan {
    let build = in_app(config, "make").args(["-C", "docs", "html"]);
    let serve = in_app(config, &config.python).args([
        "-m".to_string(),
        "http.server".to_string(),
        config.docs_port.to_string(),
        "--directory".to_string(),
        "docs/_build/html".to_string(),
    ]);
    LaunchPlan::new(BootstrapMode::Docs, serve).with_prelude(build)
}

fn test_watch(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(
        BootstrapMode::TestWatch,
        in_app(config, "ptw").args(["--runner", "pytest"]),
    )
}

fn test_coverage(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(
        BootstrapMode::TestCoverage,
        in_app(config, "pytest").args([
            "--cov=.",
            "--cov-report=term-missing",
            "--cov-report=html",
        ]),
    )
}

fn debug(config: &BootConfig) -> LaunchPlan {
    let exec = in_app(config, &config.python).args([
        "-m".to_string(),
        "debugpy".to_string(),
        "--listen".to_string(),
        format!("{}:{}", config.bind_host, config.debug_port),
        "manage.py".to_string(),
        "runserver".to_string(),
        server_addr(config),
        "--noreload".to_string(),
    ]);
    LaunchPlan::new(BootstrapMode::Debug, exec)
}

fn loadtest(config: &BootConfig) -> LaunchPlan {
    let host = format!("http://localhost:{}", config.server_port);
    LaunchPlan::new(
        BootstrapMode::Loadtest,
        in_app(config, "locust").args(["-f", "locustfile.py", "--host", &host]),
    )
}

fn shell(config: &BootConfig) -> LaunchPlan {
    LaunchPlan::new(BootstrapMode::Shell, manage_command(config, ["shell_plus"]))
}

fn security_check(config: &BootConfig) -> LaunchPlan {
    let bandit = in_app(config, "bandit").args(["-r", ".", "-x", "./tests,./venv"]);
    // bandit exits non-zero whenever it reports findings, so it cannot gate
    // the dependency check.
    LaunchPlan::new(
        BootstrapMode::SecurityCheck,
        in_app(config, "safety").arg("check"),
    )
    .with_prelude(bandit)
    .run_exec_regardless()
}
