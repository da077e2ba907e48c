//! Best-effort system diagnostics logged before handoff.
//!
//! Nothing here can fail the boot: every probe that errors becomes a
//! warning and an empty field in the report.

use crate::runner::CommandRunner;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sphere_common::{BootConfig, CommandSpec};
use sphere_telemetry::{
    DiskUsage, InstalledPackage, MemoryTelemetry, parse_interpreter_version, parse_package_list,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub collected_at: DateTime<Utc>,
    pub disk: Option<DiskUsage>,
    pub memory: Option<MemoryTelemetry>,
    pub interpreter: Option<String>,
    pub packages: Option<Vec<InstalledPackage>>,
    /// One line per probe that could not be collected.
    pub failures: Vec<String>,
}

impl HealthReport {
    fn new() -> Self {
        Self {
            collected_at: Utc::now(),
            disk: None,
            memory: None,
            interpreter: None,
            packages: None,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, probe: &str, reason: impl std::fmt::Display) {
        warn!(probe, reason = %reason, "Health probe failed");
        self.failures.push(format!("{probe}: {reason}"));
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn capture_stdout<R: CommandRunner>(runner: &R, cmd: &CommandSpec) -> Result<String, String> {
    let outcome = runner.capture(cmd).await.map_err(|err| err.to_string())?;
    if !outcome.success() {
        return Err(outcome.describe());
    }
    Ok(outcome.combined_output())
}

pub async fn check_system_health<R: CommandRunner>(config: &BootConfig, runner: &R) -> HealthReport {
    let mut report = HealthReport::new();

    let df = CommandSpec::new("df")
        .args(["-P", "-k"])
        .arg(config.app_dir.display().to_string());
    match capture_stdout(runner, &df).await {
        Ok(out) => match DiskUsage::parse_df(&out) {
            Ok(disk) => {
                info!(
                    mount = %disk.mount_point,
                    used_pct = %format!("{:.1}", disk.used_percent()),
                    available_gb = %format!("{:.2}", disk.available_gb()),
                    "Disk usage"
                );
                report.disk = Some(disk);
            }
            Err(err) => report.record_failure("disk", err),
        },
        Err(err) => report.record_failure("disk", err),
    }

    match MemoryTelemetry::collect() {
        Ok(memory) => {
            info!(
                total_mb = memory.total_mb,
                available_mb = memory.available_mb,
                used_pct = %format!("{:.1}", memory.used_percent),
                "Memory usage"
            );
            report.memory = Some(memory);
        }
        Err(err) => report.record_failure("memory", err),
    }

    let version = CommandSpec::new(&config.python).arg("--version");
    match capture_stdout(runner, &version).await {
        Ok(out) => match parse_interpreter_version(&out) {
            Ok(version) => {
                info!(python = %version, "Interpreter version");
                report.interpreter = Some(version);
            }
            Err(err) => report.record_failure("interpreter", err),
        },
        Err(err) => report.record_failure("interpreter", err),
    }

    let pip = CommandSpec::new(&config.python).args(["-m", "pip", "list", "--format=freeze"]);
    match capture_stdout(runner, &pip).await {
        Ok(out) => {
            let packages = parse_package_list(&out);
            info!(count = packages.len(), "Installed packages");
            for package in &packages {
                debug!(
                    name = %package.name,
                    version = package.version.as_deref().unwrap_or("-"),
                    "Installed package"
                );
            }
            report.packages = Some(packages);
        }
        Err(err) => report.record_failure("packages", err),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    const DF: &str = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n\
                      overlay           61255492 22815124  35298592      40% /\n";

    #[tokio::test]
    async fn test_collects_every_probe() {
        let runner = ScriptedRunner::new()
            .respond_with("df -P -k", DF)
            .respond_with("--version", "Python 3.12.1\n")
            .respond_with("pip list", "Django==5.0.1\ncelery==5.3.6\n");

        let report = check_system_health(&BootConfig::default(), &runner).await;

        assert_eq!(report.disk.as_ref().map(|d| d.mount_point.as_str()), Some("/"));
        assert_eq!(report.interpreter.as_deref(), Some("3.12.1"));
        assert_eq!(report.packages.as_ref().map(Vec::len), Some(2));
        assert!(runner.calls().iter().all(|c| c.captured));
    }

    #[tokio::test]
    async fn test_failures_never_abort() {
        let runner = ScriptedRunner::new()
            .missing_program("df")
            .exit_with("pip list", 1)
            .respond_with("--version", "garbage");

        let report = check_system_health(&BootConfig::default(), &runner).await;

        assert!(report.disk.is_none());
        assert!(report.interpreter.is_none());
        assert!(report.packages.is_none());
        assert!(!report.is_complete());
        assert!(report.failures.iter().any(|f| f.starts_with("disk:")));
        assert!(report.failures.iter().any(|f| f.starts_with("packages:")));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let report = check_system_health(&BootConfig::default(), &ScriptedRunner::new()).await;
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("collected_at").is_some());
        assert!(json["failures"].is_array());
    }
}
