//! Development environment setup: hook installation, working directories
//! and their permissions. Every step is safe to repeat on restart.

use crate::error::BootError;
use crate::runner::CommandRunner;
use serde::Serialize;
use sphere_common::{BootConfig, CommandSpec};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub hooks_installed: bool,
    pub directories: Vec<PathBuf>,
    /// Entries whose permissions were visited during normalization.
    pub entries_normalized: usize,
    pub ownership_applied: bool,
}

/// `pre-commit install`, run from the app directory.
pub fn hook_install_command(config: &BootConfig) -> CommandSpec {
    CommandSpec::new("pre-commit")
        .arg("install")
        .current_dir(&config.app_dir)
}

/// `chown -R user:user <dir>` for the configured runtime user.
pub fn ownership_command(user: &str, dir: &Path) -> CommandSpec {
    CommandSpec::new("chown")
        .arg("-R")
        .arg(format!("{user}:{user}"))
        .arg(dir.display().to_string())
}

pub async fn setup_dev_environment<R: CommandRunner>(
    config: &BootConfig,
    runner: &R,
) -> Result<SetupReport, BootError> {
    let mut report = SetupReport::default();

    let hook_config = config.hook_config_path();
    if hook_config.is_file() {
        let cmd = hook_install_command(config);
        let outcome = runner
            .run(&cmd)
            .await
            .map_err(|err| BootError::SetupFailed {
                step: "install_hooks",
                reason: err.to_string(),
            })?;
        if !outcome.success() {
            return Err(BootError::SetupFailed {
                step: "install_hooks",
                reason: format!("pre-commit install {}", outcome.describe()),
            });
        }
        report.hooks_installed = true;
        info!("Installed pre-commit hooks");
    } else {
        debug!(path = %hook_config.display(), "No hook configuration, skipping hook install");
    }

    for dir in config.work_dir_paths() {
        fs::create_dir_all(&dir).map_err(|err| BootError::SetupFailed {
            step: "create_directories",
            reason: format!("{}: {err}", dir.display()),
        })?;
        report.entries_normalized +=
            normalize_permissions(&dir).map_err(|err| BootError::SetupFailed {
                step: "normalize_permissions",
                reason: format!("{}: {err}", dir.display()),
            })?;
        report.directories.push(dir);
    }

    if let Some(user) = &config.run_user {
        for dir in &report.directories {
            let cmd = ownership_command(user, dir);
            let outcome = runner
                .run(&cmd)
                .await
                .map_err(|err| BootError::SetupFailed {
                    step: "change_ownership",
                    reason: err.to_string(),
                })?;
            if !outcome.success() {
                return Err(BootError::SetupFailed {
                    step: "change_ownership",
                    reason: format!("chown {} {}", dir.display(), outcome.describe()),
                });
            }
        }
        report.ownership_applied = true;
    }

    info!(
        directories = report.directories.len(),
        hooks = report.hooks_installed,
        "Development environment ready"
    );
    Ok(report)
}

/// Set directories to 0755 and files to 0644 below `root`, inclusive.
/// Symlinks are left alone. Returns the number of entries visited.
pub fn normalize_permissions(root: &Path) -> io::Result<usize> {
    let meta = fs::symlink_metadata(root)?;
    if meta.file_type().is_symlink() {
        return Ok(0);
    }
    if meta.is_dir() {
        set_mode(root, true)?;
        let mut visited = 1;
        for entry in fs::read_dir(root)? {
            visited += normalize_permissions(&entry?.path())?;
        }
        Ok(visited)
    } else {
        set_mode(root, false)?;
        Ok(1)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, is_dir: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if is_dir { DIR_MODE } else { FILE_MODE };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _is_dir: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn config_in(dir: &Path) -> BootConfig {
        BootConfig {
            app_dir: dir.to_path_buf(),
            ..BootConfig::default()
        }
    }

    #[tokio::test]
    async fn test_hook_install_skipped_without_config() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();

        let report = setup_dev_environment(&config_in(tmp.path()), &runner)
            .await
            .unwrap();

        assert!(!report.hooks_installed);
        assert_eq!(runner.count_matching("pre-commit"), 0);
        for name in ["logs", "media", "static"] {
            assert!(tmp.path().join(name).is_dir());
        }
    }

    #[tokio::test]
    async fn test_hook_install_runs_when_config_present() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".pre-commit-config.yaml"), "repos: []\n").unwrap();
        let runner = ScriptedRunner::new();

        let report = setup_dev_environment(&config_in(tmp.path()), &runner)
            .await
            .unwrap();

        assert!(report.hooks_installed);
        assert_eq!(runner.rendered(), vec!["pre-commit install"]);
        assert_eq!(runner.calls()[0].command.cwd.as_deref(), Some(tmp.path()));
    }

    #[tokio::test]
    async fn test_hook_install_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".pre-commit-config.yaml"), "repos: []\n").unwrap();
        let runner = ScriptedRunner::new().exit_with("pre-commit", 1);

        let err = setup_dev_environment(&config_in(tmp.path()), &runner)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BootError::SetupFailed {
                step: "install_hooks",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_ownership_applied_per_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BootConfig {
            run_user: Some("sphere".into()),
            ..config_in(tmp.path())
        };
        let runner = ScriptedRunner::new();

        let report = setup_dev_environment(&config, &runner).await.unwrap();

        assert!(report.ownership_applied);
        assert_eq!(runner.count_matching("chown -R sphere:sphere"), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_permissions_recurses() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("static/css");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("site.css");
        fs::write(&file, "body {}").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(&nested, fs::Permissions::from_mode(0o700)).unwrap();

        let visited = normalize_permissions(&tmp.path().join("static")).unwrap();

        assert_eq!(visited, 3);
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&nested), 0o755);
        assert_eq!(mode(&file), 0o644);
    }
}
