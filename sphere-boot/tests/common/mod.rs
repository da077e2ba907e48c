use sphere_common::BootConfig;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .json(),
            )
            .with(filter)
            .init();
    });
}

/// Default configuration rooted at `app_dir`.
#[allow(dead_code)]
pub fn test_config(app_dir: &Path) -> BootConfig {
    BootConfig {
        app_dir: app_dir.to_path_buf(),
        ..BootConfig::default()
    }
}

/// Write an executable shell script into `dir`.
#[cfg(unix)]
#[allow(dead_code)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

#[allow(dead_code)]
pub const DF_OUTPUT: &str = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n\
                             overlay           61255492 22815124  35298592      40% /\n";
