use sphere_common::{ConfigError, UnknownModeError};
use thiserror::Error;

/// Fatal bootstrap failures. Anything that reaches the binary as a
/// `BootError` terminates the process with [`BootError::exit_code`].
#[derive(Debug, Error)]
pub enum BootError {
    #[error("{service} at {address} still unreachable after {attempts} attempts")]
    DependencyUnreachable {
        service: String,
        address: String,
        attempts: u32,
    },

    #[error("setup step '{step}' failed: {reason}")]
    SetupFailed { step: &'static str, reason: String },

    #[error("preparation step '{step}' failed: {detail}")]
    PreparationFailed {
        step: &'static str,
        code: Option<i32>,
        detail: String,
    },

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' not found on PATH")]
    ProgramNotFound { program: String },

    #[error(transparent)]
    UnknownMode(#[from] UnknownModeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BootError {
    /// Process exit status for this failure. Always non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PreparationFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            Self::UnknownMode(_) => 2,
            Self::Config(_) => 78,
            Self::Spawn { .. } => 126,
            Self::ProgramNotFound { .. } => 127,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_non_zero() {
        let errors = [
            BootError::DependencyUnreachable {
                service: "database".into(),
                address: "db:5432".into(),
                attempts: 3,
            },
            BootError::SetupFailed {
                step: "create_directories",
                reason: "denied".into(),
            },
            BootError::PreparationFailed {
                step: "migrate",
                code: Some(0),
                detail: "odd".into(),
            },
            BootError::PreparationFailed {
                step: "migrate",
                code: None,
                detail: "killed".into(),
            },
            BootError::UnknownMode(UnknownModeError("bogus".into())),
            BootError::Config(ConfigError::Invalid("wait.interval_ms must be non-zero".into())),
            BootError::ProgramNotFound {
                program: "ptw".into(),
            },
        ];
        for err in &errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }

    #[test]
    fn test_config_error_exits_78() {
        let err = BootError::Config(ConfigError::Invalid("python must be non-empty".into()));
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_preparation_failure_keeps_command_status() {
        let err = BootError::PreparationFailed {
            step: "collectstatic",
            code: Some(3),
            detail: "exited with status 3".into(),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.to_string(),
            "preparation step 'collectstatic' failed: exited with status 3"
        );
    }
}
