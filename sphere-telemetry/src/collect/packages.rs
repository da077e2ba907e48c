//! Interpreter version and installed dependency listings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PackageError {
    #[error("unrecognized interpreter version output: '{0}'")]
    UnrecognizedVersion(String),
}

/// One entry from `pip list --format=freeze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    /// `None` for direct references (`name @ url`).
    pub version: Option<String>,
}

/// Extract the version from `python --version` output ("Python 3.12.1").
///
/// Older interpreters print the banner on stderr, so callers pass the
/// combined output.
pub fn parse_interpreter_version(output: &str) -> Result<String, PackageError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(name), Some(version))
            if name.eq_ignore_ascii_case("python")
                && version.starts_with(|c: char| c.is_ascii_digit()) =>
        {
            Ok(version.to_string())
        }
        _ => Err(PackageError::UnrecognizedVersion(line.to_string())),
    }
}

/// Parse freeze-format lines. Comments, blank lines and option lines are
/// skipped.
pub fn parse_package_list(output: &str) -> Vec<InstalledPackage> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| {
            if let Some((name, version)) = line.split_once("==") {
                return Some(InstalledPackage {
                    name: name.trim().to_string(),
                    version: Some(version.trim().to_string()),
                });
            }
            line.split_once(" @ ").map(|(name, _)| InstalledPackage {
                name: name.trim().to_string(),
                version: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interpreter_version() {
        assert_eq!(parse_interpreter_version("Python 3.12.1\n"), Ok("3.12.1".to_string()));
        assert_eq!(parse_interpreter_version("\npython 2.7.18"), Ok("2.7.18".to_string()));
    }

    #[test]
    fn test_parse_interpreter_version_rejects_noise() {
        assert!(parse_interpreter_version("").is_err());
        assert!(parse_interpreter_version("command not found: python").is_err());
        assert!(parse_interpreter_version("Python").is_err());
    }

    #[test]
    fn test_parse_package_list() {
        let output = "# generated\nDjango==5.0.1\ncelery==5.3.6\n-e git+https://x/y.git#egg=z\n\
                      breaksphere @ file:///app\n\nredis == 5.0.1\n";
        let packages = parse_package_list(output);
        assert_eq!(packages.len(), 4);
        assert_eq!(packages[0].name, "Django");
        assert_eq!(packages[0].version.as_deref(), Some("5.0.1"));
        assert_eq!(packages[2].name, "breaksphere");
        assert_eq!(packages[2].version, None);
        assert_eq!(packages[3].name, "redis");
        assert_eq!(packages[3].version.as_deref(), Some("5.0.1"));
    }
}
