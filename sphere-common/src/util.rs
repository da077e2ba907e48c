//! Shared utilities.

use crate::types::CommandSpec;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Substrings that mark an environment variable as sensitive.
const SENSITIVE_KEY_MARKERS: &[&str] = &[
    "TOKEN",
    "SECRET",
    "PASSWORD",
    "PASS",
    "API_KEY",
    "PRIVATE_KEY",
    "DATABASE_URL",
    "CREDENTIALS",
];

/// Render a command as a single shell-quoted line for logging.
pub fn render_command(cmd: &CommandSpec) -> String {
    cmd.argv()
        .into_iter()
        .map(|part| shell_escape::escape(Cow::Borrowed(part)).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Copy of `env` with values of sensitive-looking keys replaced by `***`.
pub fn mask_sensitive_env(env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    env.iter()
        .map(|(key, value)| {
            let upper = key.to_ascii_uppercase();
            let masked = SENSITIVE_KEY_MARKERS
                .iter()
                .any(|marker| upper.contains(marker));
            let value = if masked { "***".to_string() } else { value.clone() };
            (key.clone(), value)
        })
        .collect()
}
