//! Disk usage from POSIX `df -P -k` output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiskError {
    #[error("df output has no data line")]
    Empty,

    #[error("malformed df line: '{0}'")]
    Malformed(String),
}

/// Usage of the filesystem holding a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub filesystem: String,
    pub mount_point: String,
    pub total_kb: u64,
    pub used_kb: u64,
    pub available_kb: u64,
}

impl DiskUsage {
    /// Parse the first data line of `df -P -k <path>`.
    ///
    /// Format: `Filesystem 1024-blocks Used Available Capacity Mounted on`.
    /// The mount point may contain spaces, so everything after the capacity
    /// column is joined back together.
    pub fn parse_df(output: &str) -> Result<Self, DiskError> {
        let line = output
            .lines()
            .skip(1)
            .find(|line| !line.trim().is_empty())
            .ok_or(DiskError::Empty)?;

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            return Err(DiskError::Malformed(line.to_string()));
        }
        let number = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| DiskError::Malformed(line.to_string()))
        };

        Ok(Self {
            filesystem: parts[0].to_string(),
            total_kb: number(parts[1])?,
            used_kb: number(parts[2])?,
            available_kb: number(parts[3])?,
            mount_point: parts[5..].join(" "),
        })
    }

    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        (self.used_kb as f64 / self.total_kb as f64) * 100.0
    }

    pub fn available_gb(&self) -> f64 {
        self.available_kb as f64 / (1024.0 * 1024.0)
    }
}
