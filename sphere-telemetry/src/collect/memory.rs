//! Memory metrics from /proc/meminfo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Memory usage above which the snapshot is logged as a warning.
const HIGH_USAGE_PERCENT: f64 = 90.0;

/// Errors that can occur during memory metrics collection.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("failed to read /proc/meminfo: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse /proc/meminfo: missing required field '{0}'")]
    MissingField(String),
}

/// Raw memory information parsed from /proc/meminfo.
///
/// All values are in kilobytes (kB) as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    /// Kernel estimate of memory available for new allocations.
    pub available_kb: u64,
    pub buffers_kb: u64,
    pub cached_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

impl MemoryInfo {
    /// Read memory information from /proc/meminfo.
    pub fn read_from_proc() -> Result<Self, MemoryError> {
        let content = std::fs::read_to_string("/proc/meminfo")?;
        Self::parse(&content)
    }

    /// Parse /proc/meminfo content.
    pub fn parse(content: &str) -> Result<Self, MemoryError> {
        let mut map: HashMap<&str, u64> = HashMap::new();

        for line in content.lines() {
            if let Some((key, value)) = line.split_once(':') {
                // "    12345 kB" or "    12345"
                let value_str = value.trim().trim_end_matches("kB").trim();
                if let Ok(kb) = value_str.parse::<u64>() {
                    map.insert(key.trim(), kb);
                }
            }
        }

        let required = |field: &str| {
            map.get(field)
                .copied()
                .ok_or_else(|| MemoryError::MissingField(field.to_string()))
        };
        let total_kb = required("MemTotal")?;
        let free_kb = required("MemFree")?;

        let buffers_kb = map.get("Buffers").copied().unwrap_or(0);
        let cached_kb = map.get("Cached").copied().unwrap_or(0);

        // MemAvailable is missing on kernels older than 3.14
        let available_kb = map.get("MemAvailable").copied().unwrap_or_else(|| {
            debug!(
                free_kb,
                buffers_kb, cached_kb, "MemAvailable not found, estimating from Free + Buffers + Cached"
            );
            free_kb.saturating_add(buffers_kb).saturating_add(cached_kb)
        });

        Ok(Self {
            total_kb,
            free_kb,
            available_kb,
            buffers_kb,
            cached_kb,
            swap_total_kb: map.get("SwapTotal").copied().unwrap_or(0),
            swap_free_kb: map.get("SwapFree").copied().unwrap_or(0),
        })
    }

    /// Total memory in use (total - available).
    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }

    /// Percentage of memory in use (0-100).
    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        (self.used_kb() as f64 / self.total_kb as f64) * 100.0
    }

    pub fn swap_used_kb(&self) -> u64 {
        self.swap_total_kb.saturating_sub(self.swap_free_kb)
    }
}

/// Memory snapshot reported by the health phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTelemetry {
    pub collected_at: DateTime<Utc>,
    pub total_mb: u64,
    pub available_mb: u64,
    pub used_percent: f64,
    pub swap_used_mb: u64,
}

impl MemoryTelemetry {
    /// Collect memory telemetry from the running system.
    pub fn collect() -> Result<Self, MemoryError> {
        let info = MemoryInfo::read_from_proc()?;
        let telemetry = Self::from_info(&info);

        debug!(
            total_mb = telemetry.total_mb,
            available_mb = telemetry.available_mb,
            used_pct = %format!("{:.1}", telemetry.used_percent),
            swap_used_mb = telemetry.swap_used_mb,
            "Memory telemetry collected"
        );
        if telemetry.used_percent > HIGH_USAGE_PERCENT {
            warn!(
                used_pct = %format!("{:.1}", telemetry.used_percent),
                available_mb = telemetry.available_mb,
                "Container is low on memory"
            );
        }

        Ok(telemetry)
    }

    pub fn from_info(info: &MemoryInfo) -> Self {
        Self {
            collected_at: Utc::now(),
            total_mb: info.total_kb / 1024,
            available_mb: info.available_kb / 1024,
            used_percent: info.used_percent(),
            swap_used_mb: info.swap_used_kb() / 1024,
        }
    }
}
