mod common;

use common::{fixture, init_test_logging};
use sphere_telemetry::{MemoryInfo, MemoryTelemetry};
use tracing::info;

#[test]
fn test_parse_meminfo_fixture() {
    init_test_logging();
    info!(test = "test_parse_meminfo_fixture", phase = "setup");

    let mem = MemoryInfo::parse(fixture("proc_meminfo_sample.txt")).expect("meminfo parse");

    info!(
        test = "test_parse_meminfo_fixture",
        phase = "assert",
        total_kb = mem.total_kb,
        available_kb = mem.available_kb
    );
    assert_eq!(mem.total_kb, 16_384_000);
    assert_eq!(mem.free_kb, 8_192_000);
    assert_eq!(mem.available_kb, 10_240_000);
    assert_eq!(mem.swap_used_kb(), 0);
}

#[test]
fn test_low_memory_fixture_usage() {
    init_test_logging();
    info!(test = "test_low_memory_fixture_usage", phase = "setup");

    let mem = MemoryInfo::parse(fixture("proc_meminfo_low.txt")).expect("meminfo parse");
    let telemetry = MemoryTelemetry::from_info(&mem);

    info!(
        test = "test_low_memory_fixture_usage",
        phase = "assert",
        used_pct = telemetry.used_percent
    );
    assert!(telemetry.used_percent > 90.0, "got {}", telemetry.used_percent);
    assert_eq!(telemetry.swap_used_mb, 750);
}

#[test]
fn test_collect_on_linux_host() {
    init_test_logging();
    if !std::path::Path::new("/proc/meminfo").exists() {
        info!(test = "test_collect_on_linux_host", phase = "skip");
        return;
    }

    let telemetry = MemoryTelemetry::collect().expect("collect from /proc");
    assert!(telemetry.total_mb > 0);
    assert!(telemetry.available_mb <= telemetry.total_mb);
}
