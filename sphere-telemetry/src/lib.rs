//! Host diagnostics for the bootstrap health phase.
//!
//! Collectors here only parse; spawning `df` or the interpreter is left to
//! the caller so the parsing can be tested against fixtures.

pub mod collect;

pub use collect::disk::{DiskError, DiskUsage};
pub use collect::memory::{MemoryError, MemoryInfo, MemoryTelemetry};
pub use collect::packages::{InstalledPackage, PackageError, parse_interpreter_version, parse_package_list};
