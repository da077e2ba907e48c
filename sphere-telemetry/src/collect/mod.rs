//! Individual collectors.

pub mod disk;
pub mod memory;
pub mod packages;
