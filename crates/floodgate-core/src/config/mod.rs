//! Configuration helpers shared by floodgate binaries.

mod vars;

pub use vars::{interpolate, interpolate_with};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;
