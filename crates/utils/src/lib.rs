//! Helpers shared by the simulator binaries.

pub mod logging;
pub mod version;
