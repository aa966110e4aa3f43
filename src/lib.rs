//! Relocates region archives by whole regions.
//!
//! Region files are read through [`region::RegionArchive`], each chunk is
//! decoded with [`nbt::decode`], moved by [`shift::shift_chunk`] and written
//! into the same grid slot of the destination region.

pub mod config;
pub mod error;
pub mod fs;
pub mod nbt;
pub mod region;
pub mod shift;

#[cfg(test)]
mod test_support;

pub use config::{ConflictPolicy, FailurePolicy, ShiftConfig};
pub use error::{ConfigError, ConflictError, JobError, JobFailure, ShiftError};
pub use shift::{run_shift, ShiftDelta, ShiftSummary};
