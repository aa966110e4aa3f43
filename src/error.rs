//! Run-level error taxonomy. Codec errors live next to their codecs
//! ([`crate::region::RegionError`], [`crate::nbt::NbtError`]).

use std::io;
use std::path::PathBuf;

use crate::nbt::NbtError;
use crate::region::{RegionError, RegionPos};
use crate::shift::transform::TransformError;

/// Invalid run configuration. Raised before any file is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("shift ({dx}, {dz}) blocks is not a multiple of 512 (one region width)")]
    UnalignedShift { dx: i64, dz: i64 },
    #[error("shifting region ({}, {}) leaves the representable coordinate range", .region.x, .region.z)]
    RegionOverflow { region: RegionPos },
    #[error("region file extension must be non-empty and must not contain '.' or '/', got {0:?}")]
    InvalidExtension(String),
    #[error(
        "{} and {} both name region ({}, {})",
        .first.display(), .second.display(), .region.x, .region.z
    )]
    DuplicateRegion {
        region: RegionPos,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("output {} is also input {}", .output.display(), .input.display())]
    OutputOverlapsInput { input: PathBuf, output: PathBuf },
}

/// Destinations that already exist while running with `ErrorOnConflict`.
#[derive(Debug, thiserror::Error)]
#[error("{} destination region file(s) already exist: {}", .existing.len(), display_paths(.existing))]
pub struct ConflictError {
    pub existing: Vec<PathBuf>,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a single region job failed.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error("creating output directory: {0}")]
    CreateDir(#[source] io::Error),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error("chunk ({cx}, {cz}): {error}")]
    Nbt {
        cx: usize,
        cz: usize,
        #[source]
        error: NbtError,
    },
    #[error("chunk ({cx}, {cz}): {error}")]
    Transform {
        cx: usize,
        cz: usize,
        #[source]
        error: TransformError,
    },
}

/// A failed job, with the paths needed to diagnose it.
#[derive(Debug, thiserror::Error)]
#[error("failed to shift {} to {}: {failure}", .input.display(), .output.display())]
pub struct JobError {
    pub input: PathBuf,
    pub output: PathBuf,
    pub failure: JobFailure,
}

/// Errors that abort a run before any job executes.
#[derive(Debug, thiserror::Error)]
pub enum ShiftError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("failed to list input directory {}: {error}", .dir.display())]
    ListInput {
        dir: PathBuf,
        #[source]
        error: io::Error,
    },
}
