//! Runs shift jobs against real region files.

use std::path::PathBuf;

use crate::config::{FailurePolicy, ShiftConfig};
use crate::error::{JobError, JobFailure, ShiftError};
use crate::fs::Filesystem;
use crate::nbt;
use crate::region::{RegionArchive, REGION_CHUNK_EDGE};

use super::delta::ShiftDelta;
use super::planner::{classify_conflicts, plan_jobs, reject_overlapping_paths, ShiftJob};
use super::transform::shift_chunk;
use super::uuid_source::UuidSource;

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct ShiftSummary {
    /// Region files found in the input directory.
    pub found: usize,
    /// Jobs that completed.
    pub shifted: usize,
    pub chunks_shifted: usize,
    pub out_of_bounds: usize,
    /// Destinations left untouched under `ConflictPolicy::Keep`.
    pub preexisting: Vec<PathBuf>,
    pub failures: Vec<JobError>,
    /// Set when a failure stopped the run with jobs still pending.
    pub halted: bool,
    /// Jobs never attempted because the run halted.
    pub skipped_after_halt: usize,
}

impl ShiftSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Plans, checks for overlaps and conflicts, then executes every job.
/// Configuration and conflict errors return before any file is written; job
/// failures land in the summary.
pub fn run_shift(
    config: &ShiftConfig,
    fs: &impl Filesystem,
    uuids: &mut dyn UuidSource,
) -> Result<ShiftSummary, ShiftError> {
    let listing = fs
        .list_dir(&config.input_dir)
        .map_err(|error| ShiftError::ListInput {
            dir: config.input_dir.clone(),
            error,
        })?;
    let plan = plan_jobs(config, &listing)?;
    log::debug!(
        "Planned {} job(s) from {} ({} out of bounds, {} ignored)",
        plan.jobs.len(),
        config.input_dir.display(),
        plan.out_of_bounds,
        plan.ignored
    );

    let mut summary = ShiftSummary {
        found: plan.found(),
        out_of_bounds: plan.out_of_bounds,
        ..ShiftSummary::default()
    };
    reject_overlapping_paths(&plan.jobs, fs)?;
    let resolution = classify_conflicts(plan.jobs, config.conflict_policy, fs)?;
    summary.preexisting = resolution.preexisting;

    let total = resolution.runnable.len();
    for (done, job) in resolution.runnable.into_iter().enumerate() {
        match shift_region(&job, config.delta, uuids, fs) {
            Ok(chunks) => {
                log::info!(
                    "Shifted {} -> {} ({chunks} chunks)",
                    job.input.display(),
                    job.output.display()
                );
                summary.shifted += 1;
                summary.chunks_shifted += chunks;
            }
            Err(error) => {
                log::error!("{error}");
                summary.failures.push(error);
                if config.failure_policy == FailurePolicy::Halt {
                    summary.skipped_after_halt = total - done - 1;
                    summary.halted = summary.skipped_after_halt > 0;
                    break;
                }
            }
        }
    }

    log::info!(
        "Found {} region file(s): {} shifted, {} pre-existing, {} out of bounds, {} failed",
        summary.found,
        summary.shifted,
        summary.preexisting.len(),
        summary.out_of_bounds,
        summary.failures.len()
    );
    Ok(summary)
}

/// Rewrites one region file and returns how many chunks it carried. The
/// destination's header is flushed even when a chunk fails part way through.
pub fn shift_region(
    job: &ShiftJob,
    delta: ShiftDelta,
    uuids: &mut dyn UuidSource,
    fs: &impl Filesystem,
) -> Result<usize, JobError> {
    copy_shifted(job, delta, uuids, fs).map_err(|failure| JobError {
        input: job.input.clone(),
        output: job.output.clone(),
        failure,
    })
}

fn copy_shifted(
    job: &ShiftJob,
    delta: ShiftDelta,
    uuids: &mut dyn UuidSource,
    fs: &impl Filesystem,
) -> Result<usize, JobFailure> {
    if let Some(parent) = job.output.parent() {
        fs.create_dir_all(parent).map_err(JobFailure::CreateDir)?;
    }

    let mut source = RegionArchive::open(&job.input)?;
    let mut dest = RegionArchive::create(&job.output)?;

    let copied = copy_chunks(&mut source, &mut dest, job, delta, uuids);
    let closed = dest.close();
    let chunks = copied?;
    closed?;
    Ok(chunks)
}

fn copy_chunks(
    source: &mut RegionArchive,
    dest: &mut RegionArchive,
    job: &ShiftJob,
    delta: ShiftDelta,
    uuids: &mut dyn UuidSource,
) -> Result<usize, JobFailure> {
    let edge = REGION_CHUNK_EDGE as usize;
    let mut chunks = 0;
    for cz in 0..edge {
        for cx in 0..edge {
            let Some(payload) = source.read_chunk(cx, cz)? else {
                continue;
            };
            let root =
                nbt::decode(&payload).map_err(|error| JobFailure::Nbt { cx, cz, error })?;
            let shifted = shift_chunk(&root, delta, job.regenerate_uuids, &mut *uuids)
                .map_err(|error| JobFailure::Transform { cx, cz, error })?;
            let encoded =
                nbt::encode(&shifted).map_err(|error| JobFailure::Nbt { cx, cz, error })?;
            dest.write_chunk_with_timestamp(cx, cz, &encoded, source.timestamp(cx, cz)?)?;
            chunks += 1;
        }
    }
    Ok(chunks)
}
