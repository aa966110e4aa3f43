//! The shift pipeline: delta validation, per-chunk transform, job planning
//! and execution.

pub mod delta;
pub mod executor;
pub mod planner;
pub mod transform;
pub mod uuid_source;

pub use delta::ShiftDelta;
pub use executor::{run_shift, shift_region, ShiftSummary};
pub use planner::{
    classify_conflicts, plan_jobs, reject_overlapping_paths, ConflictResolution, ShiftJob,
    ShiftPlan,
};
pub use transform::{shift_chunk, TransformError};
pub use uuid_source::{uuid_from_halves, uuid_to_halves, RandomUuids, UuidSource};
