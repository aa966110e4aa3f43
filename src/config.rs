use std::path::PathBuf;

use crate::error::ConfigError;
use crate::region::coords::{RegionRect, DEFAULT_REGION_EXTENSION};
use crate::shift::ShiftDelta;

/// What to do with a job whose destination file already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave the existing destination untouched and skip the job.
    Keep,
    /// Replace the existing destination.
    Clobber,
    /// Abort the whole run before any job executes.
    #[default]
    ErrorOnConflict,
}

/// What to do with the remaining jobs after one fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    Halt,
    ContinueAndReport,
}

#[derive(Clone, Debug)]
pub struct ShiftConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub delta: ShiftDelta,
    /// Source regions outside this rectangle are ignored. `None` accepts all.
    pub bounds: Option<RegionRect>,
    pub conflict_policy: ConflictPolicy,
    pub failure_policy: FailurePolicy,
    pub regenerate_uuids: bool,
    pub extension: String,
}

impl ShiftConfig {
    pub fn with_defaults(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            delta: ShiftDelta::ZERO,
            bounds: None,
            conflict_policy: ConflictPolicy::default(),
            failure_policy: FailurePolicy::default(),
            regenerate_uuids: true,
            extension: DEFAULT_REGION_EXTENSION.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let extension = self.extension.as_str();
        if extension.is_empty() || extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }
        Ok(())
    }
}
