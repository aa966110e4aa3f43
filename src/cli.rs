use std::path::PathBuf;

use clap::{ArgAction, Args as ClapArgs, Parser};
use log::LevelFilter;
use region_shift::config::{ConflictPolicy, FailurePolicy, ShiftConfig};
use region_shift::error::ConfigError;
use region_shift::region::RegionRect;
use region_shift::shift::ShiftDelta;

#[derive(Parser, Debug)]
#[command(
    name = "region-shift",
    version,
    about = "Copy region files to a new location, shifting every chunk by whole regions"
)]
pub struct Args {
    /// Directory holding the source region files
    pub input_dir: PathBuf,
    /// Directory the shifted region files are written to
    #[arg(long, short)]
    pub output: PathBuf,
    /// Shift in region units (one region is 512 blocks)
    #[arg(
        long,
        value_name = "RX,RZ",
        default_value = "0,0",
        value_parser = parse_pair,
        allow_hyphen_values = true
    )]
    pub shift: (i32, i32),
    /// Only shift source regions inside [X0, X1) x [Z0, Z1)
    #[arg(
        long,
        value_name = "X0,Z0,X1,Z1",
        value_parser = parse_bounds,
        allow_hyphen_values = true
    )]
    pub bounds: Option<RegionRect>,
    #[command(flatten)]
    pub conflict: ConflictArgs,
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Copy entity UUIDs instead of generating fresh ones
    #[arg(long)]
    pub keep_entity_uuids: bool,
    /// Keep running the remaining regions after one fails
    #[arg(long)]
    pub continue_on_error: bool,
    /// Region file extension
    #[arg(long, default_value = "mca")]
    pub extension: String,
}

/// How to treat destination files that already exist.
#[derive(ClapArgs, Debug, Default)]
#[group(multiple = false)]
pub struct ConflictArgs {
    /// Leave existing destination files alone and skip their jobs
    #[arg(long)]
    pub keep: bool,
    /// Overwrite existing destination files
    #[arg(long)]
    pub clobber: bool,
    /// Refuse to run if any destination file exists (default)
    #[arg(long)]
    pub error_on_conflict: bool,
}

impl ConflictArgs {
    fn policy(&self) -> ConflictPolicy {
        if self.keep {
            ConflictPolicy::Keep
        } else if self.clobber {
            ConflictPolicy::Clobber
        } else {
            ConflictPolicy::ErrorOnConflict
        }
    }
}

impl Args {
    pub fn into_config(self) -> Result<ShiftConfig, ConfigError> {
        let conflict_policy = self.conflict.policy();
        let mut config = ShiftConfig::with_defaults(self.input_dir, self.output);
        config.delta = ShiftDelta::from_regions(self.shift.0, self.shift.1);
        config.bounds = self.bounds;
        config.conflict_policy = conflict_policy;
        config.failure_policy = if self.continue_on_error {
            FailurePolicy::ContinueAndReport
        } else {
            FailurePolicy::Halt
        };
        config.regenerate_uuids = !self.keep_entity_uuids;
        config.extension = self.extension;
        config.validate()?;
        Ok(config)
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

fn parse_ints<const N: usize>(text: &str) -> Result<[i32; N], String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {N} comma-separated integers, got {text:?}"));
    }
    let mut values = [0; N];
    for (value, part) in values.iter_mut().zip(parts) {
        *value = part
            .parse()
            .map_err(|_| format!("{part:?} is not a valid integer"))?;
    }
    Ok(values)
}

fn parse_pair(text: &str) -> Result<(i32, i32), String> {
    let [x, z] = parse_ints::<2>(text)?;
    Ok((x, z))
}

fn parse_bounds(text: &str) -> Result<RegionRect, String> {
    let [x0, z0, x1, z1] = parse_ints::<4>(text)?;
    Ok(RegionRect::new(x0, z0, x1, z1))
}
