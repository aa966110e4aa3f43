//! Turns a directory listing into shift jobs and resolves destination
//! conflicts before anything is written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{ConflictPolicy, ShiftConfig};
use crate::error::{ConfigError, ConflictError};
use crate::fs::Filesystem;
use crate::region::RegionPos;

/// One region file to rewrite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShiftJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub source_region: RegionPos,
    pub dest_region: RegionPos,
    pub regenerate_uuids: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShiftPlan {
    /// Sorted by source region.
    pub jobs: Vec<ShiftJob>,
    /// Region files skipped because they fall outside the bounds.
    pub out_of_bounds: usize,
    /// Directory entries that are not region files.
    pub ignored: usize,
}

impl ShiftPlan {
    /// Region files found in the listing, in or out of bounds.
    pub fn found(&self) -> usize {
        self.jobs.len() + self.out_of_bounds
    }
}

pub fn plan_jobs(config: &ShiftConfig, listing: &[String]) -> Result<ShiftPlan, ConfigError> {
    config.validate()?;
    let (region_dx, region_dz) = config.delta.region_offset();

    let mut plan = ShiftPlan::default();
    for name in listing {
        let Some(source_region) = RegionPos::parse_file_name(name, &config.extension) else {
            log::debug!("Ignoring {name}: not a region file");
            plan.ignored += 1;
            continue;
        };
        if let Some(bounds) = config.bounds {
            if !bounds.contains(source_region) {
                log::debug!("Skipping {name}: outside bounds");
                plan.out_of_bounds += 1;
                continue;
            }
        }

        let dest_region = i32::try_from(region_dx)
            .ok()
            .zip(i32::try_from(region_dz).ok())
            .and_then(|(dx, dz)| source_region.checked_offset(dx, dz))
            .ok_or(ConfigError::RegionOverflow {
                region: source_region,
            })?;

        plan.jobs.push(ShiftJob {
            input: config.input_dir.join(name),
            output: config
                .output_dir
                .join(dest_region.file_name(&config.extension)),
            source_region,
            dest_region,
            regenerate_uuids: config.regenerate_uuids,
        });
    }

    plan.jobs
        .sort_by(|a, b| (a.source_region, &a.input).cmp(&(b.source_region, &b.input)));
    // Spellings like `r.-0.0` and `r.00.0` parse to the same region.
    if let Some(pair) = plan
        .jobs
        .windows(2)
        .find(|pair| pair[0].source_region == pair[1].source_region)
    {
        return Err(ConfigError::DuplicateRegion {
            region: pair[0].source_region,
            first: pair[0].input.clone(),
            second: pair[1].input.clone(),
        });
    }
    Ok(plan)
}

/// Rejects a plan in which any destination is also a source file, however
/// the two directories are spelled. Applies under every conflict policy.
pub fn reject_overlapping_paths(
    jobs: &[ShiftJob],
    fs: &impl Filesystem,
) -> Result<(), ConfigError> {
    let inputs: HashMap<PathBuf, &Path> = jobs
        .iter()
        .map(|job| (resolve(&job.input, fs), job.input.as_path()))
        .collect();
    for job in jobs {
        if let Some(input) = inputs.get(&resolve(&job.output, fs)) {
            return Err(ConfigError::OutputOverlapsInput {
                input: input.to_path_buf(),
                output: job.output.clone(),
            });
        }
    }
    Ok(())
}

/// Canonical parent joined with the file name; the raw path when the parent
/// does not exist yet.
fn resolve(path: &Path, fs: &impl Filesystem) -> PathBuf {
    path.parent()
        .zip(path.file_name())
        .and_then(|(parent, name)| {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            fs.canonicalize(parent).ok().map(|dir| dir.join(name))
        })
        .unwrap_or_else(|| path.to_path_buf())
}

/// Jobs cleared to run, and the destinations left alone under `Keep`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictResolution {
    pub runnable: Vec<ShiftJob>,
    pub preexisting: Vec<PathBuf>,
}

/// Checks every destination up front. Under `ErrorOnConflict` a single
/// existing destination rejects the whole batch.
pub fn classify_conflicts(
    jobs: Vec<ShiftJob>,
    policy: ConflictPolicy,
    fs: &impl Filesystem,
) -> Result<ConflictResolution, ConflictError> {
    if policy == ConflictPolicy::Clobber {
        return Ok(ConflictResolution {
            runnable: jobs,
            preexisting: Vec::new(),
        });
    }

    let (clashing, runnable): (Vec<_>, Vec<_>) =
        jobs.into_iter().partition(|job| fs.exists(&job.output));
    let preexisting: Vec<PathBuf> = clashing.into_iter().map(|job| job.output).collect();

    if policy == ConflictPolicy::ErrorOnConflict && !preexisting.is_empty() {
        return Err(ConflictError {
            existing: preexisting,
        });
    }
    for path in &preexisting {
        log::info!("Keeping existing {}", path.display());
    }
    Ok(ConflictResolution {
        runnable,
        preexisting,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionRect;
    use crate::shift::ShiftDelta;
    use std::collections::HashSet;
    use std::io;
    use std::path::Path;

    #[derive(Default)]
    struct FakeFs {
        existing: HashSet<PathBuf>,
        /// Directory spellings that resolve elsewhere, like a symlink.
        aliases: HashMap<PathBuf, PathBuf>,
    }

    impl Filesystem for FakeFs {
        fn list_dir(&self, _dir: &Path) -> io::Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn exists(&self, path: &Path) -> bool {
            self.existing.contains(path)
        }

        fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            Ok(self
                .aliases
                .get(path)
                .cloned()
                .unwrap_or_else(|| path.to_path_buf()))
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    fn config(rx: i32, rz: i32) -> ShiftConfig {
        let mut config = ShiftConfig::with_defaults("world/region", "out/region");
        config.delta = ShiftDelta::from_regions(rx, rz);
        config
    }

    #[test]
    fn maps_each_region_to_its_shifted_name() {
        let plan = plan_jobs(
            &config(1, -2),
            &names(&["r.0.0.mca", "r.-1.3.mca", "level.dat", "r.0.0.mcr"]),
        )
        .unwrap();

        assert_eq!(plan.ignored, 2);
        assert_eq!(plan.out_of_bounds, 0);
        assert_eq!(plan.found(), 2);
        assert_eq!(
            plan.jobs[0],
            ShiftJob {
                input: PathBuf::from("world/region/r.-1.3.mca"),
                output: PathBuf::from("out/region/r.0.1.mca"),
                source_region: RegionPos::new(-1, 3),
                dest_region: RegionPos::new(0, 1),
                regenerate_uuids: true,
            }
        );
        assert_eq!(plan.jobs[1].output, PathBuf::from("out/region/r.1.-2.mca"));
    }

    #[test]
    fn jobs_are_sorted_by_source_region() {
        let plan = plan_jobs(
            &config(0, 0),
            &names(&["r.2.0.mca", "r.-3.5.mca", "r.0.1.mca", "r.0.-1.mca"]),
        )
        .unwrap();
        let order: Vec<_> = plan.jobs.iter().map(|job| job.source_region).collect();
        assert_eq!(
            order,
            vec![
                RegionPos::new(-3, 5),
                RegionPos::new(0, -1),
                RegionPos::new(0, 1),
                RegionPos::new(2, 0),
            ]
        );
    }

    #[test]
    fn bounds_exclude_upper_edges() {
        let mut config = config(0, 0);
        config.bounds = Some(RegionRect::new(0, 0, 2, 2));
        let plan = plan_jobs(
            &config,
            &names(&["r.0.0.mca", "r.1.1.mca", "r.2.0.mca", "r.0.2.mca", "r.-1.0.mca"]),
        )
        .unwrap();
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.out_of_bounds, 3);
        assert_eq!(plan.found(), 5);
    }

    #[test]
    fn custom_extension_selects_matching_files() {
        let mut config = config(0, 0);
        config.extension = "mcr".to_string();
        let plan = plan_jobs(&config, &names(&["r.0.0.mca", "r.0.0.mcr"])).unwrap();
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].output, PathBuf::from("out/region/r.0.0.mcr"));
    }

    #[test]
    fn destination_overflow_is_a_config_error() {
        let err = plan_jobs(&config(1, 0), &names(&["r.2147483647.0.mca"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RegionOverflow { region } if region == RegionPos::new(i32::MAX, 0)
        ));
    }

    #[test]
    fn regeneration_flag_is_carried_into_jobs() {
        let mut config = config(0, 0);
        config.regenerate_uuids = false;
        let plan = plan_jobs(&config, &names(&["r.0.0.mca"])).unwrap();
        assert!(!plan.jobs[0].regenerate_uuids);
    }

    #[test]
    fn two_spellings_of_one_region_are_rejected() {
        for alias in ["r.-0.0.mca", "r.00.0.mca"] {
            let err = plan_jobs(&config(1, 0), &names(&["r.0.0.mca", alias])).unwrap_err();
            match err {
                ConfigError::DuplicateRegion {
                    region,
                    first,
                    second,
                } => {
                    assert_eq!(region, RegionPos::new(0, 0));
                    let mut paths = vec![first, second];
                    paths.sort();
                    let mut expected = vec![
                        PathBuf::from("world/region/r.0.0.mca"),
                        PathBuf::from("world/region").join(alias),
                    ];
                    expected.sort();
                    assert_eq!(paths, expected);
                }
                other => panic!("expected duplicate region, got {other:?}"),
            }
        }
    }

    #[test]
    fn output_equal_to_input_is_rejected() {
        let config = ShiftConfig::with_defaults("world/region", "world/region");
        let plan = plan_jobs(&config, &names(&["r.0.0.mca"])).unwrap();
        let err = reject_overlapping_paths(&plan.jobs, &FakeFs::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutputOverlapsInput { input, output }
                if input == output && output == Path::new("world/region/r.0.0.mca")
        ));
    }

    #[test]
    fn aliased_output_directory_is_rejected() {
        let plan = plan_jobs(&config(1, 0), &names(&["r.0.0.mca", "r.1.0.mca"])).unwrap();
        let mut fs = FakeFs::default();
        fs.aliases
            .insert(PathBuf::from("out/region"), PathBuf::from("world/region"));
        let err = reject_overlapping_paths(&plan.jobs, &fs).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutputOverlapsInput { input, output }
                if input == Path::new("world/region/r.1.0.mca")
                    && output == Path::new("out/region/r.1.0.mca")
        ));
    }

    #[test]
    fn shared_directory_without_overlap_is_allowed() {
        let config = {
            let mut config = ShiftConfig::with_defaults("world/region", "world/region");
            config.delta = ShiftDelta::from_regions(4, 0);
            config
        };
        let plan = plan_jobs(&config, &names(&["r.0.0.mca", "r.1.0.mca"])).unwrap();
        reject_overlapping_paths(&plan.jobs, &FakeFs::default()).unwrap();
    }

    fn conflict_fixture() -> (Vec<ShiftJob>, FakeFs) {
        let plan = plan_jobs(&config(5, 0), &names(&["r.0.0.mca", "r.1.0.mca"])).unwrap();
        let mut fs = FakeFs::default();
        fs.existing.insert(PathBuf::from("out/region/r.5.0.mca"));
        (plan.jobs, fs)
    }

    #[test]
    fn error_on_conflict_rejects_the_whole_batch() {
        let (jobs, fs) = conflict_fixture();
        let err = classify_conflicts(jobs, ConflictPolicy::ErrorOnConflict, &fs).unwrap_err();
        assert_eq!(err.existing, vec![PathBuf::from("out/region/r.5.0.mca")]);
    }

    #[test]
    fn keep_skips_existing_destinations() {
        let (jobs, fs) = conflict_fixture();
        let resolution = classify_conflicts(jobs, ConflictPolicy::Keep, &fs).unwrap();
        assert_eq!(resolution.runnable.len(), 1);
        assert_eq!(resolution.runnable[0].dest_region, RegionPos::new(6, 0));
        assert_eq!(
            resolution.preexisting,
            vec![PathBuf::from("out/region/r.5.0.mca")]
        );
    }

    #[test]
    fn clobber_runs_everything() {
        let (jobs, fs) = conflict_fixture();
        let resolution = classify_conflicts(jobs, ConflictPolicy::Clobber, &fs).unwrap();
        assert_eq!(resolution.runnable.len(), 2);
        assert!(resolution.preexisting.is_empty());
    }

    #[test]
    fn no_conflicts_passes_under_every_policy() {
        for policy in [
            ConflictPolicy::Keep,
            ConflictPolicy::Clobber,
            ConflictPolicy::ErrorOnConflict,
        ] {
            let plan = plan_jobs(&config(0, 0), &names(&["r.0.0.mca"])).unwrap();
            let resolution = classify_conflicts(plan.jobs, policy, &FakeFs::default()).unwrap();
            assert_eq!(resolution.runnable.len(), 1);
        }
    }
}
