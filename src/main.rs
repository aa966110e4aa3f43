mod cli;

use std::process::ExitCode;

use clap::Parser;
use region_shift::fs::LocalFilesystem;
use region_shift::shift::{run_shift, RandomUuids};

use crate::cli::Args;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(error) => {
            log::error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let mut uuids = RandomUuids::from_thread_rng();
    match run_shift(&config, &LocalFilesystem, &mut uuids) {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(summary) => {
            log::error!(
                "{} of {} region file(s) failed{}",
                summary.failures.len(),
                summary.found,
                if summary.halted { "; run halted" } else { "" }
            );
            ExitCode::FAILURE
        }
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}
