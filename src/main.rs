mod cache;
mod cli;
mod clipper;
mod io;
mod joiner;
mod logging;
mod outside;
mod pipeline;
mod report;
mod result;
mod settings;
mod types;

use std::{panic, process::ExitCode};

use clap::Parser;
use tracing::{debug, error};

use crate::{
    cli::Args,
    logging::{init_logging, level_for},
    outside::SystemRunner,
    pipeline::{plan, Outcome, Pipeline},
    settings::Settings,
};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = init_logging(level_for(args.verbose)) {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }

    // Anything unexpected still ends the process with the failure status
    match panic::catch_unwind(move || run(args)) {
        Ok(code) => code,
        Err(_) => {
            error!("An unexpected error occurred");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> ExitCode {
    debug!("{args:?}");

    let settings = match Settings::load(args) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        }
    };
    debug!("{settings:?}");

    if settings.dry_run {
        return match plan(&settings) {
            Ok(entries) => {
                report::log_plan(&entries);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{:?}", miette::Report::new(err));
                ExitCode::FAILURE
            }
        };
    }

    let paths = match settings.path_translator() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        }
    };

    let result = Pipeline::new(&settings, &SystemRunner, paths.as_ref()).run();
    report::log_summary(&result, &settings);

    let status = result.exit_status();
    if let Outcome::Aborted(err) = result.outcome {
        eprintln!("{:?}", miette::Report::new(err));
    }
    ExitCode::from(status)
}
