//! The goldrun command-line interface.
//!
//! This module parses arguments, installs logging and the interrupt handler,
//! and maps the run outcome onto the process exit code.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use clap::Parser;
use miette::Report;

use crate::annotate::Annotator;
use crate::cancel::CancelFlag;
use crate::cli::args::{Command, GoldrunArgs, RunArgs};
use crate::errors::{HarnessError, HarnessResult};
use crate::logging;
use crate::report::{print_report, write_json_report};
use crate::runner::{run_all, Summary};

pub mod args;

pub const EXIT_OK: i32 = 0;
/// At least one fixture failed or errored.
pub const EXIT_FAILURES: i32 = 1;
/// Bad configuration, missing transform or unreadable fixture directory.
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

/// The main entry point for the CLI. Returns the process exit code.
pub fn run() -> i32 {
    let args = GoldrunArgs::parse();
    logging::init(args.run.verbose);

    let result = match args.command {
        Some(Command::Annotate { sentinel, file }) => {
            handle_annotate(&sentinel, file.as_deref()).map(|()| EXIT_OK)
        }
        None => handle_run(&args.run),
    };

    result.unwrap_or_else(|e| {
        print_error(e);
        EXIT_FATAL
    })
}

pub fn print_error(error: HarnessError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

/// Maps a run summary to an exit code.
pub fn exit_code(summary: &Summary) -> i32 {
    if summary.interrupted {
        EXIT_INTERRUPTED
    } else if summary.all_passed() {
        EXIT_OK
    } else {
        EXIT_FAILURES
    }
}

fn handle_run(args: &RunArgs) -> HarnessResult<i32> {
    let config = args.to_config()?;
    let cancel = CancelFlag::with_ctrlc_handler();
    let report = run_all(&config, cancel)?;

    print_report(&report, config.verbose, config.use_colors)
        .map_err(|e| HarnessError::io("<stdout>", e))?;
    if let Some(path) = &args.report {
        write_json_report(&report, path)?;
    }
    Ok(exit_code(&report.summary))
}

fn handle_annotate(sentinel: &str, file: Option<&Path>) -> HarnessResult<()> {
    let annotator = Annotator::new(sentinel)?;
    let text = match file {
        Some(path) => fs::read(path).map_err(|e| HarnessError::io(path, e))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| HarnessError::io("<stdin>", e))?;
            buf
        }
    };
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&annotator.apply(&text))
        .and_then(|()| stdout.flush())
        .map_err(|e| HarnessError::io("<stdout>", e))
}
