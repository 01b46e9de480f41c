//! User-facing output for a finished run.
//!
//! Passing fixtures are silent unless verbose output is requested. Failures
//! print their label, name and diff; errors print a label and the reason
//! only, since there is no actual output to diff.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::compare::DiffLine;
use crate::errors::{HarnessError, HarnessResult};
use crate::runner::{Outcome, Report, RunResult, Summary};

/// Prints a report to stdout.
pub fn print_report(report: &Report, verbose: bool, use_colors: bool) -> io::Result<()> {
    let choice = if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    write_report(&mut stdout, report, verbose)
}

pub fn write_report<W: WriteColor>(out: &mut W, report: &Report, verbose: bool) -> io::Result<()> {
    for result in &report.results {
        write_result(out, result, verbose)?;
    }
    write_summary(out, &report.summary)
}

fn label_color(outcome: &Outcome) -> Color {
    match outcome {
        Outcome::Pass => Color::Green,
        Outcome::Fail { .. } => Color::Red,
        Outcome::Error { .. } => Color::Magenta,
        Outcome::ExpectedFailure => Color::Yellow,
    }
}

fn write_label<W: WriteColor>(out: &mut W, outcome: &Outcome) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(label_color(outcome))).set_bold(true))?;
    write!(out, "{}", outcome.label())?;
    out.reset()
}

pub fn write_result<W: WriteColor>(out: &mut W, result: &RunResult, verbose: bool) -> io::Result<()> {
    let name = result.id();
    match &result.outcome {
        Outcome::Pass if !verbose => Ok(()),
        Outcome::Pass | Outcome::ExpectedFailure => {
            write_label(out, &result.outcome)?;
            writeln!(out, ": {name}")
        }
        Outcome::Fail { reason, diff } => {
            write_label(out, &result.outcome)?;
            writeln!(out, ": {name} ({reason})")?;
            if let Some(path) = &result.artifact {
                writeln!(out, "  actual output kept at {}", path.display())?;
            }
            write_diff(out, result, diff)
        }
        Outcome::Error { reason } => {
            write_label(out, &result.outcome)?;
            writeln!(out, ": {name}: {reason}")
        }
    }
}

fn write_diff<W: WriteColor>(out: &mut W, result: &RunResult, diff: &[DiffLine]) -> io::Result<()> {
    if diff.is_empty() {
        return Ok(());
    }
    writeln!(out, "--- actual")?;
    writeln!(out, "+++ {}", result.fixture.expected.display())?;
    for line in diff {
        match line {
            DiffLine::Same(text) => {
                out.reset()?;
                writeln!(out, " {text}")?;
            }
            DiffLine::Removed(text) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                writeln!(out, "-{text}")?;
            }
            DiffLine::Added(text) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                writeln!(out, "+{text}")?;
            }
        }
    }
    out.reset()
}

pub fn write_summary<W: WriteColor>(out: &mut W, summary: &Summary) -> io::Result<()> {
    write!(
        out,
        "\n{} passed, {} failed, {} errored",
        summary.passed, summary.failed, summary.errored
    )?;
    if summary.expected_failures > 0 {
        write!(out, ", {} expected failures", summary.expected_failures)?;
    }
    writeln!(out)?;
    if summary.interrupted {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(out, "run interrupted")?;
        out.reset()?;
    }
    Ok(())
}

/// Writes the report as pretty JSON.
pub fn write_json_report(report: &Report, path: &Path) -> HarnessResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| HarnessError::config(format!("cannot serialize report: {e}")))?;
    fs::write(path, json).map_err(|e| HarnessError::io(path, e))
}
