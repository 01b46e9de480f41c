//! Fixture execution.
//!
//! The runner follows a phase-based model per fixture:
//! 1. **Scratch**: create a uniquely named file for the transform's stdout
//! 2. **Transform**: spawn the external command and wait for it
//! 3. **Comparison**: byte-compare the scratch file with the expected output
//! 4. **Retention**: delete the scratch file, or move it next to the
//!    expected output when it should be kept
//!
//! [`run_all`] drives the phases for every discovered fixture under every
//! configured transform, sequentially or on a small worker pool, and always
//! returns results in discovery order (fixture first, then transform).

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

use crate::cancel::CancelFlag;
use crate::compare::{compare, DiffLine};
use crate::config::HarnessConfig;
use crate::discovery::{discover_fixtures, Fixture};
use crate::errors::HarnessResult;
use crate::scratch::ScratchOutput;
use crate::transform::{read_expected, Transform, TransformFailure};

// =============================================================================
// CORE TYPES
// =============================================================================

/// Terminal state of one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Output matched the expected file byte for byte.
    Pass,
    /// The transform succeeded but its output differs.
    Fail { reason: String, diff: Vec<DiffLine> },
    /// No output could be produced or compared.
    Error { reason: String },
    /// Output differs, but the input is marked as a known failure.
    ExpectedFailure,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail { .. } => "FAIL",
            Outcome::Error { .. } => "ERROR",
            Outcome::ExpectedFailure => "XFAIL",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Pass | Outcome::ExpectedFailure)
    }
}

/// The result of running one fixture through one transform.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub fixture: Fixture,
    /// The transform name; only set when the run has several transforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Where the actual output was kept, if it was.
    pub artifact: Option<PathBuf>,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl RunResult {
    /// `<case>` for single-transform runs, `<case>/<transform>` otherwise.
    pub fn id(&self) -> String {
        job_id(&self.fixture, self.transform.as_deref())
    }
}

fn job_id(fixture: &Fixture, transform: Option<&str>) -> String {
    match transform {
        Some(name) => format!("{}/{name}", fixture.name),
        None => fixture.name.clone(),
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub expected_failures: usize,
    pub interrupted: bool,
}

impl Summary {
    pub fn from_results(results: &[RunResult], interrupted: bool) -> Self {
        let mut summary = Summary {
            interrupted,
            ..Summary::default()
        };
        for r in results {
            match r.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail { .. } => summary.failed += 1,
                Outcome::Error { .. } => summary.errored += 1,
                Outcome::ExpectedFailure => summary.expected_failures += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored + self.expected_failures
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0 && !self.interrupted
    }
}

/// A transform as listed in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformInfo {
    pub name: String,
    pub command: String,
}

/// Everything a run produced, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub fixture_dir: PathBuf,
    pub transforms: Vec<TransformInfo>,
    pub summary: Summary,
    pub results: Vec<RunResult>,
}

/// A resolved transform together with its run label.
#[derive(Debug, Clone)]
pub struct NamedTransform {
    pub name: String,
    pub transform: Transform,
    /// Whether the xfail marker applies under this transform.
    pub xfail: bool,
}

/// Per-run settings shared by every fixture.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub transforms: Vec<NamedTransform>,
    pub scratch_dir: PathBuf,
    pub keep_temp: bool,
    pub xfail_marker: Option<String>,
    pub cancel: CancelFlag,
}

impl RunContext {
    /// Resolves the transforms and run policy from a config.
    ///
    /// Fails before any fixture is touched when a transform is missing.
    pub fn from_config(config: &HarnessConfig, cancel: CancelFlag) -> HarnessResult<Self> {
        config.validate()?;
        let timeout = config.timeout()?;
        let mut transforms = Vec::new();
        for spec in config.transforms()? {
            let program = spec.resolve()?;
            tracing::debug!(
                name = %spec.label(),
                program = %program.display(),
                "resolved transform"
            );
            transforms.push(NamedTransform {
                name: spec.label(),
                xfail: spec.xfail,
                transform: Transform::new(spec.clone(), program, timeout),
            });
        }
        Ok(Self {
            transforms,
            scratch_dir: config.scratch_dir(),
            keep_temp: config.keep_temp,
            xfail_marker: config.xfail_marker.clone(),
            cancel,
        })
    }

    /// The transform named in result ids and retained file names, if any.
    ///
    /// A single-transform run keeps plain `<case>` ids.
    fn tag<'a>(&self, named: &'a NamedTransform) -> Option<&'a str> {
        (self.transforms.len() > 1).then_some(named.name.as_str())
    }

    fn transform_infos(&self) -> Vec<TransformInfo> {
        self.transforms
            .iter()
            .map(|t| TransformInfo {
                name: t.name.clone(),
                command: t.transform.spec().display_command(),
            })
            .collect()
    }
}

// =============================================================================
// SINGLE FIXTURE
// =============================================================================

/// Runs one fixture through one transform and compares the result.
pub fn run_one(fixture: &Fixture, named: &NamedTransform, ctx: &RunContext) -> RunResult {
    let started = Instant::now();
    let (outcome, artifact) = execute(fixture, named, ctx);
    let result = RunResult {
        fixture: fixture.clone(),
        transform: ctx.tag(named).map(str::to_string),
        outcome,
        artifact,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        fixture = %result.id(),
        outcome = result.outcome.label(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "fixture finished"
    );
    result
}

fn execute(
    fixture: &Fixture,
    named: &NamedTransform,
    ctx: &RunContext,
) -> (Outcome, Option<PathBuf>) {
    let scratch = match ScratchOutput::create_in(&ctx.scratch_dir) {
        Ok(s) => s,
        Err(e) => return (error(format!("cannot create scratch output: {e}")), None),
    };

    // Any early return below drops `scratch`, which deletes it.
    if let Err(failure) = named.transform.run(fixture, &scratch, &ctx.cancel) {
        return (transform_error(failure), None);
    }

    let actual = match scratch.read() {
        Ok(bytes) => bytes,
        Err(e) => return (error(format!("cannot read scratch output: {e}")), None),
    };
    let expected = match read_expected(&fixture.expected) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                error(format!(
                    "cannot read expected output '{}': {e}",
                    fixture.expected.display()
                )),
                None,
            )
        }
    };

    let expect_failure =
        named.xfail && is_marked_failure(&fixture.input, ctx.xfail_marker.as_deref());
    let outcome = match (compare(&actual, &expected), expect_failure) {
        (None, false) => Outcome::Pass,
        (None, true) => Outcome::Fail {
            reason: "unexpected pass of a fixture marked as failing".to_string(),
            diff: Vec::new(),
        },
        (Some(_), true) => Outcome::ExpectedFailure,
        (Some(diff), false) => Outcome::Fail {
            reason: "output did not match expected".to_string(),
            diff,
        },
    };

    let actual_path = fixture.actual_path(ctx.tag(named));
    let retain = ctx.keep_temp || matches!(outcome, Outcome::Fail { .. });
    if !retain {
        remove_stale(&actual_path);
        return (outcome, None);
    }
    match scratch.retain(&actual_path) {
        Ok(path) => (outcome, Some(path)),
        Err(e) => {
            tracing::warn!(
                fixture = %job_id(fixture, ctx.tag(named)),
                error = %e,
                "could not retain actual output"
            );
            let outcome = match outcome {
                Outcome::Fail { reason, diff } => Outcome::Fail {
                    reason: format!("{reason}; actual output could not be kept: {e}"),
                    diff,
                },
                other => other,
            };
            (outcome, None)
        }
    }
}

fn error(reason: String) -> Outcome {
    Outcome::Error { reason }
}

fn transform_error(failure: TransformFailure) -> Outcome {
    error(failure.to_string())
}

fn is_marked_failure(input: &std::path::Path, marker: Option<&str>) -> bool {
    let Some(marker) = marker else {
        return false;
    };
    std::fs::read(input)
        .map(|bytes| {
            let first = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
            first.starts_with(marker.as_bytes())
        })
        .unwrap_or(false)
}

/// Removes an `.actual` file left by an earlier failing run.
fn remove_stale(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed stale actual output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove stale actual output"),
    }
}

// =============================================================================
// WHOLE RUN
// =============================================================================

/// One fixture paired with the index of the transform to run it through.
#[derive(Debug, Clone)]
struct Job {
    fixture: Fixture,
    transform: usize,
}

/// Discovers fixtures and runs each one through every transform.
///
/// The only errors returned are fatal ones: a bad config, a missing
/// transform or an unreadable fixture directory. Each is detected before any
/// fixture runs.
pub fn run_all(config: &HarnessConfig, cancel: CancelFlag) -> HarnessResult<Report> {
    let ctx = RunContext::from_config(config, cancel)?;
    let fixtures = discover_fixtures(
        &config.fixture_dir,
        &config.input_suffix,
        &config.output_suffix,
    )?;
    let filter = config.filter_regex()?;

    let mut jobs = Vec::with_capacity(fixtures.len() * ctx.transforms.len());
    for fixture in &fixtures {
        for (index, named) in ctx.transforms.iter().enumerate() {
            let id = job_id(fixture, ctx.tag(named));
            if filter.as_ref().map_or(true, |re| re.is_match(&id)) {
                jobs.push(Job {
                    fixture: fixture.clone(),
                    transform: index,
                });
            }
        }
    }

    let workers = config.worker_count().min(jobs.len().max(1));
    tracing::info!(
        fixtures = fixtures.len(),
        transforms = ctx.transforms.len(),
        jobs = jobs.len(),
        workers,
        "starting run"
    );

    let results = if workers <= 1 {
        run_sequential(&jobs, &ctx)
    } else {
        run_parallel(jobs, Arc::new(ctx.clone()), workers)
    };

    let summary = Summary::from_results(&results, ctx.cancel.is_cancelled());
    Ok(Report {
        fixture_dir: config.fixture_dir.clone(),
        transforms: ctx.transform_infos(),
        summary,
        results,
    })
}

fn run_job(job: &Job, ctx: &RunContext) -> RunResult {
    run_one(&job.fixture, &ctx.transforms[job.transform], ctx)
}

fn run_sequential(jobs: &[Job], ctx: &RunContext) -> Vec<RunResult> {
    let mut results = Vec::with_capacity(jobs.len());
    for job in jobs {
        if ctx.cancel.is_cancelled() {
            break;
        }
        results.push(run_job(job, ctx));
    }
    results
}

fn run_parallel(jobs: Vec<Job>, ctx: Arc<RunContext>, workers: usize) -> Vec<RunResult> {
    let (job_tx, job_rx) = bounded::<(usize, Job)>(workers * 2);
    let (result_tx, result_rx) = bounded::<(usize, RunResult)>(workers * 2);

    let handles: Vec<_> = (0..workers)
        .map(|worker_id| {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || run_worker(worker_id, job_rx, result_tx, ctx))
        })
        .collect();
    drop(job_rx);
    drop(result_tx);

    let total = jobs.len();
    let feeder_ctx = Arc::clone(&ctx);
    let feeder = thread::spawn(move || {
        for job in jobs.into_iter().enumerate() {
            if feeder_ctx.cancel.is_cancelled() || job_tx.send(job).is_err() {
                break;
            }
        }
    });

    let mut indexed: Vec<(usize, RunResult)> = result_rx.iter().collect();

    if feeder.join().is_err() {
        tracing::error!("fixture feeder panicked");
    }
    for (i, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            tracing::error!(worker = i, "worker panicked");
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    if indexed.len() < total && !ctx.cancel.is_cancelled() {
        tracing::warn!(
            expected = total,
            received = indexed.len(),
            "some fixtures produced no result"
        );
    }
    indexed.into_iter().map(|(_, r)| r).collect()
}

fn run_worker(
    worker_id: usize,
    jobs: Receiver<(usize, Job)>,
    results: Sender<(usize, RunResult)>,
    ctx: Arc<RunContext>,
) {
    tracing::debug!(worker = worker_id, "worker started");
    for (index, job) in jobs.iter() {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let result = run_job(&job, &ctx);
        if results.send((index, result)).is_err() {
            break;
        }
    }
    tracing::debug!(worker = worker_id, "worker finished");
}
