//! goldrun: a golden-file regression harness.
//!
//! Fixtures are `<case>.in` / `<case>.out` pairs in a directory. Each input
//! is fed to one or more external transforms, each stdout is compared byte
//! for byte with the expected file, and every case ends as pass, fail or
//! error.
//!
//! ```rust,no_run
//! use goldrun::{run_all, CancelFlag, HarnessConfig, TransformSpec};
//!
//! let config = HarnessConfig::new("test", TransformSpec::new("m4"));
//! let report = run_all(&config, CancelFlag::manual()).expect("fatal harness error");
//! if !report.summary.all_passed() {
//!     std::process::exit(1);
//! }
//! ```

pub mod annotate;
pub mod cancel;
pub mod cli;
pub mod compare;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod logging;
pub mod report;
pub mod runner;
pub mod scratch;
pub mod transform;

pub use crate::cancel::CancelFlag;
pub use crate::config::{HarnessConfig, InputMode, TransformSpec};
pub use crate::discovery::{discover_fixtures, Fixture};
pub use crate::errors::{HarnessError, HarnessResult};
pub use crate::runner::{
    run_all, run_one, NamedTransform, Outcome, Report, RunContext, RunResult, Summary,
    TransformInfo,
};
