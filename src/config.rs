//! Harness configuration.
//!
//! Everything the harness needs is carried by an explicit [`HarnessConfig`]:
//! the fixture layout, the transform command and the run policy. Nothing is
//! discovered from the environment except the `PATH` lookup of a bare
//! transform name, which happens once before any fixture runs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};
use crate::scratch::ScratchOutput;

pub const DEFAULT_FIXTURE_DIR: &str = "test";
pub const DEFAULT_INPUT_SUFFIX: &str = "in";
pub const DEFAULT_OUTPUT_SUFFIX: &str = "out";
/// Appended to the expected-output path when a failing output is retained.
pub const ACTUAL_SUFFIX: &str = "actual";
/// Placeholder replaced by the fixture input path in argument mode.
pub const INPUT_PLACEHOLDER: &str = "{input}";

// =============================================================================
// TRANSFORM
// =============================================================================

/// How the fixture input reaches the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// The input file is connected to the transform's stdin.
    #[default]
    Stdin,
    /// The input path is passed on the command line.
    Argument,
}

/// The external command under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformSpec {
    /// Label used in results and retained file names. Defaults to the
    /// program's file name.
    #[serde(default)]
    pub name: Option<String>,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub input_mode: InputMode,
    /// Whether the xfail marker applies to fixtures run through this
    /// transform.
    #[serde(default = "default_true")]
    pub xfail: bool,
}

fn default_true() -> bool {
    true
}

impl TransformSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            name: None,
            program: program.into(),
            args: Vec::new(),
            input_mode: InputMode::default(),
            xfail: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn xfail(mut self, applies: bool) -> Self {
        self.xfail = applies;
        self
    }

    /// The name results are reported under.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => Path::new(&self.program)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.program.clone()),
        }
    }

    /// Parses the `NAME=PROGRAM [ARG...]` form used on the command line.
    ///
    /// The command is split on whitespace; arguments containing spaces need
    /// the config file.
    pub fn parse_named(raw: &str) -> HarnessResult<Self> {
        let usage = "expected NAME=PROGRAM [ARG...], e.g. parser=python3 m4.py";
        let Some((name, command)) = raw.split_once('=') else {
            return Err(HarnessError::config_with_help(
                format!("invalid transform '{raw}'"),
                usage,
            ));
        };
        let name = name.trim();
        let mut words = command.split_whitespace();
        let program = match words.next() {
            Some(program) if !name.is_empty() => program,
            _ => {
                return Err(HarnessError::config_with_help(
                    format!("invalid transform '{raw}'"),
                    usage,
                ))
            }
        };
        let mut spec = TransformSpec::new(program).named(name);
        spec.args = words.map(str::to_string).collect();
        Ok(spec)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    /// Locates the transform executable.
    ///
    /// A program containing a path separator is checked as given; a bare name
    /// is searched for on `PATH`.
    pub fn resolve(&self) -> HarnessResult<PathBuf> {
        let not_found = || HarnessError::TransformNotFound {
            program: self.program.clone(),
        };
        if self.program.is_empty() {
            return Err(not_found());
        }

        let candidate = Path::new(&self.program);
        if candidate.components().count() > 1 || candidate.is_absolute() {
            return if is_executable(candidate) {
                Ok(candidate.to_path_buf())
            } else {
                Err(not_found())
            };
        }

        let path_var = env::var_os("PATH").ok_or_else(not_found)?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(&self.program))
            .find(|p| is_executable(p))
            .ok_or_else(not_found)
    }

    /// Builds the argument list for one input file.
    pub fn args_for(&self, input: &Path) -> Vec<String> {
        match self.input_mode {
            InputMode::Stdin => self.args.clone(),
            InputMode::Argument => {
                let input = input.display().to_string();
                let mut substituted = false;
                let mut args: Vec<String> = self
                    .args
                    .iter()
                    .map(|a| {
                        if a.contains(INPUT_PLACEHOLDER) {
                            substituted = true;
                            a.replace(INPUT_PLACEHOLDER, &input)
                        } else {
                            a.clone()
                        }
                    })
                    .collect();
                if !substituted {
                    args.push(input);
                }
                args
            }
        }
    }

    /// Shell-like rendering used in logs and reports.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// =============================================================================
// HARNESS CONFIG
// =============================================================================

/// Configuration for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub fixture_dir: PathBuf,
    pub input_suffix: String,
    pub output_suffix: String,
    pub transform: Option<TransformSpec>,
    /// Further transforms; every fixture runs through each one.
    pub transforms: Vec<TransformSpec>,
    /// Where scratch files are created. Defaults to the fixture directory
    /// when it is writable, so retained outputs can be renamed into place.
    pub scratch_dir: Option<PathBuf>,
    /// Retain the actual output of every fixture, not only failing ones.
    pub keep_temp: bool,
    /// Worker count; 1 runs sequentially, 0 uses one worker per CPU.
    pub parallel: usize,
    pub timeout_secs: Option<f64>,
    /// Regex matched against fixture names.
    pub filter: Option<String>,
    /// First-line prefix marking an input as a known failure.
    pub xfail_marker: Option<String>,
    pub verbose: bool,
    pub use_colors: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixture_dir: PathBuf::from(DEFAULT_FIXTURE_DIR),
            input_suffix: DEFAULT_INPUT_SUFFIX.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            transform: None,
            transforms: Vec::new(),
            scratch_dir: None,
            keep_temp: false,
            parallel: 1,
            timeout_secs: None,
            filter: None,
            xfail_marker: None,
            verbose: false,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl HarnessConfig {
    pub fn new(fixture_dir: impl Into<PathBuf>, transform: TransformSpec) -> Self {
        Self {
            fixture_dir: fixture_dir.into(),
            transform: Some(transform),
            ..Self::default()
        }
    }

    /// Loads a config from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> HarnessResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            HarnessError::Config { message, help } => HarnessError::Config {
                message: format!("{}: {}", path.display(), message),
                help,
            },
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(content).map_err(|e| HarnessError::config(e.to_string()))
    }

    /// Every configured transform, in run order.
    pub fn transforms(&self) -> HarnessResult<Vec<&TransformSpec>> {
        let all: Vec<_> = self.transform.iter().chain(&self.transforms).collect();
        if all.is_empty() {
            return Err(HarnessError::config_with_help(
                "no transform command configured",
                "pass --transform-cmd or --transform, or set `transform.program` in the config file",
            ));
        }
        Ok(all)
    }

    /// Mutable access to every configured transform.
    pub fn transforms_mut(&mut self) -> impl Iterator<Item = &mut TransformSpec> {
        self.transform.iter_mut().chain(self.transforms.iter_mut())
    }

    pub fn timeout(&self) -> HarnessResult<Option<Duration>> {
        match self.timeout_secs {
            None => Ok(None),
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| HarnessError::config(format!("invalid timeout {secs}: {e}"))),
            Some(secs) => Err(HarnessError::config(format!(
                "timeout must be positive, got {secs}"
            ))),
        }
    }

    pub fn filter_regex(&self) -> HarnessResult<Option<Regex>> {
        self.filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| HarnessError::config(format!("invalid filter '{pattern}': {e}")))
            })
            .transpose()
    }

    pub fn worker_count(&self) -> usize {
        match self.parallel {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Directory for scratch files.
    ///
    /// An explicit `scratch_dir` wins. Otherwise the fixture directory is
    /// used when a file can be created there, and the system temp directory
    /// when it cannot.
    pub fn scratch_dir(&self) -> PathBuf {
        if let Some(dir) = &self.scratch_dir {
            return dir.clone();
        }
        match ScratchOutput::create_in(&self.fixture_dir) {
            Ok(_) => self.fixture_dir.clone(),
            Err(e) => {
                let fallback = env::temp_dir();
                tracing::debug!(
                    dir = %self.fixture_dir.display(),
                    error = %e,
                    fallback = %fallback.display(),
                    "fixture directory not writable, using temp dir for scratch files"
                );
                fallback
            }
        }
    }

    /// Rejects suffix settings that would make fixture pairing ambiguous.
    pub fn validate(&self) -> HarnessResult<()> {
        for (label, suffix) in [
            ("input", &self.input_suffix),
            ("output", &self.output_suffix),
        ] {
            if suffix.is_empty() || suffix.contains('/') {
                return Err(HarnessError::config(format!(
                    "invalid {label} suffix '{suffix}'"
                )));
            }
        }
        if self.input_suffix == self.output_suffix {
            return Err(HarnessError::config(
                "input and output suffixes must differ",
            ));
        }
        self.timeout()?;
        self.filter_regex()?;

        let mut seen = std::collections::HashSet::new();
        for spec in self.transform.iter().chain(&self.transforms) {
            let label = spec.label();
            if label.is_empty() || label.contains('/') {
                return Err(HarnessError::config(format!(
                    "invalid transform name '{label}'"
                )));
            }
            if !seen.insert(label.clone()) {
                return Err(HarnessError::config_with_help(
                    format!("transform name '{label}' is used twice"),
                    "give each transform a distinct `name`",
                ));
            }
        }
        Ok(())
    }
}
