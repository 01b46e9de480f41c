//! Defines the command-line arguments for the goldrun CLI.
//!
//! Running `goldrun` with harness options runs the regression suite; the
//! `annotate` subcommand exposes the sentinel line-number rewrite.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::annotate::DEFAULT_SENTINEL;
use crate::config::{HarnessConfig, InputMode, TransformSpec};
use crate::errors::{HarnessError, HarnessResult};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "goldrun",
    version,
    about = "Run an external transform over fixture inputs and diff against golden outputs.",
    args_conflicts_with_subcommands = true
)]
pub struct GoldrunArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replace sentinel tokens with the number of the following line.
    Annotate {
        /// Token to replace.
        #[arg(long, default_value = DEFAULT_SENTINEL)]
        sentinel: String,
        /// File to annotate; stdin when omitted.
        file: Option<PathBuf>,
    },
}

/// Options for a harness run. Each one overrides the config file.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Directory holding `<case>.<input-suffix>` / `<case>.<output-suffix>` pairs.
    #[arg(long)]
    pub fixture_dir: Option<PathBuf>,

    /// Transform executable; bare names are looked up on PATH.
    #[arg(long)]
    pub transform_cmd: Option<String>,

    /// Argument passed to the transform (repeatable). `{input}` is replaced
    /// by the fixture path in argument mode.
    #[arg(long = "transform-arg", allow_hyphen_values = true)]
    pub transform_args: Vec<String>,

    /// Named transform as `NAME=PROGRAM [ARG...]` (repeatable). Every
    /// fixture runs through each one and is reported as `<case>/<NAME>`.
    #[arg(long = "transform", value_name = "NAME=COMMAND")]
    pub transforms: Vec<String>,

    /// How the fixture input reaches the transform.
    #[arg(long, value_enum)]
    pub input_mode: Option<InputMode>,

    #[arg(long)]
    pub input_suffix: Option<String>,

    #[arg(long)]
    pub output_suffix: Option<String>,

    /// Keep the actual output of every fixture next to its expected file.
    #[arg(long)]
    pub keep_temp: bool,

    /// Number of fixtures run at once; 0 uses one worker per CPU.
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Per-fixture timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Only run fixtures whose name matches this regex.
    #[arg(long, value_name = "REGEX")]
    pub filter: Option<String>,

    /// Inputs whose first line starts with this prefix are expected to fail.
    #[arg(long, value_name = "PREFIX")]
    pub xfail_marker: Option<String>,

    /// Limit the xfail marker to this transform (repeatable).
    #[arg(long = "xfail-transform", value_name = "NAME")]
    pub xfail_transforms: Vec<String>,

    /// YAML config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON report to this path.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Print passing fixtures and debug logs.
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long)]
    pub no_color: bool,
}

impl RunArgs {
    /// Builds the harness config: file values first, then flags.
    pub fn to_config(&self) -> HarnessResult<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_yaml_file(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(dir) = &self.fixture_dir {
            config.fixture_dir = dir.clone();
        }

        let flag_transforms = self.flag_transforms()?;
        if !flag_transforms.is_empty() {
            config.transform = None;
            config.transforms = flag_transforms;
        } else if !self.transform_args.is_empty() {
            match config.transform.as_mut() {
                Some(spec) => spec.args = self.transform_args.clone(),
                None => {
                    return Err(HarnessError::config_with_help(
                        "--transform-arg given without a transform",
                        "add --transform-cmd",
                    ))
                }
            }
        }
        if let Some(mode) = self.input_mode {
            config.transforms_mut().for_each(|spec| spec.input_mode = mode);
        }
        if !self.xfail_transforms.is_empty() {
            self.scope_xfail(&mut config)?;
        }

        if let Some(suffix) = &self.input_suffix {
            config.input_suffix = suffix.clone();
        }
        if let Some(suffix) = &self.output_suffix {
            config.output_suffix = suffix.clone();
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if self.filter.is_some() {
            config.filter = self.filter.clone();
        }
        if self.xfail_marker.is_some() {
            config.xfail_marker = self.xfail_marker.clone();
        }
        config.keep_temp |= self.keep_temp;
        config.verbose |= self.verbose;
        if self.no_color {
            config.use_colors = false;
        }
        Ok(config)
    }

    /// Transforms given on the command line; they replace the file's.
    fn flag_transforms(&self) -> HarnessResult<Vec<TransformSpec>> {
        let mut specs = Vec::new();
        if let Some(program) = &self.transform_cmd {
            let mut spec = TransformSpec::new(program.clone());
            spec.args = self.transform_args.clone();
            specs.push(spec);
        } else if !self.transform_args.is_empty() && !self.transforms.is_empty() {
            return Err(HarnessError::config_with_help(
                "--transform-arg only applies to --transform-cmd",
                "put the arguments after the program in --transform NAME=COMMAND",
            ));
        }
        for raw in &self.transforms {
            specs.push(TransformSpec::parse_named(raw)?);
        }
        Ok(specs)
    }

    fn scope_xfail(&self, config: &mut HarnessConfig) -> HarnessResult<()> {
        let known: Vec<String> = config.transforms_mut().map(|spec| spec.label()).collect();
        if let Some(unknown) = self.xfail_transforms.iter().find(|n| !known.contains(*n)) {
            return Err(HarnessError::config_with_help(
                format!("--xfail-transform names unknown transform '{unknown}'"),
                format!("configured transforms: {}", known.join(", ")),
            ));
        }
        for spec in config.transforms_mut() {
            spec.xfail = self.xfail_transforms.contains(&spec.label());
        }
        Ok(())
    }
}
