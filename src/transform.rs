//! Running the external transform for one fixture.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cancel::CancelFlag;
use crate::config::{InputMode, TransformSpec};
use crate::discovery::Fixture;
use crate::scratch::ScratchOutput;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const STDERR_EXCERPT_LINES: usize = 20;

/// Why a transform produced no usable output.
#[derive(Debug, Error)]
pub enum TransformFailure {
    #[error("cannot open input: {0}")]
    Input(std::io::Error),
    #[error("failed to launch transform: {0}")]
    Launch(std::io::Error),
    #[error("transform exited with status {code}{}", stderr_suffix(.stderr))]
    Exit { code: i32, stderr: String },
    #[error("transform terminated by signal{}", stderr_suffix(.stderr))]
    Signal { stderr: String },
    #[error("transform timed out after {0:?}")]
    TimedOut(Duration),
    #[error("transform interrupted")]
    Interrupted,
    #[error("I/O error while running transform: {0}")]
    Io(std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}

/// A resolved transform ready to be spawned.
#[derive(Debug, Clone)]
pub struct Transform {
    spec: TransformSpec,
    program: std::path::PathBuf,
    timeout: Option<Duration>,
}

impl Transform {
    pub fn new(spec: TransformSpec, program: std::path::PathBuf, timeout: Option<Duration>) -> Self {
        Self {
            spec,
            program,
            timeout,
        }
    }

    pub fn spec(&self) -> &TransformSpec {
        &self.spec
    }

    /// Runs the transform over `fixture.input`, writing stdout to `scratch`.
    pub fn run(
        &self,
        fixture: &Fixture,
        scratch: &ScratchOutput,
        cancel: &CancelFlag,
    ) -> Result<(), TransformFailure> {
        let stdout = scratch.writer().map_err(TransformFailure::Io)?;
        let mut stderr_file = tempfile::tempfile().map_err(TransformFailure::Io)?;
        let stderr = stderr_file.try_clone().map_err(TransformFailure::Io)?;

        let stdin = match self.spec.input_mode {
            InputMode::Stdin => {
                Stdio::from(File::open(&fixture.input).map_err(TransformFailure::Input)?)
            }
            InputMode::Argument => Stdio::null(),
        };

        let mut command = Command::new(&self.program);
        command
            .args(self.spec.args_for(&fixture.input))
            .stdin(stdin)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        tracing::debug!(
            fixture = %fixture.name,
            command = %self.spec.display_command(),
            "spawning transform"
        );
        let mut child = command.spawn().map_err(TransformFailure::Launch)?;
        // Release the parent's copies of the child's stdio handles.
        drop(command);

        let status = wait_for_child(&mut child, self.timeout, cancel)?;
        if status.success() {
            return Ok(());
        }
        let excerpt = read_excerpt(&mut stderr_file);
        match status.code() {
            Some(code) => Err(TransformFailure::Exit {
                code,
                stderr: excerpt,
            }),
            None => Err(TransformFailure::Signal { stderr: excerpt }),
        }
    }
}

/// Polls `child` until it exits, the timeout expires or the run is cancelled.
fn wait_for_child(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel: &CancelFlag,
) -> Result<ExitStatus, TransformFailure> {
    let started_at = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if cancel.is_cancelled() {
                    kill(child);
                    return Err(TransformFailure::Interrupted);
                }
                if let Some(limit) = timeout {
                    if started_at.elapsed() >= limit {
                        kill(child);
                        return Err(TransformFailure::TimedOut(limit));
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill(child);
                return Err(TransformFailure::Io(e));
            }
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_excerpt(file: &mut File) -> String {
    let mut buf = Vec::new();
    if file.seek(SeekFrom::Start(0)).is_err() || file.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    let text = String::from_utf8_lossy(&buf);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_EXCERPT_LINES);
    lines[start..].join("\n")
}

/// Reads the expected output of a fixture.
pub fn read_expected(path: &Path) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(input: &str) -> (TempDir, Fixture) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.in"), input).unwrap();
        let fixture = Fixture {
            name: "a".into(),
            input: dir.path().join("a.in"),
            expected: dir.path().join("a.out"),
        };
        (dir, fixture)
    }

    fn sh(script: &str, timeout: Option<Duration>) -> Transform {
        let spec = TransformSpec::new("sh").arg("-c").arg(script);
        let program = spec.resolve().unwrap();
        Transform::new(spec, program, timeout)
    }

    #[test]
    fn stdin_is_piped_to_stdout_file() {
        let (dir, fixture) = setup("hello\n");
        let scratch = ScratchOutput::create_in(dir.path()).unwrap();
        sh("cat", None)
            .run(&fixture, &scratch, &CancelFlag::manual())
            .unwrap();
        assert_eq!(scratch.read().unwrap(), b"hello\n");
    }

    #[test]
    fn argument_mode_passes_path() {
        let (dir, fixture) = setup("from file\n");
        let spec = TransformSpec::new("cat").input_mode(InputMode::Argument);
        let program = spec.resolve().unwrap();
        let scratch = ScratchOutput::create_in(dir.path()).unwrap();
        Transform::new(spec, program, None)
            .run(&fixture, &scratch, &CancelFlag::manual())
            .unwrap();
        assert_eq!(scratch.read().unwrap(), b"from file\n");
    }

    #[test]
    fn nonzero_exit_reports_stderr() {
        let (dir, fixture) = setup("");
        let scratch = ScratchOutput::create_in(dir.path()).unwrap();
        let err = sh("echo boom >&2; exit 3", None)
            .run(&fixture, &scratch, &CancelFlag::manual())
            .unwrap_err();
        match err {
            TransformFailure::Exit { code, stderr } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn hang_is_cut_off_by_timeout() {
        let (dir, fixture) = setup("");
        let scratch = ScratchOutput::create_in(dir.path()).unwrap();
        let started = Instant::now();
        let err = sh("exec sleep 5", Some(Duration::from_millis(200)))
            .run(&fixture, &scratch, &CancelFlag::manual())
            .unwrap_err();
        assert!(matches!(err, TransformFailure::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn cancelled_run_kills_child() {
        let (dir, fixture) = setup("");
        let scratch = ScratchOutput::create_in(dir.path()).unwrap();
        let cancel = CancelFlag::manual();
        cancel.trigger();
        let err = sh("exec sleep 5", None)
            .run(&fixture, &scratch, &cancel)
            .unwrap_err();
        assert!(matches!(err, TransformFailure::Interrupted));
    }
}
