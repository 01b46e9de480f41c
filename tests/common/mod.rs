//! Shared fixture-directory builders for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary fixture directory.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `<case>.in` and, when given, `<case>.out`.
    pub fn case(&self, name: &str, input: &str, expected: Option<&str>) -> &Self {
        fs::write(self.path().join(format!("{name}.in")), input).expect("write input");
        if let Some(expected) = expected {
            fs::write(self.path().join(format!("{name}.out")), expected).expect("write expected");
        }
        self
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// File names in the directory, sorted.
    pub fn listing(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path())
            .expect("read fixture dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// A shell script that expands `define(X,1)X` to `1`, standing in for a
/// macro processor.
pub const FAKE_EXPANDER: &str = "sed -e 's/define(X,1)X/1/'";
