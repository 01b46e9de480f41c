//! Fixture discovery.
//!
//! A fixture is a pair of files `<case>.<input_suffix>` and
//! `<case>.<output_suffix>` living directly in the fixture directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::ACTUAL_SUFFIX;
use crate::errors::{HarnessError, HarnessResult};

/// Longest file name accepted by common filesystems, in bytes.
const MAX_FILE_NAME: usize = 255;
/// Hex digits of the name digest kept when a retained name is shortened.
const DIGEST_LEN: usize = 12;

/// A paired input/expected-output test case on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fixture {
    /// The case identifier, i.e. the file name without the input suffix.
    pub name: String,
    pub input: PathBuf,
    pub expected: PathBuf,
}

impl Fixture {
    /// Path where a retained actual output for this fixture is placed.
    ///
    /// This is `<expected>.actual`, or `<expected>.<transform>.actual` when
    /// the run has several transforms. A name that would not fit on disk is
    /// cut short and tagged with a digest of the full name.
    pub fn actual_path(&self, transform: Option<&str>) -> PathBuf {
        let expected = self
            .expected
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = match transform {
            Some(tag) => format!("{expected}.{tag}"),
            None => expected,
        };
        let name = format!("{stem}.{ACTUAL_SUFFIX}");
        if name.len() <= MAX_FILE_NAME {
            return self.expected.with_file_name(name);
        }

        let digest = format!("{:x}", Sha256::digest(stem.as_bytes()));
        let mut keep = MAX_FILE_NAME - DIGEST_LEN - ACTUAL_SUFFIX.len() - 2;
        while !stem.is_char_boundary(keep) {
            keep -= 1;
        }
        self.expected.with_file_name(format!(
            "{}-{}.{ACTUAL_SUFFIX}",
            &stem[..keep],
            &digest[..DIGEST_LEN]
        ))
    }
}

/// Discovers fixtures in `fixture_dir`.
///
/// Only regular files directly inside the directory are considered, either
/// plain or reached through a symlink. The returned list is sorted by file
/// name so runs are deterministic.
pub fn discover_fixtures(
    fixture_dir: &Path,
    input_suffix: &str,
    output_suffix: &str,
) -> HarnessResult<Vec<Fixture>> {
    // WalkDir reports a missing root only when iterated; check up front so
    // the error names the directory itself.
    fs::read_dir(fixture_dir).map_err(|source| HarnessError::Discovery {
        dir: fixture_dir.to_path_buf(),
        source,
    })?;

    let input_ext = format!(".{input_suffix}");
    let mut fixtures = Vec::new();
    for entry in WalkDir::new(fixture_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| HarnessError::Walk {
            dir: fixture_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        // `DirEntry::file_type` describes a symlink itself; follow it here so
        // linked inputs count while dangling links are skipped.
        if !entry.path().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        let Some(case) = file_name.strip_suffix(&input_ext) else {
            continue;
        };
        if case.is_empty() {
            continue;
        }
        fixtures.push(Fixture {
            name: case.to_string(),
            input: entry.path().to_path_buf(),
            expected: fixture_dir.join(format!("{case}.{output_suffix}")),
        });
    }
    fixtures.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(
        dir = %fixture_dir.display(),
        count = fixtures.len(),
        "discovered fixtures"
    );
    Ok(fixtures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn pairs_inputs_with_expected_paths_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        for name in ["b.in", "b.out", "a.in", "a.out", "notes.txt", "c.in"] {
            touch(dir.path(), name);
        }
        let fixtures = discover_fixtures(dir.path(), "in", "out").unwrap();
        let names: Vec<_> = fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(fixtures[0].expected, dir.path().join("a.out"));
        // c has no expected file; it is still a fixture.
        assert_eq!(fixtures[2].expected, dir.path().join("c.out"));
    }

    #[test]
    fn ignores_subdirectories_and_bare_suffix() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested.in")).unwrap();
        touch(dir.path(), ".in");
        touch(dir.path(), "x.input");
        let fixtures = discover_fixtures(dir.path(), "in", "out").unwrap();
        assert!(fixtures.is_empty());
    }

    #[test]
    fn custom_suffixes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "case.m4");
        touch(dir.path(), "case.golden");
        let fixtures = discover_fixtures(dir.path(), "m4", "golden").unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].expected, dir.path().join("case.golden"));
    }

    #[test]
    fn missing_directory_is_a_discovery_error() {
        let dir = TempDir::new().unwrap();
        let err = discover_fixtures(&dir.path().join("nope"), "in", "out").unwrap_err();
        assert!(err.is_discovery());
    }

    #[test]
    fn actual_path_sits_next_to_expected() {
        let fixture = Fixture {
            name: "a".into(),
            input: PathBuf::from("t/a.in"),
            expected: PathBuf::from("t/a.out"),
        };
        assert_eq!(fixture.actual_path(None), PathBuf::from("t/a.out.actual"));
        assert_eq!(
            fixture.actual_path(Some("parser")),
            PathBuf::from("t/a.out.parser.actual")
        );
    }

    #[test]
    fn overlong_actual_name_is_shortened() {
        let case = "x".repeat(250);
        let fixture = Fixture {
            name: case.clone(),
            input: PathBuf::from(format!("t/{case}.in")),
            expected: PathBuf::from(format!("t/{case}.out")),
        };
        let path = fixture.actual_path(None);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), MAX_FILE_NAME);
        assert!(name.starts_with("xxxx"));
        assert!(name.ends_with(".actual"));
        assert_eq!(path.parent(), Some(Path::new("t")));

        // Distinct transforms still get distinct shortened names.
        assert_ne!(
            fixture.actual_path(Some("m4")),
            fixture.actual_path(Some("parser"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_input_is_discovered() {
        let dir = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("real.in"), "x\n").unwrap();
        std::os::unix::fs::symlink(source.path().join("real.in"), dir.path().join("a.in"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling.in"))
            .unwrap();
        touch(dir.path(), "a.out");
        let fixtures = discover_fixtures(dir.path(), "in", "out").unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].name, "a");
        assert_eq!(fixtures[0].input, dir.path().join("a.in"));
    }
}
