//! Byte-exact comparison and diagnostic diffs.

use difference::{Changeset, Difference};
use serde::Serialize;

/// One line of a diff between actual and expected output.
///
/// `Removed` lines appear only in the actual output, `Added` lines only in
/// the expected output, mirroring `diff actual expected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum DiffLine {
    Same(String),
    Removed(String),
    Added(String),
}

/// Compares two outputs byte for byte.
///
/// Returns `None` when they are identical, otherwise the line diff. The diff
/// is never empty for differing inputs: when the bytes differ in a way the
/// line view cannot show (invalid UTF-8), a single note line is returned.
pub fn compare(actual: &[u8], expected: &[u8]) -> Option<Vec<DiffLine>> {
    if actual == expected {
        return None;
    }
    let actual_text = String::from_utf8_lossy(actual);
    let expected_text = String::from_utf8_lossy(expected);
    let changeset = Changeset::new(&actual_text, &expected_text, "\n");

    let mut lines = Vec::new();
    for diff in changeset.diffs {
        match diff {
            Difference::Same(text) => push_lines(&mut lines, &text, DiffLine::Same),
            Difference::Rem(text) => push_lines(&mut lines, &text, DiffLine::Removed),
            Difference::Add(text) => push_lines(&mut lines, &text, DiffLine::Added),
        }
    }
    if lines.iter().all(|l| matches!(l, DiffLine::Same(_))) {
        lines.push(DiffLine::Removed(format!(
            "binary difference: actual {} bytes, expected {} bytes",
            actual.len(),
            expected.len()
        )));
    }
    Some(lines)
}

fn push_lines(out: &mut Vec<DiffLine>, chunk: &str, make: fn(String) -> DiffLine) {
    // Changeset joins consecutive lines of the same kind with the separator.
    out.extend(chunk.split('\n').map(|l| make(l.to_string())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_have_no_diff() {
        assert_eq!(compare(b"1\n", b"1\n"), None);
        assert_eq!(compare(b"", b""), None);
    }

    #[test]
    fn mismatch_shows_actual_as_removed() {
        let diff = compare(b"1", b"2").unwrap();
        assert_eq!(
            diff,
            vec![DiffLine::Removed("1".into()), DiffLine::Added("2".into())]
        );
    }

    #[test]
    fn unchanged_context_is_kept() {
        let diff = compare(b"a\nb\nc", b"a\nx\nc").unwrap();
        assert!(diff.contains(&DiffLine::Same("a".into())));
        assert!(diff.contains(&DiffLine::Removed("b".into())));
        assert!(diff.contains(&DiffLine::Added("x".into())));
        assert!(diff.contains(&DiffLine::Same("c".into())));
    }

    #[test]
    fn trailing_newline_difference_is_visible() {
        let diff = compare(b"1\n", b"1").unwrap();
        assert!(diff
            .iter()
            .any(|l| !matches!(l, DiffLine::Same(_))));
    }

    #[test]
    fn invalid_utf8_difference_is_reported() {
        let diff = compare(&[0xff], &[0xfe]).unwrap();
        assert!(!diff.is_empty());
        assert!(diff.iter().any(|l| matches!(l, DiffLine::Removed(_))));
    }
}
