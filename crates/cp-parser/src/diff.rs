//! Unified diff reader.
//!
//! Splits a diff body into per-file sections and hunks. Hunk bodies are consumed
//! by the line counts in their `@@ -l,c +l,c @@` header, so a removed line that
//! happens to start with `---` is never mistaken for a file header.

use regex::Regex;
use std::sync::OnceLock;

/// Errors raised for diff text that cannot be read as a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("diff is empty")]
    Empty,
    #[error("hunk at line {line} has no preceding `---`/`+++` file header")]
    MissingFileHeader { line: usize },
    #[error("malformed hunk header at line {line}: {text:?}")]
    MalformedHunkHeader { line: usize, text: String },
    #[error(
        "truncated hunk {header:?}: expected -{expected_old}/+{expected_new} lines, saw -{seen_old}/+{seen_new}"
    )]
    TruncatedHunk {
        header: String,
        expected_old: usize,
        expected_new: usize,
        seen_old: usize,
        seen_new: usize,
    },
    #[error("cannot read patch {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Removed(String),
    Added(String),
}

impl HunkLine {
    pub fn text(&self) -> &str {
        match self {
            Self::Context(t) | Self::Removed(t) | Self::Added(t) => t,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Context(_))
    }
}

/// A `@@` hunk with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Text after the closing `@@` (git's function-context trailer), trimmed.
    pub section: String,
    pub lines: Vec<HunkLine>,
}

/// All hunks for one file header pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path from the `---` header with `a/` stripped; `None` for `/dev/null`.
    pub old_path: Option<String>,
    /// Path from the `+++` header with `b/` stripped; `None` for `/dev/null`.
    pub new_path: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// The path this file is known by after the patch, falling back to the
    /// old path for deletions.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }
}

fn hunk_header_re() -> &'static Regex {
    static HUNK_RE: OnceLock<Regex> = OnceLock::new();
    HUNK_RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$").unwrap()
    })
}

/// Strip the `a/`/`b/` prefix and any trailing timestamp from a header path.
fn header_path(rest: &str) -> Option<String> {
    let raw = rest.split('\t').next().unwrap_or(rest).trim();
    let raw = raw.trim_matches('"');
    if raw.is_empty() || raw == "/dev/null" {
        return None;
    }
    let path = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(path.to_string())
}

struct HunkBuilder {
    hunk: Hunk,
    header: String,
    seen_old: usize,
    seen_new: usize,
}

impl HunkBuilder {
    fn is_complete(&self) -> bool {
        self.seen_old >= self.hunk.old_count && self.seen_new >= self.hunk.new_count
    }

    fn push(&mut self, line: HunkLine) {
        match line {
            HunkLine::Context(_) => {
                self.seen_old += 1;
                self.seen_new += 1;
            }
            HunkLine::Removed(_) => self.seen_old += 1,
            HunkLine::Added(_) => self.seen_new += 1,
        }
        self.hunk.lines.push(line);
    }

    fn finish(self) -> Result<Hunk, ParseError> {
        if !self.is_complete() {
            return Err(ParseError::TruncatedHunk {
                header: self.header,
                expected_old: self.hunk.old_count,
                expected_new: self.hunk.new_count,
                seen_old: self.seen_old,
                seen_new: self.seen_new,
            });
        }
        Ok(self.hunk)
    }
}

fn parse_hunk_header(line: &str, line_no: usize) -> Result<HunkBuilder, ParseError> {
    let malformed = || ParseError::MalformedHunkHeader {
        line: line_no,
        text: line.to_string(),
    };
    let caps = hunk_header_re().captures(line).ok_or_else(malformed)?;
    let num = |idx: usize, default: usize| -> Result<usize, ParseError> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().map_err(|_| malformed()),
            None => Ok(default),
        }
    };

    Ok(HunkBuilder {
        hunk: Hunk {
            old_start: num(1, 0)?,
            old_count: num(2, 1)?,
            new_start: num(3, 0)?,
            new_count: num(4, 1)?,
            section: caps.get(5).map_or("", |m| m.as_str()).trim().to_string(),
            lines: Vec::new(),
        },
        header: line.to_string(),
        seen_old: 0,
        seen_new: 0,
    })
}

/// Parse a unified diff body into file sections.
///
/// Lines outside hunks that are not file headers (`diff --git`, `index`,
/// mode lines, commit messages) are ignored.
pub fn parse_unified_diff(text: &str) -> Result<Vec<FileDiff>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut files: Vec<FileDiff> = Vec::new();
    let mut pending_old: Option<Option<String>> = None;
    let mut current: Option<HunkBuilder> = None;

    let lines: Vec<&str> = text.lines().collect();
    for (idx, &line) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if let Some(builder) = current.as_mut() {
            // A `---`/`+++` pair is the next file's header, even inside an
            // over-counted body.
            let next_file = line.starts_with("--- ")
                && lines.get(idx + 1).is_some_and(|next| next.starts_with("+++ "));
            if !builder.is_complete() && !next_file {
                let body = match line.chars().next() {
                    Some('+') => Some(HunkLine::Added(line[1..].to_string())),
                    Some('-') => Some(HunkLine::Removed(line[1..].to_string())),
                    Some(' ') => Some(HunkLine::Context(line[1..].to_string())),
                    // Some tools drop the leading space of blank context lines.
                    None => Some(HunkLine::Context(String::new())),
                    Some('\\') => continue, // "\ No newline at end of file"
                    Some(_) => None,
                };
                if let Some(body) = body {
                    builder.push(body);
                    continue;
                }
            } else if line.starts_with('\\') {
                continue;
            }
            // Body exhausted (or interrupted): close the hunk.
            let hunk = current.take().map(HunkBuilder::finish).transpose()?;
            if let (Some(hunk), Some(file)) = (hunk, files.last_mut()) {
                file.hunks.push(hunk);
            }
        }

        if let Some(rest) = line.strip_prefix("--- ") {
            pending_old = Some(header_path(rest));
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let Some(old_path) = pending_old.take() else {
                return Err(ParseError::MissingFileHeader { line: line_no });
            };
            files.push(FileDiff {
                old_path,
                new_path: header_path(rest),
                hunks: Vec::new(),
            });
        } else if line.starts_with("@@") {
            if files.is_empty() || pending_old.is_some() {
                return Err(ParseError::MissingFileHeader { line: line_no });
            }
            current = Some(parse_hunk_header(line, line_no)?);
        }
    }

    if let Some(builder) = current.take() {
        let hunk = builder.finish()?;
        if let Some(file) = files.last_mut() {
            file.hunks.push(hunk);
        }
    }

    if pending_old.is_some() {
        return Err(ParseError::MissingFileHeader { line: lines.len() });
    }
    if files.is_empty() {
        return Err(ParseError::MissingFileHeader { line: 1 });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/src/Foo.java b/src/Foo.java
index 1111111..2222222 100644
--- a/src/Foo.java
+++ b/src/Foo.java
@@ -10,2 +10,2 @@ public class Foo {
     int a = 1;
-    int b = 2;
+    int b = 3;
@@ -40,2 +40,3 @@ public int calculate(int x) {
     x++;
+    x--;
     return x;
--- a/src/Bar.java
+++ b/src/Bar.java
@@ -1 +1 @@
-old
+new
";

    #[test]
    fn test_parses_files_and_hunks() {
        let files = parse_unified_diff(TWO_FILES).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path(), Some("src/Foo.java"));
        assert_eq!(files[0].hunks.len(), 2);
        assert_eq!(files[0].hunks[0].old_start, 10);
        assert_eq!(files[0].hunks[0].section, "public class Foo {");
        assert_eq!(files[0].hunks[1].section, "public int calculate(int x) {");
        assert_eq!(files[0].hunks[1].lines.len(), 3);
        assert_eq!(files[1].path(), Some("src/Bar.java"));
        assert_eq!(files[1].hunks[0].old_count, 1);
    }

    #[test]
    fn test_removed_line_starting_with_dashes_stays_in_body() {
        let diff = "\
--- a/A.java
+++ b/A.java
@@ -1,2 +1,1 @@
---x;
 y;
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hunks[0].lines[0], HunkLine::Removed("--x;".to_string()));
    }

    #[test]
    fn test_dev_null_side_uses_other_path() {
        let diff = "\
--- /dev/null
+++ b/src/New.java
@@ -0,0 +1,1 @@
+class New {}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].old_path, None);
        assert_eq!(files[0].path(), Some("src/New.java"));
    }

    #[test]
    fn test_header_timestamp_is_stripped() {
        let diff = "\
--- src/A.java\t2017-01-01 00:00:00.000000000 +0000
+++ src/A.java\t2017-01-02 00:00:00.000000000 +0000
@@ -1 +1 @@
-a
+b
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].path(), Some("src/A.java"));
    }

    #[test]
    fn test_blank_context_line_without_space() {
        let diff = "--- a/A.java\n+++ b/A.java\n@@ -1,3 +1,3 @@\n a\n\n-b\n+c\n";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].hunks[0].lines.len(), 4);
    }

    #[test]
    fn test_no_newline_marker_is_skipped() {
        let diff = "--- a/A.java\n+++ b/A.java\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n\\ No newline at end of file\n";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn test_empty_diff_is_error() {
        assert_eq!(parse_unified_diff("  \n"), Err(ParseError::Empty));
    }

    #[test]
    fn test_hunk_without_header_is_error() {
        let err = parse_unified_diff("@@ -1 +1 @@\n-a\n+b\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingFileHeader { line: 1 }));
    }

    #[test]
    fn test_old_header_without_new_header_is_error() {
        let err = parse_unified_diff("--- a/A.java\n@@ -1 +1 @@\n-a\n+b\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingFileHeader { .. }));
    }

    #[test]
    fn test_truncated_hunk_is_error() {
        let diff = "--- a/A.java\n+++ b/A.java\n@@ -1,5 +1,5 @@\n a\n-b\n+c\n";
        let err = parse_unified_diff(diff).unwrap_err();
        assert!(matches!(
            err,
            ParseError::TruncatedHunk {
                expected_old: 5,
                seen_old: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_overcounted_hunk_stops_at_next_file_header() {
        let diff = "\
--- a/A.java
+++ b/A.java
@@ -1,4 +1,4 @@
 a
-b
+c
--- a/B.java
+++ b/B.java
@@ -1,1 +1,1 @@
-x
+y
";
        let err = parse_unified_diff(diff).unwrap_err();
        assert!(matches!(
            err,
            ParseError::TruncatedHunk {
                expected_old: 4,
                seen_old: 2,
                seen_new: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_hunk_header_is_error() {
        let diff = "--- a/A.java\n+++ b/A.java\n@@ -x +1 @@\n";
        let err = parse_unified_diff(diff).unwrap_err();
        assert!(matches!(err, ParseError::MalformedHunkHeader { line: 3, .. }));
    }

    #[test]
    fn test_text_without_headers_is_error() {
        let err = parse_unified_diff("just some notes\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingFileHeader { .. }));
    }
}
