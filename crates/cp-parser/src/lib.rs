//! Patch parsing: unified diffs to modified-method sets, and bug identity
//! from patch uids.
//!
//! [`parse`] is a pure function of the diff text. Method boundaries are found
//! with per-language regex heuristics (see [`methods`]).

pub mod bugkey;
pub mod diff;
pub mod languages;
pub mod methods;

pub use bugkey::{MalformedUidError, bug_key_of, patch_ref};
pub use diff::ParseError;

use cp_core::model::ModifiedMethod;
use languages::Language;
use std::collections::BTreeSet;
use std::path::Path;

/// What one patch touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchMethods {
    /// Source files (recognized languages only) with a file header in the diff.
    pub files: BTreeSet<String>,
    pub methods: BTreeSet<ModifiedMethod>,
}

impl PatchMethods {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Method names with file paths stripped.
    pub fn method_names(&self) -> BTreeSet<&str> {
        self.methods.iter().map(|m| m.method.as_str()).collect()
    }
}

/// Parse a unified diff into the source files and methods it modifies.
pub fn parse(diff_text: &str) -> Result<PatchMethods, ParseError> {
    let mut out = PatchMethods::default();
    for file in diff::parse_unified_diff(diff_text)? {
        let Some(path) = file.path() else {
            continue;
        };
        if Language::from_path(path).is_none() {
            tracing::trace!(path, "skipping non-source file");
            continue;
        }
        out.files.insert(path.to_string());
        out.methods.extend(methods::file_methods(&file));
    }
    Ok(out)
}

/// Read and parse a patch file. Invalid UTF-8 is replaced, not rejected.
pub fn parse_file(path: &Path) -> Result<PatchMethods, ParseError> {
    let bytes = std::fs::read(path).map_err(|e| ParseError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse(&String::from_utf8_lossy(&bytes))
}
