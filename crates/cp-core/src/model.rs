//! Data model for labeled patch pairs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single benchmark defect: (project, bug id).
///
/// Dedup scope: method-set collisions are only compared within one BugKey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BugKey {
    pub project: String,
    pub bug_id: u32,
}

impl BugKey {
    pub fn new(project: impl Into<String>, bug_id: u32) -> Self {
        Self {
            project: project.into(),
            bug_id,
        }
    }
}

impl fmt::Display for BugKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.bug_id)
    }
}

/// A patch file, identified by its filename stem.
///
/// The stem encodes source, project, bug id, tool and variant, e.g.
/// `arja-defects4j-Math-11-jGenProg-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchRef {
    pub uid: String,
    pub bug: BugKey,
}

impl PatchRef {
    pub fn project(&self) -> &str {
        &self.bug.project
    }

    pub fn bug_id(&self) -> u32 {
        self.bug.bug_id
    }

    /// File name of this patch inside the patches directory.
    pub fn file_name(&self, extension: &str) -> String {
        if extension.is_empty() {
            self.uid.clone()
        } else {
            format!("{}.{}", self.uid, extension.trim_start_matches('.'))
        }
    }
}

/// A method whose body is touched by at least one diff hunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifiedMethod {
    pub file_path: String,
    pub method: String,
}

impl ModifiedMethod {
    pub fn new(file_path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            method: method.into(),
        }
    }

    /// Enclosing class, taken from the file stem (`src/org/Foo.java` → `Foo`).
    pub fn class_name(&self) -> &str {
        class_name_of(&self.file_path)
    }

    /// `Class::method`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.class_name(), self.method)
    }
}

/// File stem of a (possibly slash-separated) source path.
pub fn class_name_of(file_path: &str) -> &str {
    let file = file_path.rsplit('/').next().unwrap_or(file_path);
    match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    }
}

/// Expert-assigned clone type for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CloneLabel {
    #[serde(rename = "type-1")]
    Type1,
    #[serde(rename = "type-2")]
    Type2,
    #[serde(rename = "type-3")]
    Type3,
    #[serde(rename = "type-4")]
    Type4,
    #[serde(rename = "not-clone")]
    NotClone,
    #[serde(rename = "unlabeled")]
    Unlabeled,
}

impl CloneLabel {
    pub const ALL: [CloneLabel; 6] = [
        CloneLabel::Type1,
        CloneLabel::Type2,
        CloneLabel::Type3,
        CloneLabel::Type4,
        CloneLabel::NotClone,
        CloneLabel::Unlabeled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type1 => "type-1",
            Self::Type2 => "type-2",
            Self::Type3 => "type-3",
            Self::Type4 => "type-4",
            Self::NotClone => "not-clone",
            Self::Unlabeled => "unlabeled",
        }
    }

    /// Position in [`CloneLabel::ALL`], for dense per-label counters.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CloneLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized `expert_label` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown expert label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for CloneLabel {
    type Err = UnknownLabel;

    /// Accepts the canonical spellings plus common variants
    /// (`Type-1`, `type1`, `type_1`, `not_clone`, empty = unlabeled).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        match normalized.as_str() {
            "type1" | "t1" => Ok(Self::Type1),
            "type2" | "t2" => Ok(Self::Type2),
            "type3" | "t3" => Ok(Self::Type3),
            "type4" | "t4" => Ok(Self::Type4),
            "notclone" | "nonclone" | "noclone" => Ok(Self::NotClone),
            "" | "unlabeled" | "unlabelled" => Ok(Self::Unlabeled),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

/// One CSV row as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    pub uid: String,
    pub groundtruth_index: String,
    pub expert_label: String,
}

/// A labeled pair linking a candidate patch to its ground-truth patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchPair {
    /// Zero-based position among the well-formed input rows.
    pub row: usize,
    pub uid: PatchRef,
    pub groundtruth: PatchRef,
    pub label: CloneLabel,
}

impl PatchPair {
    /// Bug this pair belongs to (the candidate side's key).
    pub fn bug(&self) -> &BugKey {
        &self.uid.bug
    }

    pub fn project(&self) -> &str {
        self.uid.project()
    }

    /// Both sides address the same defect.
    pub fn is_same_bug(&self) -> bool {
        self.uid.bug == self.groundtruth.bug
    }

    pub fn to_record(&self) -> PairRecord {
        PairRecord {
            uid: self.uid.uid.clone(),
            groundtruth_index: self.groundtruth.uid.clone(),
            expert_label: self.label.as_str().to_string(),
        }
    }
}

/// Canonical, order-independent encoding of a pair's combined method footprint.
///
/// `Unresolved` carries the pair's row so that two unresolved pairs never
/// compare equal: each forms its own dedup group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MethodSetSignature {
    Resolved(Vec<String>),
    Unresolved { row: usize },
}

impl MethodSetSignature {
    /// Build from unsorted, possibly repeated entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<String> = entries.into_iter().map(Into::into).collect();
        items.sort();
        items.dedup();
        Self::Resolved(items)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Stable string form, e.g. `Foo::bar|Foo::calculate`.
    pub fn encode(&self) -> String {
        match self {
            Self::Resolved(items) => items.join("|"),
            Self::Unresolved { row } => format!("<unresolved:{}>", row),
        }
    }
}

impl fmt::Display for MethodSetSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Side of the project-disjoint partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}
