//! Bug identity from patch uids.
//!
//! Candidate patches are named `{source}-defects4j-{Project}-{BugID}-{Tool}-{Identifier}`,
//! ground-truth patches `defects4j-{Project}-{BugID}-developer`.

use cp_core::model::{BugKey, PatchRef};
use regex::Regex;
use std::sync::OnceLock;

/// Tool name carried by ground-truth patches.
pub const GROUND_TRUTH_TOOL: &str = "developer";

/// A uid without a usable `defects4j-{Project}-{BugID}` segment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed uid {uid:?}: {reason}")]
pub struct MalformedUidError {
    pub uid: String,
    pub reason: &'static str,
}

fn bug_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|-)(?i:defects4j)-([A-Za-z][A-Za-z0-9]*)-(\d+)(?:-|$)").unwrap()
    })
}

/// Parse the `(Project, BugID)` identity out of a uid.
pub fn bug_key_of(uid: &str) -> Result<BugKey, MalformedUidError> {
    split_uid(uid).map(|parts| parts.bug)
}

/// Parse a uid into a [`PatchRef`].
pub fn patch_ref(uid: &str) -> Result<PatchRef, MalformedUidError> {
    Ok(PatchRef {
        uid: uid.to_string(),
        bug: bug_key_of(uid)?,
    })
}

/// All named components of a uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidParts {
    /// Producer of the patch set (`arja`, `tbar`, ...). Absent for ground truth.
    pub source: Option<String>,
    pub bug: BugKey,
    pub tool: Option<String>,
    pub identifier: Option<String>,
}

impl UidParts {
    pub fn is_ground_truth(&self) -> bool {
        self.tool.as_deref() == Some(GROUND_TRUTH_TOOL)
    }
}

/// Split a uid into its components.
pub fn split_uid(uid: &str) -> Result<UidParts, MalformedUidError> {
    let malformed = |reason| MalformedUidError {
        uid: uid.to_string(),
        reason,
    };

    let trimmed = uid.trim();
    let Some(caps) = bug_segment_re().captures(trimmed) else {
        let reason = if trimmed.to_ascii_lowercase().contains("defects4j-") {
            "missing or non-numeric bug id"
        } else {
            "missing defects4j segment"
        };
        return Err(malformed(reason));
    };

    let (Some(whole), Some(project), Some(bug_id)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Err(malformed("missing defects4j segment"));
    };
    let bug_id: u32 = bug_id
        .as_str()
        .parse()
        .map_err(|_| malformed("bug id out of range"))?;

    let prefix = &trimmed[..whole.start()];
    let source = (!prefix.is_empty()).then(|| prefix.to_string());

    let rest = &trimmed[whole.end()..];
    let (tool, identifier) = match rest.rsplit_once('-') {
        _ if rest.is_empty() => (None, None),
        Some((tool, id)) => (Some(tool.to_string()), Some(id.to_string())),
        None => (Some(rest.to_string()), None),
    };

    Ok(UidParts {
        source,
        bug: BugKey::new(project.as_str(), bug_id),
        tool,
        identifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_uid() {
        let parts = split_uid("arja-defects4j-Math-11-jGenProg-3").unwrap();
        assert_eq!(parts.source.as_deref(), Some("arja"));
        assert_eq!(parts.bug, BugKey::new("Math", 11));
        assert_eq!(parts.tool.as_deref(), Some("jGenProg"));
        assert_eq!(parts.identifier.as_deref(), Some("3"));
        assert!(!parts.is_ground_truth());
    }

    #[test]
    fn test_ground_truth_uid() {
        let parts = split_uid("defects4j-Closure-102-developer").unwrap();
        assert_eq!(parts.source, None);
        assert_eq!(parts.bug, BugKey::new("Closure", 102));
        assert!(parts.is_ground_truth());
        assert_eq!(parts.identifier, None);
    }

    #[test]
    fn test_hyphenated_source() {
        let key = bug_key_of("repair-them-all-defects4j-Lang-7-Nopol-1").unwrap();
        assert_eq!(key, BugKey::new("Lang", 7));
    }

    #[test]
    fn test_missing_bug_id() {
        let err = bug_key_of("defects4j-Math-developer").unwrap_err();
        assert_eq!(err.reason, "missing or non-numeric bug id");
        assert_eq!(err.uid, "defects4j-Math-developer");
    }

    #[test]
    fn test_missing_segment() {
        let err = bug_key_of("arja-Math-11-jGenProg-1").unwrap_err();
        assert_eq!(err.reason, "missing defects4j segment");
        assert!(bug_key_of("").is_err());
    }

    #[test]
    fn test_bug_id_overflow() {
        let err = bug_key_of("defects4j-Math-99999999999-developer").unwrap_err();
        assert_eq!(err.reason, "bug id out of range");
    }

    #[test]
    fn test_digits_must_end_segment() {
        // `11a` is not a bug id.
        assert!(bug_key_of("x-defects4j-Math-11a-tool-1").is_err());
    }

    #[test]
    fn test_patch_ref() {
        let r = patch_ref("tbar-defects4j-Chart-1-TBar-1").unwrap();
        assert_eq!(r.project(), "Chart");
        assert_eq!(r.bug_id(), 1);
        assert_eq!(r.uid, "tbar-defects4j-Chart-1-TBar-1");
    }
}
