//! Per-pair dedup keys: the pair's BugKey plus the canonical union of the
//! methods both of its patches modify.

use crate::cache::PatchCache;
use cp_core::config::{DedupConfig, Granularity};
use cp_core::model::{BugKey, MethodSetSignature, ModifiedMethod, PatchPair, class_name_of};
use cp_parser::PatchMethods;
use std::collections::BTreeSet;

/// Dedup key of one pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub bug: BugKey,
    pub signature: MethodSetSignature,
}

impl GroupKey {
    pub fn is_resolved(&self) -> bool {
        self.signature.is_resolved()
    }
}

fn method_entry(method: &ModifiedMethod, granularity: Granularity) -> String {
    match granularity {
        Granularity::Method => method.method.clone(),
        Granularity::Class => method.qualified_name(),
        Granularity::File => format!("{}::{}", method.file_path, method.method),
    }
}

/// Marks fallback entries; a file-only footprint must never equal a method
/// footprint (field edits in `Config.java` vs. a `Config` constructor).
const FILE_ENTRY_PREFIX: &str = "file:";

fn file_entry(path: &str, granularity: Granularity) -> String {
    match granularity {
        Granularity::Method | Granularity::Class => {
            format!("{FILE_ENTRY_PREFIX}{}", class_name_of(path))
        }
        Granularity::File => format!("{FILE_ENTRY_PREFIX}{path}"),
    }
}

/// Signature of the union of `sides`. `None` when nothing usable was found.
pub fn union_signature(sides: &[&PatchMethods], config: &DedupConfig) -> Option<MethodSetSignature> {
    let mut entries: BTreeSet<String> = sides
        .iter()
        .flat_map(|side| side.methods.iter())
        .map(|m| method_entry(m, config.granularity))
        .collect();

    if entries.is_empty() && config.fallback_to_files {
        entries = sides
            .iter()
            .flat_map(|side| side.files.iter())
            .map(|f| file_entry(f, config.granularity))
            .collect();
    }

    (!entries.is_empty()).then(|| MethodSetSignature::from_entries(entries))
}

/// Compute the dedup key of `pair`, parsing its patches through `cache`.
///
/// A side whose patch failed to parse contributes nothing. When both sides
/// failed, or neither yields a method or file, the pair is unresolved and gets
/// a signature unique to its row.
pub fn group_key(pair: &PatchPair, cache: &PatchCache, config: &DedupConfig) -> GroupKey {
    let uid_side = cache.get(&pair.uid);
    let gt_side = cache.get(&pair.groundtruth);

    let parsed: Vec<&PatchMethods> = [&*uid_side, &*gt_side]
        .into_iter()
        .filter_map(|outcome| outcome.as_ref().ok())
        .collect();

    let signature = union_signature(&parsed, config).unwrap_or_else(|| {
        tracing::debug!(row = pair.row, uid = %pair.uid.uid, "pair has no resolvable methods");
        MethodSetSignature::Unresolved { row: pair.row }
    });

    GroupKey {
        bug: pair.bug().clone(),
        signature,
    }
}
