//! One representative pair per `(BugKey, MethodSetSignature)`.

use crate::grouper::GroupKey;
use cp_core::model::PatchPair;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// A pair with its dedup key attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedPair {
    pub pair: PatchPair,
    pub key: GroupKey,
}

/// A pair dropped because an earlier pair had the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duplicate {
    pub row: usize,
    pub kept_row: usize,
}

#[derive(Debug, Default)]
pub struct Deduplicated {
    /// Survivors, in input order.
    pub kept: Vec<KeyedPair>,
    pub removed: Vec<Duplicate>,
}

/// Keep the first pair of every key, in input order.
pub fn dedupe(pairs: Vec<KeyedPair>) -> Deduplicated {
    let mut first_seen: HashMap<GroupKey, usize> = HashMap::with_capacity(pairs.len());
    let mut out = Deduplicated::default();

    for keyed in pairs {
        match first_seen.entry(keyed.key.clone()) {
            Entry::Occupied(kept) => {
                tracing::debug!(
                    row = keyed.pair.row,
                    kept_row = *kept.get(),
                    bug = %keyed.key.bug,
                    "duplicate pair"
                );
                out.removed.push(Duplicate {
                    row: keyed.pair.row,
                    kept_row: *kept.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(keyed.pair.row);
                out.kept.push(keyed);
            }
        }
    }
    out
}
