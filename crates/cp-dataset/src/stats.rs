//! Per-project and per-label counts of an existing pairs CSV.

use cp_core::model::PairRecord;
use cp_parser::bug_key_of;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub pairs: usize,
    /// Rows whose uid has no BugKey.
    pub malformed_uids: usize,
    pub bugs: usize,
    /// Pairs per project.
    pub projects: BTreeMap<String, usize>,
    /// Pairs per label, as written in the file.
    pub labels: BTreeMap<String, usize>,
}

pub fn summarize(records: &[PairRecord]) -> DatasetStats {
    let mut stats = DatasetStats {
        pairs: records.len(),
        ..DatasetStats::default()
    };
    let mut bugs = BTreeSet::new();
    for record in records {
        *stats.labels.entry(record.expert_label.clone()).or_default() += 1;
        match bug_key_of(&record.uid) {
            Ok(bug) => {
                *stats.projects.entry(bug.project.clone()).or_default() += 1;
                bugs.insert(bug);
            }
            Err(_) => stats.malformed_uids += 1,
        }
    }
    stats.bugs = bugs.len();
    stats
}
