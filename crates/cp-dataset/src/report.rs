//! Run summary written next to the output CSVs.

use cp_core::model::{CloneLabel, PatchPair};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-label pair counts for each output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub all: usize,
    pub train: usize,
    pub test: usize,
}

/// Counts from one `build` run. Recoverable problems (bad rows, unparsable
/// patches, split imbalance) end up here instead of failing the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub pairs_read: usize,
    pub malformed_rows: usize,
    pub malformed_uids: usize,
    pub unknown_labels: usize,
    pub cross_bug_pairs: usize,
    pub patches_parsed: usize,
    pub patch_parse_failures: usize,
    pub unresolved_pairs: usize,
    pub dropped_unresolved: usize,
    pub duplicates_removed: usize,
    pub pairs_kept: usize,
    pub train_pairs: usize,
    pub test_pairs: usize,
    pub train_projects: Vec<String>,
    pub test_projects: Vec<String>,
    pub target_train_fraction: f64,
    pub achieved_train_fraction: f64,
    pub labels: BTreeMap<String, LabelCounts>,
    pub warnings: Vec<String>,
    pub generated_at: String,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    /// Fill the per-label table from the three outputs.
    pub fn count_labels(&mut self, all: &[PatchPair], train: &[PatchPair], test: &[PatchPair]) {
        let mut labels: BTreeMap<String, LabelCounts> = BTreeMap::new();
        let mut bump = |pairs: &[PatchPair], field: fn(&mut LabelCounts) -> &mut usize| {
            for pair in pairs {
                *field(labels.entry(pair.label.as_str().to_string()).or_default()) += 1;
            }
        };
        bump(all, |c| &mut c.all);
        bump(train, |c| &mut c.train);
        bump(test, |c| &mut c.test);
        self.labels = labels;
    }

    /// Human-readable summary, one line per entry.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("pairs read:            {}", self.pairs_read),
            format!("  malformed rows:      {}", self.malformed_rows),
            format!("  malformed uids:      {}", self.malformed_uids),
            format!("  unknown labels:      {}", self.unknown_labels),
            format!("  cross-bug pairs:     {}", self.cross_bug_pairs),
            format!(
                "patches parsed:        {} ({} failed)",
                self.patches_parsed, self.patch_parse_failures
            ),
            format!(
                "unresolved pairs:      {} ({} dropped)",
                self.unresolved_pairs, self.dropped_unresolved
            ),
            format!("duplicates removed:    {}", self.duplicates_removed),
            format!("pairs kept:            {}", self.pairs_kept),
            format!(
                "train / test:          {} / {} (fraction {:.3}, target {:.3})",
                self.train_pairs,
                self.test_pairs,
                self.achieved_train_fraction,
                self.target_train_fraction
            ),
            format!("train projects:        {}", self.train_projects.join(", ")),
            format!("test projects:         {}", self.test_projects.join(", ")),
        ];
        for label in CloneLabel::ALL {
            if let Some(c) = self.labels.get(label.as_str()) {
                lines.push(format!(
                    "  {:<10} all {:>5}  train {:>5}  test {:>5}",
                    label.as_str(),
                    c.all,
                    c.train,
                    c.test
                ));
            }
        }
        for warning in &self.warnings {
            lines.push(format!("warning: {warning}"));
        }
        lines
    }
}
