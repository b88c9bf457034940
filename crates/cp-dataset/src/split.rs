//! Project-disjoint train/test split.
//!
//! Whole projects are assigned greedily, largest first (ties by name), to
//! whichever side leaves the lower cost:
//!
//! ```text
//! cost = |train/target_train - test/target_test| + weight * label_divergence
//! ```
//!
//! The first term keeps both sides filling towards their targets at the same
//! rate; the second is the mean total-variation distance between each side's
//! label distribution and the global one. The result is deterministic for a
//! given input order.

use cp_core::config::SplitConfig;
use cp_core::model::{CloneLabel, PatchPair, Split};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const LABELS: usize = CloneLabel::ALL.len();

/// Costs closer than this are treated as a tie.
const COST_EPSILON: f64 = 1e-9;

/// The achieved train fraction is outside the tolerance band around the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitImbalanceWarning {
    pub target: f64,
    pub achieved: f64,
    pub tolerance: f64,
    /// Project with the most pairs, usually the cause.
    pub largest_project: String,
    pub largest_project_pairs: usize,
}

impl fmt::Display for SplitImbalanceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "train fraction {:.3} deviates from target {:.3} by more than {:.3} (largest project {} has {} pairs)",
            self.achieved,
            self.target,
            self.tolerance,
            self.largest_project,
            self.largest_project_pairs
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SplitResult {
    pub train: Vec<PatchPair>,
    pub test: Vec<PatchPair>,
    pub train_projects: Vec<String>,
    pub test_projects: Vec<String>,
    pub achieved_fraction: f64,
    pub warning: Option<SplitImbalanceWarning>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    pairs: usize,
    labels: [usize; LABELS],
}

impl Tally {
    fn add(&mut self, other: &Tally) {
        self.pairs += other.pairs;
        for (mine, theirs) in self.labels.iter_mut().zip(other.labels) {
            *mine += theirs;
        }
    }

    fn plus(mut self, other: &Tally) -> Tally {
        self.add(other);
        self
    }

    /// Total-variation distance to `global` (0 for an empty side).
    fn divergence(&self, global: &[f64; LABELS]) -> f64 {
        if self.pairs == 0 {
            return 0.0;
        }
        let n = self.pairs as f64;
        self.labels
            .iter()
            .zip(global)
            .map(|(&count, &share)| (count as f64 / n - share).abs())
            .sum::<f64>()
            / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct ProjectSplitter {
    train_fraction: f64,
    tolerance: f64,
    label_weight: f64,
}

impl ProjectSplitter {
    pub fn new(config: &SplitConfig) -> Self {
        Self {
            train_fraction: config.train_fraction,
            tolerance: config.tolerance,
            label_weight: config.label_balance_weight,
        }
    }

    fn cost(&self, train: &Tally, test: &Tally, total: usize, global: &[f64; LABELS]) -> f64 {
        let n = total as f64;
        let fill_train = train.pairs as f64 / (n * self.train_fraction);
        let fill_test = test.pairs as f64 / (n * (1.0 - self.train_fraction));
        let gap = (fill_train - fill_test).abs();
        let divergence = (train.divergence(global) + test.divergence(global)) / 2.0;
        gap + self.label_weight * divergence
    }

    /// Assign each project to a side.
    pub fn assign(&self, pairs: &[PatchPair]) -> BTreeMap<String, Split> {
        let total = pairs.len();
        let mut per_project: HashMap<&str, Tally> = HashMap::new();
        let mut overall = Tally::default();
        for pair in pairs {
            let tally = per_project.entry(pair.project()).or_default();
            tally.pairs += 1;
            tally.labels[pair.label.index()] += 1;
            overall.pairs += 1;
            overall.labels[pair.label.index()] += 1;
        }

        let mut global = [0.0; LABELS];
        if total > 0 {
            for (share, count) in global.iter_mut().zip(overall.labels) {
                *share = count as f64 / total as f64;
            }
        }

        let mut order: Vec<(&str, Tally)> = per_project.into_iter().collect();
        order.sort_by_key(|(name, tally)| (Reverse(tally.pairs), *name));

        let mut train = Tally::default();
        let mut test = Tally::default();
        let mut assignment = BTreeMap::new();
        for (project, tally) in order {
            let to_train = self.cost(&train.plus(&tally), &test, total, &global);
            let to_test = self.cost(&train, &test.plus(&tally), total, &global);

            let side = if (to_train - to_test).abs() < COST_EPSILON {
                let fill_train = train.pairs as f64 / self.train_fraction;
                let fill_test = test.pairs as f64 / (1.0 - self.train_fraction);
                if fill_test < fill_train {
                    Split::Test
                } else {
                    Split::Train
                }
            } else if to_test < to_train {
                Split::Test
            } else {
                Split::Train
            };

            match side {
                Split::Train => train.add(&tally),
                Split::Test => test.add(&tally),
            }
            tracing::debug!(project, pairs = tally.pairs, side = side.as_str(), "assigned project");
            assignment.insert(project.to_string(), side);
        }
        assignment
    }

    /// Split `pairs` into project-disjoint train and test sequences, each in
    /// input order.
    pub fn split(&self, pairs: &[PatchPair]) -> SplitResult {
        let assignment = self.assign(pairs);

        let mut result = SplitResult::default();
        for pair in pairs {
            match assignment.get(pair.project()) {
                Some(Split::Test) => result.test.push(pair.clone()),
                _ => result.train.push(pair.clone()),
            }
        }
        for (project, side) in &assignment {
            match side {
                Split::Train => result.train_projects.push(project.clone()),
                Split::Test => result.test_projects.push(project.clone()),
            }
        }

        if pairs.is_empty() {
            return result;
        }

        result.achieved_fraction = result.train.len() as f64 / pairs.len() as f64;
        if (result.achieved_fraction - self.train_fraction).abs() > self.tolerance {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for pair in pairs {
                *counts.entry(pair.project()).or_default() += 1;
            }
            let (largest, largest_pairs) = counts
                .into_iter()
                .max_by_key(|(name, count)| (*count, Reverse(*name)))
                .unwrap_or_default();
            let warning = SplitImbalanceWarning {
                target: self.train_fraction,
                achieved: result.achieved_fraction,
                tolerance: self.tolerance,
                largest_project: largest.to_string(),
                largest_project_pairs: largest_pairs,
            };
            tracing::warn!("{warning}");
            result.warning = Some(warning);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::model::{BugKey, PatchRef};
    use std::collections::HashSet;

    fn pair(row: usize, project: &str, label: CloneLabel) -> PatchPair {
        let bug = BugKey::new(project, 1);
        PatchPair {
            row,
            uid: PatchRef {
                uid: format!("s-defects4j-{project}-1-t-{row}"),
                bug: bug.clone(),
            },
            groundtruth: PatchRef {
                uid: format!("defects4j-{project}-1-developer"),
                bug,
            },
            label,
        }
    }

    fn dataset(sizes: &[(&str, usize)]) -> Vec<PatchPair> {
        let mut pairs = Vec::new();
        for (project, size) in sizes {
            for i in 0..*size {
                let label = CloneLabel::ALL[i % 3];
                pairs.push(pair(pairs.len(), project, label));
            }
        }
        pairs
    }

    fn splitter(fraction: f64, weight: f64) -> ProjectSplitter {
        ProjectSplitter::new(&SplitConfig {
            train_fraction: fraction,
            tolerance: 0.05,
            label_balance_weight: weight,
        })
    }

    #[test]
    fn test_projects_are_disjoint_and_cover_input() {
        let pairs = dataset(&[("Math", 40), ("Lang", 30), ("Chart", 20), ("Time", 10)]);
        let result = splitter(0.5, 1.0).split(&pairs);

        let train_projects: HashSet<&str> = result.train.iter().map(|p| p.project()).collect();
        let test_projects: HashSet<&str> = result.test.iter().map(|p| p.project()).collect();
        assert!(train_projects.is_disjoint(&test_projects));

        let mut rows: Vec<usize> = result
            .train
            .iter()
            .chain(&result.test)
            .map(|p| p.row)
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_greedy_reaches_exact_target_when_possible() {
        let pairs = dataset(&[("Math", 40), ("Lang", 30), ("Chart", 20), ("Time", 10)]);
        let result = splitter(0.5, 0.0).split(&pairs);
        assert_eq!(result.train.len(), 50);
        assert_eq!(result.train_projects, vec!["Math", "Time"]);
        assert_eq!(result.test_projects, vec!["Chart", "Lang"]);
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_outputs_preserve_input_order() {
        let mut pairs = dataset(&[("Math", 4), ("Lang", 4)]);
        pairs.swap(0, 7);
        let result = splitter(0.5, 1.0).split(&pairs);
        for side in [&result.train, &result.test] {
            let positions: Vec<usize> = side
                .iter()
                .map(|p| pairs.iter().position(|q| q == p).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_dominant_project_warns_but_completes() {
        let pairs = dataset(&[("Closure", 90), ("Math", 5), ("Lang", 5)]);
        let result = splitter(0.49, 1.0).split(&pairs);
        assert_eq!(result.train.len() + result.test.len(), 100);
        let warning = result.warning.expect("imbalance warning");
        assert_eq!(warning.largest_project, "Closure");
        assert_eq!(warning.largest_project_pairs, 90);
        assert!(warning.to_string().contains("Closure"));
    }

    #[test]
    fn test_split_is_deterministic() {
        let pairs = dataset(&[("A", 7), ("B", 7), ("C", 3), ("D", 9), ("E", 1)]);
        let s = splitter(0.49, 1.0);
        let first = s.split(&pairs);
        let second = s.split(&pairs);
        assert_eq!(first.train, second.train);
        assert_eq!(first.test, second.test);
    }

    #[test]
    fn test_label_weight_prefers_balanced_sides() {
        // Two same-sized projects per label profile: a balanced split puts one
        // of each profile on each side.
        let mut pairs = Vec::new();
        for (project, label) in [
            ("A", CloneLabel::Type1),
            ("B", CloneLabel::Type1),
            ("C", CloneLabel::NotClone),
            ("D", CloneLabel::NotClone),
        ] {
            for _ in 0..10 {
                pairs.push(pair(pairs.len(), project, label));
            }
        }
        let result = splitter(0.5, 1.0).split(&pairs);
        let train_labels: HashSet<CloneLabel> = result.train.iter().map(|p| p.label).collect();
        let test_labels: HashSet<CloneLabel> = result.test.iter().map(|p| p.label).collect();
        assert_eq!(train_labels.len(), 2);
        assert_eq!(test_labels.len(), 2);
        assert_eq!(result.train.len(), 20);
    }

    #[test]
    fn test_empty_input() {
        let result = splitter(0.49, 1.0).split(&[]);
        assert!(result.train.is_empty() && result.test.is_empty());
        assert!(result.warning.is_none());
    }
}
