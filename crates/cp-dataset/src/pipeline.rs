//! End-to-end dataset build: read pairs, parse patches, dedup, split, write.

use crate::PipelineError;
use crate::cache::PatchCache;
use crate::dedup::{KeyedPair, dedupe};
use crate::grouper::group_key;
use crate::progress::BuildProgress;
use crate::report::RunReport;
use crate::split::ProjectSplitter;
use cp_core::config::{ClonePairsConfig, UnresolvedPolicy};
use cp_core::model::{CloneLabel, PairRecord, PatchPair, PatchRef};
use cp_core::storage;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Parse failures and bad rows listed individually in the report; the rest are
/// only counted.
const MAX_FAILURE_SAMPLES: usize = 10;

/// Files written by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutputs {
    pub all: PathBuf,
    pub train: PathBuf,
    pub test: PathBuf,
    pub report: PathBuf,
}

impl BuildOutputs {
    pub fn resolve(root: &Path, config: &ClonePairsConfig) -> Self {
        let dir = config.output_dir(root);
        Self {
            all: dir.join(&config.output.all),
            train: dir.join(&config.output.train),
            test: dir.join(&config.output.test),
            report: dir.join(&config.output.report),
        }
    }
}

#[derive(Debug)]
pub struct BuildRun {
    pub report: RunReport,
    pub outputs: BuildOutputs,
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Turn CSV rows into pairs. Rows with an unknown label or a uid without a
/// BugKey are counted and skipped.
pub fn resolve_pairs(records: &[PairRecord], report: &mut RunReport) -> Vec<PatchPair> {
    let mut pairs = Vec::with_capacity(records.len());
    for (row, record) in records.iter().enumerate() {
        let label: CloneLabel = match record.expert_label.parse() {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!(row, "skipping row: {e}");
                report.unknown_labels += 1;
                continue;
            }
        };
        let sides = cp_parser::patch_ref(&record.uid)
            .and_then(|uid| Ok((uid, cp_parser::patch_ref(&record.groundtruth_index)?)));
        let (uid, groundtruth) = match sides {
            Ok(sides) => sides,
            Err(e) => {
                tracing::warn!(row, "skipping row: {e}");
                report.malformed_uids += 1;
                continue;
            }
        };

        let pair = PatchPair {
            row,
            uid,
            groundtruth,
            label,
        };
        if !pair.is_same_bug() {
            tracing::warn!(
                row,
                uid = %pair.uid.bug,
                groundtruth = %pair.groundtruth.bug,
                "pair spans two bugs; keyed by the uid side"
            );
            report.cross_bug_pairs += 1;
        }
        pairs.push(pair);
    }
    pairs
}

/// Every patch referenced by `pairs`, once, in first-use order.
fn distinct_patches(pairs: &[PatchPair]) -> Vec<&PatchRef> {
    let mut seen = HashSet::new();
    pairs
        .iter()
        .flat_map(|p| [&p.uid, &p.groundtruth])
        .filter(|r| seen.insert(r.uid.as_str()))
        .collect()
}

/// Run `f` on a dedicated pool of `threads` workers, or on the global pool
/// when `threads` is 0.
fn in_pool<R, F>(threads: usize, f: F) -> Result<R, PipelineError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if threads == 0 {
        return Ok(f());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PipelineError::InvalidConfig(format!("cannot start {threads} threads: {e}")))?;
    Ok(pool.install(f))
}

/// Create `path` for writing. Failing to do so means the output directory is
/// unusable.
fn create_output(path: &Path) -> Result<fs::File, PipelineError> {
    let dir = path.parent().map_or_else(|| path.to_path_buf(), Path::to_path_buf);
    fs::create_dir_all(&dir)
        .and_then(|()| fs::File::create(path))
        .map_err(|source| PipelineError::OutputUnwritable { path: dir, source })
}

fn write_csv(path: &Path, pairs: &[PatchPair]) -> Result<(), PipelineError> {
    let records: Vec<PairRecord> = pairs.iter().map(PatchPair::to_record).collect();
    let file = create_output(path)?;
    storage::write_pairs_to(file, &records).map_err(|e| PipelineError::Csv {
        path: path.to_path_buf(),
        message: format!("{e:#}"),
    })
}

/// Build the deduplicated dataset and its project-disjoint split.
///
/// Only missing input, unwritable output, and invalid settings fail the run.
pub fn run(
    root: &Path,
    config: &ClonePairsConfig,
    progress: &BuildProgress,
) -> Result<BuildRun, PipelineError> {
    config
        .validate()
        .map_err(|e| PipelineError::InvalidConfig(format!("{e:#}")))?;

    let input = config.input_csv(root);
    if !input.is_file() {
        return Err(PipelineError::InputMissing { path: input });
    }
    let outputs = BuildOutputs::resolve(root, config);
    for out in [&outputs.all, &outputs.train, &outputs.test] {
        if same_path(&input, out) {
            return Err(PipelineError::SameInputOutput { path: input });
        }
    }
    let out_dir = config.output_dir(root);
    fs::create_dir_all(&out_dir).map_err(|source| PipelineError::OutputUnwritable {
        path: out_dir.clone(),
        source,
    })?;

    let mut report = RunReport::new();
    report.target_train_fraction = config.split.train_fraction;

    // Stage 1: rows to pairs.
    let rows = storage::read_pairs_lenient(&input).map_err(|e| PipelineError::Csv {
        path: input.clone(),
        message: format!("{e:#}"),
    })?;
    report.pairs_read = rows.total();
    report.malformed_rows = rows.rejected.len();
    for bad in &rows.rejected {
        tracing::warn!(row = bad.row, line = bad.line, "skipping row: {}", bad.reason);
    }
    for bad in rows.rejected.iter().take(MAX_FAILURE_SAMPLES) {
        report.warnings.push(format!("row {}: {}", bad.row, bad.reason));
    }
    let pairs = resolve_pairs(&rows.records, &mut report);
    tracing::info!(
        rows = report.pairs_read,
        pairs = pairs.len(),
        malformed_rows = report.malformed_rows,
        malformed_uids = report.malformed_uids,
        unknown_labels = report.unknown_labels,
        "read input"
    );

    // Stage 2: parse every referenced patch once, then key each pair.
    let cache = PatchCache::new(
        config.patches_dir(root),
        &config.input.patch_extension,
    );
    let keyed: Vec<KeyedPair> = in_pool(config.parse.threads, || {
        let patches = distinct_patches(&pairs);
        cache.warm(&patches, progress);
        pairs
            .par_iter()
            .map(|pair| KeyedPair {
                pair: pair.clone(),
                key: group_key(pair, &cache, &config.dedup),
            })
            .collect()
    })?;

    let failures = cache.failures();
    report.patch_parse_failures = failures.len();
    report.patches_parsed = cache.len() - failures.len();
    for (uid, err) in failures.iter().take(MAX_FAILURE_SAMPLES) {
        report.warnings.push(format!("patch {uid}: {err}"));
    }
    tracing::info!(
        parsed = report.patches_parsed,
        failed = report.patch_parse_failures,
        dir = %cache.dir().display(),
        "parsed patches"
    );

    // Stage 3: unresolved policy, then dedup.
    report.unresolved_pairs = keyed.iter().filter(|k| !k.key.is_resolved()).count();
    let keyed = match config.dedup.unresolved {
        UnresolvedPolicy::Singleton => keyed,
        UnresolvedPolicy::Drop => {
            report.dropped_unresolved = report.unresolved_pairs;
            keyed.into_iter().filter(|k| k.key.is_resolved()).collect()
        }
    };
    let deduped = dedupe(keyed);
    report.duplicates_removed = deduped.removed.len();
    let kept: Vec<PatchPair> = deduped.kept.into_iter().map(|k| k.pair).collect();
    report.pairs_kept = kept.len();
    tracing::info!(
        kept = kept.len(),
        removed = report.duplicates_removed,
        unresolved = report.unresolved_pairs,
        "deduplicated"
    );

    // Stage 4: project-disjoint split.
    let split = ProjectSplitter::new(&config.split).split(&kept);
    report.train_pairs = split.train.len();
    report.test_pairs = split.test.len();
    report.achieved_train_fraction = split.achieved_fraction;
    report.train_projects.clone_from(&split.train_projects);
    report.test_projects.clone_from(&split.test_projects);
    if let Some(warning) = &split.warning {
        report.warnings.push(warning.to_string());
    }
    report.count_labels(&kept, &split.train, &split.test);
    tracing::info!(
        train = split.train.len(),
        test = split.test.len(),
        fraction = split.achieved_fraction,
        "split"
    );

    // Stage 5: outputs.
    write_csv(&outputs.all, &kept)?;
    write_csv(&outputs.train, &split.train)?;
    write_csv(&outputs.test, &split.test)?;

    let file = create_output(&outputs.report)?;
    serde_json::to_writer_pretty(file, &report).map_err(|e| PipelineError::Io {
        path: outputs.report.clone(),
        source: std::io::Error::other(e),
    })?;

    Ok(BuildRun { report, outputs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uid: &str, gt: &str, label: &str) -> PairRecord {
        PairRecord {
            uid: uid.into(),
            groundtruth_index: gt.into(),
            expert_label: label.into(),
        }
    }

    #[test]
    fn test_resolve_pairs_counts_bad_rows() {
        let mut report = RunReport::default();
        let pairs = resolve_pairs(
            &[
                record("a-defects4j-Math-11-t-1", "defects4j-Math-11-developer", "type-1"),
                record("defects4j-Math-developer", "defects4j-Math-11-developer", "type-2"),
                record("a-defects4j-Math-11-t-2", "defects4j-Math-11-developer", "bogus"),
                record("a-defects4j-Math-11-t-3", "defects4j-Math-12-developer", "Type 3"),
            ],
            &mut report,
        );
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].row, 0);
        assert_eq!(pairs[1].row, 3);
        assert_eq!(pairs[1].label, CloneLabel::Type3);
        assert_eq!(report.malformed_uids, 1);
        assert_eq!(report.unknown_labels, 1);
        assert_eq!(report.cross_bug_pairs, 1);
    }

    #[test]
    fn test_distinct_patches_first_use_order() {
        let mut report = RunReport::default();
        let pairs = resolve_pairs(
            &[
                record("a-defects4j-Math-1-t-1", "defects4j-Math-1-developer", "type-1"),
                record("a-defects4j-Math-1-t-2", "defects4j-Math-1-developer", "type-1"),
            ],
            &mut report,
        );
        let uids: Vec<&str> = distinct_patches(&pairs)
            .into_iter()
            .map(|r| r.uid.as_str())
            .collect();
        assert_eq!(
            uids,
            vec![
                "a-defects4j-Math-1-t-1",
                "defects4j-Math-1-developer",
                "a-defects4j-Math-1-t-2"
            ]
        );
    }
}
