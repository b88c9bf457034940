//! Read-through cache of parsed patches.
//!
//! One slot per patch uid. The map shard lock is held only long enough to
//! fetch or insert the slot; parsing runs inside `OnceLock::get_or_init`, so
//! each patch file is read and parsed at most once no matter how many pairs
//! (or worker threads) ask for it.

use crate::progress::BuildProgress;
use cp_core::model::PatchRef;
use cp_parser::{ParseError, PatchMethods};
use dashmap::DashMap;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Result of parsing one patch file.
pub type ParseOutcome = Result<PatchMethods, ParseError>;

type Slot = Arc<OnceLock<Arc<ParseOutcome>>>;

pub struct PatchCache {
    dir: PathBuf,
    extension: String,
    slots: DashMap<String, Slot>,
}

impl PatchCache {
    /// Cache over patch files named `{uid}.{extension}` in `dir`.
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
            slots: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, patch: &PatchRef) -> PathBuf {
        self.dir.join(patch.file_name(&self.extension))
    }

    /// Parsed methods of `patch`, parsing on first request.
    pub fn get(&self, patch: &PatchRef) -> Arc<ParseOutcome> {
        let slot = Arc::clone(&self.slots.entry(patch.uid.clone()).or_default());
        Arc::clone(slot.get_or_init(|| Arc::new(self.load(patch))))
    }

    fn load(&self, patch: &PatchRef) -> ParseOutcome {
        let path = self.path_for(patch);
        let outcome = cp_parser::parse_file(&path);
        match &outcome {
            Ok(parsed) => tracing::debug!(
                uid = %patch.uid,
                files = parsed.files.len(),
                methods = parsed.methods.len(),
                "parsed patch"
            ),
            Err(e) => tracing::warn!(uid = %patch.uid, "patch parse failed: {e}"),
        }
        outcome
    }

    /// Parse every patch in `patches` across the current rayon pool.
    pub fn warm(&self, patches: &[&PatchRef], progress: &BuildProgress) {
        progress.start_phase("Parsing", patches.len() as u64);
        patches.par_iter().for_each(|patch| {
            self.get(patch);
            progress.tick();
        });
        progress.finish_phase();
    }

    /// Number of patches requested so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Uids of patches that failed to parse, sorted.
    pub fn failures(&self) -> Vec<(String, ParseError)> {
        let mut failed: Vec<(String, ParseError)> = self
            .slots
            .iter()
            .filter_map(|entry| match entry.value().get().map(|outcome| &**outcome) {
                Some(Err(e)) => Some((entry.key().clone(), e.clone())),
                _ => None,
            })
            .collect();
        failed.sort_by(|a, b| a.0.cmp(&b.0));
        failed
    }
}
