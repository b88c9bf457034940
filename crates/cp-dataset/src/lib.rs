//! Dataset construction for labeled patch pairs.
//!
//! Resolves each pair's modified-method footprint through a shared patch
//! cache, keeps one pair per `(BugKey, signature)`, and splits the survivors
//! into project-disjoint train and test sets.

pub mod cache;
pub mod dedup;
pub mod grouper;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod split;
pub mod stats;

pub use cache::PatchCache;
pub use dedup::{KeyedPair, dedupe};
pub use grouper::{GroupKey, group_key};
pub use pipeline::{BuildOutputs, BuildRun, run};
pub use report::RunReport;
pub use split::{ProjectSplitter, SplitImbalanceWarning, SplitResult};

use std::path::PathBuf;

/// Errors that stop a build. Everything else is counted in the [`RunReport`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input CSV not found: {}", path.display())]
    InputMissing { path: PathBuf },
    #[error("output directory {} is not writable", path.display())]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {message}", path.display())]
    Csv { path: PathBuf, message: String },
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("output would overwrite the input CSV {}", path.display())]
    SameInputOutput { path: PathBuf },
}
