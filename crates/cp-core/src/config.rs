//! Configuration for dataset construction runs.
//!
//! Load order: `clonepairs.toml` in the dataset root → environment variables → defaults.
//! CLI flags are applied on top by the caller.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the config file looked up in the dataset root.
pub const CONFIG_FILE: &str = "clonepairs.toml";

/// Top-level run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClonePairsConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub dedup: DedupConfig,
    pub split: SplitConfig,
    pub parse: ParseConfig,
}

/// Where the labeled pairs and patch corpus live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Input CSV with `uid, groundtruth_index, expert_label` columns.
    pub csv: PathBuf,
    /// Directory holding `<uid>.<patch_extension>` files.
    pub patches_dir: PathBuf,
    pub patch_extension: String,
}

/// Output file names, written under `dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub all: String,
    pub train: String,
    pub test: String,
    pub report: String,
}

/// How a pair's combined method footprint is encoded for dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Bare method names.
    Method,
    /// `Class::method`, class taken from the file stem.
    #[default]
    Class,
    /// `path/to/File.java::method`.
    File,
}

/// What to do with pairs whose method footprint could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Keep each such pair as a dedup group of one.
    #[default]
    Singleton,
    /// Exclude such pairs from every output.
    Drop,
}

/// Deduplication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub granularity: Granularity,
    pub unresolved: UnresolvedPolicy,
    /// When no method is found on either side, fall back to the set of
    /// modified source classes (or files, at `file` granularity).
    pub fallback_to_files: bool,
}

/// Project-disjoint train/test split settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Target share of pairs assigned to train.
    pub train_fraction: f64,
    /// Allowed deviation of the achieved train fraction before a warning is emitted.
    pub tolerance: f64,
    /// Weight of the per-label proportion term relative to the size term.
    pub label_balance_weight: f64,
}

/// Diff parsing fan-out settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Worker threads for patch parsing. 0 uses the global rayon pool.
    pub threads: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            csv: PathBuf::from("labeled_pairs.csv"),
            patches_dir: PathBuf::from("patches"),
            patch_extension: "patch".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            all: "labeled_pairs.csv".to_string(),
            train: "labeled_pairs_train.csv".to_string(),
            test: "labeled_pairs_test.csv".to_string(),
            report: "run_report.json".to_string(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Class,
            unresolved: UnresolvedPolicy::Singleton,
            fallback_to_files: true,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.49,
            tolerance: 0.05,
            label_balance_weight: 1.0,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl ClonePairsConfig {
    /// Load config from `clonepairs.toml` in the dataset root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("CLONEPAIRS_TRAIN_FRACTION", &mut config.split.train_fraction);
        env_override("CLONEPAIRS_SPLIT_TOLERANCE", &mut config.split.tolerance);
        env_override("CLONEPAIRS_PATCHES_DIR", &mut config.input.patches_dir);
        env_override("CLONEPAIRS_OUTPUT_DIR", &mut config.output.dir);
        env_override("CLONEPAIRS_THREADS", &mut config.parse.threads);

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.train_fraction;
        if fraction.is_nan() || fraction <= 0.0 || fraction >= 1.0 {
            anyhow::bail!("split.train_fraction ({}) must be in (0, 1)", fraction);
        }
        if self.split.tolerance.is_nan() || self.split.tolerance < 0.0 {
            anyhow::bail!("split.tolerance ({}) must be >= 0", self.split.tolerance);
        }
        if self.split.label_balance_weight.is_nan() || self.split.label_balance_weight < 0.0 {
            anyhow::bail!(
                "split.label_balance_weight ({}) must be >= 0",
                self.split.label_balance_weight
            );
        }
        Ok(())
    }

    pub fn input_csv(&self, root: &Path) -> PathBuf {
        root.join(&self.input.csv)
    }

    pub fn patches_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.input.patches_dir)
    }

    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.output.dir)
    }
}

/// Unrecognized value for a config enum given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?} (expected one of: {expected})")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

impl FromStr for Granularity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "method" => Ok(Self::Method),
            "class" => Ok(Self::Class),
            "file" => Ok(Self::File),
            _ => Err(UnknownVariant {
                kind: "granularity",
                value: s.to_string(),
                expected: "method, class, file",
            }),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Method => "method",
            Self::Class => "class",
            Self::File => "file",
        })
    }
}

impl FromStr for UnresolvedPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(Self::Singleton),
            "drop" => Ok(Self::Drop),
            _ => Err(UnknownVariant {
                kind: "unresolved policy",
                value: s.to_string(),
                expected: "singleton, drop",
            }),
        }
    }
}

impl fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Singleton => "singleton",
            Self::Drop => "drop",
        })
    }
}
