//! CLI binary for clonepairs: build deduplicated, project-disjoint patch clone datasets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cp_core::config::{ClonePairsConfig, DedupConfig, Granularity, UnresolvedPolicy};
use cp_dataset::progress::BuildProgress;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "clonepairs", about = "Patch clone-pair dataset builder")]
struct Cli {
    /// Dataset root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors; no progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deduplicate labeled pairs and write the train/test split
    Build {
        /// Input pairs CSV (relative to the root)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Directory holding `{uid}.patch` files
        #[arg(long)]
        patches: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Target share of pairs in the train split
        #[arg(long)]
        train_fraction: Option<f64>,

        /// Signature granularity: method, class, file
        #[arg(short, long)]
        granularity: Option<Granularity>,

        /// Unresolved pairs: singleton, drop
        #[arg(long)]
        unresolved: Option<UnresolvedPolicy>,
    },

    /// Print the methods modified by one patch file
    Methods {
        /// Patch file
        patch: PathBuf,

        /// Signature granularity: method, class, file
        #[arg(short, long)]
        granularity: Option<Granularity>,
    },

    /// Print the bug key of each uid
    Bugkey {
        #[arg(required = true)]
        uids: Vec<String>,
    },

    /// Per-project and per-label counts of a pairs CSV
    Stats {
        /// Pairs CSV
        csv: PathBuf,
    },
}

fn get_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.root {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let root = get_root(&cli)?;

    match cli.command {
        Commands::Build {
            csv,
            patches,
            out,
            train_fraction,
            granularity,
            unresolved,
        } => {
            let mut config = ClonePairsConfig::load(&root)
                .with_context(|| format!("failed to load config from {}", root.display()))?;
            if let Some(csv) = csv {
                config.input.csv = csv;
            }
            if let Some(patches) = patches {
                config.input.patches_dir = patches;
            }
            if let Some(out) = out {
                config.output.dir = out;
            }
            if let Some(fraction) = train_fraction {
                config.split.train_fraction = fraction;
            }
            if let Some(granularity) = granularity {
                config.dedup.granularity = granularity;
            }
            if let Some(unresolved) = unresolved {
                config.dedup.unresolved = unresolved;
            }
            cmd_build(&root, &config, cli.quiet)
        }
        Commands::Methods { patch, granularity } => cmd_methods(&patch, granularity),
        Commands::Bugkey { uids } => cmd_bugkey(&uids),
        Commands::Stats { csv } => cmd_stats(&root.join(csv)),
    }
}

fn cmd_build(root: &Path, config: &ClonePairsConfig, quiet: bool) -> Result<()> {
    let progress = if quiet {
        BuildProgress::hidden()
    } else {
        BuildProgress::new()
    };

    let build = cp_dataset::run(root, config, &progress).context("dataset build failed")?;

    if !quiet {
        eprintln!();
        for line in build.report.summary_lines() {
            eprintln!("{line}");
        }
    }
    eprintln!("\nWrote:");
    for path in [
        &build.outputs.all,
        &build.outputs.train,
        &build.outputs.test,
        &build.outputs.report,
    ] {
        eprintln!("  {}", path.display());
    }
    Ok(())
}

fn cmd_methods(patch: &Path, granularity: Option<Granularity>) -> Result<()> {
    let parsed = cp_parser::parse_file(patch)
        .with_context(|| format!("failed to parse {}", patch.display()))?;

    for file in &parsed.files {
        println!("{file}");
        for method in parsed.methods.iter().filter(|m| &m.file_path == file) {
            println!("  {}", method.method);
        }
    }

    let dedup = DedupConfig {
        granularity: granularity.unwrap_or_default(),
        ..DedupConfig::default()
    };
    match cp_dataset::grouper::union_signature(&[&parsed], &dedup) {
        Some(signature) => println!("signature: {signature}"),
        None => println!("signature: <none>"),
    }
    Ok(())
}

fn cmd_bugkey(uids: &[String]) -> Result<()> {
    let mut malformed = 0usize;
    for uid in uids {
        match cp_parser::bugkey::split_uid(uid) {
            Ok(parts) => {
                let role = if parts.is_ground_truth() {
                    "ground-truth"
                } else {
                    "candidate"
                };
                println!("{uid}\t{}\t{role}", parts.bug);
            }
            Err(e) => {
                println!("{uid}\terror: {}", e.reason);
                malformed += 1;
            }
        }
    }
    if malformed > 0 {
        anyhow::bail!("{malformed} of {} uids are malformed", uids.len());
    }
    Ok(())
}

fn cmd_stats(csv: &Path) -> Result<()> {
    let records = cp_core::storage::read_pairs(csv)?;
    let stats = cp_dataset::stats::summarize(&records);

    println!("Pairs: {}", stats.pairs);
    println!("Bugs: {}", stats.bugs);
    if stats.malformed_uids > 0 {
        println!("Malformed uids: {}", stats.malformed_uids);
    }
    println!("\nProjects ({}):", stats.projects.len());
    let mut projects: Vec<(&String, &usize)> = stats.projects.iter().collect();
    projects.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (project, count) in projects {
        println!("  {project:<20} {count:>6}");
    }
    println!("\nLabels:");
    for (label, count) in &stats.labels {
        println!("  {label:<20} {count:>6}");
    }
    Ok(())
}
