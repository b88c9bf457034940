//! Terminal progress display for dataset builds.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// A single phase bar shared by the build stages.
pub struct BuildProgress {
    bar: ProgressBar,
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildProgress {
    /// Progress bar drawn on stderr.
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("##-"),
        );
        Self { bar }
    }

    /// Progress that draws nothing (quiet mode, tests).
    pub fn hidden() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Start a new phase with a given name and total count.
    pub fn start_phase(&self, name: &str, total: u64) {
        self.bar.reset();
        self.bar.set_prefix(name.to_string());
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_message("");
    }

    pub fn tick(&self) {
        self.bar.inc(1);
    }

    pub fn finish_phase(&self) {
        self.bar.finish_and_clear();
    }
}
