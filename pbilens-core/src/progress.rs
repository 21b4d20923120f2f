//! Per-file progress for batch analysis.
//!
//! [`AnalysisPipeline::analyze_batch`](crate::pipeline::AnalysisPipeline::analyze_batch)
//! reports each file as it starts and finishes. The CLI draws this with
//! [`IndicatifReporter`]; library callers pass [`NoopReporter`].

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.green} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

pub trait ProgressReporter: Send + Sync {
    /// A batch of `files` is about to be analyzed.
    fn begin(&self, files: u64);

    /// Extraction of `project` is starting.
    fn file_started(&self, project: &str);

    /// `project` is done; `ok` is false when it failed.
    fn file_finished(&self, project: &str, ok: bool);

    fn finish(&self);
}

#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn begin(&self, _files: u64) {}
    fn file_started(&self, _project: &str) {}
    fn file_finished(&self, _project: &str, _ok: bool) {}
    fn finish(&self) {}
}

/// Progress bar on stderr. Failed files are printed above the bar so they
/// stay visible after it clears.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
    failed: AtomicU64,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// A reporter that never draws.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            failed: AtomicU64::new(0),
        }
    }

    /// Files finished so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for IndicatifReporter {
    fn begin(&self, files: u64) {
        self.bar.set_length(files);
        self.bar.set_prefix("Analyzing");
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            self.bar.set_style(style.progress_chars("=> "));
        }
        self.failed.store(0, Ordering::Relaxed);
        self.bar.reset();
    }

    fn file_started(&self, project: &str) {
        self.bar.set_message(project.to_string());
    }

    fn file_finished(&self, project: &str, ok: bool) {
        if !ok {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.println(format!("failed: {project}"));
            self.bar.set_prefix(format!("Analyzing ({failed} failed)"));
        }
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
