// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for batch propagation
// reference: uses indicatif for progress bars and tracks per-item outcomes

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub duration_secs: f64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.files_processed + self.files_failed
    }

    pub fn files_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.total() as f64 / self.duration_secs
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.files_processed as f64 / total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    _multi: MultiProgress,
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    files_processed: AtomicUsize,
    files_failed: AtomicUsize,
    in_flight: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_files: usize, visible: bool) -> Self {
        let multi_progress = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let main_bar = create_progress_bar(&multi_progress, total_files as u64);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            _multi: multi_progress,
            main_bar,
            detail_bar,
            files_processed: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn hidden(total_files: usize) -> Self {
        Self::new(total_files, false)
    }

    /// Marks one record as handed to a worker.
    pub fn start_item(&self, name: &str) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.main_bar.set_message(format!("propagating {}", name));
        self.update_detail_bar();
    }

    pub fn inc_files_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::SeqCst);
        self.complete_item();
    }

    pub fn inc_files_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::SeqCst);
        self.complete_item();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn complete_item(&self) {
        // saturating: completions may be reported without a matching start
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Propagation complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> BatchStats {
        BatchStats {
            files_processed: self.files_processed.load(Ordering::SeqCst),
            files_failed: self.files_failed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }

    fn update_detail_bar(&self) {
        let processed = self.files_processed.load(Ordering::SeqCst);
        let failed = self.files_failed.load(Ordering::SeqCst);
        let running = self.in_flight.load(Ordering::SeqCst);

        self.detail_bar.set_message(format!(
            "Propagated: {} | Failed: {} | Running: {}",
            processed, failed, running
        ));
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}
