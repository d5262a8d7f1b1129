// file: src/pipeline/batch.rs
// description: discovers input records and propagates them on a bounded worker pool
// reference: fans propagation out to blocking workers and collects per-item outcomes

use super::progress::{BatchStats, ProgressTracker};
use super::propagator::Propagator;
use crate::config::BatchConfig;
use crate::engine::Engine;
use crate::error::{ErrorKind, PropagationError, Result};
use crate::utils::Validator;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Filename convention mapping input records to output records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchNaming {
    pub input_prefix: String,
    pub output_prefix: String,
    pub extension: String,
}

impl Default for BatchNaming {
    fn default() -> Self {
        Self {
            input_prefix: "FELsource_out".to_string(),
            output_prefix: "prop_out".to_string(),
            extension: "h5".to_string(),
        }
    }
}

impl BatchNaming {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            input_prefix: config.input_prefix.clone(),
            output_prefix: config.output_prefix.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.input_prefix)
            && file_name
                .strip_suffix(&self.extension)
                .is_some_and(|stem| stem.ends_with('.'))
    }

    /// Swaps the input prefix for the output prefix, keeping the rest of the
    /// name. `None` when `file_name` is not a batch input.
    pub fn output_name(&self, file_name: &str) -> Option<String> {
        if !self.matches(file_name) {
            return None;
        }
        let rest = &file_name[self.input_prefix.len()..];
        Some(format!("{}{}", self.output_prefix, rest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Succeeded,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: ItemStatus,
}

impl ItemOutcome {
    fn succeeded(job: &BatchJob) -> Self {
        Self {
            index: job.index,
            input: job.input.clone(),
            output: job.output.clone(),
            status: ItemStatus::Succeeded,
        }
    }

    fn failed(job: &BatchJob, kind: ErrorKind, message: String) -> Self {
        Self {
            index: job.index,
            input: job.input.clone(),
            output: job.output.clone(),
            status: ItemStatus::Failed { kind, message },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub discovered: usize,
    pub outcomes: Vec<ItemOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

type PropagatorFactory<E> = dyn Fn() -> Result<Propagator<E>> + Send + Sync;

/// Idle propagators waiting for a worker. A propagator, and the engine it
/// owns, serves one item at a time; at most one is built per concurrent
/// worker.
struct PropagatorPool<E: Engine> {
    idle: Mutex<Vec<Propagator<E>>>,
    factory: Box<PropagatorFactory<E>>,
}

impl<E: Engine> PropagatorPool<E> {
    fn checkout(&self) -> Result<Propagator<E>> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        match reused {
            Some(propagator) => Ok(propagator),
            None => {
                debug!("Building propagator for a new worker");
                (self.factory)()
            }
        }
    }

    fn checkin(&self, propagator: Propagator<E>) {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(propagator);
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

pub struct BatchCoordinator<E: Engine + 'static> {
    pool: Arc<PropagatorPool<E>>,
    naming: BatchNaming,
    workers: usize,
    show_progress: bool,
}

impl<E: Engine + 'static> BatchCoordinator<E> {
    /// `factory` builds the propagator, engine included, for each worker
    /// slot, so engines are never shared between threads.
    pub fn new<F>(factory: F, naming: BatchNaming, workers: usize) -> Result<Self>
    where
        F: Fn() -> Result<Propagator<E>> + Send + Sync + 'static,
    {
        Validator::validate_worker_count(workers)?;
        Validator::validate_prefixes(&naming.input_prefix, &naming.output_prefix)?;

        Ok(Self {
            pool: Arc::new(PropagatorPool {
                idle: Mutex::new(Vec::new()),
                factory: Box::new(factory),
            }),
            naming,
            workers,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Lists batch inputs directly inside `input_dir`, ordered by file name,
    /// with their output paths under `output_dir`.
    pub fn discover(&self, input_dir: &Path, output_dir: &Path) -> Result<Vec<BatchJob>> {
        Validator::validate_directory(input_dir)?;
        info!("Scanning directory: {}", input_dir.display());

        let mut jobs = Vec::new();
        for entry in WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(PropagationError::Validation(format!(
                        "Cannot read directory {}: {}",
                        input_dir.display(),
                        e
                    )));
                }
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", input_dir.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                warn!(
                    "Skipping file with a non UTF-8 name: {}",
                    entry.path().display()
                );
                continue;
            };
            let Some(output_name) = self.naming.output_name(file_name) else {
                debug!("Skipping file: {}", entry.path().display());
                continue;
            };

            debug!("out_file_name: {}", output_name);
            jobs.push(BatchJob {
                index: jobs.len(),
                input: entry.path().to_path_buf(),
                output: output_dir.join(output_name),
            });
        }

        ensure_distinct_outputs(&jobs)?;

        info!(
            "Found {} {} files in {}",
            jobs.len(),
            self.naming.extension,
            input_dir.display()
        );
        Ok(jobs)
    }

    pub async fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<BatchReport> {
        let jobs = self.discover(input_dir, output_dir)?;
        let discovered = jobs.len();

        if jobs.is_empty() {
            warn!("No files found to propagate");
        }

        let (outcomes, stats) = self.execute(jobs).await;
        log_final_stats(discovered, &stats);

        Ok(BatchReport {
            discovered,
            outcomes,
            stats,
        })
    }

    /// Propagates every job and returns one outcome per job, ordered by job
    /// index. A failing item never stops its siblings.
    pub async fn run_jobs(&self, jobs: Vec<BatchJob>) -> Vec<ItemOutcome> {
        self.execute(jobs).await.0
    }

    async fn execute(&self, jobs: Vec<BatchJob>) -> (Vec<ItemOutcome>, BatchStats) {
        let progress = Arc::new(ProgressTracker::new(jobs.len(), self.show_progress));

        info!(
            "Propagating {} files with {} workers",
            jobs.len(),
            self.workers
        );

        let tasks = jobs.into_iter().map(|job| {
            let pool = Arc::clone(&self.pool);
            let progress = Arc::clone(&progress);

            async move {
                let name = job
                    .input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                progress.start_item(&name);

                let (input, output) = (job.input.clone(), job.output.clone());
                let result = tokio::task::spawn_blocking(move || {
                    let propagator = pool.checkout()?;
                    let outcome = propagator.propagate(&input, &output);
                    pool.checkin(propagator);
                    outcome
                })
                .await;

                match result {
                    Ok(Ok(())) => {
                        progress.inc_files_processed();
                        info!("Propagated: {}", job.output.display());
                        ItemOutcome::succeeded(&job)
                    }
                    Ok(Err(e)) => {
                        progress.inc_files_failed();
                        warn!("Failed to propagate {}: {}", job.input.display(), e);
                        ItemOutcome::failed(&job, e.kind(), e.to_string())
                    }
                    Err(e) => {
                        progress.inc_files_failed();
                        error!("Propagation task for {} panicked: {}", job.input.display(), e);
                        ItemOutcome::failed(&job, ErrorKind::Engine, e.to_string())
                    }
                }
            }
        });

        let mut outcomes: Vec<ItemOutcome> = stream::iter(tasks)
            .buffer_unordered(self.workers)
            .collect()
            .await;
        outcomes.sort_by_key(|o| o.index);

        let stats = progress.get_stats();
        progress.finish();
        (outcomes, stats)
    }
}

/// Every output must be distinct, and none may overwrite a batch input.
fn ensure_distinct_outputs(jobs: &[BatchJob]) -> Result<()> {
    let inputs: HashSet<&Path> = jobs.iter().map(|j| j.input.as_path()).collect();
    let mut outputs = HashSet::with_capacity(jobs.len());

    for job in jobs {
        if inputs.contains(job.output.as_path()) {
            return Err(PropagationError::Validation(format!(
                "output {} would overwrite a batch input",
                job.output.display()
            )));
        }
        if !outputs.insert(job.output.as_path()) {
            return Err(PropagationError::Validation(format!(
                "several inputs map to output {}",
                job.output.display()
            )));
        }
    }
    Ok(())
}

fn log_final_stats(discovered: usize, stats: &BatchStats) {
    info!("=== Batch Propagation Summary ===");
    info!("Files discovered: {}", discovered);
    info!("Files propagated: {}", stats.files_processed);
    info!("Files failed: {}", stats.files_failed);
    info!("Success rate: {:.2}%", stats.success_rate());
    info!("Duration: {:.2} seconds", stats.duration_secs);
    info!("Speed: {:.2} files/sec", stats.files_per_second());
    info!("=================================");
}
