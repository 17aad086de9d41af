use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use super::format::OutputFormat;
use super::objects::ObjectStore;
use super::pipeline::{ConversionBatch, ConversionJob, Converter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    Converting,
    Completed,
    CompletedWithFailures,
}

#[derive(Debug, Clone)]
pub struct ConversionProgress {
    pub state: ConversionState,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

impl Default for ConversionProgress {
    fn default() -> Self {
        Self {
            state: ConversionState::Idle,
            current: 0,
            total: 0,
            message: String::new(),
        }
    }
}

impl ConversionProgress {
    pub fn fraction(&self) -> f32 {
        if self.total > 0 {
            self.current as f32 / self.total as f32
        } else {
            0.0
        }
    }
}

#[derive(Default)]
struct Shared {
    progress: Mutex<ConversionProgress>,
    finished: Mutex<Option<ConversionBatch>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one conversion at a time on a background thread.
#[derive(Clone, Default)]
pub struct ConversionWorker {
    shared: Arc<Shared>,
}

impl ConversionWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> ConversionProgress {
        lock(&self.shared.progress).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.progress).state == ConversionState::Converting
    }

    /// Returns `false` without doing anything if a run is already active.
    pub fn start(
        &self,
        converter: Converter,
        jobs: Vec<ConversionJob>,
        format: OutputFormat,
        store: ObjectStore,
    ) -> bool {
        {
            let mut p = lock(&self.shared.progress);
            if p.state == ConversionState::Converting {
                return false;
            }
            *p = ConversionProgress {
                state: ConversionState::Converting,
                current: 0,
                total: jobs.len(),
                message: "Starting conversion...".to_string(),
            };
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("conversion".to_string())
            .spawn(move || {
                let batch = converter.run(&jobs, format, &store, |current, total, name| {
                    let mut p = lock(&shared.progress);
                    p.current = current;
                    p.message = format!("Converting {} ({}/{})", name, current, total);
                });

                let converted = batch.converted().count();
                let failed = batch.failure_count();
                *lock(&shared.finished) = Some(batch);

                let mut p = lock(&shared.progress);
                p.current = p.total;
                p.state = if failed == 0 {
                    ConversionState::Completed
                } else {
                    ConversionState::CompletedWithFailures
                };
                p.message = format!("Completed: {} succeeded, {} failed", converted, failed);
            });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn conversion thread");
            let mut p = lock(&self.shared.progress);
            p.state = ConversionState::CompletedWithFailures;
            p.message = format!("Could not start conversion: {}", e);
            return false;
        }
        true
    }

    /// Hands over the finished batch once, if there is one.
    pub fn take_finished(&self) -> Option<ConversionBatch> {
        lock(&self.shared.finished).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for_batch(worker: &ConversionWorker) -> ConversionBatch {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(batch) = worker.take_finished() {
                return batch;
            }
            assert!(Instant::now() < deadline, "conversion did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn empty_run_completes() {
        let worker = ConversionWorker::new();
        assert!(worker.start(Converter::with_defaults(), Vec::new(), OutputFormat::Png, ObjectStore::new()));

        let batch = wait_for_batch(&worker);
        assert!(batch.outcomes.is_empty());
        // The batch is published just before the final progress update.
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_running() {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.progress().state, ConversionState::Completed);
        assert!(worker.take_finished().is_none());
    }

    #[test]
    fn progress_fraction_handles_zero_total() {
        assert_eq!(ConversionProgress::default().fraction(), 0.0);
        let p = ConversionProgress { current: 1, total: 4, ..Default::default() };
        assert_eq!(p.fraction(), 0.25);
    }
}
