//! Bounded per-group worker pool.
//!
//! Groups are independent, so each one runs on the blocking pool under a
//! semaphore permit and hands back a `(key, result)` pair. The collector is
//! the only writer of the result map. Cancellation is checked each time a
//! group is about to start; groups already running finish normally.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Shared flag that stops a batch from starting further groups.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of a batch run, keyed by group.
#[derive(Debug)]
pub struct BatchOutcome<K, O> {
    pub results: BTreeMap<K, O>,
    /// Groups never started because the batch was cancelled.
    pub skipped: usize,
}

/// Runs `work` once per group with at most `concurrency` groups in flight.
pub async fn run_groups<K, I, O, F>(
    groups: impl IntoIterator<Item = (K, I)>,
    concurrency: usize,
    cancel: &CancelFlag,
    work: F,
) -> Result<BatchOutcome<K, O>>
where
    K: Ord + Display + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&K, I) -> O + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let work = Arc::new(work);
    let groups: Vec<(K, I)> = groups.into_iter().collect();
    let total = groups.len();

    let mut tasks = Vec::with_capacity(total);

    for (key, input) in groups {
        let permit = semaphore.clone().acquire_owned().await?;
        if cancel.is_cancelled() {
            break;
        }

        let work = work.clone();
        let span = tracing::info_span!("process_group", group = %key);

        tasks.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _enter = span.enter();
            let output = work(&key, input);
            (key, output)
        }));
    }

    let skipped = total - tasks.len();

    let mut results = BTreeMap::new();
    for task in tasks {
        let (key, output) = task.await?;
        results.insert(key, output);
    }

    if skipped > 0 {
        warn!(skipped, total, "Batch cancelled before all groups started");
    }
    info!(completed = results.len(), total, "Batch finished");

    Ok(BatchOutcome { results, skipped })
}
