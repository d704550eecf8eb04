//! Work distribution.

use crossbeam_channel::Receiver;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A bounded multi-producer multi-consumer queue of jobs, filled once and
/// drained by a fixed pool of workers. Popping is the only suspension point
/// in a worker's loop.
pub struct WorkQueue<T> {
    rx: Receiver<T>,
    total: usize,
    remaining: Arc<AtomicUsize>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            total: self.total,
            remaining: Arc::clone(&self.remaining),
        }
    }
}

impl<T: Send> WorkQueue<T> {
    /// Create a queue holding the given jobs.
    ///
    /// * `jobs` - The jobs to distribute.
    pub fn new(jobs: Vec<T>) -> Self {
        let total = jobs.len();
        let (tx, rx) = crossbeam_channel::bounded(total.max(1));
        for job in jobs {
            // Cannot fail: the channel is sized to hold every job.
            tx.send(job).expect("work queue overflow");
        }
        Self {
            rx,
            total,
            remaining: Arc::new(AtomicUsize::new(total)),
        }
    }

    /// Pop the next job, or `None` once the queue is drained.
    pub fn pop(&self) -> Option<T> {
        let job = self.rx.try_recv().ok()?;
        self.remaining.fetch_sub(1, Ordering::Relaxed);
        Some(job)
    }

    /// Returns the fraction of jobs handed out so far.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        1.0 - self.remaining.load(Ordering::Relaxed) as f64 / self.total as f64
    }
}

/// Create a progress bar for a render pass, or a hidden one when quiet.
///
/// * `len`   - Total number of progress steps.
/// * `msg`   - Message displayed next to the bar.
/// * `quiet` - Suppress the bar.
pub fn create_progress_bar(len: u64, msg: &'static str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::default_bar()
        .template("{msg:25.cyan.bold} [{bar:40.green/white}] {pos:>6}/{len:6} ({elapsed}|{eta})")
        .unwrap()
        .progress_chars("█▓▒░  ");
    let pb = ProgressBar::new(len);
    pb.set_message(msg);
    pb.set_style(style);
    pb
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
