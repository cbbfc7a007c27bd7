//! Bounded worker pool for the concurrent pipeline stages.
//!
//! A stage hands the pool a batch of tasks and blocks until every task has
//! finished. Task results travel back over a channel and are applied by the
//! calling thread alone, so workers never touch shared manifests.
//!
//! A task that fails (or panics) is logged and contributes nothing; its
//! siblings keep running. When the process is interrupted the pool stops
//! starting queued tasks, waits for the running ones, and the stage returns
//! [`Interrupted`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::util::interrupt::{Interrupt, Interrupted};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Counts from a finished stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub completed: usize,
    pub failed: usize,
}

enum Outcome<R> {
    Done(R),
    Failed(String),
    Skipped,
}

/// A fixed-size pool of worker threads.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    interrupt: Interrupt,
    progress: bool,
}

impl WorkerPool {
    /// Create a pool with `jobs` workers (None = available parallelism).
    pub fn new(jobs: Option<usize>, interrupt: Interrupt) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.unwrap_or(0))
            .thread_name(|i| format!("hurudist-worker-{}", i))
            .build()
            .context("failed to start worker pool")?;
        tracing::debug!("Started worker pool with {} threads", pool.current_num_threads());
        Ok(WorkerPool {
            pool,
            interrupt,
            progress: false,
        })
    }

    /// Show a progress bar while stages run.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Run `work` over every task and hand each successful result to
    /// `collect` on the calling thread.
    ///
    /// Returns once all tasks have finished. Results arrive in completion
    /// order.
    pub fn run_stage<T, R, F, C>(
        &self,
        label: &str,
        tasks: Vec<T>,
        work: F,
        mut collect: C,
    ) -> Result<StageSummary, Interrupted>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
        C: FnMut(R),
    {
        self.interrupt.check()?;
        if tasks.is_empty() {
            return Ok(StageSummary::default());
        }

        let bar = self.progress_bar(label, tasks.len());
        let cancel = AtomicBool::new(false);
        let mut summary = StageSummary::default();
        let mut cancelled = false;

        self.pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<Outcome<R>>();

            for task in tasks {
                let tx = tx.clone();
                let work = &work;
                let cancel = &cancel;
                scope.spawn(move |_| {
                    let outcome = if cancel.load(Ordering::SeqCst) {
                        Outcome::Skipped
                    } else {
                        match panic::catch_unwind(AssertUnwindSafe(|| work(task))) {
                            Ok(Ok(result)) => Outcome::Done(result),
                            Ok(Err(e)) => Outcome::Failed(format!("{:#}", e)),
                            Err(_) => Outcome::Failed("task panicked".to_string()),
                        }
                    };
                    // The receiver outlives every task in this scope.
                    let _ = tx.send(outcome);
                });
            }
            drop(tx);

            loop {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(Outcome::Done(result)) => {
                        summary.completed += 1;
                        bar.inc(1);
                        if !cancelled {
                            collect(result);
                        }
                    }
                    Ok(Outcome::Failed(message)) => {
                        summary.failed += 1;
                        bar.inc(1);
                        tracing::error!("{} task failed: {}", label, message);
                    }
                    Ok(Outcome::Skipped) => {
                        bar.inc(1);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }

                if !cancelled && self.interrupt.is_triggered() {
                    tracing::warn!("Interrupted, waiting for running {} tasks...", label);
                    cancel.store(true, Ordering::SeqCst);
                    cancelled = true;
                }
            }
        });

        bar.finish_and_clear();

        if cancelled {
            return Err(Interrupted);
        }
        tracing::debug!(
            "{}: {} task(s) completed, {} failed",
            label,
            summary.completed,
            summary.failed
        );
        Ok(summary)
    }

    fn progress_bar(&self, label: &str, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(label.to_string());
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_run_stage_collects_all_results() {
        let pool = WorkerPool::new(Some(4), Interrupt::new()).unwrap();
        let mut total = 0;
        let summary = pool
            .run_stage("sum", (1..=100).collect(), |n: u64| Ok(n * 2), |n| total += n)
            .unwrap();

        assert_eq!(total, 10100);
        assert_eq!(summary.completed, 100);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_failed_task_does_not_stop_siblings() {
        let pool = WorkerPool::new(Some(2), Interrupt::new()).unwrap();
        let mut seen = Vec::new();
        let summary = pool
            .run_stage(
                "mixed",
                vec![1, 2, 3, 4],
                |n: i32| {
                    if n == 3 {
                        bail!("bad task {}", n);
                    }
                    Ok(n)
                },
                |n| seen.push(n),
            )
            .unwrap();

        seen.sort();
        assert_eq!(seen, vec![1, 2, 4]);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let pool = WorkerPool::new(Some(2), Interrupt::new()).unwrap();
        let mut seen = 0;
        let summary = pool
            .run_stage(
                "panic",
                vec![true, false, false],
                |explode: bool| {
                    if explode {
                        panic!("boom");
                    }
                    Ok(())
                },
                |_| seen += 1,
            )
            .unwrap();

        assert_eq!(seen, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_tasks_may_borrow_from_caller() {
        let pool = WorkerPool::new(Some(2), Interrupt::new()).unwrap();
        let names = vec!["a".to_string(), "bb".to_string()];
        let mut lengths = Vec::new();
        pool.run_stage("borrow", names.iter().collect(), |s: &String| Ok(s.len()), |n| {
            lengths.push(n)
        })
        .unwrap();
        lengths.sort();
        assert_eq!(lengths, vec![1, 2]);
    }

    #[test]
    fn test_interrupt_before_stage() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let pool = WorkerPool::new(Some(2), interrupt).unwrap();
        let result = pool.run_stage("never", vec![1], |n: i32| Ok(n), |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn test_interrupt_during_stage_skips_queued_tasks() {
        let interrupt = Interrupt::new();
        let pool = WorkerPool::new(Some(1), interrupt.clone()).unwrap();
        let started = AtomicUsize::new(0);

        let result = pool.run_stage(
            "slow",
            (0..50).collect::<Vec<_>>(),
            |_: i32| {
                if started.fetch_add(1, Ordering::SeqCst) == 0 {
                    interrupt.trigger();
                }
                std::thread::sleep(Duration::from_millis(20));
                Ok(())
            },
            |_| {},
        );

        assert!(result.is_err());
        assert!(started.load(Ordering::SeqCst) < 50);
    }
}
