//! Dedicated worker thread hosting its own cooperative scheduler.
//!
//! A blocking or long-running submission must not stall the bot's main
//! runtime, so each eval gets a disposable OS thread running a private
//! current-thread tokio runtime. One worker, one submission, then teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::error::SandboxError;

/// Workers ever started by this process. Surfaced in the spawn log line and
/// used by tests to prove that rejected submissions never reach a thread.
pub(crate) static SPAWNED: AtomicUsize = AtomicUsize::new(0);

type Job = Box<dyn FnOnce(&tokio::runtime::Runtime) + Send>;

/// Handle to one isolated execution thread. Created per submission, never
/// reused; `stop` consumes the handle and joins the thread.
pub struct Worker {
    jobs: mpsc::Sender<Job>,
    handle: thread::JoinHandle<()>,
}

impl Worker {
    /// Spawn the thread and build its private scheduler, returning once the
    /// scheduler is ready to accept work. A runtime build failure on the
    /// worker side is reported here, not swallowed.
    pub fn start() -> Result<Self, SandboxError> {
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<std::io::Result<()>>();

        let handle = thread::Builder::new()
            .name("sandbox-worker".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => {
                        let _ = ready_tx.send(Ok(()));
                        rt
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while let Ok(job) = job_rx.recv() {
                    job(&rt);
                }
            })
            .map_err(SandboxError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(SandboxError::Spawn(e));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(SandboxError::Gone);
            }
        }

        let total = SPAWNED.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, "sandbox worker started");
        Ok(Self { jobs, handle })
    }

    /// Hand one unit of work to the worker's scheduler and await its result,
    /// bounded by `timeout`. The await suspends the calling task; the main
    /// runtime keeps processing other events. On expiry the in-flight
    /// computation is abandoned to `stop`.
    pub async fn submit<T, F>(&self, work: F, timeout: Duration) -> Result<T, SandboxError>
    where
        F: FnOnce(&tokio::runtime::Runtime) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(Box::new(move |rt| {
                let _ = tx.send(work(rt));
            }))
            .map_err(|_| SandboxError::Gone)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            // The job dropped its sender without a result: the closure
            // panicked or the thread died mid-run.
            Ok(Err(_)) => Err(SandboxError::Gone),
            Err(_) => Err(SandboxError::Timed(timeout.as_secs())),
        }
    }

    /// Close the job channel and join the thread. Runs on every exit path
    /// of an invocation; after a timeout the runtime-side watchdog has
    /// already terminated the stuck script, so the join is bounded.
    pub fn stop(self) {
        drop(self.jobs);
        if self.handle.join().is_err() {
            warn!("sandbox worker panicked during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::test_support::SERIAL;

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[tokio::test]
    async fn submit_returns_the_job_result() {
        let _guard = serial();
        let worker = Worker::start().unwrap();
        let value = worker
            .submit(|_rt| 2 + 2, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, 4);
        worker.stop();
    }

    #[tokio::test]
    async fn jobs_can_use_the_private_runtime() {
        let _guard = serial();
        let worker = Worker::start().unwrap();
        let value = worker
            .submit(
                |rt| {
                    rt.block_on(async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        "slept"
                    })
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(value, "slept");
        worker.stop();
    }

    #[tokio::test]
    async fn slow_jobs_time_out_and_teardown_still_joins() {
        let _guard = serial();
        let worker = Worker::start().unwrap();
        let result = worker
            .submit(
                |_rt| std::thread::sleep(Duration::from_millis(300)),
                Duration::from_millis(50),
            )
            .await;
        assert!(matches!(result, Err(SandboxError::Timed(_))));
        // The job finishes on its own shortly after; stop must not hang.
        worker.stop();
    }

    #[tokio::test]
    async fn each_start_is_a_fresh_thread() {
        let _guard = serial();
        let before = SPAWNED.load(Ordering::Relaxed);
        let first = Worker::start().unwrap();
        let second = Worker::start().unwrap();
        assert!(SPAWNED.load(Ordering::Relaxed) >= before + 2);
        first.stop();
        second.stop();
    }
}
