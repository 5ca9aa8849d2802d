//! Sandboxed code runner behind the `eval` command.
//!
//! An invocation flows: static pre-filter → fresh worker thread → evaluate
//! inside a stripped V8 isolate → teardown. Each submission gets its own
//! disposable worker and its own capture sink, so concurrent invocations
//! share no mutable state. The worker is stopped on every exit path.

pub mod error;
pub mod filter;
mod runtime;
mod worker;

use std::time::{Duration, Instant};

pub use error::SandboxError;
pub use filter::{Policy, Rejection};
pub use worker::Worker;

/// Reply text when a submission completes without printing anything.
pub const NO_OUTPUT: &str = "No output";

/// Wall-clock bound for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra headroom on the caller-side wait so the runtime-side watchdog
/// (which fires at the configured timeout) gets to report first.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub timeout: Duration,
    pub policy: Policy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            policy: Policy::default(),
        }
    }
}

/// What a completed submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub output: String,
    pub elapsed: Duration,
}

/// Run one submission through the whole pipeline.
///
/// Rejected sources never reach a worker. Everything past the filter gets a
/// fresh worker which is unconditionally stopped before this returns,
/// whatever the outcome.
pub async fn run(config: &SandboxConfig, source: &str) -> Result<Evaluation, SandboxError> {
    config.policy.check(source)?;

    let worker = Worker::start()?;
    let timeout = config.timeout;
    let submission = source.to_string();
    let started = Instant::now();

    let outcome = worker
        .submit(
            move |rt| rt.block_on(runtime::evaluate(&submission, timeout)),
            timeout + TEARDOWN_GRACE,
        )
        .await;
    worker.stop();
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(output)) => Ok(Evaluation {
            output: if output.is_empty() {
                NO_OUTPUT.to_string()
            } else {
                output
            },
            elapsed,
        }),
        Ok(Err(e)) => Err(e),
        // The caller-side bound only fires if the watchdog failed to tear
        // the script down in time; report the configured limit either way.
        Err(SandboxError::Timed(_)) => Err(SandboxError::Timed(timeout.as_secs())),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    /// Tests that observe the global worker spawn counter take this lock so
    /// parallel test threads cannot skew each other's readings.
    pub static SERIAL: Mutex<()> = Mutex::new(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn quick_config() -> SandboxConfig {
        SandboxConfig {
            timeout: Duration::from_millis(500),
            policy: Policy::default(),
        }
    }

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        test_support::SERIAL
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[tokio::test]
    async fn captured_output_comes_back() {
        let _guard = serial();
        let result = run(&quick_config(), "print(\"A\");\nconsole.log(\"B\");")
            .await
            .unwrap();
        assert_eq!(result.output, "A\nB\n");
    }

    #[tokio::test]
    async fn silent_submissions_get_the_sentinel() {
        let _guard = serial();
        let result = run(&quick_config(), "let x = 1 + 1;").await.unwrap();
        assert_eq!(result.output, NO_OUTPUT);
    }

    #[tokio::test]
    async fn overlong_submissions_are_rejected_before_any_worker_spawns() {
        let _guard = serial();
        let before = worker::SPAWNED.load(Ordering::Relaxed);
        let source = "print(1);\n".repeat(301);
        let err = run(&quick_config(), &source).await.unwrap_err();
        assert!(matches!(
            err,
            SandboxError::Rejected(Rejection::TooLong { .. })
        ));
        assert_eq!(worker::SPAWNED.load(Ordering::Relaxed), before);
    }

    #[tokio::test]
    async fn denylisted_words_are_rejected_without_execution() {
        let _guard = serial();
        let before = worker::SPAWNED.load(Ordering::Relaxed);
        let err = run(&quick_config(), "Deno.exit(0)").await.unwrap_err();
        assert!(matches!(
            err,
            SandboxError::Rejected(Rejection::ForbiddenWord(_))
        ));
        assert_eq!(worker::SPAWNED.load(Ordering::Relaxed), before);
    }

    #[tokio::test]
    async fn sleeping_submissions_time_out_at_the_bound() {
        let _guard = serial();
        let started = Instant::now();
        let err = run(&quick_config(), "await sleep(120000);")
            .await
            .unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, SandboxError::Timed(_)), "got {err:?}");
        // Configured bound is 500ms; the worker must also be joined by now,
        // which run() guarantees before returning.
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn busy_loops_are_terminated() {
        let _guard = serial();
        let started = Instant::now();
        let err = run(&quick_config(), "while (true) {}").await.unwrap_err();
        assert!(matches!(err, SandboxError::Timed(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn exceptions_report_kind_and_message_and_drop_prior_output() {
        let _guard = serial();
        let err = run(
            &quick_config(),
            "print(\"A\");\nprint(\"B\");\nthrow new TypeError(\"x\");",
        )
        .await
        .unwrap_err();
        match err {
            SandboxError::Failed { kind, message } => {
                assert_eq!(kind, "TypeError");
                assert_eq!(message, "x");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn syntax_errors_are_reported_not_propagated() {
        let _guard = serial();
        let err = run(&quick_config(), "let = ;").await.unwrap_err();
        match err {
            SandboxError::Failed { kind, .. } => assert_eq!(kind, "SyntaxError"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn short_sleeps_suspend_and_resume() {
        let _guard = serial();
        let result = run(&quick_config(), "await sleep(20);\nprint(\"woke\");")
            .await
            .unwrap();
        assert_eq!(result.output, "woke\n");
    }

    #[tokio::test]
    async fn reruns_are_independent_and_identical() {
        let _guard = serial();
        let before = worker::SPAWNED.load(Ordering::Relaxed);
        let source = "print(3 * 7);";
        let first = run(&quick_config(), source).await.unwrap();
        let second = run(&quick_config(), source).await.unwrap();
        assert_eq!(first.output, "21\n");
        assert_eq!(first.output, second.output);
        assert_eq!(worker::SPAWNED.load(Ordering::Relaxed), before + 2);
    }
}
