use super::filter::Rejection;

/// Everything that can go wrong between receiving a submission and
/// producing its output. All variants are absorbed at the command layer;
/// none of them may crash the bot.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The static pre-filter refused the source before any execution.
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// The submission did not finish within the configured wall-clock bound.
    #[error("execution exceeded the {0} second limit")]
    Timed(u64),

    /// The submitted code threw, or failed to compile.
    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },

    /// The worker thread could not be started.
    #[error("failed to start the sandbox worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread went away before returning a result.
    #[error("the sandbox worker exited before returning a result")]
    Gone,
}
