/// Classification of a failed step, deciding how the caller reacts.
///
/// `Retryable` failures are re-attempted after a delay, `Recoverable` ones
/// signal a broken precondition that the recovery procedure can repair, and
/// anything `Fatal` terminates the caller.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A transient failure; the same step may be attempted again.
    #[error("{0}")]
    Retryable(anyhow::Error),
    /// A violated precondition; recovery is required before continuing.
    #[error("{0}")]
    Recoverable(anyhow::Error),
    /// An unrecoverable failure.
    #[error("{0}")]
    Fatal(anyhow::Error),
}

impl StepError {
    /// Wraps `error` as [`StepError::Retryable`].
    pub fn retryable(error: impl Into<anyhow::Error>) -> Self {
        Self::Retryable(error.into())
    }

    /// Wraps `error` as [`StepError::Recoverable`].
    pub fn recoverable(error: impl Into<anyhow::Error>) -> Self {
        Self::Recoverable(error.into())
    }

    /// Returns `true` for [`StepError::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Returns `true` for [`StepError::Recoverable`].
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }

    /// Consumes the classification and returns the underlying error.
    pub fn into_inner(self) -> anyhow::Error {
        match self {
            Self::Retryable(e) | Self::Recoverable(e) | Self::Fatal(e) => e,
        }
    }
}

/// Unclassified errors are assumed to be fatal rather than something that can be retried.
impl From<anyhow::Error> for StepError {
    fn from(e: anyhow::Error) -> Self {
        Self::Fatal(e)
    }
}
