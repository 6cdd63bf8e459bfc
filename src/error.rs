/// Errors surfaced by the fetch boundary, the asset cache and the reconciler.
///
/// The enum is `Clone` because a single outcome is handed to every caller
/// that joined a shared in-flight lookup or refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    /// Transport or HTTP-level failure (status >= 400, connection reset, timeout).
    #[error("fetch failed: {0}")]
    FetchFailure(String),
    /// The remote answered but the body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The tracker was stopped before the operation could succeed.
    #[error("balance tracker stopped")]
    Cancelled,
}

impl BalanceError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::FetchFailure(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Both fetch kinds are assumed transient: the remote services are
    /// expected to become reachable and consistent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailure(_) | Self::MalformedResponse(_))
    }
}

impl From<reqwest::Error> for BalanceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::MalformedResponse(error.to_string())
        } else {
            Self::FetchFailure(error.to_string())
        }
    }
}

impl From<serde_json::Error> for BalanceError {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedResponse(error.to_string())
    }
}

pub type BalanceResult<T> = Result<T, BalanceError>;
