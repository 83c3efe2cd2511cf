/// Errors from any capability adapter.
///
/// The orchestrator does not branch on the variant: every capability error
/// fails the current step and counts against the retry ceiling.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service returned a non-2xx status code.
    #[error("{service} API error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The call did not finish within the configured bound.
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: std::time::Duration,
    },

    /// The input was rejected before any remote call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The service answered but produced nothing usable.
    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    /// Object storage rejected the write.
    #[error("Storage error: {0}")]
    Storage(String),
}
