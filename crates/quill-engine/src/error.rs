use thiserror::Error;

/// Errors surfaced across the index worker boundary.
///
/// `Timeout` is deliberately distinct from an empty search result: "no
/// relevant notes found" is a successful outcome, an abandoned round-trip
/// is not.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("index worker request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("index worker is no longer running")]
    WorkerClosed,

    #[error("index worker rejected request: {0}")]
    Rejected(String),
}
