/// Failures raised by the underlying record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("store backend failure: {message}")]
    Backend { message: String },
}

/// Failures a ranking request can surface to its caller. A request either
/// produces a complete page or fails with one of these; partial pages are
/// never returned.
#[derive(Debug, thiserror::Error)]
pub enum RankError {
    /// Missing or malformed request parameter. Never retried.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The request needed data the cohort does not have, e.g. a most-recent
    /// term lookup against a cohort with no recorded scores.
    #[error("not found: {0}")]
    NotFound(String),

    /// Infrastructure failure from the store, message passed through for
    /// diagnostics.
    #[error(transparent)]
    Store(#[from] StoreError),
}
