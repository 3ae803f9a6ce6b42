/// Errors raised while holding or reducing raw time-series data.
///
/// # Examples
///
/// ```rust
/// use advisor_common::error::DataError;
///
/// let err = DataError::EmptySeries {
///     entity: "db-01".to_string(),
///     statistic: "writes_per_sec".to_string(),
/// };
/// assert!(err.to_string().contains("writes_per_sec"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    /// A series exists for the pair but holds no samples.
    #[error("Data: empty series for statistic '{statistic}' on entity '{entity}'")]
    EmptySeries { entity: String, statistic: String },

    /// The sampling interval or reporting duration must be positive.
    #[error("Data: {name} must be greater than zero")]
    ZeroInterval { name: &'static str },
}

/// Errors returned by a [`crate::provider::SampleProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Reading the underlying sample source failed.
    #[error("Provider: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sample source could not be decoded.
    #[error("Provider: malformed samples from {source_name}: {message}")]
    Malformed {
        source_name: String,
        message: String,
    },

    /// The fetched data violates a store invariant.
    #[error("Provider: {0}")]
    Data(#[from] DataError),
}

/// Convenience `Result` alias for data operations.
pub type Result<T> = std::result::Result<T, DataError>;
