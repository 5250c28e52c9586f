use std::result;
use std::sync::PoisonError;
use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = result::Result<T, MetricError>;

/// Errors returned by the registry core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricError {
    /// Malformed metric name or tag key, rejected at key construction.
    #[error("invalid metric key: {0}")]
    InvalidKey(&'static str),
    /// A keyed-cache lookup for a value outside the domain fixed at
    /// build time. Indicates a programming error in the caller's
    /// domain enumeration, not a transient condition.
    #[error("unknown tag value: {0}")]
    UnknownTagValue(String),
    /// Invalid configuration, such as a `TagDomain` impl whose ordinals
    /// disagree with its declared value list.
    #[error("config error: {0}")]
    Config(String),
    /// Other errors not covered by specific cases.
    #[error("metrics error: {0}")]
    Other(String),
}

impl<T> From<PoisonError<T>> for MetricError {
    fn from(err: PoisonError<T>) -> Self {
        MetricError::Other(err.to_string())
    }
}
