use thiserror::Error;

/// Errors raised while constructing a map.
#[derive(Debug, Error)]
pub enum TMapError {
    #[error("tmap requires a Tokio runtime to spawn expiry watchers")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Errors raised while resolving an entry lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifetimeError {
    /// The explicit lifetimes add up to more than `Duration::MAX`.
    #[error("summed lifetime overflows")]
    Overflow,
    /// A signed lifetime was negative. Negative lifetimes are rejected rather
    /// than treated as persistent.
    #[error("negative lifetime: {0}ms")]
    Negative(i64),
}
