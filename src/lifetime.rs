//! Resolution of per-store lifetimes.

use std::time::Duration;

use crate::error::LifetimeError;

/// Resolves the effective lifetime of a store.
///
/// Explicit lifetimes are summed; a zero sum falls back to `default`.
/// `Ok(None)` means the entry is persistent and gets no watcher.
pub fn resolve<I>(explicit: I, default: Duration) -> Result<Option<Duration>, LifetimeError>
where
    I: IntoIterator<Item = Duration>,
{
    let total = explicit
        .into_iter()
        .try_fold(Duration::ZERO, |acc, d| acc.checked_add(d))
        .ok_or(LifetimeError::Overflow)?;

    let total = if total.is_zero() { default } else { total };
    Ok((!total.is_zero()).then_some(total))
}

/// Converts a signed millisecond count into a lifetime, rejecting negatives.
pub fn from_millis(ms: i64) -> Result<Duration, LifetimeError> {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| LifetimeError::Negative(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_no_lifetime_and_zero_default_is_persistent() {
        assert_eq!(resolve(std::iter::empty(), Duration::ZERO), Ok(None));
        assert_eq!(resolve([Duration::ZERO], Duration::ZERO), Ok(None));
    }

    #[test]
    fn test_falls_back_to_default() {
        assert_eq!(resolve(std::iter::empty(), 5 * MS), Ok(Some(5 * MS)));
    }

    #[test]
    fn test_explicit_lifetimes_are_summed() {
        assert_eq!(resolve([10 * MS, 15 * MS], 5 * MS), Ok(Some(25 * MS)));
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(
            resolve([Duration::MAX, MS], Duration::ZERO),
            Err(LifetimeError::Overflow)
        );
    }

    #[test]
    fn test_signed_millis() {
        assert_eq!(from_millis(40), Ok(40 * MS));
        assert_eq!(from_millis(0), Ok(Duration::ZERO));
        assert_eq!(from_millis(-1), Err(LifetimeError::Negative(-1)));
    }
}
