use std::time::Duration;

/// Construction options for [`TMap`](crate::TMap).
///
/// # Example
///
/// ```rust
/// use tmap::TMapConfig;
/// use std::time::Duration;
///
/// let config = TMapConfig::default()
///     .with_default_lifetime(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TMapConfig {
    /// Lifetime applied when a store supplies none. Zero (the default) keeps
    /// such entries until they are deleted.
    pub default_lifetime: Duration,
}

impl TMapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lifetime used by stores that do not supply their own.
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_persistent() {
        let config = TMapConfig::default();
        assert_eq!(config.default_lifetime, Duration::ZERO);
    }

    #[test]
    fn test_builder_sets_default_lifetime() {
        let config = TMapConfig::new().with_default_lifetime(Duration::from_millis(250));
        assert_eq!(config.default_lifetime, Duration::from_millis(250));
    }
}
