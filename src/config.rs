use std::{sync::Arc, time::Duration};

use crate::{local::ConfigSource, LocalClient, Result};

/// Configuration for a polling [`LocalClient`].
///
/// # Examples
/// ```
/// # use std::{sync::Arc, time::Duration};
/// # use configcat_openfeature::{LocalClientConfig, SingleValueCache};
/// let cache = Arc::new(SingleValueCache::new(""));
/// let config = LocalClientConfig::new(cache)
///     .with_interval(Duration::from_secs(5))
///     .with_jitter(Duration::from_millis(500));
/// ```
pub struct LocalClientConfig {
    pub(crate) source: Arc<dyn ConfigSource>,
    pub(crate) interval: Duration,
    pub(crate) jitter: Duration,
}

impl LocalClientConfig {
    /// Default value for the poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Default value for the poll jitter.
    pub const DEFAULT_POLL_JITTER: Duration = Duration::ZERO;

    /// Create a configuration reading documents from `source`.
    pub fn new(source: Arc<dyn ConfigSource>) -> LocalClientConfig {
        LocalClientConfig {
            source,
            interval: LocalClientConfig::DEFAULT_POLL_INTERVAL,
            jitter: LocalClientConfig::DEFAULT_POLL_JITTER,
        }
    }

    /// Update poll interval with `interval`.
    pub fn with_interval(mut self, interval: Duration) -> LocalClientConfig {
        self.interval = interval;
        self
    }

    /// Update poll interval jitter with `jitter`. Jitter shortens the wait by a random duration
    /// up to `jitter`.
    pub fn with_jitter(mut self, jitter: Duration) -> LocalClientConfig {
        self.jitter = jitter;
        self
    }

    /// Create a new [`LocalClient`] and start polling.
    pub fn to_client(self) -> Result<LocalClient> {
        LocalClient::with_source(self)
    }
}
