use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Pool;
use crate::error::RepoError;
use crate::executor::ConnectionManager;
use crate::observer::{Observer, TracingObserver};

/// Sizing and timeout settings for a [`Pool`].
///
/// Deserializes from e.g. `{"max_size": 4, "acquire_timeout_ms": 250}`; missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on idle + in-use connections.
    pub max_size: usize,
    /// How long `acquire` waits for a connection before giving up.
    #[serde(rename = "acquire_timeout_ms", with = "duration_ms")]
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn new(max_size: usize, acquire_timeout: Duration) -> Self {
        Self {
            max_size,
            acquire_timeout,
        }
    }

    /// # Errors
    /// Returns `RepoError::InvalidArgument` if `max_size` is zero.
    pub fn validate(&self) -> Result<(), RepoError> {
        if self.max_size == 0 {
            return Err(RepoError::InvalidArgument(
                "max_size must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for a [`Pool`].
pub struct PoolBuilder {
    config: PoolConfig,
    observer: Arc<dyn Observer>,
}

impl PoolBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Replace the default [`TracingObserver`].
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Build the pool. No connection is opened until the first `acquire`.
    ///
    /// # Errors
    /// Returns `RepoError::InvalidArgument` if the configuration is invalid.
    pub fn build<M: ConnectionManager>(self, manager: M) -> Result<Pool<M>, RepoError> {
        Pool::with_observer(manager, self.config, self.observer)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
