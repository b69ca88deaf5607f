//! Configuration for replication runs.

use crate::error::{ReplicationError, ReplicationResult};
use std::time::Duration;
use usagelog_store::SchemaProfile;

/// Default number of fact rows per multi-row insert.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Largest accepted batch size. Keeps the widest fact statement well under
/// SQLite's bound-parameter limit.
pub const MAX_BATCH_SIZE: usize = 1024;

/// Configuration for a [`crate::Replicator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    /// Fact rows per multi-row insert.
    pub batch_size: usize,
    /// Server schema layout.
    pub profile: SchemaProfile,
    /// Upper bound on one run's duration.
    pub timeout: Option<Duration>,
}

impl ReplicationConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            profile: SchemaProfile::Tagged,
            timeout: None,
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the schema profile.
    pub fn with_profile(mut self, profile: SchemaProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::InvalidConfig`] for a batch size outside
    /// `1..=MAX_BATCH_SIZE` or a zero timeout.
    pub fn validate(&self) -> ReplicationResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ReplicationError::invalid_config(format!(
                "batch size {} outside 1..={MAX_BATCH_SIZE}",
                self.batch_size
            )));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ReplicationError::invalid_config("timeout must be non-zero"));
        }
        Ok(())
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ReplicationConfig::default();
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.profile, SchemaProfile::Tagged);
        assert!(config.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder() {
        let config = ReplicationConfig::new()
            .with_batch_size(10)
            .with_profile(SchemaProfile::Untagged)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.profile, SchemaProfile::Untagged);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn validation() {
        assert!(ReplicationConfig::new().with_batch_size(0).validate().is_err());
        assert!(ReplicationConfig::new()
            .with_batch_size(MAX_BATCH_SIZE)
            .validate()
            .is_ok());
        assert!(ReplicationConfig::new()
            .with_batch_size(MAX_BATCH_SIZE + 1)
            .validate()
            .is_err());
        assert!(ReplicationConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
