//! Replicate command implementation.

use std::path::Path;
use std::time::Duration;
use usagelog_replication::{ReplicationConfig, ReplicationReport, Replicator};
use usagelog_store::{SchemaProfile, SqliteStore};

/// Options for one replication run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Fact rows per insert statement.
    pub batch_size: Option<usize>,
    /// Run timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Server schema layout.
    pub profile: SchemaProfile,
}

impl Options {
    fn config(&self) -> ReplicationConfig {
        let mut config = ReplicationConfig::new().with_profile(self.profile);
        if let Some(size) = self.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Replicates the payload at `payload` into the server at `db`.
pub fn run(
    db: &Path,
    user: &str,
    app_version: &str,
    payload: &Path,
    options: &Options,
) -> Result<ReplicationReport, Box<dyn std::error::Error>> {
    if !db.exists() {
        return Err(format!("No database found at {}", db.display()).into());
    }
    let bytes = std::fs::read(payload)?;
    tracing::debug!(path = %payload.display(), len = bytes.len(), "payload read");

    let replicator = Replicator::new(options.config())?;
    let mut store = SqliteStore::open(db)?;
    Ok(replicator.replicate_run(user, app_version, &mut store, &bytes)?)
}
