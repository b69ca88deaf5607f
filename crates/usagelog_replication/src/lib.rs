//! # Usagelog Replication
//!
//! Merges device telemetry snapshots into the authoritative server schema.
//!
//! This crate provides:
//! - Natural-key catalogs and device-to-server id maps
//! - Create-or-reuse reconciliation of reference rows
//! - Batched insertion of fact rows
//! - The run coordinator, with cancellation and timeouts
//!
//! ## Architecture
//!
//! Device rows carry device-local ids that mean nothing on the server. A
//! run first reconciles every reference kind (Context, Step, Exception,
//! then Feature) into an [`IdMap`], then inserts fact rows with every
//! reference translated through those maps.
//!
//! ## Key Invariants
//!
//! - A device id is never written to the server untranslated
//! - Reference rows are created once per natural key and reused after
//! - Fact rows are never deduplicated
//! - A run commits completely or not at all

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod cancel;
mod catalog;
mod config;
mod coordinator;
mod error;
mod reconcile;

pub use batch::{BatchOutcome, FactTable};
pub use cancel::CancelHandle;
pub use catalog::{Catalog, FeatureKey, IdMap, NameKey};
pub use config::{ReplicationConfig, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
pub use coordinator::{ReplicationReport, Replicator};
pub use error::{EntityKind, ReplicationError, ReplicationResult};
pub use reconcile::{
    load_exception_catalog, load_feature_catalog, load_name_catalog, reconcile,
    reconcile_contexts, reconcile_exceptions, reconcile_features, reconcile_steps, Candidate,
    KindCounts, Reconciled,
};
