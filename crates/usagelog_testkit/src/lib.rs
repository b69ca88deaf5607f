//! # Usagelog Testkit
//!
//! Test utilities for usagelog.
//!
//! This crate provides:
//! - Provisioned server stores and shared sample snapshots
//! - Property-based snapshot generators using proptest
//! - Fault-injecting store wrappers
//!
//! ## Usage
//!
//! ```rust
//! use usagelog_testkit::prelude::*;
//!
//! let mut server = TestServer::memory();
//! assert_eq!(server.count("Feature"), 0);
//! assert_eq!(sample_snapshot().features[0].name, "CreateActivity");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
