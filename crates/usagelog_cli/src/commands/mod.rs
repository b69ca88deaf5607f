//! CLI command implementations.

pub mod inspect;
pub mod pack;
pub mod replicate;
pub mod schema;
