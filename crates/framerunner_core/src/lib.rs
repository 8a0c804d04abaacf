#![forbid(unsafe_code)]
//! Provide the shared vocabulary for the framerunner test scheduler.
//!
//! This crate is intentionally small and dependency-light. It contains the plain data that both:
//! - the scheduler uses to build its unit arena and group tree, and
//! - discovery collaborators and hosts use to describe tests and read results back.
//!
//! ## Notes
//!
//! - No IO, no global state, and no scheduler types: everything here is a value.
//! - Current scope: test descriptors, result values (and their aggregation rule), slash-separated test paths, and
//!   configuration diagnostics raised while ingesting discovery batches.

pub mod descriptor;
pub mod errors;
pub mod path;
pub mod result;

pub use descriptor::{Descriptor, Origin};
pub use errors::ConfigError;
pub use result::TestResult;
