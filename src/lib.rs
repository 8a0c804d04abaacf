#![forbid(unsafe_code)]
//! Frame-stepped test orchestration for interactive hosts.
//!
//! Hosts (editors, game loops, simulators) hand this crate a discovery batch of test descriptors and invocables,
//! let the user select and lock them through a path-derived group tree, and then call [`Scheduler::tick`] once per
//! frame. Exactly one test executes at a time; multi-frame tests are step producers resumed once per tick.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `scheduler`
//!   modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Test bodies**: failures are reported through [`TestContext`] or returned as [`RunError`]; nothing a test does
//!   unwinds through the scheduler.

pub mod body;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod group;
pub mod hooks;
pub mod observer;
pub mod queue;
pub mod scheduler;
pub mod snapshot;
pub mod unit;

pub use framerunner_core::{ConfigError, Descriptor, Origin, TestResult, path};

pub use body::{Body, Step, StepProducer, TestFn, test_fn};
pub use catalog::{Catalog, IngestReport};
pub use config::RunnerConfig;
pub use context::{FailureChannel, FailureSignal, Fixture, FixtureHandle, TestContext};
pub use errors::{RunError, RunnerError};
pub use group::{Group, GroupTree};
pub use hooks::{DefaultFixtures, FixtureProvider, HookRegistry};
pub use observer::{EventLog, RunEvent, RunObserver, TestSummary};
pub use queue::{FinishedEntry, RunQueue};
pub use scheduler::{Scheduler, SchedulerState};
pub use snapshot::{GroupSnapshot, Snapshot, UnitSnapshot, render_tree};
pub use unit::{InvokeMode, RunPhase, TestUnit, UnitId};
