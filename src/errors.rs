//! Error types for test runs and scheduler control.
//!
//! Configuration diagnostics raised during ingestion live in [`framerunner_core::ConfigError`].

use std::panic::{self, AssertUnwindSafe};

use miette::Diagnostic;
use thiserror::Error;

use crate::unit::UnitId;

/// Errors that end a single test run.
///
/// Every variant finalizes the unit as failed; the scheduler then moves on to the next queued unit. Running outside
/// the host context is refused before any unit starts, as [`RunnerError::NotRunnable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("set-up hook `{hook}` did not produce a fixture")]
    SetupReturnTypeMismatch { hook: String },

    #[error("fixture has no `{component}` component")]
    MissingFixtureComponent { component: &'static str },

    #[error("no hook registered under `{hook}`")]
    UnknownHook { hook: String },

    #[error("{0}")]
    Body(String),

    #[error("test panicked: {message}")]
    Panicked { message: String },
}

impl RunError {
    /// Failure raised by test code itself.
    pub fn body(message: impl Into<String>) -> Self {
        RunError::Body(message.into())
    }

    /// Run `f`, turning a panic into [`RunError::Panicked`].
    pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, RunError>) -> Result<T, RunError> {
        panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(RunError::Panicked { message })
        })
    }
}

/// Errors returned by scheduler and catalog mutators.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum RunnerError {
    #[error("cannot run tests outside an active host context")]
    #[diagnostic(
        code(framerunner::not_runnable),
        help("enter the host execution context before starting a run")
    )]
    NotRunnable,

    #[error("a test run is already in progress")]
    #[diagnostic(code(framerunner::already_running))]
    AlreadyRunning,

    #[error("unknown test unit {0}")]
    #[diagnostic(code(framerunner::unknown_unit))]
    UnknownUnit(UnitId),

    #[error("unknown group `{0}`")]
    #[diagnostic(code(framerunner::unknown_group))]
    UnknownGroup(String),
}
