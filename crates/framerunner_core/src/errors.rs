//! Configuration diagnostics raised while ingesting a discovery batch.
//!
//! None of these are fatal: the offending entry is skipped and the rest of the batch is kept.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigError {
    #[error("duplicate test path `{path}` in discovery batch")]
    #[diagnostic(
        code(framerunner::duplicate_path),
        help("the first descriptor with this path was kept")
    )]
    DuplicatePath { path: String },

    #[error("test discovered at `{origin}` has an empty path")]
    #[diagnostic(code(framerunner::empty_path))]
    EmptyPath { origin: String },

    #[error("group `{group}` cannot hold both suite and non-suite tests (rejected `{path}`)")]
    #[diagnostic(
        code(framerunner::mixed_suite_group),
        help("move suite-sourced tests into their own group")
    )]
    MixedSuiteGroup { group: String, path: String },
}

impl ConfigError {
    /// Path of the entry that was skipped (empty for [`ConfigError::EmptyPath`]).
    pub fn path(&self) -> &str {
        match self {
            ConfigError::DuplicatePath { path } | ConfigError::MixedSuiteGroup { path, .. } => path,
            ConfigError::EmptyPath { .. } => "",
        }
    }
}
