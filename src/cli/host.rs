//! Headless host loop.
//!
//! Plays the part of an interactive host: enters the execution context, ticks once per simulated frame, and leaves the
//! context when the run ends. There is no user to press resume, so a pause after a failure is resumed on the next
//! frame.

use crate::errors::RunnerError;
use crate::observer::TestSummary;
use crate::scheduler::Scheduler;

/// Run the selected units to completion, or until `max_ticks` frames have passed.
pub fn drive(scheduler: &mut Scheduler, max_ticks: u64) -> Result<TestSummary, RunnerError> {
    scheduler.on_host_context_entered();
    if let Err(err) = scheduler.start() {
        scheduler.on_host_context_exited();
        return Err(err);
    }

    while scheduler.is_running() {
        if scheduler.tick_count() >= max_ticks {
            tracing::warn!(max_ticks, "tick budget exhausted; stopping run");
            scheduler.stop();
            break;
        }
        if scheduler.is_paused() && scheduler.current().is_none() {
            tracing::debug!("resuming paused run");
            scheduler.resume();
        }
        scheduler.tick();
    }

    let summary = scheduler.summary();
    scheduler.on_host_context_exited();
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::demo;
    use crate::config::RunnerConfig;

    fn demo_scheduler(with_failures: bool) -> Scheduler {
        let mut scheduler = Scheduler::new(RunnerConfig::default()).with_hooks(demo::hooks());
        scheduler.ingest(demo::catalog(with_failures));
        scheduler.catalog_mut().select_all();
        scheduler
    }

    #[test]
    fn test_drive_runs_everything_selected() {
        let mut scheduler = demo_scheduler(false);
        let summary = drive(&mut scheduler, 1_000).unwrap();
        assert_eq!(summary.passed, 6);
        assert_eq!(summary.failed, 0);
        assert!(!scheduler.is_host_active());
    }

    #[test]
    fn test_drive_resumes_after_pause_on_fail() {
        let mut scheduler = demo_scheduler(true);
        let summary = drive(&mut scheduler, 1_000).unwrap();
        assert_eq!(summary.total, 8);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn test_drive_respects_tick_budget() {
        let mut scheduler = demo_scheduler(false);
        let summary = drive(&mut scheduler, 2).unwrap();
        assert_eq!(summary.ticks, 2);
        assert!(summary.total < 6);
        assert!(!scheduler.is_running());
    }
}
