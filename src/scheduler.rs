//! The tick-driven scheduler.
//!
//! The scheduler owns the catalog, the queue and the single execution slot. Hosts call [`Scheduler::tick`] once per
//! frame; each tick does at most one thing:
//! - nothing executing, not paused, and work pending: dequeue and begin the next unit,
//! - a multi-step unit executing: resume it once.
//!
//! A unit begun in a tick that completes synchronously frees the slot within the same tick. When a tick ends with
//! nothing executing and nothing pending, the run stops.
//!
//! ## State machine
//!
//! `Idle -> Running -> (Paused) -> Idle`. Pausing only blocks dequeuing; it never interrupts the executing unit.
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::time::Duration;

use framerunner_core::{Descriptor, TestResult};
use serde::{Deserialize, Serialize};

use crate::body::TestFn;
use crate::catalog::{Catalog, IngestReport};
use crate::config::RunnerConfig;
use crate::context::{FailureChannel, FailureSignal};
use crate::errors::RunnerError;
use crate::hooks::{DefaultFixtures, FixtureProvider, HookRegistry};
use crate::observer::{RunObserver, TestSummary};
use crate::queue::RunQueue;
use crate::unit::{Cancel, Progress, RunEnv, RunPhase, RunUpdate, TestUnit, UnitId};

/// Coarse scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
}

pub struct Scheduler {
    config: RunnerConfig,
    catalog: Catalog,
    queue: RunQueue,
    hooks: HookRegistry,
    fixtures: Box<dyn FixtureProvider>,
    failures: FailureChannel,
    observers: Vec<Box<dyn RunObserver>>,
    host_active: bool,
    running: bool,
    paused: bool,
    current: Option<UnitId>,
    tick_count: u64,
    elapsed: Duration,
    summary: TestSummary,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: RunnerConfig) -> Self {
        let queue = RunQueue::new().with_history_limit(config.history_limit);
        Self {
            config,
            catalog: Catalog::new(),
            queue,
            hooks: HookRegistry::new(),
            fixtures: Box::new(DefaultFixtures::new()),
            failures: FailureChannel::new(),
            observers: Vec::new(),
            host_active: false,
            running: false,
            paused: false,
            current: None,
            tick_count: 0,
            elapsed: Duration::ZERO,
            summary: TestSummary::default(),
        }
    }

    /// Replace the default fixture collaborator.
    pub fn with_fixtures(mut self, fixtures: impl FixtureProvider + 'static) -> Self {
        self.fixtures = Box::new(fixtures);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn add_observer(&mut self, observer: impl RunObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ---- accessors ----

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Catalog access for selection, lock and expand mutators.
    ///
    /// Ingest through [`Scheduler::ingest`] rather than the catalog so an executing unit that disappears is torn down.
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn queue(&self) -> &RunQueue {
        &self.queue
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn state(&self) -> SchedulerState {
        match (self.running, self.paused) {
            (false, _) => SchedulerState::Idle,
            (true, false) => SchedulerState::Running,
            (true, true) => SchedulerState::Paused,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_host_active(&self) -> bool {
        self.host_active
    }

    pub fn current(&self) -> Option<UnitId> {
        self.current
    }

    pub fn current_unit(&self) -> Option<&TestUnit> {
        self.current.and_then(|id| self.catalog.unit(id))
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Counters for the current or most recent run.
    pub fn summary(&self) -> TestSummary {
        TestSummary {
            ticks: self.tick_count,
            elapsed: self.elapsed,
            ..self.summary
        }
    }

    /// Where `id` stands relative to the current run.
    pub fn phase_of(&self, id: UnitId) -> Option<RunPhase> {
        if self.current == Some(id) {
            return self.catalog.unit(id).and_then(TestUnit::phase);
        }
        if self.queue.contains(id) {
            return Some(RunPhase::Pending);
        }
        if self.queue.finished().any(|entry| entry.unit == id) {
            return Some(RunPhase::Finished);
        }
        None
    }

    // ---- discovery ----

    /// Reconcile the catalog with a discovery batch.
    ///
    /// Removed units leave the queue. If the executing unit was removed, its run is aborted and torn down.
    pub fn ingest(&mut self, discovered: Vec<(Descriptor, TestFn)>) -> IngestReport {
        let (report, detached) = self.catalog.ingest_detached(discovered);
        for mut unit in detached {
            self.queue.remove(unit.id());
            if self.current == Some(unit.id()) {
                tracing::info!(path = unit.path(), "executing test removed by discovery; aborting");
                let mut env = RunEnv {
                    hooks: &self.hooks,
                    fixtures: &mut *self.fixtures,
                    failures: &self.failures,
                };
                let update = unit.cancel(&mut env, Cancel::Abort);
                self.current = None;
                self.failures.detach();
                self.emit_signals(&update.signals);
            }
        }
        report
    }

    // ---- host lifecycle ----

    pub fn on_host_context_entered(&mut self) {
        tracing::debug!("host context entered");
        self.host_active = true;
    }

    /// Leaving the host context always stops the run.
    pub fn on_host_context_exited(&mut self) {
        tracing::debug!("host context exited");
        self.host_active = false;
        self.stop();
    }

    /// Host environment reloaded: all in-flight and recorded state is discarded.
    pub fn on_environment_reload(&mut self) {
        self.reset();
    }

    // ---- run control ----

    /// Queue every selected unit in tree order and start running.
    ///
    /// ## Returns
    /// - (`usize`): number of units queued.
    ///
    /// ## Errors
    /// - [`RunnerError::NotRunnable`] outside an active host context, [`RunnerError::AlreadyRunning`] during a run.
    ///   Neither mutates any state.
    #[tracing::instrument(skip_all)]
    pub fn start(&mut self) -> Result<usize, RunnerError> {
        self.check_startable()?;
        let selected = self.catalog.selected_units();
        Ok(self.launch(selected))
    }

    /// Run exactly `ids`, in the given order, ignoring selection.
    #[tracing::instrument(skip_all, fields(units = ids.len()))]
    pub fn run_units(&mut self, ids: &[UnitId]) -> Result<usize, RunnerError> {
        self.check_startable()?;
        if let Some(missing) = ids.iter().find(|id| self.catalog.unit(**id).is_none()) {
            return Err(RunnerError::UnknownUnit(*missing));
        }
        Ok(self.launch(ids.to_vec()))
    }

    /// Advance by one frame of the configured delta.
    pub fn tick(&mut self) {
        self.advance(self.config.frame_delta);
    }

    /// Advance by one frame of `delta`. No-op when not running.
    pub fn advance(&mut self, delta: Duration) {
        if !self.running {
            return;
        }
        self.tick_count += 1;
        self.elapsed += delta;

        match self.current {
            Some(id) => self.step_current(id),
            None if !self.paused => {
                if let Some(id) = self.next_pending() {
                    self.begin_unit(id);
                }
            }
            None => {}
        }

        if self.running && self.current.is_none() && self.queue.is_empty() {
            self.stop();
        }
    }

    /// End the run.
    ///
    /// An executing unit is aborted: its producer is dropped, tear-down runs, its result goes back to `NotRun` and it
    /// is not recorded as finished. Pending units are discarded.
    pub fn stop(&mut self) {
        if let Some(id) = self.current.take() {
            if let Some(unit) = self.catalog.units.get_mut(&id) {
                tracing::info!(path = unit.path(), "aborting executing test");
                let mut env = RunEnv {
                    hooks: &self.hooks,
                    fixtures: &mut *self.fixtures,
                    failures: &self.failures,
                };
                let update = unit.cancel(&mut env, Cancel::Abort);
                self.emit_signals(&update.signals);
            }
        }
        self.queue.clear_pending();
        self.failures.clear();
        self.paused = false;

        if !self.running {
            return;
        }
        self.running = false;
        let summary = self.summary();
        tracing::info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            ticks = summary.ticks,
            "test run ended"
        );
        for observer in &mut self.observers {
            observer.on_run_ended(&summary);
        }
    }

    /// Skip the executing unit, or begin the next pending one if nothing is executing.
    ///
    /// A skipped unit is torn down, recorded as `Skipped`, and its producer is never resumed again.
    pub fn skip(&mut self) {
        if !self.running {
            return;
        }
        match self.current {
            Some(id) => {
                let Some(unit) = self.catalog.units.get_mut(&id) else {
                    self.current = None;
                    return;
                };
                tracing::debug!(path = unit.path(), "skipping test");
                let mut env = RunEnv {
                    hooks: &self.hooks,
                    fixtures: &mut *self.fixtures,
                    failures: &self.failures,
                };
                let update = unit.cancel(&mut env, Cancel::Skip);
                self.apply(id, update);
            }
            None => {
                if let Some(id) = self.next_pending() {
                    self.begin_unit(id);
                }
            }
        }
    }

    /// Stop dequeuing after the executing unit. Has no effect on the executing unit itself.
    pub fn pause(&mut self) {
        if !self.running || self.paused {
            return;
        }
        self.paused = true;
        let unit = self.current.and_then(|id| self.catalog.units.get(&id));
        for observer in &mut self.observers {
            observer.on_paused(unit);
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Remove a unit from the pending queue.
    pub fn remove_pending(&mut self, id: UnitId) -> bool {
        self.queue.remove(id)
    }

    /// Move a pending unit, clamping `index` into the queue.
    pub fn reorder_pending(&mut self, id: UnitId, index: usize) -> Option<usize> {
        self.queue.reorder(id, index)
    }

    /// Stop, then clear results, history and counters.
    pub fn reset(&mut self) {
        self.stop();
        for unit in self.catalog.units.values_mut() {
            unit.result = TestResult::NotRun;
        }
        self.queue.clear_finished();
        self.tick_count = 0;
        self.elapsed = Duration::ZERO;
        self.summary = TestSummary::default();
    }

    // ---- failures ----

    /// Report a failure against the executing unit.
    ///
    /// ## Returns
    /// - (`bool`): `false` when nothing is executing; the report is dropped.
    pub fn report_failure(&self, message: impl Into<String>) -> bool {
        self.failures.report(message)
    }

    /// A handle for reporting failures from outside the scheduler, such as a host log hook.
    pub fn failure_channel(&self) -> FailureChannel {
        self.failures.clone()
    }

    // ---- internals ----

    fn check_startable(&self) -> Result<(), RunnerError> {
        if !self.host_active {
            return Err(RunnerError::NotRunnable);
        }
        if self.running {
            return Err(RunnerError::AlreadyRunning);
        }
        Ok(())
    }

    fn launch(&mut self, ids: Vec<UnitId>) -> usize {
        self.queue.clear_finished();
        self.queue.clear_pending();
        for id in ids {
            self.queue.enqueue(id);
        }
        let queued = self.queue.pending_len();

        self.running = true;
        self.paused = false;
        self.current = None;
        self.tick_count = 0;
        self.elapsed = Duration::ZERO;
        self.summary = TestSummary::default();
        self.failures.clear();

        tracing::info!(queued, "test run started");
        for observer in &mut self.observers {
            observer.on_run_started(queued);
        }
        queued
    }

    fn next_pending(&mut self) -> Option<UnitId> {
        while let Some(id) = self.queue.dequeue_next() {
            if self.catalog.units.contains_key(&id) {
                return Some(id);
            }
            tracing::debug!(unit = %id, "dropping stale queue entry");
        }
        None
    }

    fn begin_unit(&mut self, id: UnitId) {
        let Some(unit) = self.catalog.units.get_mut(&id) else {
            return;
        };
        tracing::debug!(path = unit.path(), "starting test");
        self.current = Some(id);
        self.failures.attach(unit.path());
        for observer in &mut self.observers {
            observer.on_test_started(unit);
        }
        let mut env = RunEnv {
            hooks: &self.hooks,
            fixtures: &mut *self.fixtures,
            failures: &self.failures,
        };
        let update = unit.begin(&mut env);
        self.apply(id, update);
    }

    fn step_current(&mut self, id: UnitId) {
        let Some(unit) = self.catalog.units.get_mut(&id) else {
            self.current = None;
            self.failures.detach();
            return;
        };
        let mut env = RunEnv {
            hooks: &self.hooks,
            fixtures: &mut *self.fixtures,
            failures: &self.failures,
        };
        let update = unit.advance(&mut env);
        self.apply(id, update);
    }

    fn apply(&mut self, id: UnitId, update: RunUpdate) {
        self.emit_signals(&update.signals);
        match update.progress {
            Progress::Suspended => {}
            Progress::Aborted => {
                self.current = None;
                self.failures.detach();
            }
            Progress::Finished(result) => {
                self.current = None;
                self.failures.detach();
                self.complete(id, result);
            }
        }
    }

    fn complete(&mut self, id: UnitId, result: TestResult) {
        let Some(unit) = self.catalog.units.get(&id) else {
            return;
        };
        self.queue.finish(id, unit.path(), result);
        self.summary.total += 1;
        match result {
            TestResult::Passed => self.summary.passed += 1,
            TestResult::Failed => self.summary.failed += 1,
            TestResult::Skipped => self.summary.skipped += 1,
            TestResult::NotRun => {}
        }
        for observer in &mut self.observers {
            observer.on_test_completed(unit, result);
        }

        if result == TestResult::Failed {
            if unit.descriptor().pause_on_fail() && !self.paused {
                tracing::info!(path = unit.path(), "pausing after failure");
                self.paused = true;
                for observer in &mut self.observers {
                    observer.on_paused(Some(unit));
                }
            }
            if self.config.stop_on_fail {
                tracing::info!(path = unit.path(), "stopping after first failure");
                self.stop();
            }
        }
    }

    fn emit_signals(&mut self, signals: &[FailureSignal]) {
        for signal in signals {
            for observer in &mut self.observers {
                observer.on_failure(signal);
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("host_active", &self.host_active)
            .field("current", &self.current)
            .field("pending", &self.queue.pending_len())
            .field("finished", &self.queue.finished_len())
            .field("tick_count", &self.tick_count)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::body::{Body, test_fn};
    use crate::observer::{EventLog, RunEvent};

    fn pass() -> TestFn {
        test_fn(|_| Ok(Body::Complete))
    }

    fn active(paths: &[&str]) -> Scheduler {
        let mut scheduler = Scheduler::default();
        scheduler.ingest(paths.iter().map(|p| (Descriptor::new(p), pass())).collect());
        scheduler.catalog_mut().select_all();
        scheduler.on_host_context_entered();
        scheduler
    }

    #[test]
    fn test_start_requires_host_context() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.start(), Err(RunnerError::NotRunnable));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut scheduler = active(&["a/one"]);
        assert_eq!(scheduler.start(), Ok(1));
        assert_eq!(scheduler.start(), Err(RunnerError::AlreadyRunning));
    }

    #[test]
    fn test_tick_is_noop_when_idle() {
        let mut scheduler = active(&["a/one"]);
        scheduler.tick();
        assert_eq!(scheduler.tick_count(), 0);
        assert_eq!(scheduler.queue().finished_len(), 0);
    }

    #[test]
    fn test_run_stops_when_queue_drains() {
        let log = EventLog::new();
        let mut scheduler = active(&["a/one", "a/two"]);
        scheduler.add_observer(log.clone());
        scheduler.start().unwrap();
        scheduler.tick();
        assert!(scheduler.is_running());
        scheduler.tick();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.summary().passed, 2);
        assert!(matches!(log.events().last(), Some(RunEvent::RunEnded { .. })));
    }

    #[test]
    fn test_advance_accumulates_elapsed() {
        let mut scheduler = active(&["a/one"]);
        scheduler.run_units(&[scheduler.catalog().id_of("a/one").unwrap()]).unwrap();
        scheduler.advance(Duration::from_millis(10));
        assert_eq!(scheduler.elapsed(), Duration::from_millis(10));
        assert_eq!(scheduler.tick_count(), 1);
    }

    #[test]
    fn test_run_units_rejects_unknown_ids() {
        let mut scheduler = active(&["a/one"]);
        assert_eq!(
            scheduler.run_units(&[UnitId(42)]),
            Err(RunnerError::UnknownUnit(UnitId(42)))
        );
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_host_exit_stops_run() {
        let mut scheduler = active(&["a/one", "a/two"]);
        scheduler.start().unwrap();
        scheduler.on_host_context_exited();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.queue().pending_len(), 0);
    }

    #[test]
    fn test_stop_on_fail_ends_run() {
        let mut scheduler = Scheduler::new(RunnerConfig::new().with_stop_on_fail(true));
        scheduler.ingest(vec![
            (Descriptor::new("a/bad"), test_fn(|ctx| {
                ctx.fail("boom");
                Ok(Body::Complete)
            })),
            (Descriptor::new("a/good"), pass()),
        ]);
        scheduler.catalog_mut().select_all();
        scheduler.on_host_context_entered();
        scheduler.start().unwrap();
        scheduler.tick();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.summary().failed, 1);
        assert_eq!(
            scheduler.catalog().unit_by_path("a/good").unwrap().result(),
            TestResult::NotRun
        );
    }

    #[test]
    fn test_report_failure_without_executing_unit_is_dropped() {
        let scheduler = active(&["a/one"]);
        assert!(!scheduler.report_failure("stray"));
    }

    #[test]
    fn test_reset_clears_results() {
        let mut scheduler = active(&["a/one"]);
        scheduler.start().unwrap();
        scheduler.tick();
        assert_eq!(scheduler.queue().finished_len(), 1);
        scheduler.reset();
        assert_eq!(scheduler.queue().finished_len(), 0);
        assert_eq!(scheduler.tick_count(), 0);
        assert_eq!(
            scheduler.catalog().unit_by_path("a/one").unwrap().result(),
            TestResult::NotRun
        );
    }
}
