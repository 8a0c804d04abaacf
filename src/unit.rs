//! Test units and the lifecycle of a single run.
//!
//! A [`TestUnit`] wraps a [`Descriptor`] and its invocable with the state the user and the scheduler mutate:
//! result, selection, lock, and the in-flight execution of the current run.
//!
//! ## Run lifecycle
//!
//! 1. Set-up: the named custom hook, or the default fixture from the [`FixtureProvider`]. A set-up error finalizes
//!    the run as failed without invoking the body.
//! 2. Invoke: the body runs with the fixture. A synchronous body is done at once; a multi-step body is resumed once
//!    in the same call and then once per [`TestUnit::advance`].
//! 3. Tear-down: the named custom hook, or the provider's destroy. Runs exactly once for every run whose set-up
//!    produced a fixture, including skipped and aborted runs.
//! 4. Finalize: a run with no failure signal passes. `Skipped` is only ever set by a skip.

use std::fmt;
use std::rc::Rc;

use framerunner_core::{Descriptor, TestResult};
use serde::{Deserialize, Serialize};

use crate::body::{Body, Step, StepProducer, TestFn};
use crate::context::{FailureChannel, FailureSignal, Fixture, TestContext};
use crate::errors::RunError;
use crate::hooks::{FixtureProvider, HookRegistry};

/// Stable handle for a unit inside a [`crate::Catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the body of the executing unit is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvokeMode {
    Sync,
    MultiStep,
}

/// Where a unit stands in its current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Queued, not started.
    Pending,
    SettingUp,
    Invoking(InvokeMode),
    TearingDown,
    /// Recorded in the finished sequence.
    Finished,
}

struct Execution {
    phase: RunPhase,
    fixture: Option<Fixture>,
    producer: Option<Box<dyn StepProducer>>,
}

/// How a run ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cancel {
    /// User skip: finalized as `Skipped`.
    Skip,
    /// Run torn down and discarded (stop, host exit, removal): result reset to `NotRun`.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Suspended,
    Finished(TestResult),
    Aborted,
}

/// What happened during one scheduler call into a unit.
#[derive(Debug)]
pub(crate) struct RunUpdate {
    pub progress: Progress,
    pub signals: Vec<FailureSignal>,
}

impl Default for RunUpdate {
    fn default() -> Self {
        Self {
            progress: Progress::Suspended,
            signals: Vec::new(),
        }
    }
}

/// Collaborators a run needs.
pub(crate) struct RunEnv<'a> {
    pub hooks: &'a HookRegistry,
    pub fixtures: &'a mut dyn FixtureProvider,
    pub failures: &'a FailureChannel,
}

/// Runtime wrapper around one descriptor.
pub struct TestUnit {
    id: UnitId,
    descriptor: Descriptor,
    invocable: TestFn,
    pub(crate) result: TestResult,
    pub(crate) selected: bool,
    pub(crate) locked: bool,
    execution: Option<Execution>,
    /// Producer resumes in the current or most recent run.
    steps: usize,
}

impl TestUnit {
    pub(crate) fn new(id: UnitId, descriptor: Descriptor, invocable: TestFn) -> Self {
        Self {
            id,
            descriptor,
            invocable,
            result: TestResult::NotRun,
            selected: false,
            locked: false,
            execution: None,
            steps: 0,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &str {
        self.descriptor.path()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn result(&self) -> TestResult {
        self.result
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether this unit holds in-flight execution state.
    pub fn is_executing(&self) -> bool {
        self.execution.is_some()
    }

    /// Phase of the in-flight run, if any.
    pub fn phase(&self) -> Option<RunPhase> {
        self.execution.as_ref().map(|exec| exec.phase)
    }

    /// Producer resumes in the current or most recent run. Zero for synchronous bodies.
    pub fn steps_taken(&self) -> usize {
        self.steps
    }

    /// Pick up a re-discovered descriptor and invocable.
    ///
    /// Selection, lock and result are left alone.
    ///
    /// ## Returns
    /// - (`bool`): whether the descriptor configuration changed.
    pub(crate) fn refresh(&mut self, descriptor: &Descriptor, invocable: TestFn) -> bool {
        self.invocable = invocable;
        self.descriptor.update_from(descriptor)
    }

    pub(crate) fn begin(&mut self, env: &mut RunEnv<'_>) -> RunUpdate {
        let mut update = RunUpdate::default();
        self.result = TestResult::NotRun;
        self.execution = Some(Execution {
            phase: RunPhase::SettingUp,
            fixture: None,
            producer: None,
        });
        self.steps = 0;

        let mut fixture = match self.set_up(env) {
            Ok(fixture) => fixture,
            Err(err) => {
                self.record_error(err, &mut update);
                self.execution = None;
                return self.finalize(env, update);
            }
        };

        self.set_phase(RunPhase::Invoking(InvokeMode::Sync));
        let invocable = Rc::clone(&self.invocable);
        let invoked = {
            let mut ctx = TestContext::new(&self.descriptor, &mut fixture, env.failures, 0);
            RunError::guard(|| invocable(&mut ctx))
        };
        if let Some(exec) = self.execution.as_mut() {
            exec.fixture = Some(fixture);
        }
        self.absorb(env.failures, &mut update);

        match invoked {
            Ok(Body::Complete) => {
                self.tear_down(env, &mut update);
                self.finalize(env, update)
            }
            Ok(Body::Steps(producer)) => {
                if let Some(exec) = self.execution.as_mut() {
                    exec.phase = RunPhase::Invoking(InvokeMode::MultiStep);
                    exec.producer = Some(producer);
                }
                self.step(env, update)
            }
            Err(err) => {
                self.record_error(err, &mut update);
                self.tear_down(env, &mut update);
                self.finalize(env, update)
            }
        }
    }

    /// Resume the in-flight producer once.
    pub(crate) fn advance(&mut self, env: &mut RunEnv<'_>) -> RunUpdate {
        if self.execution.is_none() {
            return RunUpdate {
                progress: Progress::Finished(self.result),
                signals: Vec::new(),
            };
        }
        self.step(env, RunUpdate::default())
    }

    /// End the in-flight run early. The producer is dropped without being resumed again and tear-down runs.
    pub(crate) fn cancel(&mut self, env: &mut RunEnv<'_>, cancel: Cancel) -> RunUpdate {
        let mut update = RunUpdate::default();
        if self.execution.is_none() {
            update.progress = Progress::Aborted;
            return update;
        }
        self.absorb(env.failures, &mut update);
        if let Some(exec) = self.execution.as_mut() {
            exec.producer = None;
        }
        self.tear_down(env, &mut update);

        match cancel {
            Cancel::Skip => {
                self.result = TestResult::Skipped;
                self.finalize(env, update)
            }
            Cancel::Abort => {
                self.absorb(env.failures, &mut update);
                self.execution = None;
                self.result = TestResult::NotRun;
                update.progress = Progress::Aborted;
                update
            }
        }
    }

    fn set_up(&self, env: &mut RunEnv<'_>) -> Result<Fixture, RunError> {
        match self.descriptor.set_up() {
            Some(name) => RunError::guard(|| env.hooks.run_set_up(name, &self.descriptor)),
            None => RunError::guard(|| env.fixtures.instantiate_default(&self.descriptor)),
        }
    }

    fn step(&mut self, env: &mut RunEnv<'_>, mut update: RunUpdate) -> RunUpdate {
        let resumed = self.resume_producer(env.failures);
        self.absorb(env.failures, &mut update);

        match resumed {
            Ok(Step::Yield) => {
                update.progress = Progress::Suspended;
                update
            }
            Ok(Step::Complete) => {
                self.tear_down(env, &mut update);
                self.finalize(env, update)
            }
            Err(err) => {
                self.record_error(err, &mut update);
                self.tear_down(env, &mut update);
                self.finalize(env, update)
            }
        }
    }

    fn resume_producer(&mut self, failures: &FailureChannel) -> Result<Step, RunError> {
        let Some(exec) = self.execution.as_mut() else {
            return Ok(Step::Complete);
        };
        let (Some(fixture), Some(producer)) = (exec.fixture.as_mut(), exec.producer.as_mut()) else {
            return Ok(Step::Complete);
        };
        let mut ctx = TestContext::new(&self.descriptor, fixture, failures, self.steps);
        let resumed = RunError::guard(|| producer.resume(&mut ctx));
        self.steps += 1;
        resumed
    }

    fn tear_down(&mut self, env: &mut RunEnv<'_>, update: &mut RunUpdate) {
        let fixture = match self.execution.as_mut() {
            Some(exec) => {
                exec.phase = RunPhase::TearingDown;
                exec.producer = None;
                exec.fixture.take()
            }
            None => None,
        };
        let Some(fixture) = fixture else {
            return;
        };

        let torn_down = match self.descriptor.tear_down() {
            None => RunError::guard(|| {
                env.fixtures.destroy(fixture);
                Ok(())
            }),
            Some(name) => match env.hooks.tear_down(name) {
                Some(hook) => RunError::guard(|| {
                    hook(fixture);
                    Ok(())
                }),
                None => {
                    // The fixture still goes back to its provider.
                    env.fixtures.destroy(fixture);
                    Err(RunError::UnknownHook { hook: name.to_string() })
                }
            },
        };
        if let Err(err) = torn_down {
            self.record_error(err, update);
        }
    }

    fn finalize(&mut self, env: &mut RunEnv<'_>, mut update: RunUpdate) -> RunUpdate {
        self.absorb(env.failures, &mut update);
        self.execution = None;
        if self.result == TestResult::NotRun {
            self.result = TestResult::Passed;
        }
        tracing::debug!(path = self.path(), result = %self.result, "test finished");
        update.progress = Progress::Finished(self.result);
        update
    }

    fn record_error(&mut self, err: RunError, update: &mut RunUpdate) {
        tracing::warn!(path = self.path(), error = %err, "test run error");
        if self.result != TestResult::Skipped {
            self.result = TestResult::Failed;
        }
        update.signals.push(FailureSignal {
            path: self.path().to_string(),
            message: err.to_string(),
        });
    }

    fn absorb(&mut self, failures: &FailureChannel, update: &mut RunUpdate) {
        let drained = failures.drain();
        if drained.is_empty() {
            return;
        }
        if self.result != TestResult::Skipped {
            self.result = TestResult::Failed;
        }
        update.signals.extend(drained);
    }

    fn set_phase(&mut self, phase: RunPhase) {
        if let Some(exec) = self.execution.as_mut() {
            exec.phase = phase;
        }
    }
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("id", &self.id)
            .field("path", &self.descriptor.path())
            .field("result", &self.result)
            .field("selected", &self.selected)
            .field("locked", &self.locked)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::body::test_fn;
    use crate::context::FixtureHandle;
    use crate::hooks::DefaultFixtures;

    struct Harness {
        hooks: HookRegistry,
        fixtures: DefaultFixtures,
        failures: FailureChannel,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                hooks: HookRegistry::new(),
                fixtures: DefaultFixtures::new(),
                failures: FailureChannel::new(),
            }
        }

        fn env(&mut self) -> RunEnv<'_> {
            RunEnv {
                hooks: &self.hooks,
                fixtures: &mut self.fixtures,
                failures: &self.failures,
            }
        }
    }

    fn unit(descriptor: Descriptor, f: TestFn) -> TestUnit {
        TestUnit::new(UnitId(0), descriptor, f)
    }

    #[test]
    fn test_sync_body_passes_by_default() {
        let mut h = Harness::new();
        let mut u = unit(Descriptor::new("a/sync"), test_fn(|_| Ok(Body::Complete)));
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Passed));
        assert!(!u.is_executing());
        assert_eq!(h.fixtures.live(), 0);
    }

    #[test]
    fn test_failure_signal_marks_failed() {
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/fails"),
            test_fn(|ctx| {
                ctx.fail("expected 3 got 4");
                Ok(Body::Complete)
            }),
        );
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Failed));
        assert_eq!(update.signals.len(), 1);
        assert_eq!(update.signals[0].message, "expected 3 got 4");
    }

    #[test]
    fn test_multi_step_suspends_between_advances() {
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/steps"),
            test_fn(|_| Ok(Body::steps(2, |_, _| Ok(())))),
        );
        let first = u.begin(&mut h.env());
        assert_eq!(first.progress, Progress::Suspended);
        assert_eq!(u.phase(), Some(RunPhase::Invoking(InvokeMode::MultiStep)));
        assert_eq!(u.steps_taken(), 1);
        assert_eq!(h.fixtures.live(), 1);

        let second = u.advance(&mut h.env());
        assert_eq!(second.progress, Progress::Finished(TestResult::Passed));
        assert_eq!(h.fixtures.live(), 0);
    }

    #[test]
    fn test_set_up_mismatch_fails_without_invoking_body() {
        let invoked = Rc::new(Cell::new(false));
        let flag = invoked.clone();
        let mut h = Harness::new();
        h.hooks.register_set_up("bad", |_| Box::new(5_u32));
        let mut u = unit(
            Descriptor::new("a/bad_setup").with_set_up("bad"),
            test_fn(move |_| {
                flag.set(true);
                Ok(Body::Complete)
            }),
        );
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Failed));
        assert!(update.signals[0].message.contains("did not produce a fixture"));
        assert!(!invoked.get());
    }

    #[test]
    fn test_missing_component_fails_and_tears_down() {
        struct Camera;
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/needs_camera"),
            test_fn(|ctx| {
                ctx.component::<Camera>()?;
                Ok(Body::Complete)
            }),
        );
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Failed));
        assert_eq!(h.fixtures.live(), 0);
    }

    #[test]
    fn test_custom_hooks_receive_fixture() {
        let torn_down = Rc::new(Cell::new(0_u64));
        let sink = torn_down.clone();
        let mut h = Harness::new();
        h.hooks
            .register_set_up("spawn", |_| Box::new(Fixture::new(FixtureHandle(77)).with_component(1_i32)));
        h.hooks
            .register_tear_down("despawn", move |fixture| sink.set(fixture.handle().0));
        let mut u = unit(
            Descriptor::new("a/custom").with_set_up("spawn").with_tear_down("despawn"),
            test_fn(|ctx| {
                *ctx.component::<i32>()? += 1;
                let value = *ctx.component::<i32>()?;
                ctx.check_eq(value, 2);
                Ok(Body::Complete)
            }),
        );
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Passed));
        assert_eq!(torn_down.get(), 77);
    }

    #[test]
    fn test_skip_tears_down_and_stops_resuming() {
        let resumed = Rc::new(Cell::new(0));
        let counter = resumed.clone();
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/long"),
            test_fn(move |_| {
                let counter = counter.clone();
                Ok(Body::steps(5, move |_, _| {
                    counter.set(counter.get() + 1);
                    Ok(())
                }))
            }),
        );
        u.begin(&mut h.env());
        u.advance(&mut h.env());
        assert_eq!(resumed.get(), 2);

        let update = u.cancel(&mut h.env(), Cancel::Skip);
        assert_eq!(update.progress, Progress::Finished(TestResult::Skipped));
        assert_eq!(u.result(), TestResult::Skipped);
        assert!(!u.is_executing());
        assert_eq!(h.fixtures.live(), 0);
        assert_eq!(resumed.get(), 2);
    }

    #[test]
    fn test_abort_resets_result() {
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/aborted"),
            test_fn(|_| Ok(Body::steps(3, |_, _| Ok(())))),
        );
        u.begin(&mut h.env());
        let update = u.cancel(&mut h.env(), Cancel::Abort);
        assert_eq!(update.progress, Progress::Aborted);
        assert_eq!(u.result(), TestResult::NotRun);
        assert_eq!(h.fixtures.live(), 0);
    }

    #[test]
    fn test_unknown_tear_down_hook_fails_run() {
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/teardown").with_tear_down("nope"),
            test_fn(|_| Ok(Body::Complete)),
        );
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Failed));
        assert_eq!(h.fixtures.live(), 0);
    }

    #[test]
    fn test_panicking_body_fails_and_tears_down() {
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/panics"),
            test_fn(|ctx| {
                let empty: Vec<u8> = Vec::new();
                let first = empty[0];
                ctx.check_eq(first, 0);
                Ok(Body::Complete)
            }),
        );
        let update = u.begin(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Failed));
        assert!(update.signals[0].message.starts_with("test panicked"));
        assert!(!u.is_executing());
        assert_eq!(h.fixtures.live(), 0);
    }

    #[test]
    fn test_panicking_step_fails_and_tears_down() {
        let mut h = Harness::new();
        let mut u = unit(
            Descriptor::new("a/panics_later"),
            test_fn(|_| {
                Ok(Body::steps(3, |_, step| {
                    assert!(step < 1, "gave up on step {step}");
                    Ok(())
                }))
            }),
        );
        assert_eq!(u.begin(&mut h.env()).progress, Progress::Suspended);
        let update = u.advance(&mut h.env());
        assert_eq!(update.progress, Progress::Finished(TestResult::Failed));
        assert!(update.signals[0].message.contains("gave up on step 1"));
        assert_eq!(u.steps_taken(), 2);
        assert_eq!(h.fixtures.live(), 0);
    }
}
