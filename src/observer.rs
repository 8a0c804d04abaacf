//! Run observers.
//!
//! The scheduler reports progress through [`RunObserver`]. Every method has an empty default, so observers only
//! implement what they care about. [`EventLog`] records events for inspection in tests and headless hosts.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use framerunner_core::TestResult;
use serde::{Deserialize, Serialize};

use crate::context::FailureSignal;
use crate::unit::TestUnit;

/// Counters for a finished (or in-progress) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub ticks: u64,
    pub elapsed: Duration,
}

impl TestSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

pub trait RunObserver {
    fn on_run_started(&mut self, _queued: usize) {}

    fn on_test_started(&mut self, _unit: &TestUnit) {}

    fn on_failure(&mut self, _signal: &FailureSignal) {}

    fn on_test_completed(&mut self, _unit: &TestUnit, _result: TestResult) {}

    /// The run paused.
    ///
    /// After a pause-on-fail, `unit` is the failed unit that just finished. After an explicit pause, it is the unit
    /// still executing, if any; that unit runs to completion before the queue holds.
    fn on_paused(&mut self, _unit: Option<&TestUnit>) {}

    /// Execution ended; the host may leave its active context.
    fn on_run_ended(&mut self, _summary: &TestSummary) {}
}

/// One observed event, with units referenced by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEvent {
    RunStarted { queued: usize },
    TestStarted { path: String },
    Failure { path: String, message: String },
    TestCompleted { path: String, result: TestResult },
    Paused { path: Option<String> },
    RunEnded { summary: TestSummary },
}

/// Shared, cloneable recorder. Register one clone with the scheduler and read events from another.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<RunEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<RunEvent> {
        std::mem::take(&mut self.events.borrow_mut())
    }

    /// Paths of completed tests, in completion order.
    pub fn completed(&self) -> Vec<(String, TestResult)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                RunEvent::TestCompleted { path, result } => Some((path.clone(), *result)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: RunEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl RunObserver for EventLog {
    fn on_run_started(&mut self, queued: usize) {
        self.push(RunEvent::RunStarted { queued });
    }

    fn on_test_started(&mut self, unit: &TestUnit) {
        self.push(RunEvent::TestStarted {
            path: unit.path().to_string(),
        });
    }

    fn on_failure(&mut self, signal: &FailureSignal) {
        self.push(RunEvent::Failure {
            path: signal.path.clone(),
            message: signal.message.clone(),
        });
    }

    fn on_test_completed(&mut self, unit: &TestUnit, result: TestResult) {
        self.push(RunEvent::TestCompleted {
            path: unit.path().to_string(),
            result,
        });
    }

    fn on_paused(&mut self, unit: Option<&TestUnit>) {
        self.push(RunEvent::Paused {
            path: unit.map(|unit| unit.path().to_string()),
        });
    }

    fn on_run_ended(&mut self, summary: &TestSummary) {
        self.push(RunEvent::RunEnded { summary: *summary });
    }
}
