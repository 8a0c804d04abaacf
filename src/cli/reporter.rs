//! Console reporter (pytest-style)

use framerunner_core::TestResult;

use crate::context::FailureSignal;
use crate::observer::{RunObserver, TestSummary};
use crate::unit::TestUnit;

/// Default console reporter
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    pub verbose: bool,
    failures: Vec<FailureSignal>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failures: Vec::new(),
        }
    }
}

impl RunObserver for ConsoleReporter {
    fn on_run_started(&mut self, queued: usize) {
        eprintln!("collected {} item{}", queued, if queued == 1 { "" } else { "s" });
        eprintln!();
    }

    fn on_test_started(&mut self, unit: &TestUnit) {
        if self.verbose {
            eprint!("{} ... ", unit.path());
        }
    }

    fn on_failure(&mut self, signal: &FailureSignal) {
        self.failures.push(signal.clone());
    }

    fn on_test_completed(&mut self, unit: &TestUnit, result: TestResult) {
        let status = match (result, self.verbose) {
            (TestResult::Passed, true) if unit.steps_taken() > 0 => {
                format!("\x1b[32mPASSED\x1b[0m ({} steps)", unit.steps_taken())
            }
            (TestResult::Passed, true) => "\x1b[32mPASSED\x1b[0m".to_string(),
            (TestResult::Passed, false) => "\x1b[32m.\x1b[0m".to_string(),
            (TestResult::Failed, true) => "\x1b[31mFAILED\x1b[0m".to_string(),
            (TestResult::Failed, false) => "\x1b[31mF\x1b[0m".to_string(),
            (TestResult::Skipped, true) => "\x1b[33mSKIPPED\x1b[0m".to_string(),
            (TestResult::Skipped, false) => "\x1b[33ms\x1b[0m".to_string(),
            (TestResult::NotRun, _) => return,
        };

        if self.verbose {
            eprintln!("{}", status);
        } else {
            eprint!("{}", status);
        }
    }

    fn on_paused(&mut self, unit: Option<&TestUnit>) {
        if let Some(unit) = unit {
            eprintln!("\n\x1b[33mpaused after {}\x1b[0m", unit.path());
        }
    }

    fn on_run_ended(&mut self, summary: &TestSummary) {
        if !self.verbose {
            eprintln!();
        }

        for failure in &self.failures {
            eprintln!("\n\x1b[31m{}\x1b[0m", failure.path);
            eprintln!("{}", failure.message);
        }
        eprintln!();

        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(format!("\x1b[32m{} passed\x1b[0m", summary.passed));
        }
        if summary.failed > 0 {
            parts.push(format!("\x1b[31m{} failed\x1b[0m", summary.failed));
        }
        if summary.skipped > 0 {
            parts.push(format!("\x1b[33m{} skipped\x1b[0m", summary.skipped));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }

        eprintln!(
            "====== {} in {:.2}s ({} ticks) ======",
            parts.join(", "),
            summary.elapsed.as_secs_f64(),
            summary.ticks
        );
    }
}
