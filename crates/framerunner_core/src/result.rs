//! Test result values and the group aggregation rule.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of the most recent run of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TestResult {
    /// Never run, or reset by an aborted run.
    #[default]
    NotRun,
    Passed,
    Failed,
    /// Only ever assigned by an explicit skip.
    Skipped,
}

impl TestResult {
    /// Whether this value records a finished run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TestResult::NotRun)
    }

    /// Roll a set of leaf results up into a group result.
    ///
    /// ## Returns
    /// - `Failed` if any leaf failed, else `Passed` if any leaf passed, else `NotRun`. `Skipped` leaves do not
    ///   contribute.
    pub fn aggregate<I>(results: I) -> TestResult
    where
        I: IntoIterator<Item = TestResult>,
    {
        let mut passed = false;
        for result in results {
            match result {
                TestResult::Failed => return TestResult::Failed,
                TestResult::Passed => passed = true,
                TestResult::NotRun | TestResult::Skipped => {}
            }
        }
        if passed { TestResult::Passed } else { TestResult::NotRun }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::NotRun => write!(f, "none"),
            TestResult::Passed => write!(f, "pass"),
            TestResult::Failed => write!(f, "fail"),
            TestResult::Skipped => write!(f, "skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_failure_wins() {
        let results = [TestResult::Passed, TestResult::Failed, TestResult::Skipped];
        assert_eq!(TestResult::aggregate(results), TestResult::Failed);
    }

    #[test]
    fn test_aggregate_pass_over_none() {
        let results = [TestResult::NotRun, TestResult::Passed];
        assert_eq!(TestResult::aggregate(results), TestResult::Passed);
    }

    #[test]
    fn test_aggregate_skipped_is_none() {
        assert_eq!(TestResult::aggregate([TestResult::Skipped]), TestResult::NotRun);
        assert_eq!(TestResult::aggregate([]), TestResult::NotRun);
    }

    #[test]
    fn test_display() {
        assert_eq!(TestResult::Passed.to_string(), "pass");
        assert_eq!(TestResult::Failed.to_string(), "fail");
        assert_eq!(TestResult::Skipped.to_string(), "skipped");
        assert_eq!(TestResult::NotRun.to_string(), "none");
    }

    #[test]
    fn test_terminal() {
        assert!(!TestResult::NotRun.is_terminal());
        assert!(TestResult::Skipped.is_terminal());
    }
}
