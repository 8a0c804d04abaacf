//! Test bodies and step producers.
//!
//! A body is invoked once with the test's [`TestContext`]. It either finishes right there ([`Body::Complete`]) or
//! hands back a [`StepProducer`]: a lazy, finite, resumable sequence that the scheduler resumes exactly once per
//! tick. Step producers are the only way a test can span several ticks; nothing else ever blocks the scheduler.

use std::fmt;
use std::rc::Rc;

use crate::context::TestContext;
use crate::errors::RunError;

/// Invocable handle for one test.
pub type TestFn = Rc<dyn Fn(&mut TestContext<'_>) -> Result<Body, RunError>>;

/// Wrap a closure as a [`TestFn`].
pub fn test_fn<F>(f: F) -> TestFn
where
    F: Fn(&mut TestContext<'_>) -> Result<Body, RunError> + 'static,
{
    Rc::new(f)
}

/// What a single resume of a step producer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the next tick.
    Yield,
    /// The producer is exhausted.
    Complete,
}

/// A multi-tick test body.
pub trait StepProducer {
    fn resume(&mut self, ctx: &mut TestContext<'_>) -> Result<Step, RunError>;
}

impl<F> StepProducer for F
where
    F: FnMut(&mut TestContext<'_>) -> Result<Step, RunError>,
{
    fn resume(&mut self, ctx: &mut TestContext<'_>) -> Result<Step, RunError> {
        self(ctx)
    }
}

/// Result of invoking a test body.
pub enum Body {
    /// The body ran to completion synchronously.
    Complete,
    /// The body continues over several ticks.
    Steps(Box<dyn StepProducer>),
}

impl Body {
    pub fn producer(producer: impl StepProducer + 'static) -> Self {
        Body::Steps(Box::new(producer))
    }

    /// A producer that runs `f` once per resume and completes on the `count`-th resume.
    ///
    /// `f` receives the zero-based step index. A `count` of zero completes on the first resume without calling `f`.
    pub fn steps<F>(count: usize, f: F) -> Self
    where
        F: FnMut(&mut TestContext<'_>, usize) -> Result<(), RunError> + 'static,
    {
        Body::Steps(Box::new(CountedSteps { taken: 0, count, f }))
    }

    pub fn is_multi_step(&self) -> bool {
        matches!(self, Body::Steps(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Complete => f.write_str("Complete"),
            Body::Steps(_) => f.write_str("Steps(..)"),
        }
    }
}

struct CountedSteps<F> {
    taken: usize,
    count: usize,
    f: F,
}

impl<F> StepProducer for CountedSteps<F>
where
    F: FnMut(&mut TestContext<'_>, usize) -> Result<(), RunError>,
{
    fn resume(&mut self, ctx: &mut TestContext<'_>) -> Result<Step, RunError> {
        if self.taken >= self.count {
            return Ok(Step::Complete);
        }
        (self.f)(ctx, self.taken)?;
        self.taken += 1;
        Ok(if self.taken >= self.count {
            Step::Complete
        } else {
            Step::Yield
        })
    }
}
