//! What a test body sees while it runs: its fixture, its descriptor, and the failure channel.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use framerunner_core::Descriptor;
use serde::{Deserialize, Serialize};

use crate::errors::RunError;

/// Identity of a fixture instance, assigned by whoever created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixtureHandle(pub u64);

/// The value a test body operates on.
///
/// A fixture is a bag of typed components. Bodies ask for the capabilities they need with
/// [`TestContext::component`]; a missing one ends the run with [`RunError::MissingFixtureComponent`].
pub struct Fixture {
    handle: FixtureHandle,
    components: HashMap<TypeId, Box<dyn Any>>,
}

impl Fixture {
    pub fn new(handle: FixtureHandle) -> Self {
        Self {
            handle,
            components: HashMap::new(),
        }
    }

    pub fn handle(&self) -> FixtureHandle {
        self.handle
    }

    /// Attach a component, replacing any previous one of the same type.
    pub fn with_component<T: Any>(mut self, component: T) -> Self {
        self.insert(component);
        self
    }

    pub fn insert<T: Any>(&mut self, component: T) {
        self.components.insert(TypeId::of::<T>(), Box::new(component));
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.components.get(&TypeId::of::<T>()).and_then(|c| c.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.components.get_mut(&TypeId::of::<T>()).and_then(|c| c.downcast_mut())
    }

    pub fn has<T: Any>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("handle", &self.handle)
            .field("components", &self.components.len())
            .finish()
    }
}

/// A failure reported while a test was executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSignal {
    /// Path of the unit the failure is attributed to.
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct Inbox {
    executing: Option<String>,
    signals: Vec<FailureSignal>,
}

/// Shared inbox for failure signals.
///
/// Test bodies report through [`TestContext::fail`]. Code outside the body (for example a host log interceptor)
/// can hold a clone and call [`FailureChannel::report`]; the signal is attributed to whichever unit is executing.
/// Signals are drained by the scheduler after every body invocation or step.
#[derive(Debug, Clone, Default)]
pub struct FailureChannel {
    inbox: Rc<RefCell<Inbox>>,
}

impl FailureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a failure against the executing unit.
    ///
    /// ## Returns
    /// - (`bool`): `false` if no unit is executing; the signal is dropped.
    pub fn report(&self, message: impl Into<String>) -> bool {
        let mut inbox = self.inbox.borrow_mut();
        let Some(path) = inbox.executing.clone() else {
            tracing::debug!("failure reported with no executing unit; dropped");
            return false;
        };
        inbox.signals.push(FailureSignal {
            path,
            message: message.into(),
        });
        true
    }

    /// Path of the unit failures are currently attributed to.
    pub fn executing(&self) -> Option<String> {
        self.inbox.borrow().executing.clone()
    }

    pub fn pending(&self) -> usize {
        self.inbox.borrow().signals.len()
    }

    pub(crate) fn report_for(&self, path: &str, message: impl Into<String>) {
        self.inbox.borrow_mut().signals.push(FailureSignal {
            path: path.to_string(),
            message: message.into(),
        });
    }

    pub(crate) fn attach(&self, path: &str) {
        self.inbox.borrow_mut().executing = Some(path.to_string());
    }

    pub(crate) fn detach(&self) {
        self.inbox.borrow_mut().executing = None;
    }

    pub(crate) fn drain(&self) -> Vec<FailureSignal> {
        std::mem::take(&mut self.inbox.borrow_mut().signals)
    }

    pub(crate) fn clear(&self) {
        let mut inbox = self.inbox.borrow_mut();
        inbox.executing = None;
        inbox.signals.clear();
    }
}

/// Execution context handed to a test body and to each step of a multi-step body.
pub struct TestContext<'a> {
    descriptor: &'a Descriptor,
    fixture: &'a mut Fixture,
    failures: &'a FailureChannel,
    step: usize,
}

impl<'a> TestContext<'a> {
    pub(crate) fn new(
        descriptor: &'a Descriptor,
        fixture: &'a mut Fixture,
        failures: &'a FailureChannel,
        step: usize,
    ) -> Self {
        Self {
            descriptor,
            fixture,
            failures,
            step,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        self.descriptor
    }

    pub fn fixture(&self) -> &Fixture {
        &*self.fixture
    }

    pub fn fixture_mut(&mut self) -> &mut Fixture {
        &mut *self.fixture
    }

    /// Number of steps already taken by this run. `0` during the body invocation and the first step.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Borrow a fixture component the body depends on.
    pub fn component<T: Any>(&mut self) -> Result<&mut T, RunError> {
        self.fixture
            .get_mut::<T>()
            .ok_or(RunError::MissingFixtureComponent {
                component: type_name::<T>(),
            })
    }

    /// Record a failure for this test. Execution continues; the run finishes as failed.
    pub fn fail(&self, message: impl Into<String>) {
        self.failures.report_for(self.descriptor.path(), message);
    }

    /// Record a failure unless `condition` holds.
    pub fn check(&self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.fail(message);
        }
        condition
    }

    /// Record a failure unless `left == right`.
    pub fn check_eq<T: PartialEq + fmt::Debug>(&self, left: T, right: T) -> bool {
        let equal = left == right;
        if !equal {
            self.fail(format!(
                "assertion failed: left != right\n  left:  {:?}\n  right: {:?}",
                left, right
            ));
        }
        equal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32);

    #[test]
    fn test_fixture_components() {
        let mut fixture = Fixture::new(FixtureHandle(7)).with_component(Position(3));
        assert_eq!(fixture.handle(), FixtureHandle(7));
        assert!(fixture.has::<Position>());
        assert!(!fixture.has::<String>());
        fixture.get_mut::<Position>().unwrap().0 += 1;
        assert_eq!(fixture.get::<Position>(), Some(&Position(4)));
    }

    #[test]
    fn test_report_requires_executing_unit() {
        let channel = FailureChannel::new();
        assert!(!channel.report("boom"));
        assert_eq!(channel.pending(), 0);

        channel.attach("a/b");
        assert!(channel.report("boom"));
        let drained = channel.drain();
        assert_eq!(
            drained,
            vec![FailureSignal {
                path: "a/b".into(),
                message: "boom".into()
            }]
        );
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_clones_share_inbox() {
        let channel = FailureChannel::new();
        let interceptor = channel.clone();
        channel.attach("x");
        interceptor.report("from the log");
        assert_eq!(channel.pending(), 1);
        channel.clear();
        assert_eq!(interceptor.pending(), 0);
        assert_eq!(interceptor.executing(), None);
    }

    #[test]
    fn test_context_checks_report_failures() {
        let descriptor = Descriptor::new("suite/check");
        let mut fixture = Fixture::new(FixtureHandle(1));
        let channel = FailureChannel::new();
        let mut ctx = TestContext::new(&descriptor, &mut fixture, &channel, 0);

        assert!(ctx.check(true, "fine"));
        assert!(ctx.check_eq(2, 2));
        assert!(!ctx.check_eq(1, 2));
        assert!(matches!(
            ctx.component::<Position>(),
            Err(RunError::MissingFixtureComponent { .. })
        ));

        let drained = channel.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].path, "suite/check");
        assert!(drained[0].message.contains("left != right"));
    }
}
