//! Set-up and tear-down collaborators.
//!
//! Tests without custom hooks get their fixture from a [`FixtureProvider`] and hand it back to the same provider
//! when they finish. Tests naming a custom hook look it up in the [`HookRegistry`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use framerunner_core::Descriptor;

use crate::context::{Fixture, FixtureHandle};
use crate::errors::RunError;

/// Creates and destroys default fixtures.
pub trait FixtureProvider {
    fn instantiate_default(&mut self, descriptor: &Descriptor) -> Result<Fixture, RunError>;

    fn destroy(&mut self, fixture: Fixture);
}

/// Hands out empty fixtures with increasing handles.
#[derive(Debug, Default)]
pub struct DefaultFixtures {
    next: u64,
    live: usize,
}

impl DefaultFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixtures created and not yet destroyed.
    pub fn live(&self) -> usize {
        self.live
    }
}

impl FixtureProvider for DefaultFixtures {
    fn instantiate_default(&mut self, _descriptor: &Descriptor) -> Result<Fixture, RunError> {
        self.next += 1;
        self.live += 1;
        Ok(Fixture::new(FixtureHandle(self.next)))
    }

    fn destroy(&mut self, _fixture: Fixture) {
        self.live = self.live.saturating_sub(1);
    }
}

/// Custom set-up hook. Must produce a [`Fixture`]; anything else is a contract violation.
pub type SetUpHook = Rc<dyn Fn(&Descriptor) -> Box<dyn Any>>;

/// Custom tear-down hook. Receives the fixture produced by set-up.
pub type TearDownHook = Rc<dyn Fn(Fixture)>;

/// Named custom set-up and tear-down hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    set_up: HashMap<String, SetUpHook>,
    tear_down: HashMap<String, TearDownHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_set_up<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&Descriptor) -> Box<dyn Any> + 'static,
    {
        self.set_up.insert(name.into(), Rc::new(hook));
    }

    pub fn register_tear_down<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(Fixture) + 'static,
    {
        self.tear_down.insert(name.into(), Rc::new(hook));
    }

    pub fn set_up(&self, name: &str) -> Option<SetUpHook> {
        self.set_up.get(name).cloned()
    }

    pub fn tear_down(&self, name: &str) -> Option<TearDownHook> {
        self.tear_down.get(name).cloned()
    }

    /// Run the named set-up hook and check that it produced a fixture.
    pub(crate) fn run_set_up(&self, name: &str, descriptor: &Descriptor) -> Result<Fixture, RunError> {
        let hook = self.set_up(name).ok_or_else(|| RunError::UnknownHook { hook: name.to_string() })?;
        hook(descriptor)
            .downcast::<Fixture>()
            .map(|fixture| *fixture)
            .map_err(|_| RunError::SetupReturnTypeMismatch { hook: name.to_string() })
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set_up: Vec<_> = self.set_up.keys().collect();
        let mut tear_down: Vec<_> = self.tear_down.keys().collect();
        set_up.sort();
        tear_down.sort();
        f.debug_struct("HookRegistry")
            .field("set_up", &set_up)
            .field("tear_down", &tear_down)
            .finish()
    }
}
