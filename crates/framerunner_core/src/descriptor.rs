//! Test descriptors: identity and configuration for one discovered test.

use serde::{Deserialize, Serialize};

use crate::path;

/// Opaque reference to where a test came from (a source location, a type name, ...).
///
/// Only used for display; the scheduler never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin(pub String);

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity and configuration for one test.
///
/// The `path` is the unique key. A descriptor is immutable once built, except through [`Descriptor::update_from`]
/// which re-discovery uses when the same path shows up with different configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    path: String,
    set_up: Option<String>,
    tear_down: Option<String>,
    pause_on_fail: bool,
    suite: bool,
    origin: Origin,
}

impl Descriptor {
    /// Create a descriptor for `path` with default configuration.
    ///
    /// ## Notes
    /// - The path is normalized (see [`path::normalize`]). A path with no segments is kept empty and rejected later
    ///   at ingestion time.
    pub fn new(raw_path: &str) -> Self {
        Self {
            path: path::normalize(raw_path).unwrap_or_default(),
            set_up: None,
            tear_down: None,
            pause_on_fail: false,
            suite: false,
            origin: Origin::default(),
        }
    }

    /// Use the named custom set-up hook instead of the default fixture.
    pub fn with_set_up(mut self, hook: impl Into<String>) -> Self {
        self.set_up = Some(hook.into());
        self
    }

    /// Use the named custom tear-down hook instead of the default fixture destruction.
    pub fn with_tear_down(mut self, hook: impl Into<String>) -> Self {
        self.tear_down = Some(hook.into());
        self
    }

    /// Pause the scheduler once this test finishes with a failure.
    pub fn with_pause_on_fail(mut self, pause: bool) -> Self {
        self.pause_on_fail = pause;
        self
    }

    /// Mark the test as coming from a suite source.
    pub fn in_suite(mut self) -> Self {
        self.suite = true;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Origin(origin.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Leaf segment of the path.
    pub fn name(&self) -> &str {
        path::leaf_name(&self.path)
    }

    /// Path of the group that directly contains this test.
    pub fn group_path(&self) -> &str {
        path::parent_path(&self.path).unwrap_or("")
    }

    pub fn set_up(&self) -> Option<&str> {
        self.set_up.as_deref()
    }

    pub fn tear_down(&self) -> Option<&str> {
        self.tear_down.as_deref()
    }

    pub fn pause_on_fail(&self) -> bool {
        self.pause_on_fail
    }

    pub fn is_suite(&self) -> bool {
        self.suite
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Merge configuration from a re-discovered descriptor with the same path.
    ///
    /// ## Returns
    /// - (`bool`): `true` if anything changed. Descriptors with a different path are ignored.
    pub fn update_from(&mut self, other: &Descriptor) -> bool {
        if other.path != self.path || other == self {
            return false;
        }
        self.set_up.clone_from(&other.set_up);
        self.tear_down.clone_from(&other.tear_down);
        self.pause_on_fail = other.pause_on_fail;
        self.suite = other.suite;
        self.origin.clone_from(&other.origin);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_path() {
        let d = Descriptor::new("/physics//gravity/falls/");
        assert_eq!(d.path(), "physics/gravity/falls");
        assert_eq!(d.name(), "falls");
        assert_eq!(d.group_path(), "physics/gravity");
    }

    #[test]
    fn test_top_level_group_is_root() {
        let d = Descriptor::new("smoke");
        assert_eq!(d.group_path(), "");
        assert_eq!(d.name(), "smoke");
    }

    #[test]
    fn test_empty_path_stays_empty() {
        assert_eq!(Descriptor::new("///").path(), "");
    }

    #[test]
    fn test_builder_defaults() {
        let d = Descriptor::new("a/b");
        assert_eq!(d.set_up(), None);
        assert_eq!(d.tear_down(), None);
        assert!(!d.pause_on_fail());
        assert!(!d.is_suite());
        assert_eq!(d.origin(), &Origin::default());
    }

    #[test]
    fn test_update_from_merges_configuration() {
        let mut d = Descriptor::new("a/b");
        let newer = Descriptor::new("a/b")
            .with_set_up("spawn")
            .with_pause_on_fail(true)
            .with_origin("tests.rs:10");
        assert!(d.update_from(&newer));
        assert_eq!(d, newer);
        assert!(!d.update_from(&newer), "second merge is a no-op");
    }

    #[test]
    fn test_update_from_ignores_other_paths() {
        let mut d = Descriptor::new("a/b");
        let other = Descriptor::new("a/c").with_pause_on_fail(true);
        assert!(!d.update_from(&other));
        assert!(!d.pause_on_fail());
    }
}
