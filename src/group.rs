//! The group tree: path-keyed containers over test units.
//!
//! Groups are interned by path in a registry. Parent/child relations are never stored; they are computed from path
//! containment, so removing a group is just removing its registry entry.
//!
//! `selected` and `locked` on a group are cached aggregates. Every mutator below updates the leaves and then
//! refreshes all caches bottom-up before returning, so readers never see a half-updated tree. The invariant kept is:
//! a group is selected iff every unlocked descendant unit and group is selected (vacuously true when everything
//! below is locked).

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use framerunner_core::{ConfigError, Descriptor, TestResult, path};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::errors::RunnerError;
use crate::unit::UnitId;

/// One node of the group tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    path: String,
    units: Vec<UnitId>,
    /// Suite origin of the directly contained units, fixed by the first one added.
    suite: Option<bool>,
    pub(crate) expanded: bool,
    pub(crate) selected: bool,
    pub(crate) locked: bool,
}

impl Group {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            units: Vec::new(),
            suite: None,
            expanded: false,
            selected: false,
            locked: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        path::leaf_name(&self.path)
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Directly contained units, in discovery order.
    pub fn units(&self) -> &[UnitId] {
        &self.units
    }

    pub fn is_suite(&self) -> bool {
        self.suite == Some(true)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Registry of groups keyed by path.
#[derive(Debug, Clone)]
pub struct GroupTree {
    groups: BTreeMap<String, Group>,
}

impl Default for GroupTree {
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(String::new(), Group::new(""));
        Self { groups }
    }
}

impl GroupTree {
    pub fn get(&self, path: &str) -> Option<&Group> {
        self.groups.get(path)
    }

    pub fn root(&self) -> Option<&Group> {
        self.groups.get("")
    }

    pub fn contains(&self, path: &str) -> bool {
        self.groups.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All groups, ordered by path.
    pub fn iter(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.values()
    }

    /// Groups exactly one level below `path`, ordered by path.
    pub fn children(&self, path: &str) -> Vec<&Group> {
        self.groups
            .values()
            .filter(|group| path::is_direct_child_of(&group.path, path))
            .collect()
    }

    pub fn parent(&self, path: &str) -> Option<&Group> {
        path::parent_path(path).and_then(|parent| self.groups.get(parent))
    }

    /// Groups strictly below `path`.
    pub fn descendants(&self, path: &str) -> Vec<&Group> {
        self.groups
            .values()
            .filter(|group| path::is_descendant_of(&group.path, path))
            .collect()
    }

    /// Every unit in the subtree rooted at `path`, or `None` for an unknown group.
    pub fn descendant_units(&self, path: &str) -> Option<Vec<UnitId>> {
        let root = self.groups.get(path)?;
        let mut units = root.units.clone();
        for group in self.descendants(path) {
            units.extend_from_slice(&group.units);
        }
        Some(units)
    }

    /// Depth-first, pre-order walk from the root. Child groups are visited by path order.
    pub fn walk(&self) -> Vec<&Group> {
        let mut out = Vec::with_capacity(self.groups.len());
        if let Some(root) = self.root() {
            self.walk_from(root, &mut out);
        }
        out
    }

    fn walk_from<'a>(&'a self, group: &'a Group, out: &mut Vec<&'a Group>) {
        out.push(group);
        for child in self.children(&group.path) {
            self.walk_from(child, out);
        }
    }

    /// Rebuild the registry from a set of units.
    ///
    /// The expanded flag survives for paths that still exist. A unit whose suite origin differs from the
    /// units already in its group is rejected and reported.
    ///
    /// ## Returns
    /// - (`Vec<UnitId>`): rejected units, which the caller must drop.
    pub(crate) fn rebuild<'a, I>(&mut self, units: I, diagnostics: &mut Vec<ConfigError>) -> Vec<UnitId>
    where
        I: IntoIterator<Item = (UnitId, &'a Descriptor)>,
    {
        let previous = std::mem::take(&mut self.groups);
        self.intern("", &previous);
        let mut rejected = Vec::new();

        for (id, descriptor) in units {
            let group_path = descriptor.group_path();
            let conflicting = self
                .groups
                .get(group_path)
                .and_then(|group| group.suite)
                .is_some_and(|suite| suite != descriptor.is_suite());
            if conflicting {
                let diagnostic = ConfigError::MixedSuiteGroup {
                    group: group_path.to_string(),
                    path: descriptor.path().to_string(),
                };
                tracing::warn!(%diagnostic, "skipping discovered test");
                diagnostics.push(diagnostic);
                rejected.push(id);
                continue;
            }

            for prefix in path::prefixes(descriptor.path()) {
                self.intern(prefix, &previous);
            }
            if let Some(group) = self.groups.get_mut(group_path) {
                group.suite.get_or_insert(descriptor.is_suite());
                group.units.push(id);
            }
        }
        rejected
    }

    fn intern(&mut self, path: &str, previous: &BTreeMap<String, Group>) {
        if self.groups.contains_key(path) {
            return;
        }
        let mut group = Group::new(path);
        if let Some(old) = previous.get(path) {
            group.expanded = old.expanded;
        }
        self.groups.insert(path.to_string(), group);
    }
}

// ============================================================================
// Selection, locking and aggregation
// ============================================================================

impl Catalog {
    /// Select every unlocked unit under `path`.
    pub fn select_group(&mut self, path: &str) -> Result<(), RunnerError> {
        self.set_group_selection(path, true)
    }

    /// Deselect every unlocked unit under `path`.
    pub fn deselect_group(&mut self, path: &str) -> Result<(), RunnerError> {
        self.set_group_selection(path, false)
    }

    /// Lock everything under `path`, regardless of its current lock state.
    pub fn lock_group(&mut self, path: &str) -> Result<(), RunnerError> {
        self.set_group_lock(path, true)
    }

    pub fn unlock_group(&mut self, path: &str) -> Result<(), RunnerError> {
        self.set_group_lock(path, false)
    }

    pub fn select_all(&mut self) {
        if let Err(err) = self.set_group_selection("", true) {
            tracing::warn!(error = %err, "root group missing from group tree");
        }
    }

    pub fn deselect_all(&mut self) {
        if let Err(err) = self.set_group_selection("", false) {
            tracing::warn!(error = %err, "root group missing from group tree");
        }
    }

    /// Set a single unit's selection. Locked units can still be toggled individually.
    pub fn select_unit(&mut self, id: UnitId, selected: bool) -> Result<(), RunnerError> {
        self.unit_mut(id).ok_or(RunnerError::UnknownUnit(id))?.selected = selected;
        self.refresh_aggregates();
        Ok(())
    }

    /// Flip a single unit's selection and return the new value.
    pub fn toggle_unit(&mut self, id: UnitId) -> Result<bool, RunnerError> {
        let unit = self.unit_mut(id).ok_or(RunnerError::UnknownUnit(id))?;
        unit.selected = !unit.selected;
        let selected = unit.selected;
        self.refresh_aggregates();
        Ok(selected)
    }

    pub fn lock_unit(&mut self, id: UnitId, locked: bool) -> Result<(), RunnerError> {
        self.unit_mut(id).ok_or(RunnerError::UnknownUnit(id))?.locked = locked;
        self.refresh_aggregates();
        Ok(())
    }

    /// Select exactly the unlocked units whose last run failed.
    ///
    /// ## Returns
    /// - (`usize`): number of units selected.
    pub fn select_failed(&mut self) -> usize {
        self.select_where(|unit| unit.result == TestResult::Failed)
    }

    /// Select exactly the unlocked units whose path contains `pattern`.
    pub fn select_matching(&mut self, pattern: &str) -> usize {
        self.select_where(|unit| unit.path().contains(pattern))
    }

    fn select_where(&mut self, predicate: impl Fn(&crate::unit::TestUnit) -> bool) -> usize {
        let mut count = 0;
        for unit in self.units.values_mut().filter(|unit| !unit.locked) {
            unit.selected = predicate(unit);
            if unit.selected {
                count += 1;
            }
        }
        self.refresh_aggregates();
        count
    }

    pub fn set_expanded(&mut self, path: &str, expanded: bool) -> Result<(), RunnerError> {
        let group = self
            .groups
            .groups
            .get_mut(path)
            .ok_or_else(|| RunnerError::UnknownGroup(path.to_string()))?;
        group.expanded = expanded;
        Ok(())
    }

    /// Expand or collapse a group and everything below it.
    pub fn set_expanded_recursive(&mut self, path: &str, expanded: bool) -> Result<(), RunnerError> {
        if !self.groups.contains(path) {
            return Err(RunnerError::UnknownGroup(path.to_string()));
        }
        for group in self.groups.groups.values_mut() {
            if group.path == path || path::is_descendant_of(&group.path, path) {
                group.expanded = expanded;
            }
        }
        Ok(())
    }

    /// Selected units in tree order: depth-first over groups, discovery order inside a group.
    pub fn selected_units(&self) -> Vec<UnitId> {
        self.groups
            .walk()
            .into_iter()
            .flat_map(|group| group.units.iter().copied())
            .filter(|id| self.units.get(id).is_some_and(|unit| unit.selected))
            .collect()
    }

    /// Whether no unit or group below `path` reports itself unselected. Locked entries count too.
    pub fn is_all_selected(&self, path: &str) -> bool {
        let Some(units) = self.groups.descendant_units(path) else {
            return false;
        };
        units.iter().filter_map(|id| self.unit(*id)).all(|unit| unit.selected)
            && self.groups.descendants(path).iter().all(|group| group.selected)
    }

    /// Whether some but not all units below `path` are selected. Counted fresh on every call.
    pub fn is_mixed(&self, path: &str) -> bool {
        let Some(units) = self.groups.descendant_units(path) else {
            return false;
        };
        let total = units.len();
        let selected = units
            .iter()
            .filter_map(|id| self.unit(*id))
            .filter(|unit| unit.selected)
            .count();
        selected > 0 && selected < total
    }

    /// Aggregate result of every unit below `path`, computed on demand.
    pub fn group_result(&self, path: &str) -> Option<TestResult> {
        let units = self.groups.descendant_units(path)?;
        Some(TestResult::aggregate(
            units.iter().filter_map(|id| self.unit(*id)).map(|unit| unit.result),
        ))
    }

    fn set_group_selection(&mut self, path: &str, selected: bool) -> Result<(), RunnerError> {
        let units = self
            .groups
            .descendant_units(path)
            .ok_or_else(|| RunnerError::UnknownGroup(path.to_string()))?;
        for id in units {
            if let Some(unit) = self.unit_mut(id).filter(|unit| !unit.locked) {
                unit.selected = selected;
            }
        }
        self.refresh_aggregates();
        Ok(())
    }

    fn set_group_lock(&mut self, path: &str, locked: bool) -> Result<(), RunnerError> {
        let units = self
            .groups
            .descendant_units(path)
            .ok_or_else(|| RunnerError::UnknownGroup(path.to_string()))?;
        for id in units {
            if let Some(unit) = self.unit_mut(id) {
                unit.locked = locked;
            }
        }
        self.refresh_aggregates();
        Ok(())
    }

    /// Recompute every group's cached `selected` and `locked`, deepest groups first.
    pub(crate) fn refresh_aggregates(&mut self) {
        let mut paths: Vec<String> = self.groups.groups.keys().cloned().collect();
        paths.sort_by_key(|p| Reverse(path::depth(p)));

        // (selected, locked) per group path
        let mut computed: HashMap<String, (bool, bool)> = HashMap::with_capacity(paths.len());
        for group_path in paths {
            let Some(group) = self.groups.get(&group_path) else {
                continue;
            };
            let mut selected = true;
            let mut locked = true;
            let mut has_content = false;

            for unit in group.units.iter().filter_map(|id| self.units.get(id)) {
                has_content = true;
                if !unit.locked {
                    locked = false;
                    selected &= unit.selected;
                }
            }
            for child in self.groups.children(&group_path) {
                has_content = true;
                let (child_selected, child_locked) = computed.get(&child.path).copied().unwrap_or((true, false));
                if !child_locked {
                    locked = false;
                    selected &= child_selected;
                }
            }
            computed.insert(group_path, (selected, has_content && locked));
        }

        for (group_path, (selected, locked)) in computed {
            if let Some(group) = self.groups.groups.get_mut(&group_path) {
                group.selected = selected;
                group.locked = locked;
            }
        }
    }
}
