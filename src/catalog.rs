//! The unit arena and discovery ingestion.
//!
//! Units live in an arena keyed by [`UnitId`] with a path index next to it. Discovery hands over
//! `(descriptor, invocable)` pairs; ingesting a batch reconciles the arena with it:
//! - known paths keep their selection, lock and result and pick up the new invocable,
//! - new paths become fresh units,
//! - paths missing from the batch are removed,
//! - the group tree is rebuilt from the surviving paths.

use std::collections::{HashMap, HashSet};

use framerunner_core::{ConfigError, Descriptor};

use crate::body::TestFn;
use crate::group::{Group, GroupTree};
use crate::unit::{TestUnit, UnitId};

/// Summary of one ingestion pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub added: Vec<UnitId>,
    /// Existing units whose descriptor configuration changed.
    pub updated: Vec<UnitId>,
    pub removed: Vec<UnitId>,
    /// Skipped entries. Never fatal to the batch.
    pub diagnostics: Vec<ConfigError>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// All known units plus the group tree built over their paths.
#[derive(Debug, Default)]
pub struct Catalog {
    pub(crate) units: HashMap<UnitId, TestUnit>,
    by_path: HashMap<String, UnitId>,
    order: Vec<UnitId>,
    pub(crate) groups: GroupTree,
    next_id: u32,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn unit(&self, id: UnitId) -> Option<&TestUnit> {
        self.units.get(&id)
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> Option<&mut TestUnit> {
        self.units.get_mut(&id)
    }

    pub fn id_of(&self, path: &str) -> Option<UnitId> {
        self.by_path.get(path).copied()
    }

    pub fn unit_by_path(&self, path: &str) -> Option<&TestUnit> {
        self.id_of(path).and_then(|id| self.unit(id))
    }

    /// Unit ids in discovery order.
    pub fn ids(&self) -> &[UnitId] {
        &self.order
    }

    /// Units in discovery order.
    pub fn units(&self) -> impl Iterator<Item = &TestUnit> + '_ {
        self.order.iter().filter_map(|id| self.units.get(id))
    }

    pub fn groups(&self) -> &GroupTree {
        &self.groups
    }

    pub fn group(&self, path: &str) -> Option<&Group> {
        self.groups.get(path)
    }

    /// Ingest a discovery batch and drop whatever it removed.
    ///
    /// Hosts driving runs should go through [`crate::Scheduler::ingest`], which also tears down a removed unit that
    /// was executing.
    pub fn ingest(&mut self, discovered: Vec<(Descriptor, TestFn)>) -> IngestReport {
        self.ingest_detached(discovered).0
    }

    /// Ingest a discovery batch, handing back the removed units so the caller can cancel in-flight work.
    #[tracing::instrument(skip_all, fields(batch = discovered.len()))]
    pub(crate) fn ingest_detached(&mut self, discovered: Vec<(Descriptor, TestFn)>) -> (IngestReport, Vec<TestUnit>) {
        let mut report = IngestReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted = Vec::with_capacity(discovered.len());

        for (descriptor, invocable) in discovered {
            if descriptor.path().is_empty() {
                let diagnostic = ConfigError::EmptyPath {
                    origin: descriptor.origin().to_string(),
                };
                tracing::warn!(%diagnostic, "skipping discovered test");
                report.diagnostics.push(diagnostic);
                continue;
            }
            if !seen.insert(descriptor.path().to_string()) {
                let diagnostic = ConfigError::DuplicatePath {
                    path: descriptor.path().to_string(),
                };
                tracing::warn!(%diagnostic, "skipping discovered test");
                report.diagnostics.push(diagnostic);
                continue;
            }
            accepted.push((descriptor, invocable));
        }

        let stale: Vec<UnitId> = self
            .units()
            .filter(|unit| !seen.contains(unit.path()))
            .map(TestUnit::id)
            .collect();
        let mut detached = Vec::new();
        for id in stale {
            if let Some(unit) = self.detach(id) {
                report.removed.push(id);
                detached.push(unit);
            }
        }

        let mut order = Vec::with_capacity(accepted.len());
        for (descriptor, invocable) in accepted {
            if let Some(&id) = self.by_path.get(descriptor.path()) {
                if let Some(unit) = self.units.get_mut(&id) {
                    if unit.refresh(&descriptor, invocable) {
                        report.updated.push(id);
                    }
                }
                order.push(id);
            } else {
                let id = UnitId(self.next_id);
                self.next_id += 1;
                self.by_path.insert(descriptor.path().to_string(), id);
                self.units.insert(id, TestUnit::new(id, descriptor, invocable));
                report.added.push(id);
                order.push(id);
            }
        }
        self.order = order;

        let rejected = self.groups.rebuild(
            self.order
                .iter()
                .filter_map(|id| self.units.get(id))
                .map(|unit| (unit.id(), unit.descriptor())),
            &mut report.diagnostics,
        );
        for id in rejected {
            if let Some(unit) = self.detach(id) {
                report.added.retain(|added| *added != id);
                report.updated.retain(|updated| *updated != id);
                report.removed.push(id);
                detached.push(unit);
            }
        }
        self.refresh_aggregates();

        tracing::info!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            diagnostics = report.diagnostics.len(),
            "ingested discovery batch"
        );
        (report, detached)
    }

    fn detach(&mut self, id: UnitId) -> Option<TestUnit> {
        let unit = self.units.remove(&id)?;
        self.by_path.remove(unit.path());
        self.order.retain(|other| *other != id);
        Some(unit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use framerunner_core::TestResult;

    use super::*;
    use crate::body::{Body, test_fn};

    fn pass() -> TestFn {
        test_fn(|_| Ok(Body::Complete))
    }

    fn batch(paths: &[&str]) -> Vec<(Descriptor, TestFn)> {
        paths.iter().map(|p| (Descriptor::new(p), pass())).collect()
    }

    #[test]
    fn test_ingest_creates_units_in_order() {
        let mut catalog = Catalog::new();
        let report = catalog.ingest(batch(&["a/one", "a/two", "b/three"]));
        assert_eq!(report.added.len(), 3);
        assert!(report.is_clean());
        let paths: Vec<_> = catalog.units().map(TestUnit::path).collect();
        assert_eq!(paths, ["a/one", "a/two", "b/three"]);
        let unit = catalog.unit_by_path("a/two").unwrap();
        assert!(!unit.is_selected());
        assert_eq!(unit.result(), TestResult::NotRun);
    }

    #[test]
    fn test_duplicate_path_keeps_first() {
        let mut catalog = Catalog::new();
        let report = catalog.ingest(vec![
            (Descriptor::new("a/dup"), pass()),
            (Descriptor::new("a/dup").with_pause_on_fail(true), pass()),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            report.diagnostics,
            vec![ConfigError::DuplicatePath { path: "a/dup".into() }]
        );
        assert!(!catalog.unit_by_path("a/dup").unwrap().descriptor().pause_on_fail());
    }

    #[test]
    fn test_empty_path_is_diagnosed() {
        let mut catalog = Catalog::new();
        let report = catalog.ingest(vec![(Descriptor::new("//").with_origin("lib.rs:3"), pass())]);
        assert!(catalog.is_empty());
        assert_eq!(
            report.diagnostics,
            vec![ConfigError::EmptyPath { origin: "lib.rs:3".into() }]
        );
    }

    #[test]
    fn test_reingest_preserves_user_state_and_removes_missing() {
        let mut catalog = Catalog::new();
        catalog.ingest(batch(&["a/keep", "a/drop"]));
        let keep = catalog.id_of("a/keep").unwrap();
        catalog.select_unit(keep, true).unwrap();
        catalog.lock_unit(keep, true).unwrap();
        catalog.unit_mut(keep).unwrap().result = TestResult::Failed;

        let report = catalog.ingest(vec![(Descriptor::new("a/keep").with_pause_on_fail(true), pass())]);
        assert_eq!(report.updated, vec![keep]);
        assert_eq!(report.removed.len(), 1);
        assert!(catalog.unit_by_path("a/drop").is_none());

        let unit = catalog.unit(keep).unwrap();
        assert!(unit.is_selected());
        assert!(unit.is_locked());
        assert_eq!(unit.result(), TestResult::Failed);
        assert!(unit.descriptor().pause_on_fail());
    }

    #[test]
    fn test_mixed_suite_group_rejects_later_entry() {
        let mut catalog = Catalog::new();
        let report = catalog.ingest(vec![
            (Descriptor::new("ui/press").in_suite(), pass()),
            (Descriptor::new("ui/plain"), pass()),
        ]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.group("ui").unwrap().is_suite());
        assert_eq!(
            report.diagnostics,
            vec![ConfigError::MixedSuiteGroup {
                group: "ui".into(),
                path: "ui/plain".into()
            }]
        );
        assert!(report.added.iter().all(|id| catalog.unit(*id).is_some()));
    }
}
