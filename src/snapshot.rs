//! Read-only, serializable views of scheduler state for presentation layers.

use std::fmt::Write as _;

use framerunner_core::TestResult;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::queue::FinishedEntry;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::unit::{RunPhase, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub path: String,
    pub depth: usize,
    pub expanded: bool,
    pub selected: bool,
    pub mixed: bool,
    pub locked: bool,
    pub suite: bool,
    pub result: TestResult,
    pub units: Vec<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub path: String,
    pub result: TestResult,
    pub selected: bool,
    pub locked: bool,
    pub pause_on_fail: bool,
    pub phase: Option<RunPhase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: SchedulerState,
    pub tick_count: u64,
    pub elapsed_ms: u64,
    pub current: Option<UnitId>,
    /// Depth-first, pre-order.
    pub groups: Vec<GroupSnapshot>,
    /// Discovery order.
    pub units: Vec<UnitSnapshot>,
    pub pending: Vec<UnitId>,
    /// Most recent first.
    pub finished: Vec<FinishedEntry>,
}

impl Scheduler {
    pub fn snapshot(&self) -> Snapshot {
        let catalog = self.catalog();
        Snapshot {
            state: self.state(),
            tick_count: self.tick_count(),
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            current: self.current(),
            groups: group_snapshots(catalog),
            units: catalog
                .units()
                .map(|unit| UnitSnapshot {
                    id: unit.id(),
                    path: unit.path().to_string(),
                    result: unit.result(),
                    selected: unit.is_selected(),
                    locked: unit.is_locked(),
                    pause_on_fail: unit.descriptor().pause_on_fail(),
                    phase: self.phase_of(unit.id()),
                })
                .collect(),
            pending: self.queue().pending().collect(),
            finished: self.queue().finished().cloned().collect(),
        }
    }
}

fn group_snapshots(catalog: &Catalog) -> Vec<GroupSnapshot> {
    catalog
        .groups()
        .walk()
        .into_iter()
        .map(|group| GroupSnapshot {
            path: group.path().to_string(),
            depth: framerunner_core::path::depth(group.path()),
            expanded: group.is_expanded(),
            selected: group.is_selected(),
            mixed: catalog.is_mixed(group.path()),
            locked: group.is_locked(),
            suite: group.is_suite(),
            result: catalog.group_result(group.path()).unwrap_or_default(),
            units: group.units().to_vec(),
        })
        .collect()
}

/// Render the group tree as indented text, one line per group and unit.
///
/// ```text
/// [~] physics  (fail)
///   [x] gravity  pass
///   [ ] friction  fail  locked
/// ```
pub fn render_tree(catalog: &Catalog) -> String {
    let mut out = String::new();
    for group in catalog.groups().walk() {
        let depth = framerunner_core::path::depth(group.path());
        if !group.is_root() {
            let indent = "  ".repeat(depth - 1);
            let mark = if catalog.is_mixed(group.path()) {
                "~"
            } else if group.is_selected() {
                "x"
            } else {
                " "
            };
            let result = catalog.group_result(group.path()).unwrap_or_default();
            let _ = write!(out, "{indent}[{mark}] {}  ({result})", group.name());
            if group.is_locked() {
                out.push_str("  locked");
            }
            out.push('\n');
        }

        let indent = "  ".repeat(depth);
        for unit in group.units().iter().filter_map(|id| catalog.unit(*id)) {
            let mark = if unit.is_selected() { "x" } else { " " };
            let _ = write!(out, "{indent}[{mark}] {}  {}", unit.name(), unit.result());
            if unit.is_locked() {
                out.push_str("  locked");
            }
            out.push('\n');
        }
    }
    out
}
