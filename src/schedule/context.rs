use std::collections::BTreeSet;

use super::locks::{LockOracle, NoLocks};
use super::rotation::{RotationHistory, RotationWeights};
use super::types::{AssignmentGrid, BunkId, DivisionMap, LocationRegistry};

static NO_LOCKS: NoLocks = NoLocks;
static NOBODY: BTreeSet<BunkId> = BTreeSet::new();
static DEFAULT_WEIGHTS: RotationWeights = RotationWeights::DEFAULT;

/// Everything a planning pass reads. The grid is a snapshot; nothing here is mutated.
#[derive(Clone, Copy)]
pub struct ScheduleContext<'a> {
    pub grid: &'a AssignmentGrid,
    pub registry: &'a LocationRegistry,
    pub divisions: Option<&'a DivisionMap>,
    /// Bunks the caller may reassign without approval
    pub editable: &'a BTreeSet<BunkId>,
    pub locks: &'a dyn LockOracle,
    pub history: Option<&'a RotationHistory>,
    pub weights: &'a RotationWeights,
}

impl<'a> ScheduleContext<'a> {
    pub fn new(grid: &'a AssignmentGrid, registry: &'a LocationRegistry) -> Self {
        Self {
            grid,
            registry,
            divisions: None,
            editable: &NOBODY,
            locks: &NO_LOCKS,
            history: None,
            weights: &DEFAULT_WEIGHTS,
        }
    }

    pub fn with_divisions(mut self, divisions: &'a DivisionMap) -> Self {
        self.divisions = Some(divisions);
        self
    }

    pub fn with_editable(mut self, editable: &'a BTreeSet<BunkId>) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_locks(mut self, locks: &'a dyn LockOracle) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_history(mut self, history: &'a RotationHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_weights(mut self, weights: &'a RotationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn division_of(&self, bunk: &str) -> Option<&'a str> {
        self.divisions.and_then(|d| d.division_of(bunk))
    }

    pub fn is_editable(&self, bunk: &str) -> bool {
        self.editable.contains(bunk)
    }
}
