use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::types::{AssignmentGrid, BunkId};

/// Who is using one location in one slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationUsage {
    /// bunk -> activity label
    pub occupants: BTreeMap<BunkId, String>,
}

impl LocationUsage {
    pub fn count(&self) -> u32 {
        self.occupants.len() as u32
    }
}

/// slot -> location -> usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageIndex {
    slots: BTreeMap<usize, BTreeMap<String, LocationUsage>>,
}

impl UsageIndex {
    pub fn usage(&self, slot: usize, location: &str) -> Option<&LocationUsage> {
        self.slots.get(&slot)?.get(location)
    }

    pub fn count(&self, slot: usize, location: &str) -> u32 {
        self.usage(slot, location).map(LocationUsage::count).unwrap_or(0)
    }

    /// Occupants of `location` at `slot`, ordered by bunk id
    pub fn occupants(&self, slot: usize, location: &str) -> Vec<(&BunkId, &String)> {
        self.usage(slot, location)
            .map(|u| u.occupants.iter().collect())
            .unwrap_or_default()
    }

    pub fn locations_at(&self, slot: usize) -> impl Iterator<Item = (&String, &LocationUsage)> {
        self.slots.get(&slot).into_iter().flat_map(|m| m.iter())
    }

    pub fn add(&mut self, slot: usize, location: &str, bunk: &str, activity: &str) {
        self.slots
            .entry(slot)
            .or_default()
            .entry(location.to_string())
            .or_default()
            .occupants
            .insert(bunk.to_string(), activity.to_string());
    }

    pub fn remove(&mut self, slot: usize, location: &str, bunk: &str) -> bool {
        let Some(at_slot) = self.slots.get_mut(&slot) else {
            return false;
        };
        let Some(usage) = at_slot.get_mut(location) else {
            return false;
        };
        let removed = usage.occupants.remove(bunk).is_some();
        if usage.occupants.is_empty() {
            at_slot.remove(location);
        }
        removed
    }
}

/// Counts, per slot, which bunks occupy each location.
///
/// Continuation entries and empty slots are skipped, as are the bunks in
/// `exclude` and anything past the grid's slot count.
pub fn build_usage_index(grid: &AssignmentGrid, exclude: &BTreeSet<BunkId>) -> UsageIndex {
    let mut index = UsageIndex::default();
    for (bunk, row) in &grid.bunks {
        if exclude.contains(bunk) {
            continue;
        }
        for (slot, entry) in row.iter().enumerate().take(grid.slot_count) {
            let Some(entry) = entry else {
                continue;
            };
            if entry.continuation || entry.location.is_empty() {
                continue;
            }
            index.add(slot, &entry.location, bunk, &entry.activity);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::SlotEntry;

    fn grid() -> AssignmentGrid {
        let mut grid = AssignmentGrid::new(6);
        grid.set_entry("B1", 1, SlotEntry::new("Field A", "Soccer")).unwrap();
        grid.set_entry("B1", 2, SlotEntry::new("Field A", "Soccer").as_continuation()).unwrap();
        grid.set_entry("B2", 1, SlotEntry::new("Field A", "Kickball")).unwrap();
        grid.set_entry("B3", 1, SlotEntry::new("Pool", "Swim")).unwrap();
        grid
    }

    #[test]
    fn counts_occupants_per_slot_and_location() {
        let index = build_usage_index(&grid(), &BTreeSet::new());
        assert_eq!(index.count(1, "Field A"), 2);
        assert_eq!(index.count(1, "Pool"), 1);
        let occupants = index.occupants(1, "Field A");
        assert_eq!(occupants[0], (&"B1".to_string(), &"Soccer".to_string()));
        assert_eq!(occupants[1], (&"B2".to_string(), &"Kickball".to_string()));
    }

    #[test]
    fn skips_continuations_and_excluded_bunks() {
        let exclude: BTreeSet<BunkId> = ["B2".to_string()].into_iter().collect();
        let index = build_usage_index(&grid(), &exclude);
        assert_eq!(index.count(1, "Field A"), 1);
        assert_eq!(index.count(2, "Field A"), 0);
    }

    #[test]
    fn remove_drops_empty_locations() {
        let mut index = build_usage_index(&grid(), &BTreeSet::new());
        assert!(index.remove(1, "Pool", "B3"));
        assert!(!index.remove(1, "Pool", "B3"));
        assert_eq!(index.locations_at(1).count(), 1);
    }

    #[test]
    fn ignores_rows_longer_than_the_day() {
        let mut grid = AssignmentGrid::new(2);
        grid.bunks.insert(
            "B9".to_string(),
            vec![None, None, Some(SlotEntry::new("Gym", "Hoops"))],
        );
        let index = build_usage_index(&grid, &BTreeSet::new());
        assert_eq!(index.count(2, "Gym"), 0);
    }
}
