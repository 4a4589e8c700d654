use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::Result;
use super::context::ScheduleContext;
use super::types::{BunkId, ConflictRecord};
use super::usage::{build_usage_index, UsageIndex};

/// What stands between a claim and a location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicts: Vec<ConflictRecord>,
    pub editable_conflicts: Vec<ConflictRecord>,
    pub non_editable_conflicts: Vec<ConflictRecord>,
    /// Slots where the location is reserved outside the grid
    pub reserved_slots: Vec<usize>,
    /// Room left for another bunk: offer "share" instead of "replace"
    pub can_share: bool,
    /// Highest occupancy (claimants excluded) across the requested slots
    pub current_usage: u32,
    pub max_capacity: u32,
    /// slot -> number of occupants that must leave for the claim to fit
    pub overflow: BTreeMap<usize, u32>,
}

/// Reports which occupants of `location` would push it past capacity if
/// `claimants` took it at `slots`.
pub fn detect_conflicts(
    ctx: &ScheduleContext<'_>,
    location: &str,
    slots: &[usize],
    claimants: &[BunkId],
) -> Result<ConflictReport> {
    let slots = ctx.grid.normalize_slots(slots)?;
    let claimants: BTreeSet<BunkId> = claimants.iter().cloned().collect();
    let usage = build_usage_index(ctx.grid, &BTreeSet::new());
    Ok(detect_in(ctx, &usage, location, &slots, &claimants))
}

/// Detection against an explicit usage index. Slots must already be validated.
pub(crate) fn detect_in(
    ctx: &ScheduleContext<'_>,
    usage: &UsageIndex,
    location: &str,
    slots: &[usize],
    claimants: &BTreeSet<BunkId>,
) -> ConflictReport {
    let capacity = ctx.registry.capacity(location);
    let incoming = claimants.len() as u32;
    let division_hint = claimants.iter().find_map(|b| ctx.division_of(b));

    let mut report = ConflictReport {
        max_capacity: capacity,
        ..Default::default()
    };

    for &slot in slots {
        if ctx.locks.is_reserved(location, slot, division_hint) {
            report.reserved_slots.push(slot);
        }

        let occupants: Vec<(&BunkId, &String)> = usage
            .occupants(slot, location)
            .into_iter()
            .filter(|(bunk, _)| !claimants.contains(*bunk))
            .collect();
        let existing = occupants.len() as u32;
        report.current_usage = report.current_usage.max(existing);

        if existing + incoming <= capacity {
            continue;
        }
        report.overflow.insert(slot, existing + incoming - capacity);

        for (bunk, activity) in occupants {
            let pinned = ctx.grid.entry(bunk, slot).map(|e| e.pinned).unwrap_or(false);
            let record = ConflictRecord {
                bunk: bunk.clone(),
                slot,
                location: location.to_string(),
                activity: activity.clone(),
                pinned,
                owned_by_caller: ctx.is_editable(bunk),
            };
            if record.owned_by_caller {
                report.editable_conflicts.push(record.clone());
            } else {
                report.non_editable_conflicts.push(record.clone());
            }
            report.conflicts.push(record);
        }
    }

    report.has_conflict = !report.overflow.is_empty() || !report.reserved_slots.is_empty();
    report.can_share = capacity > 1 && report.current_usage < capacity;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::locks::ReservationTable;
    use crate::schedule::types::{AssignmentGrid, DivisionMap, Location, LocationRegistry, SlotEntry};

    fn registry() -> LocationRegistry {
        LocationRegistry::new(vec![
            Location::new("Field A"),
            Location::new("Field B"),
            Location::shared("Field C", 2),
        ])
        .unwrap()
    }

    #[test]
    fn exclusive_location_conflicts_with_its_occupant() {
        let mut grid = AssignmentGrid::new(6);
        grid.set_entry("Bunk A", 3, SlotEntry::new("Field A", "Soccer")).unwrap();
        let registry = registry();
        let editable: BTreeSet<BunkId> = ["Bunk A".to_string()].into_iter().collect();
        let ctx = ScheduleContext::new(&grid, &registry).with_editable(&editable);

        let report = detect_conflicts(&ctx, "Field A", &[3], &["Bunk C".to_string()]).unwrap();
        assert!(report.has_conflict);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.editable_conflicts.len(), 1);
        assert!(report.non_editable_conflicts.is_empty());
        assert!(!report.can_share);
        assert_eq!(report.overflow.get(&3), Some(&1));
    }

    #[test]
    fn shared_location_with_room_reports_can_share() {
        let mut grid = AssignmentGrid::new(6);
        grid.set_entry("Bunk A", 5, SlotEntry::new("Field C", "Kickball")).unwrap();
        let registry = registry();
        let ctx = ScheduleContext::new(&grid, &registry);

        let report = detect_conflicts(&ctx, "Field C", &[5], &["Bunk B".to_string()]).unwrap();
        assert!(!report.has_conflict);
        assert!(report.can_share);
        assert_eq!(report.current_usage, 1);
        assert_eq!(report.max_capacity, 2);
    }

    #[test]
    fn claimant_already_there_is_not_its_own_conflict() {
        let mut grid = AssignmentGrid::new(6);
        grid.set_entry("Bunk A", 1, SlotEntry::new("Field A", "Soccer")).unwrap();
        let registry = registry();
        let ctx = ScheduleContext::new(&grid, &registry);

        let report = detect_conflicts(&ctx, "Field A", &[1], &["Bunk A".to_string()]).unwrap();
        assert!(!report.has_conflict);
    }

    #[test]
    fn reservations_raise_a_conflict_without_occupants() {
        let grid = AssignmentGrid::new(6);
        let registry = registry();
        let divisions = DivisionMap::from_pairs([("Juniors", "Bunk A")]).unwrap();
        let mut locks = ReservationTable::new();
        locks.reserve("Field B", 2, Some("Seniors".to_string()));
        let ctx = ScheduleContext::new(&grid, &registry)
            .with_divisions(&divisions)
            .with_locks(&locks);

        let report = detect_conflicts(&ctx, "Field B", &[1, 2], &["Bunk A".to_string()]).unwrap();
        assert!(report.has_conflict);
        assert!(report.conflicts.is_empty());
        assert_eq!(report.reserved_slots, vec![2]);
    }

    #[test]
    fn bad_slot_lists_fail_fast() {
        let grid = AssignmentGrid::new(6);
        let registry = registry();
        let ctx = ScheduleContext::new(&grid, &registry);
        assert!(detect_conflicts(&ctx, "Field A", &[], &[]).is_err());
        assert!(detect_conflicts(&ctx, "Field A", &[6], &[]).is_err());
    }
}
