use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Result;
use super::context::ScheduleContext;
use super::rotation::penalty;
use super::types::{BunkId, Location};
use super::usage::UsageIndex;

/// A replacement activity for a displaced bunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternative {
    pub location: String,
    pub activity: String,
    pub penalty: u64,
}

/// An alternative that only fits once some of its occupants move out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Displacement {
    pub alternative: Alternative,
    /// (bunk, slot) pairs that have to leave the alternative location
    pub displaced: Vec<(BunkId, usize)>,
}

/// Picks the lowest-penalty location with room for `bunk` at every slot in `slots`.
///
/// Returns `Ok(None)` when nothing fits; only a bad slot list is an error.
pub fn select_alternative(
    ctx: &ScheduleContext<'_>,
    bunk: &str,
    slots: &[usize],
    usage: &UsageIndex,
    exclude: &BTreeSet<String>,
) -> Result<Option<Alternative>> {
    let slots = ctx.grid.normalize_slots(slots)?;
    Ok(best_free(ctx, bunk, &slots, usage, exclude))
}

/// Candidates in registry order: not excluded, available, not reserved at any slot
fn candidates<'c>(
    ctx: ScheduleContext<'c>,
    bunk: &str,
    slots: &'c [usize],
    exclude: &'c BTreeSet<String>,
) -> impl Iterator<Item = &'c Location> + 'c {
    let division = ctx.division_of(bunk);
    ctx.registry.iter().filter(move |loc| {
        loc.available
            && !exclude.contains(&loc.name)
            && !slots
                .iter()
                .any(|&slot| ctx.locks.is_reserved(&loc.name, slot, division))
    })
}

/// Cheapest activity at `location` for this bunk; ties keep the listed order
fn cheapest_activity(
    ctx: &ScheduleContext<'_>,
    bunk: &str,
    location: &Location,
    first_slot: usize,
) -> Alternative {
    let mut best: Option<Alternative> = None;
    for label in location.activity_labels() {
        let score = penalty(ctx, bunk, label, first_slot);
        if best.as_ref().map_or(true, |b| score < b.penalty) {
            best = Some(Alternative {
                location: location.name.clone(),
                activity: label.to_string(),
                penalty: score,
            });
        }
    }
    best.unwrap_or_else(|| Alternative {
        location: location.name.clone(),
        activity: location.name.clone(),
        penalty: penalty(ctx, bunk, &location.name, first_slot),
    })
}

pub(crate) fn best_free(
    ctx: &ScheduleContext<'_>,
    bunk: &str,
    slots: &[usize],
    usage: &UsageIndex,
    exclude: &BTreeSet<String>,
) -> Option<Alternative> {
    let first_slot = *slots.first()?;
    let mut best: Option<Alternative> = None;

    for location in candidates(*ctx, bunk, slots, exclude) {
        let has_room = slots
            .iter()
            .all(|&slot| usage.count(slot, &location.name) < location.capacity);
        if !has_room {
            continue;
        }
        let option = cheapest_activity(ctx, bunk, location, first_slot);
        if best.as_ref().map_or(true, |b| option.penalty < b.penalty) {
            best = Some(option);
        }
    }
    best
}

/// Like [`best_free`], but also considers full locations whose surplus
/// occupants can all be moved. Prefers fewer displacements, then lower penalty.
pub(crate) fn best_displacing<F>(
    ctx: &ScheduleContext<'_>,
    bunk: &str,
    slots: &[usize],
    usage: &UsageIndex,
    exclude: &BTreeSet<String>,
    movable: F,
) -> Option<Displacement>
where
    F: Fn(&str, usize) -> bool,
{
    let first_slot = *slots.first()?;
    let mut best: Option<Displacement> = None;

    'locations: for location in candidates(*ctx, bunk, slots, exclude) {
        let mut displaced = Vec::new();
        for &slot in slots {
            let occupants = usage.occupants(slot, &location.name);
            let count = occupants.len() as u32;
            if count < location.capacity {
                continue;
            }
            let surplus = (count + 1 - location.capacity) as usize;
            let chosen: Vec<(BunkId, usize)> = occupants
                .into_iter()
                .filter(|(occupant, _)| occupant.as_str() != bunk && movable(occupant, slot))
                .take(surplus)
                .map(|(occupant, _)| (occupant.clone(), slot))
                .collect();
            if chosen.len() < surplus {
                continue 'locations;
            }
            displaced.extend(chosen);
        }

        let alternative = cheapest_activity(ctx, bunk, location, first_slot);
        let better = match &best {
            None => true,
            Some(b) => {
                (displaced.len(), alternative.penalty)
                    < (b.displaced.len(), b.alternative.penalty)
            }
        };
        if better {
            best = Some(Displacement {
                alternative,
                displaced,
            });
        }
    }
    best
}
