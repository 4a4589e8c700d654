use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CascadeError, Result};
use super::alternatives::{best_displacing, best_free, Alternative};
use super::conflicts::detect_in;
use super::context::ScheduleContext;
use super::types::{
    AssignmentGrid, BlockReason, BlockedConflict, BunkId, CascadeOutcome, Claim, ConflictRecord,
    PlanEntry, SlotEntry,
};
use super::usage::{build_usage_index, UsageIndex};

pub const DEFAULT_ITERATION_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Circuit breaker on queue pops per pass
    pub iteration_cap: usize,
    /// Allow moving a bunk into a full location and displacing its occupants in turn
    pub allow_cascade: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            iteration_cap: DEFAULT_ITERATION_CAP,
            allow_cascade: true,
        }
    }
}

/// Validated claim: sorted slots and the set of claiming bunks
struct ClaimScope {
    slots: Vec<usize>,
    bunks: BTreeSet<BunkId>,
    /// claimant -> every slot it gives up
    released: BTreeMap<BunkId, BTreeSet<usize>>,
}

/// Slots a claimant gives up: the claim slots plus the rest of any block the
/// claim cuts into. Refuses a claim that lands on a pinned block.
fn released_slots(
    grid: &AssignmentGrid,
    bunk: &str,
    claim_slots: &[usize],
) -> Result<BTreeSet<usize>> {
    let mut released = BTreeSet::new();
    for &slot in claim_slots {
        if grid.entry(bunk, slot).is_none() {
            continue;
        }
        for held in grid.block_slots(bunk, slot) {
            if grid.entry(bunk, held).map_or(false, |e| e.pinned) {
                return Err(CascadeError::invalid(format!(
                    "{} is pinned at slot {} and cannot take the claim",
                    bunk, held
                )));
            }
            released.insert(held);
        }
    }
    Ok(released)
}

fn validate_claim(ctx: &ScheduleContext<'_>, claim: &Claim) -> Result<ClaimScope> {
    let slots = ctx.grid.normalize_slots(&claim.slots)?;
    if claim.bunks.is_empty() {
        return Err(CascadeError::invalid("claim names no bunks"));
    }
    for bunk in &claim.bunks {
        let known = ctx.grid.contains_bunk(bunk)
            || ctx.divisions.map_or(false, |d| d.contains_bunk(bunk));
        if !known {
            return Err(CascadeError::invalid(format!("unknown bunk {}", bunk)));
        }
    }
    let bunks: BTreeSet<BunkId> = claim.bunks.iter().cloned().collect();
    let capacity = ctx.registry.capacity(&claim.location);
    if bunks.len() as u32 > capacity {
        return Err(CascadeError::invalid(format!(
            "{} bunks cannot share {} (capacity {})",
            bunks.len(),
            claim.location,
            capacity
        )));
    }
    let mut released = BTreeMap::new();
    for bunk in &bunks {
        released.insert(bunk.clone(), released_slots(ctx.grid, bunk, &slots)?);
    }
    Ok(ClaimScope {
        slots,
        bunks,
        released,
    })
}

/// Builds a reassignment plan that makes room for `claim`.
///
/// Works breadth-first over a queue of conflicts seeded by the detector.
/// Each `(bunk, slot)` is handled at most once. Pinned occupants and bunks
/// with nowhere to go end up in `blocked`, but only if their slot still
/// overflows after everyone else has moved. The plan is not applied.
pub fn build_plan(
    ctx: &ScheduleContext<'_>,
    claim: &Claim,
    options: &PlannerOptions,
) -> Result<CascadeOutcome> {
    let scope = validate_claim(ctx, claim)?;
    let mut usage = build_usage_index(ctx.grid, &BTreeSet::new());

    let report = detect_in(ctx, &usage, &claim.location, &scope.slots, &scope.bunks);
    let mut outcome = CascadeOutcome::default();

    if !report.reserved_slots.is_empty() {
        info!(
            location = %claim.location,
            slots = ?report.reserved_slots,
            "claim hits reserved slots, nothing planned"
        );
        outcome.reserved_slots = report.reserved_slots;
        return Ok(outcome);
    }
    if !report.has_conflict {
        debug!(location = %claim.location, "claim fits without moving anyone");
        return Ok(outcome);
    }

    // Claimants leave every block the claim touches and take the claimed location.
    for (bunk, slots) in &scope.released {
        for &slot in slots {
            if let Some(entry) = ctx.grid.entry(bunk, slot) {
                if !entry.continuation {
                    usage.remove(slot, &entry.location, bunk);
                }
            }
        }
    }
    for bunk in &scope.bunks {
        for &slot in &scope.slots {
            usage.add(slot, &claim.location, bunk, &claim.activity);
        }
    }

    // (location, slot) -> occupants that still have to leave
    let mut need: BTreeMap<(String, usize), u32> = report
        .overflow
        .iter()
        .map(|(&slot, &n)| ((claim.location.clone(), slot), n))
        .collect();

    // Movable occupants go first so pinned ones are only blocked if they had to move.
    let mut seed = report.conflicts;
    seed.sort_by_key(|c| (c.slot, c.pinned));
    let mut queue: VecDeque<ConflictRecord> = seed.into();
    let mut processed: BTreeSet<(BunkId, usize)> = BTreeSet::new();
    // Occupants that could not move. They are only blocked if their slot still
    // overflows once everyone else has had a turn.
    let mut stuck: Vec<BlockedConflict> = Vec::new();

    while let Some(conflict) = queue.pop_front() {
        if outcome.iterations >= options.iteration_cap {
            queue.push_front(conflict);
            outcome.cap_reached = true;
            break;
        }
        outcome.iterations += 1;

        let key = (conflict.bunk.clone(), conflict.slot);
        if processed.contains(&key) {
            continue;
        }
        let need_key = (conflict.location.clone(), conflict.slot);
        if need.get(&need_key).copied().unwrap_or(0) == 0 {
            continue;
        }
        processed.insert(key);

        if conflict.pinned {
            debug!(bunk = %conflict.bunk, slot = conflict.slot, "pinned occupant cannot move");
            stuck.push(BlockedConflict {
                conflict,
                reason: BlockReason::Pinned,
            });
            continue;
        }

        let block = ctx.grid.block_slots(&conflict.bunk, conflict.slot);
        usage.remove(conflict.slot, &conflict.location, &conflict.bunk);

        let exclude: BTreeSet<String> = [claim.location.clone(), conflict.location.clone()]
            .into_iter()
            .collect();
        let choice = relocate(
            ctx,
            &conflict.bunk,
            &block,
            &usage,
            &exclude,
            &scope,
            &processed,
            options,
        );

        let Some((alternative, displaced)) = choice else {
            debug!(bunk = %conflict.bunk, slot = conflict.slot, "no alternative");
            usage.add(conflict.slot, &conflict.location, &conflict.bunk, &conflict.activity);
            stuck.push(BlockedConflict {
                conflict,
                reason: BlockReason::NoAlternative,
            });
            continue;
        };

        if let Some(n) = need.get_mut(&need_key) {
            *n = n.saturating_sub(1);
        }
        for &slot in &block {
            processed.insert((conflict.bunk.clone(), slot));
            usage.add(slot, &alternative.location, &conflict.bunk, &alternative.activity);
        }
        debug!(
            bunk = %conflict.bunk,
            from = %conflict.location,
            to = %alternative.location,
            displaced = displaced.len(),
            "reassigned"
        );

        if !displaced.is_empty() {
            let mover: BTreeSet<BunkId> = [conflict.bunk.clone()].into_iter().collect();
            let secondary = detect_in(ctx, &usage, &alternative.location, &block, &mover);
            for record in secondary.conflicts {
                if displaced.contains(&(record.bunk.clone(), record.slot)) {
                    *need.entry((record.location.clone(), record.slot)).or_insert(0) += 1;
                    queue.push_back(record);
                }
            }
        }

        outcome.plan.push(PlanEntry {
            bunk: conflict.bunk.clone(),
            slots: block,
            from_location: conflict.location,
            from_activity: conflict.activity,
            to_location: alternative.location,
            to_activity: alternative.activity,
            owned_by_caller: conflict.owned_by_caller,
            penalty: alternative.penalty,
        });
    }

    for blocked in stuck {
        let needed = need
            .get(&(blocked.conflict.location.clone(), blocked.conflict.slot))
            .copied()
            .unwrap_or(0);
        if needed > 0 {
            outcome.blocked.push(blocked);
        } else {
            debug!(
                bunk = %blocked.conflict.bunk,
                slot = blocked.conflict.slot,
                "others made room, stays put"
            );
        }
    }

    if outcome.cap_reached {
        for conflict in queue {
            let key = (conflict.bunk.clone(), conflict.slot);
            let needed = need
                .get(&(conflict.location.clone(), conflict.slot))
                .copied()
                .unwrap_or(0);
            if needed == 0 || !processed.insert(key) {
                continue;
            }
            outcome.blocked.push(BlockedConflict {
                conflict,
                reason: BlockReason::IterationCap,
            });
        }
        warn!(
            cap = options.iteration_cap,
            unresolved = outcome.blocked.len(),
            "iteration cap reached, plan is partial"
        );
    }

    info!(
        location = %claim.location,
        moves = outcome.plan.len(),
        blocked = outcome.blocked.len(),
        iterations = outcome.iterations,
        "plan built"
    );
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn relocate(
    ctx: &ScheduleContext<'_>,
    bunk: &str,
    block: &[usize],
    usage: &UsageIndex,
    exclude: &BTreeSet<String>,
    scope: &ClaimScope,
    processed: &BTreeSet<(BunkId, usize)>,
    options: &PlannerOptions,
) -> Option<(Alternative, Vec<(BunkId, usize)>)> {
    if let Some(free) = best_free(ctx, bunk, block, usage, exclude) {
        return Some((free, Vec::new()));
    }
    if !options.allow_cascade {
        return None;
    }
    let movable = |other: &str, slot: usize| {
        !scope.bunks.contains(other)
            && !processed.contains(&(other.to_string(), slot))
            && ctx.grid.entry(other, slot).map_or(false, |e| !e.pinned)
    };
    best_displacing(ctx, bunk, block, usage, exclude, movable)
        .map(|d| (d.alternative, d.displaced))
}

/// Applies a plan and then the claim to `grid`, all or nothing.
///
/// Claimants give up any block the claim cuts into; slots of that block outside
/// the claim are left empty. Every plan entry is checked against the grid first.
/// If a bunk is no longer where the plan found it the grid is left untouched and
/// `StalePlan` is returned.
pub fn apply_plan(
    grid: &mut AssignmentGrid,
    claim: &Claim,
    outcome: &CascadeOutcome,
) -> Result<()> {
    if !outcome.reserved_slots.is_empty() {
        return Err(CascadeError::invalid(format!(
            "{} is reserved at slots {:?}",
            claim.location, outcome.reserved_slots
        )));
    }
    let claim_slots = grid.normalize_slots(&claim.slots)?;
    let mut released = BTreeMap::new();
    for bunk in &claim.bunks {
        released.insert(bunk.as_str(), released_slots(grid, bunk, &claim_slots)?);
    }

    for entry in &outcome.plan {
        let first = *entry.slots.first().ok_or_else(|| {
            CascadeError::invalid(format!("plan entry for {} has no slots", entry.bunk))
        })?;
        let current = grid.entry(&entry.bunk, first);
        let matches = current.map_or(false, |e| {
            e.location == entry.from_location && e.activity == entry.from_activity && !e.pinned
        });
        if !matches {
            return Err(CascadeError::StalePlan {
                bunk: entry.bunk.clone(),
                slot: first,
                expected: entry.from_location.clone(),
            });
        }
    }

    let mut next = grid.clone();
    for entry in &outcome.plan {
        for (i, &slot) in entry.slots.iter().enumerate() {
            let mut moved =
                SlotEntry::new(&entry.to_location, &entry.to_activity).with_source("cascade");
            if i > 0 {
                moved = moved.as_continuation();
            }
            next.set_entry(&entry.bunk, slot, moved)?;
        }
    }
    for (bunk, slots) in &released {
        for &slot in slots {
            next.clear_entry(bunk, slot);
        }
    }
    for bunk in &claim.bunks {
        for &slot in &claim_slots {
            let claimed = SlotEntry::new(&claim.location, &claim.activity).with_source("claim");
            next.set_entry(bunk, slot, claimed)?;
        }
    }

    *grid = next;
    info!(
        location = %claim.location,
        moves = outcome.plan.len(),
        bunks = claim.bunks.len(),
        "plan applied"
    );
    Ok(())
}
