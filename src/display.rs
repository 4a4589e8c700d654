use crate::schedule::slot_utils::slot_times;
use crate::schedule::{AssignmentGrid, CascadeOutcome, ConflictReport, PlanEntry};

/// Formats a slot list as "3" or "3-5"
pub fn format_slots(slots: &[usize]) -> String {
    match (slots.first(), slots.last()) {
        (Some(first), Some(last)) if first != last && last - first + 1 == slots.len() => {
            format!("{}-{}", first, last)
        }
        _ => slots
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Formats a location/activity pair, dropping the activity when it just repeats the location
pub fn format_activity(location: &str, activity: &str) -> String {
    if activity.is_empty() || activity == location {
        location.to_string()
    } else {
        format!("{} ({})", activity, location)
    }
}

pub fn format_plan_entry(entry: &PlanEntry) -> String {
    format!(
        "{} slot {}: {} -> {} (penalty {})",
        entry.bunk,
        format_slots(&entry.slots),
        format_activity(&entry.from_location, &entry.from_activity),
        format_activity(&entry.to_location, &entry.to_activity),
        entry.penalty
    )
}

/// Prints a planning outcome split into silent moves, moves needing approval, and blocked conflicts
pub fn print_outcome(outcome: &CascadeOutcome) {
    println!("\n=== Cascade Plan ===");
    println!(
        "Moves: {}  Blocked: {}  Iterations: {}",
        outcome.plan.len(),
        outcome.blocked.len(),
        outcome.iterations
    );

    if !outcome.reserved_slots.is_empty() {
        println!(
            "⚠️  Location reserved at slot(s) {}; nothing planned",
            format_slots(&outcome.reserved_slots)
        );
        return;
    }

    let silent: Vec<&PlanEntry> = outcome.silent_reassignments().collect();
    if !silent.is_empty() {
        println!("\nReassigned automatically ({}):", silent.len());
        for entry in silent {
            println!("  - {}", format_plan_entry(entry));
        }
    }

    let approval: Vec<&PlanEntry> = outcome.approval_required().collect();
    if !approval.is_empty() {
        println!("\nNeeds approval from another scheduler ({}):", approval.len());
        for entry in approval {
            println!("  - {}", format_plan_entry(entry));
        }
    }

    if !outcome.blocked.is_empty() {
        println!("\n⚠️  Blocked ({}):", outcome.blocked.len());
        for blocked in &outcome.blocked {
            let c = &blocked.conflict;
            println!(
                "  - {} slot {} at {}: {}",
                c.bunk,
                c.slot,
                format_activity(&c.location, &c.activity),
                blocked.reason.describe()
            );
        }
    }

    if outcome.cap_reached {
        println!("\n⚠️  Iteration cap reached; the plan is partial");
    }
    if outcome.plan.is_empty() && outcome.is_clean() {
        println!("\nNo conflicts; the claim fits as is.");
    }
}

pub fn print_conflicts(location: &str, report: &ConflictReport) {
    println!("\n=== Conflicts at {} ===", location);
    println!(
        "Capacity: {}  Current usage: {}  Can share: {}",
        report.max_capacity,
        report.current_usage,
        if report.can_share { "yes" } else { "no" }
    );
    if !report.reserved_slots.is_empty() {
        println!("Reserved at slot(s): {}", format_slots(&report.reserved_slots));
    }
    if !report.has_conflict {
        println!("No conflicts.");
        return;
    }
    for (label, records) in [
        ("Editable", &report.editable_conflicts),
        ("Other schedulers", &report.non_editable_conflicts),
    ] {
        if records.is_empty() {
            continue;
        }
        println!("{} ({}):", label, records.len());
        for c in records.iter() {
            let pin = if c.pinned { " [pinned]" } else { "" };
            println!(
                "  - {} slot {}: {}{}",
                c.bunk,
                c.slot,
                format_activity(&c.location, &c.activity),
                pin
            );
        }
    }
}

/// Prints every bunk's day, one line per slot
pub fn print_grid(grid: &AssignmentGrid, start_time: &str, minutes_per_slot: u32) {
    let times = slot_times(start_time, minutes_per_slot, grid.slot_count);
    println!("\n=== Schedule ({} bunks, {} slots) ===", grid.bunks.len(), grid.slot_count);
    for bunk in grid.bunk_ids() {
        println!("\n{}", bunk);
        for (slot, time) in times.iter().enumerate() {
            match grid.entry(bunk, slot) {
                Some(entry) => {
                    let mut flags = String::new();
                    if entry.pinned {
                        flags.push_str(" [pinned]");
                    }
                    if entry.continuation {
                        flags.push_str(" [cont.]");
                    }
                    println!(
                        "  Slot {} ({}) -> {}{}",
                        slot,
                        time,
                        format_activity(&entry.location, &entry.activity),
                        flags
                    );
                }
                None => println!("  Slot {} ({}) -> [EMPTY]", slot, time),
            }
        }
    }
}
