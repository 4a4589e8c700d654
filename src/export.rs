use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::display::format_slots;
use crate::error::{Result, StoreError};
use crate::schedule::CascadeOutcome;

#[derive(Debug, Serialize)]
struct PlanRow<'a> {
    kind: &'static str,
    bunk: &'a str,
    slots: String,
    from: &'a str,
    to: &'a str,
    owned_by_caller: bool,
    reason: &'a str,
}

/// Writes moves and blocked conflicts as `kind,bunk,slots,from,to,owned_by_caller,reason` rows.
///
/// Moves are `kind=move`; blocked conflicts are `kind=blocked` with an empty `to`.
/// Reserved claim slots produce a single `kind=reserved` row.
pub fn write_plan<W: Write>(outcome: &CascadeOutcome, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);

    if !outcome.reserved_slots.is_empty() {
        wtr.serialize(PlanRow {
            kind: "reserved",
            bunk: "",
            slots: format_slots(&outcome.reserved_slots),
            from: "",
            to: "",
            owned_by_caller: false,
            reason: "reserved",
        })
        .map_err(StoreError::from)?;
    }

    for entry in &outcome.plan {
        wtr.serialize(PlanRow {
            kind: "move",
            bunk: &entry.bunk,
            slots: format_slots(&entry.slots),
            from: &entry.from_location,
            to: &entry.to_location,
            owned_by_caller: entry.owned_by_caller,
            reason: "",
        })
        .map_err(StoreError::from)?;
    }

    for blocked in &outcome.blocked {
        let c = &blocked.conflict;
        wtr.serialize(PlanRow {
            kind: "blocked",
            bunk: &c.bunk,
            slots: c.slot.to_string(),
            from: &c.location,
            to: "",
            owned_by_caller: c.owned_by_caller,
            reason: blocked.reason.describe(),
        })
        .map_err(StoreError::from)?;
    }

    wtr.flush().map_err(StoreError::from)?;
    Ok(())
}

pub fn write_plan_csv(outcome: &CascadeOutcome, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(StoreError::from)?;
    write_plan(outcome, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{BlockReason, BlockedConflict, ConflictRecord, PlanEntry};

    #[test]
    fn writes_moves_then_blocked() {
        let outcome = CascadeOutcome {
            plan: vec![PlanEntry {
                bunk: "B2".to_string(),
                slots: vec![3],
                from_location: "Field A".to_string(),
                from_activity: "Soccer".to_string(),
                to_location: "Court".to_string(),
                to_activity: "Basketball".to_string(),
                owned_by_caller: false,
                penalty: 0,
            }],
            blocked: vec![BlockedConflict {
                conflict: ConflictRecord {
                    bunk: "B3".to_string(),
                    slot: 3,
                    location: "Field A".to_string(),
                    activity: "Soccer".to_string(),
                    pinned: true,
                    owned_by_caller: true,
                },
                reason: BlockReason::Pinned,
            }],
            ..Default::default()
        };

        let mut buf = Vec::new();
        write_plan(&outcome, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "kind,bunk,slots,from,to,owned_by_caller,reason");
        assert_eq!(lines[1], "move,B2,3,Field A,Court,false,");
        assert_eq!(lines[2], "blocked,B3,3,Field A,,true,pinned");
    }
}
