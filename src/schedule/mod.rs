pub mod types;
pub mod slot_utils;
pub mod context;
pub mod locks;
pub mod usage;
pub mod conflicts;
pub mod rotation;
pub mod alternatives;
pub mod cascade;

pub use types::{
    AssignmentGrid, BlockReason, BlockedConflict, BunkId, CascadeOutcome, Claim, ConflictRecord,
    DivisionMap, Location, LocationRegistry, PlanEntry, SlotEntry,
};
pub use context::ScheduleContext;
pub use locks::{LockOracle, NoLocks, ReservationTable};
pub use usage::{build_usage_index, UsageIndex};
pub use conflicts::{detect_conflicts, ConflictReport};
pub use rotation::{penalty, RotationHistory, RotationWeights};
pub use alternatives::{select_alternative, Alternative};
pub use cascade::{apply_plan, build_plan, PlannerOptions};
pub use slot_utils::{parse_slot_list, slot_times};
