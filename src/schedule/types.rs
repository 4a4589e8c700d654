use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{CascadeError, Result};

pub type BunkId = String;

/// A bunk's activity in one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub location: String,
    pub activity: String,
    /// Never displaced by cascade resolution
    #[serde(default)]
    pub pinned: bool,
    /// Slots 2..N of a multi-slot block; not independently reassignable
    #[serde(default)]
    pub continuation: bool,
    /// Who or what last wrote this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SlotEntry {
    pub fn new(location: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            activity: activity.into(),
            pinned: false,
            continuation: false,
            source: None,
        }
    }

    pub fn with_pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn as_continuation(mut self) -> Self {
        self.continuation = true;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// True if this entry is a new occupancy of `location` (continuations are not)
    pub fn occupies(&self, location: &str) -> bool {
        !self.continuation && self.location == location
    }
}

/// Bunk -> one optional entry per slot of the day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentGrid {
    pub slot_count: usize,
    #[serde(default)]
    pub bunks: BTreeMap<BunkId, Vec<Option<SlotEntry>>>,
}

impl AssignmentGrid {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count,
            bunks: BTreeMap::new(),
        }
    }

    pub fn contains_bunk(&self, bunk: &str) -> bool {
        self.bunks.contains_key(bunk)
    }

    pub fn bunk_ids(&self) -> impl Iterator<Item = &BunkId> {
        self.bunks.keys()
    }

    pub fn entry(&self, bunk: &str, slot: usize) -> Option<&SlotEntry> {
        self.bunks.get(bunk)?.get(slot)?.as_ref()
    }

    /// Returns the bunk's row, creating an empty one if needed
    pub fn ensure_bunk(&mut self, bunk: &str) -> &mut Vec<Option<SlotEntry>> {
        let slot_count = self.slot_count;
        let row = self.bunks.entry(bunk.to_string()).or_default();
        if row.len() < slot_count {
            row.resize(slot_count, None);
        }
        row
    }

    pub fn set_entry(&mut self, bunk: &str, slot: usize, entry: SlotEntry) -> Result<()> {
        self.check_slot(slot)?;
        self.ensure_bunk(bunk)[slot] = Some(entry);
        Ok(())
    }

    pub fn clear_entry(&mut self, bunk: &str, slot: usize) -> Option<SlotEntry> {
        self.bunks.get_mut(bunk)?.get_mut(slot)?.take()
    }

    /// Slots of the block covering `slot`: the root plus its trailing continuations.
    /// An empty or single-slot entry yields just `[slot]`.
    pub fn block_slots(&self, bunk: &str, slot: usize) -> Vec<usize> {
        let Some(entry) = self.entry(bunk, slot) else {
            return vec![slot];
        };

        let mut root = slot;
        let mut current = entry;
        while current.continuation && root > 0 {
            match self.entry(bunk, root - 1) {
                Some(prev) if prev.location == entry.location => {
                    root -= 1;
                    current = prev;
                }
                _ => break,
            }
        }

        let mut slots = vec![root];
        let mut next = root + 1;
        while let Some(follow) = self.entry(bunk, next) {
            if !follow.continuation || follow.location != entry.location {
                break;
            }
            slots.push(next);
            next += 1;
        }
        slots
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.slot_count {
            return Err(CascadeError::invalid(format!(
                "slot {} out of range (day has {} slots)",
                slot, self.slot_count
            )));
        }
        Ok(())
    }

    /// Validates a caller-supplied slot list and returns it sorted and deduplicated
    pub fn normalize_slots(&self, slots: &[usize]) -> Result<Vec<usize>> {
        if slots.is_empty() {
            return Err(CascadeError::invalid("slot list is empty"));
        }
        for &slot in slots {
            self.check_slot(slot)?;
        }
        let mut sorted: Vec<usize> = slots.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        Ok(sorted)
    }
}

fn default_capacity() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// A named field or room with a sharing capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl Location {
    /// Exclusive-use location
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: 1,
            available: true,
            activities: Vec::new(),
        }
    }

    pub fn shared(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            capacity,
            ..Self::new(name)
        }
    }

    pub fn with_activities<I, S>(mut self, activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activities = activities.into_iter().map(Into::into).collect();
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Activities this location can host; the location name if none are listed
    pub fn activity_labels(&self) -> Vec<&str> {
        if self.activities.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.activities.iter().map(String::as_str).collect()
        }
    }
}

/// Locations in configuration order, with lookup by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Location>", into = "Vec<Location>")]
pub struct LocationRegistry {
    locations: Vec<Location>,
    index: BTreeMap<String, usize>,
}

impl LocationRegistry {
    pub fn new(locations: Vec<Location>) -> Result<Self> {
        let mut registry = Self::default();
        for location in locations {
            registry.insert(location)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, location: Location) -> Result<()> {
        if location.capacity == 0 {
            return Err(CascadeError::invalid(format!(
                "location {} has capacity 0",
                location.name
            )));
        }
        if self.index.contains_key(&location.name) {
            return Err(CascadeError::invalid(format!(
                "location {} registered twice",
                location.name
            )));
        }
        self.index.insert(location.name.clone(), self.locations.len());
        self.locations.push(location);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.index.get(name).map(|&i| &self.locations[i])
    }

    /// Unknown locations are exclusive
    pub fn capacity(&self, name: &str) -> u32 {
        self.get(name).map(|l| l.capacity).unwrap_or(1)
    }

    /// Unknown locations are available
    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).map(|l| l.available).unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl TryFrom<Vec<Location>> for LocationRegistry {
    type Error = CascadeError;

    fn try_from(locations: Vec<Location>) -> Result<Self> {
        Self::new(locations)
    }
}

impl From<LocationRegistry> for Vec<Location> {
    fn from(registry: LocationRegistry) -> Self {
        registry.locations
    }
}

/// Division name -> bunks. Each bunk belongs to exactly one division.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DivisionMap {
    divisions: BTreeMap<String, BTreeSet<BunkId>>,
    #[serde(skip)]
    owner: BTreeMap<BunkId, String>,
}

impl DivisionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, D, B>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (D, B)>,
        D: Into<String>,
        B: Into<String>,
    {
        let mut map = Self::new();
        for (division, bunk) in pairs {
            map.add_bunk(division, bunk)?;
        }
        Ok(map)
    }

    pub fn add_bunk(&mut self, division: impl Into<String>, bunk: impl Into<String>) -> Result<()> {
        let division = division.into();
        let bunk = bunk.into();
        if let Some(existing) = self.owner.get(&bunk) {
            if *existing != division {
                return Err(CascadeError::invalid(format!(
                    "bunk {} is in both {} and {}",
                    bunk, existing, division
                )));
            }
            return Ok(());
        }
        self.owner.insert(bunk.clone(), division.clone());
        self.divisions.entry(division).or_default().insert(bunk);
        Ok(())
    }

    pub fn division_of(&self, bunk: &str) -> Option<&str> {
        self.owner.get(bunk).map(String::as_str)
    }

    pub fn bunks_in(&self, division: &str) -> Option<&BTreeSet<BunkId>> {
        self.divisions.get(division)
    }

    pub fn contains_bunk(&self, bunk: &str) -> bool {
        self.owner.contains_key(bunk)
    }

    pub fn division_names(&self) -> impl Iterator<Item = &String> {
        self.divisions.keys()
    }

    /// Every bunk in the given divisions; unknown division names contribute nothing
    pub fn editable_bunks<S: AsRef<str>>(&self, divisions: &[S]) -> BTreeSet<BunkId> {
        divisions
            .iter()
            .filter_map(|d| self.divisions.get(d.as_ref()))
            .flat_map(|bunks| bunks.iter().cloned())
            .collect()
    }
}

/// A request for some bunks to take a location for a set of slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub location: String,
    pub activity: String,
    pub slots: Vec<usize>,
    pub bunks: Vec<BunkId>,
}

impl Claim {
    pub fn new(
        location: impl Into<String>,
        activity: impl Into<String>,
        slots: Vec<usize>,
        bunks: Vec<BunkId>,
    ) -> Self {
        Self {
            location: location.into(),
            activity: activity.into(),
            slots,
            bunks,
        }
    }

    /// Claims the location for every bunk of a division
    pub fn for_division(
        divisions: &DivisionMap,
        division: &str,
        location: impl Into<String>,
        activity: impl Into<String>,
        slots: Vec<usize>,
    ) -> Result<Self> {
        let bunks = divisions
            .bunks_in(division)
            .ok_or_else(|| CascadeError::invalid(format!("unknown division {}", division)))?;
        Ok(Self::new(location, activity, slots, bunks.iter().cloned().collect()))
    }
}

/// An existing occupant standing in the way of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub bunk: BunkId,
    pub slot: usize,
    pub location: String,
    pub activity: String,
    pub pinned: bool,
    /// The caller may reassign this bunk without asking anyone
    pub owned_by_caller: bool,
}

/// A proposed move of one bunk (or one multi-slot block) to a new activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub bunk: BunkId,
    pub slots: Vec<usize>,
    pub from_location: String,
    pub from_activity: String,
    pub to_location: String,
    pub to_activity: String,
    pub owned_by_caller: bool,
    pub penalty: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Pinned,
    NoAlternative,
    IterationCap,
}

impl BlockReason {
    pub fn describe(&self) -> &'static str {
        match self {
            BlockReason::Pinned => "pinned",
            BlockReason::NoAlternative => "no alternative",
            BlockReason::IterationCap => "iteration cap reached",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedConflict {
    #[serde(flatten)]
    pub conflict: ConflictRecord,
    pub reason: BlockReason,
}

/// Result of one planning pass. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub plan: Vec<PlanEntry>,
    pub blocked: Vec<BlockedConflict>,
    /// Claim slots reserved outside the grid
    pub reserved_slots: Vec<usize>,
    pub iterations: usize,
    pub cap_reached: bool,
}

impl CascadeOutcome {
    /// Nothing blocked and nothing reserved; the plan fully resolves the claim
    pub fn is_clean(&self) -> bool {
        self.blocked.is_empty() && self.reserved_slots.is_empty()
    }

    /// Moves the caller can make on its own
    pub fn silent_reassignments(&self) -> impl Iterator<Item = &PlanEntry> {
        self.plan.iter().filter(|e| e.owned_by_caller)
    }

    /// Moves touching another scheduler's bunks
    pub fn approval_required(&self) -> impl Iterator<Item = &PlanEntry> {
        self.plan.iter().filter(|e| !e.owned_by_caller)
    }
}
