use csv::{Reader, StringRecord};
use std::io::Read;
use std::path::Path;

use crate::error::{CascadeError, Result, StoreError};
use crate::schedule::{AssignmentGrid, DivisionMap, Location, LocationRegistry, ReservationTable, SlotEntry};

/// Parses a boolean value from various string representations
fn parse_bool(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower == "yes" || lower == "true" || lower == "1"
}

fn open<P: AsRef<Path>>(path: P) -> Result<Reader<std::fs::File>> {
    Reader::from_path(path).map_err(|e| StoreError::from(e).into())
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn required_column(headers: &StringRecord, name: &str) -> Result<usize> {
    column(headers, name).ok_or_else(|| CascadeError::invalid(format!("missing column {:?}", name)))
}

fn field<'r>(record: &'r StringRecord, col: Option<usize>) -> &'r str {
    col.and_then(|c| record.get(c)).unwrap_or("").trim()
}

/// Reads `name,capacity,available,activities` rows. `activities` is `;`-separated.
pub fn read_locations<R: Read>(reader: R) -> Result<LocationRegistry> {
    let mut reader = Reader::from_reader(reader);
    let headers = reader.headers().map_err(StoreError::from)?.clone();
    let name_col = required_column(&headers, "name")?;
    let capacity_col = column(&headers, "capacity");
    let available_col = column(&headers, "available");
    let activities_col = column(&headers, "activities");

    let mut registry = LocationRegistry::default();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(StoreError::from)?;
        let name = field(&record, Some(name_col));
        if name.is_empty() {
            continue;
        }

        let capacity = match field(&record, capacity_col) {
            "" => 1,
            raw => raw.parse().map_err(|_| {
                CascadeError::invalid(format!("line {}: bad capacity {:?}", line + 2, raw))
            })?,
        };
        let available = match field(&record, available_col) {
            "" => true,
            raw => parse_bool(raw),
        };
        let activities: Vec<String> = field(&record, activities_col)
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        registry.insert(Location {
            name: name.to_string(),
            capacity,
            available,
            activities,
        })?;
    }
    Ok(registry)
}

pub fn load_locations<P: AsRef<Path>>(path: P) -> Result<LocationRegistry> {
    let file = std::fs::File::open(path).map_err(StoreError::from)?;
    read_locations(file)
}

/// Reads `division,bunk` rows
pub fn read_divisions<R: Read>(reader: R) -> Result<DivisionMap> {
    let mut reader = Reader::from_reader(reader);
    let headers = reader.headers().map_err(StoreError::from)?.clone();
    let division_col = required_column(&headers, "division")?;
    let bunk_col = required_column(&headers, "bunk")?;

    let mut divisions = DivisionMap::new();
    for result in reader.records() {
        let record = result.map_err(StoreError::from)?;
        let division = field(&record, Some(division_col));
        let bunk = field(&record, Some(bunk_col));
        if division.is_empty() || bunk.is_empty() {
            continue;
        }
        divisions.add_bunk(division, bunk)?;
    }
    Ok(divisions)
}

pub fn load_divisions<P: AsRef<Path>>(path: P) -> Result<DivisionMap> {
    let file = std::fs::File::open(path).map_err(StoreError::from)?;
    read_divisions(file)
}

/// Reads `bunk,slot,location,activity,pinned,continuation,source` rows into a grid
pub fn read_assignments<R: Read>(reader: R, slot_count: usize) -> Result<AssignmentGrid> {
    let mut reader = Reader::from_reader(reader);
    let headers = reader.headers().map_err(StoreError::from)?.clone();
    let bunk_col = required_column(&headers, "bunk")?;
    let slot_col = required_column(&headers, "slot")?;
    let location_col = required_column(&headers, "location")?;
    let activity_col = column(&headers, "activity");
    let pinned_col = column(&headers, "pinned");
    let continuation_col = column(&headers, "continuation");
    let source_col = column(&headers, "source");

    let mut grid = AssignmentGrid::new(slot_count);
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(StoreError::from)?;
        let bunk = field(&record, Some(bunk_col));
        let location = field(&record, Some(location_col));

        // Skip if essential fields are missing
        if bunk.is_empty() || location.is_empty() {
            continue;
        }

        let raw_slot = field(&record, Some(slot_col));
        let slot: usize = raw_slot.parse().map_err(|_| {
            CascadeError::invalid(format!("line {}: bad slot {:?}", line + 2, raw_slot))
        })?;

        let activity = match field(&record, activity_col) {
            "" => location,
            a => a,
        };
        let mut entry = SlotEntry::new(location, activity);
        entry.pinned = parse_bool(field(&record, pinned_col));
        entry.continuation = parse_bool(field(&record, continuation_col));
        let source = field(&record, source_col);
        if !source.is_empty() {
            entry.source = Some(source.to_string());
        }

        grid.set_entry(bunk, slot, entry)
            .map_err(|e| CascadeError::invalid(format!("line {}: {}", line + 2, e)))?;
    }
    Ok(grid)
}

pub fn load_assignments<P: AsRef<Path>>(path: P, slot_count: usize) -> Result<AssignmentGrid> {
    let file = std::fs::File::open(path).map_err(StoreError::from)?;
    read_assignments(file, slot_count)
}

/// Reads `location,slot,division` rows; division may be blank
pub fn load_reservations<P: AsRef<Path>>(path: P) -> Result<ReservationTable> {
    let mut reader = open(path)?;
    let headers = reader.headers().map_err(StoreError::from)?.clone();
    let location_col = required_column(&headers, "location")?;
    let slot_col = required_column(&headers, "slot")?;
    let division_col = column(&headers, "division");

    let mut table = ReservationTable::new();
    for result in reader.records() {
        let record = result.map_err(StoreError::from)?;
        let location = field(&record, Some(location_col));
        if location.is_empty() {
            continue;
        }
        let raw_slot = field(&record, Some(slot_col));
        let slot = raw_slot
            .parse()
            .map_err(|_| CascadeError::invalid(format!("bad reservation slot {:?}", raw_slot)))?;
        let division = match field(&record, division_col) {
            "" => None,
            d => Some(d.to_string()),
        };
        table.reserve(location, slot, division);
    }
    Ok(table)
}
