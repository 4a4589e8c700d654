//! Assignment stores: where day grids live between planning passes.
//!
//! Saves are optimistic. A writer passes the version it snapshotted and the
//! save is refused with [`StoreError::StaleSnapshot`] if anyone wrote since;
//! the caller then re-loads and re-plans.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::schedule::{AssignmentGrid, RotationHistory};

/// A day's grid plus the version it was read at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub grid: AssignmentGrid,
}

pub trait AssignmentStore: Send + Sync {
    /// A day that was never saved loads as version 0 with an empty grid
    fn load(&self, date: NaiveDate) -> Result<Snapshot, StoreError>;

    /// Writes `grid` if the stored version is still `expected_version`; returns the new version
    fn save(&self, date: NaiveDate, grid: &AssignmentGrid, expected_version: u64) -> Result<u64, StoreError>;

    /// Rotation history from the `lookback_days` days before `today`
    fn history(&self, today: NaiveDate, lookback_days: u32) -> Result<RotationHistory, StoreError> {
        let mut days = Vec::new();
        for back in 1..=lookback_days {
            let date = today - Duration::days(back as i64);
            let snapshot = self.load(date)?;
            if snapshot.version > 0 {
                days.push((date, snapshot.grid));
            }
        }
        Ok(RotationHistory::from_grids(today, &days))
    }
}

fn stale(date: NaiveDate, expected: u64, actual: u64) -> StoreError {
    StoreError::StaleSnapshot {
        date: date.to_string(),
        expected,
        actual,
    }
}

/// In-process store
pub struct MemoryStore {
    slot_count: usize,
    days: Mutex<BTreeMap<NaiveDate, Snapshot>>,
}

impl MemoryStore {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count,
            days: Mutex::new(BTreeMap::new()),
        }
    }
}

impl AssignmentStore for MemoryStore {
    fn load(&self, date: NaiveDate) -> Result<Snapshot, StoreError> {
        let days = self.days.lock().unwrap_or_else(|e| e.into_inner());
        Ok(days.get(&date).cloned().unwrap_or_else(|| Snapshot {
            version: 0,
            grid: AssignmentGrid::new(self.slot_count),
        }))
    }

    fn save(&self, date: NaiveDate, grid: &AssignmentGrid, expected_version: u64) -> Result<u64, StoreError> {
        let mut days = self.days.lock().unwrap_or_else(|e| e.into_inner());
        let current = days.get(&date).map(|s| s.version).unwrap_or(0);
        if current != expected_version {
            return Err(stale(date, expected_version, current));
        }
        let version = current + 1;
        days.insert(
            date,
            Snapshot {
                version,
                grid: grid.clone(),
            },
        );
        debug!(%date, version, "saved grid in memory");
        Ok(version)
    }
}

/// One `<dir>/<YYYY-MM-DD>.json` file per day
pub struct JsonFileStore {
    dir: PathBuf,
    slot_count: usize,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(dir: &Path, slot_count: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        info!(dir = %dir.display(), "opened assignment store");
        Ok(Self {
            dir: dir.to_path_buf(),
            slot_count,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }
}

impl AssignmentStore for JsonFileStore {
    fn load(&self, date: NaiveDate) -> Result<Snapshot, StoreError> {
        let path = self.path_for(date);
        if !path.exists() {
            return Ok(Snapshot {
                version: 0,
                grid: AssignmentGrid::new(self.slot_count),
            });
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, date: NaiveDate, grid: &AssignmentGrid, expected_version: u64) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.load(date)?.version;
        if current != expected_version {
            return Err(stale(date, expected_version, current));
        }

        let snapshot = Snapshot {
            version: current + 1,
            grid: grid.clone(),
        };
        let path = self.path_for(date);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?)?;
        fs::rename(&tmp, &path)?;
        info!(%date, version = snapshot.version, path = %path.display(), "saved grid");
        Ok(snapshot.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::SlotEntry;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn memory_store_rejects_stale_writes() {
        let store = MemoryStore::new(4);
        let first = store.load(day(1)).unwrap();
        assert_eq!(first.version, 0);
        assert_eq!(first.grid.slot_count, 4);

        let v1 = store.save(day(1), &first.grid, first.version).unwrap();
        assert_eq!(v1, 1);
        let err = store.save(day(1), &first.grid, first.version).unwrap_err();
        assert!(matches!(err, StoreError::StaleSnapshot { expected: 0, actual: 1, .. }));
    }

    #[test]
    fn history_reads_previous_days() {
        let store = MemoryStore::new(2);
        let mut grid = AssignmentGrid::new(2);
        grid.set_entry("B1", 0, SlotEntry::new("Lake", "Canoe")).unwrap();
        store.save(day(9), &grid, 0).unwrap();
        store.save(day(10), &grid, 0).unwrap();

        let history = store.history(day(10), 7).unwrap();
        assert_eq!(history.activities("B1").len(), 1);
        assert_eq!(history.activities("B1")[0].days_ago, 1);
    }
}
