use camp_cascade::error::StoreError;
use camp_cascade::schedule::{
    apply_plan, build_plan, AssignmentGrid, Claim, Location, LocationRegistry, PlannerOptions,
    RotationWeights, ScheduleContext, SlotEntry,
};
use camp_cascade::store::{AssignmentStore, JsonFileStore, MemoryStore};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
}

fn sample_grid() -> AssignmentGrid {
    let mut grid = AssignmentGrid::new(4);
    grid.set_entry("B1", 0, SlotEntry::new("Lake", "Canoe").with_pinned()).unwrap();
    grid.set_entry("B1", 1, SlotEntry::new("Lake", "Canoe").as_continuation()).unwrap();
    grid.set_entry("B2", 2, SlotEntry::new("Gym", "Hoops").with_source("office")).unwrap();
    grid
}

#[test]
fn json_store_round_trips_a_day() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path(), 4).unwrap();

    let empty = store.load(day(1)).unwrap();
    assert_eq!(empty.version, 0);
    assert!(empty.grid.bunks.is_empty());

    let grid = sample_grid();
    let version = store.save(day(1), &grid, 0).unwrap();
    assert_eq!(version, 1);
    assert!(dir.path().join("2024-07-01.json").exists());

    let reopened = JsonFileStore::open(dir.path(), 4).unwrap();
    let snapshot = reopened.load(day(1)).unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.grid, grid);
}

#[test]
fn json_store_refuses_stale_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path(), 4).unwrap();
    let grid = sample_grid();

    store.save(day(2), &grid, 0).unwrap();
    let err = store.save(day(2), &grid, 0).unwrap_err();
    match err {
        StoreError::StaleSnapshot { date, expected, actual } => {
            assert_eq!(date, "2024-07-02");
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected stale snapshot, got {other:?}"),
    }
    assert_eq!(store.save(day(2), &grid, 1).unwrap(), 2);
}

#[test]
fn json_store_reports_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("2024-07-03.json"), "not json").unwrap();
    let store = JsonFileStore::open(dir.path(), 4).unwrap();
    assert!(matches!(store.load(day(3)), Err(StoreError::Json(_))));
}

#[test]
fn history_feeds_rotation_penalties() {
    let store = MemoryStore::new(4);
    let mut yesterday = AssignmentGrid::new(4);
    yesterday.set_entry("B1", 0, SlotEntry::new("Gym", "Hoops")).unwrap();
    store.save(day(9), &yesterday, 0).unwrap();

    let mut today = AssignmentGrid::new(4);
    today.set_entry("B1", 2, SlotEntry::new("Field", "Soccer")).unwrap();
    today.ensure_bunk("B2");
    let registry = LocationRegistry::new(vec![
        Location::new("Field"),
        Location::new("Gym").with_activities(["Hoops"]),
        Location::new("Lake").with_activities(["Canoe"]),
    ])
    .unwrap();

    let history = store.history(day(10), 7).unwrap();
    let weights = RotationWeights::default();
    let ctx = ScheduleContext::new(&today, &registry)
        .with_history(&history)
        .with_weights(&weights);
    let claim = Claim::new("Field", "Soccer", vec![2], vec!["B2".to_string()]);

    let outcome = build_plan(&ctx, &claim, &PlannerOptions::default()).unwrap();
    // Hoops was yesterday, so the lake wins even though the gym comes first.
    assert_eq!(outcome.plan.len(), 1);
    assert_eq!(outcome.plan[0].to_location, "Lake");
    assert_eq!(outcome.plan[0].penalty, 0);
}

#[test]
fn snapshot_plan_apply_save_cycle() {
    let store = MemoryStore::new(4);
    let mut grid = AssignmentGrid::new(4);
    grid.set_entry("B1", 1, SlotEntry::new("Field", "Soccer")).unwrap();
    grid.ensure_bunk("B2");
    store.save(day(5), &grid, 0).unwrap();
    let registry = LocationRegistry::new(vec![Location::new("Field"), Location::new("Gym")]).unwrap();

    let mut snapshot = store.load(day(5)).unwrap();
    let claim = Claim::new("Field", "Soccer", vec![1], vec!["B2".to_string()]);
    let outcome = {
        let ctx = ScheduleContext::new(&snapshot.grid, &registry);
        build_plan(&ctx, &claim, &PlannerOptions::default()).unwrap()
    };

    // Someone else writes between snapshot and save.
    let other = store.load(day(5)).unwrap();
    store.save(day(5), &other.grid, other.version).unwrap();

    apply_plan(&mut snapshot.grid, &claim, &outcome).unwrap();
    let err = store.save(day(5), &snapshot.grid, snapshot.version).unwrap_err();
    assert!(matches!(err, StoreError::StaleSnapshot { .. }));

    // Re-snapshot, re-plan, and the save goes through.
    let mut fresh = store.load(day(5)).unwrap();
    let outcome = {
        let ctx = ScheduleContext::new(&fresh.grid, &registry);
        build_plan(&ctx, &claim, &PlannerOptions::default()).unwrap()
    };
    apply_plan(&mut fresh.grid, &claim, &outcome).unwrap();
    assert_eq!(store.save(day(5), &fresh.grid, fresh.version).unwrap(), 3);

    let saved = store.load(day(5)).unwrap().grid;
    assert_eq!(saved.entry("B2", 1).unwrap().source.as_deref(), Some("claim"));
    assert_eq!(saved.entry("B1", 1).unwrap().location, "Gym");
    assert_eq!(saved.entry("B1", 1).unwrap().source.as_deref(), Some("cascade"));
}
