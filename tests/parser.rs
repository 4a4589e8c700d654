use std::fs;
use std::path::Path;

use camp_cascade::error::CascadeError;
use camp_cascade::export::write_plan_csv;
use camp_cascade::parser::{load_assignments, load_divisions, load_locations, load_reservations};
use camp_cascade::schedule::{build_plan, Claim, LockOracle, PlannerOptions, ScheduleContext};

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn loads_a_camp_from_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let locations = write(
        dir.path(),
        "locations.csv",
        "name,capacity,available,activities\n\
         Field A,1,yes,Soccer;Kickball\n\
         Field B,1,yes,\n\
         Pavilion,2,yes,Arts\n\
         Lake,1,no,Canoe\n",
    );
    let bunks = write(dir.path(), "bunks.csv", "division,bunk\nJuniors,B1\nJuniors,B2\nSeniors,B3\n");
    let assignments = write(
        dir.path(),
        "assignments.csv",
        "bunk,slot,location,activity,pinned,continuation,source\n\
         B1,3,Field A,Soccer,,,\n\
         B2,3,Field B,,yes,,\n\
         B3,0,Pavilion,Arts,,,\n",
    );
    let reservations = write(dir.path(), "reservations.csv", "location,slot,division\nPavilion,3,Seniors\n");

    let registry = load_locations(&locations).unwrap();
    let divisions = load_divisions(&bunks).unwrap();
    let grid = load_assignments(&assignments, 6).unwrap();
    let locks = load_reservations(&reservations).unwrap();

    assert_eq!(registry.len(), 4);
    assert!(!registry.is_available("Lake"));
    assert_eq!(divisions.division_of("B2"), Some("Juniors"));
    assert!(grid.entry("B2", 3).unwrap().pinned);
    assert!(locks.is_reserved("Pavilion", 3, Some("Juniors")));
    assert!(!locks.is_reserved("Pavilion", 3, Some("Seniors")));

    // B3 claims Field A; the pavilion is held for Seniors only, so B1 can't go there.
    let editable = divisions.editable_bunks(&["Seniors"]);
    let ctx = ScheduleContext::new(&grid, &registry)
        .with_divisions(&divisions)
        .with_editable(&editable)
        .with_locks(&locks);
    let claim = Claim::new("Field A", "Soccer", vec![3], vec!["B3".to_string()]);
    let outcome = build_plan(&ctx, &claim, &PlannerOptions::default()).unwrap();
    assert!(outcome.plan.is_empty());
    assert_eq!(outcome.blocked.len(), 1);
    assert_eq!(outcome.blocked[0].conflict.bunk, "B1");
    assert!(!outcome.blocked[0].conflict.owned_by_caller);

    let out = dir.path().join("plan.csv");
    write_plan_csv(&outcome, &out).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("kind,bunk,slots,from,to,owned_by_caller,reason\n"));
    assert!(text.contains("blocked,B1,3,Field A,,false,no alternative"));
}

#[test]
fn rejects_out_of_range_slots_and_bad_registries() {
    let dir = tempfile::tempdir().unwrap();
    let assignments = write(dir.path(), "a.csv", "bunk,slot,location\nB1,1,Gym\nB1,12,Gym\n");
    let err = load_assignments(&assignments, 10).unwrap_err();
    assert!(matches!(err, CascadeError::InvalidArgument(ref msg) if msg.contains("line 3")));

    let dupes = write(dir.path(), "l.csv", "name,capacity\nGym,1\nGym,2\n");
    assert!(load_locations(&dupes).is_err());

    let zero = write(dir.path(), "z.csv", "name,capacity\nGym,0\n");
    assert!(load_locations(&zero).is_err());

    let headless = write(dir.path(), "h.csv", "where,when\nGym,1\n");
    assert!(load_reservations(&headless).is_err());
}

#[test]
fn missing_files_are_store_errors() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_locations(dir.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, CascadeError::Store(_)));
}
