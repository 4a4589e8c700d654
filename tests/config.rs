use camp_cascade::config::{Config, ConfigOverrides};

#[test]
fn partial_toml_keeps_defaults_for_the_rest() {
    let config = Config::from_toml(
        r#"
[planner]
iteration_cap = 12

[rotation]
yesterday = 900

[day]
slot_count = 14
"#,
    )
    .unwrap();

    assert_eq!(config.planner.iteration_cap, 12);
    assert!(config.planner.allow_cascade);
    assert_eq!(config.rotation.yesterday, 900);
    assert_eq!(config.rotation.same_day, 10_000);
    assert_eq!(config.day.slot_count, 14);
    assert_eq!(config.day.start_time, "09:00");
    assert_eq!(config.storage.data_dir, "data/grids");
    assert_eq!(config.server.port, 8080);
}

#[test]
fn zero_slots_is_rejected() {
    assert!(Config::from_toml("[day]\nslot_count = 0\n").is_err());
    assert!(Config::from_toml("[planner]\niteration_cap = \"many\"\n").is_err());
}

#[test]
fn template_round_trips_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("camp-cascade.toml");
    Config::write_template(&path).unwrap();

    let loaded = Config::load(Some(path.as_path())).unwrap();
    let defaults = Config::default();
    assert_eq!(loaded.planner, defaults.planner);
    assert_eq!(loaded.rotation, defaults.rotation);
    assert_eq!(loaded.day.minutes_per_slot, defaults.day.minutes_per_slot);
    assert_eq!(loaded.storage.reservations, None);
    assert_eq!(loaded.server.host, defaults.server.host);
}

#[test]
fn missing_file_means_defaults_and_overrides_win() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config.planner.iteration_cap, 50);

    config.apply_overrides(ConfigOverrides {
        data_dir: Some("/tmp/grids".to_string()),
        iteration_cap: Some(5),
        port: None,
    });
    assert_eq!(config.storage.data_dir, "/tmp/grids");
    assert_eq!(config.planner.iteration_cap, 5);
    assert_eq!(config.server.port, 8080);
}
