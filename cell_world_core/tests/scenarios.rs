use cell_world_core::{
    Position,
    battery::Battery,
    config::{CleaningConfig, SimConfig, Variant},
    environment::{Environment, TurnStatus, behavior_for, load_environment_from_string},
    map::Topology,
};

fn single_station(seed: u64) -> CleaningConfig {
    CleaningConfig {
        seed: Some(seed),
        ..CleaningConfig::for_variant(Variant::SingleStation)
    }
}

#[test]
fn nearby_dirt_is_cleaned_within_four_ticks() {
    let mut environment =
        load_environment_from_string("CR FL FL DT", &single_station(1)).expect("valid map");
    assert_eq!(environment.remaining_dirty(), 1);

    for _ in 0..4 {
        environment.process_turn();
    }

    assert_eq!(environment.status(), TurnStatus::AllClean);
    assert_eq!(environment.remaining_dirty(), 0);
    assert_eq!(environment.time_to_clean(), Some(4));
    let snapshot = environment.snapshot();
    assert_eq!(snapshot.clean_percent, 100.0);
    assert_eq!(snapshot.move_count, 3);
    assert_eq!(snapshot.cleaners[0].cleaned_count, 1);
    assert_eq!(snapshot.cleaners[0].battery, 96);
}

#[test]
fn flat_battery_off_charger_stalls_the_run() {
    let config = single_station(2);
    let mut environment =
        load_environment_from_string("CH FL FL DT", &config).expect("valid map");
    environment
        .add_cleaner(
            Position::new(1, 0),
            behavior_for(config.variant),
            Battery::new(0),
            Position::new(0, 0),
        )
        .expect("free floor");

    assert_eq!(environment.process_turn(), TurnStatus::Stalled);
    assert_eq!(environment.step(), 1);

    // Stalled runs stay stopped.
    assert_eq!(environment.process_turn(), TurnStatus::Stalled);
    assert_eq!(environment.run_to_completion(), TurnStatus::Stalled);
    assert_eq!(environment.step(), 1);

    let cleaner = environment.get_cleaner_state(0).expect("cleaner 0");
    assert_eq!(cleaner.position, Position::new(1, 0));
    assert!(cleaner.battery.is_empty());
    assert_eq!(environment.remaining_dirty(), 1);
}

#[test]
fn low_battery_returns_home_and_recharges() {
    let config = single_station(3);
    let mut environment =
        load_environment_from_string("CH FL FL FL FL DT", &config).expect("valid map");
    let id = environment
        .add_cleaner(
            Position::new(3, 0),
            behavior_for(config.variant),
            Battery::new(8),
            Position::new(0, 0),
        )
        .expect("free floor");

    for _ in 0..3 {
        environment.process_turn();
    }
    let cleaner = environment.get_cleaner_state(id).expect("cleaner");
    assert_eq!(cleaner.position, Position::new(0, 0));
    assert_eq!(cleaner.battery.level(), 5);

    environment.process_turn();
    let cleaner = environment.get_cleaner_state(id).expect("cleaner");
    assert_eq!(cleaner.position, Position::new(0, 0));
    assert_eq!(cleaner.battery.level(), 10);
}

#[test]
fn step_budget_ends_the_run() {
    let config = CleaningConfig {
        max_steps: 3,
        ..single_station(4)
    };
    let mut environment =
        load_environment_from_string("CR FL FL FL FL FL FL DT", &config).expect("valid map");
    assert_eq!(environment.run_to_completion(), TurnStatus::OutOfSteps);
    assert_eq!(environment.step(), 3);
    assert_eq!(environment.time_to_clean(), None);
}

#[test]
fn same_seed_same_run() {
    for variant in [Variant::SingleStation, Variant::MultiStation, Variant::Baseline] {
        let config = CleaningConfig {
            seed: Some(42),
            max_steps: 200,
            ..CleaningConfig::for_variant(variant)
        };
        let mut first = Environment::generate(&config);
        let mut second = Environment::generate(&config);
        assert_eq!(first.terrain(), second.terrain());

        let status = first.run_to_completion();
        assert_eq!(second.run_to_completion(), status);
        assert_eq!(first.snapshot(), second.snapshot(), "{:?}", variant);
        assert_eq!(first.terrain(), second.terrain());
    }
}

#[test]
fn config_file_drives_generation() {
    let config = SimConfig::from_toml_str(
        r#"
        [cleaning]
        variant = "multi_station"
        width = 6
        height = 4
        num_agents = 2
        dirty_percent = 0.5
        obstacle_percent = 0.0
        seed = 11

        [cleaning.policy]
        low_threshold = 15
        tie_break = "random"
        "#,
    )
    .expect("valid config");

    let environment = Environment::generate(&config.cleaning);
    assert_eq!(environment.terrain().width(), 6);
    assert_eq!(environment.terrain().height(), 4);
    assert_eq!(environment.cleaners().count(), 2);
    assert_eq!(environment.initial_dirty(), 12);
    assert_eq!(environment.seed(), 11);
    assert_eq!(environment.policy().low_threshold, 15);
    assert!(environment.policy().avoid_cleaners);
}

#[test]
fn first_cleaner_in_id_order_claims_the_clean() {
    let config = CleaningConfig {
        shuffle_order: false,
        ..single_station(5)
    };
    let mut environment =
        load_environment_from_string("CR DT CR", &config).expect("valid map");

    // Both cleaners head for the only dirty cell.
    assert_eq!(environment.process_turn(), TurnStatus::Running);
    for cleaner in environment.cleaners() {
        assert_eq!(cleaner.position, Position::new(1, 0));
    }

    assert_eq!(environment.process_turn(), TurnStatus::AllClean);
    let snapshot = environment.snapshot();
    assert_eq!(snapshot.cleaners[0].cleaned_count, 1);
    assert_eq!(snapshot.cleaners[1].cleaned_count, 0);
    assert_eq!(environment.time_to_clean(), Some(2));
}

#[test]
fn torus_cleaner_reaches_dirt_across_the_edge() {
    let config = CleaningConfig {
        topology: Topology::Torus,
        ..single_station(6)
    };
    let mut environment =
        load_environment_from_string("CR FL FL DT", &config).expect("valid map");

    environment.process_turn();
    let cleaner = environment.get_cleaner_state(0).expect("cleaner 0");
    assert_eq!(cleaner.position, Position::new(3, 0));

    assert_eq!(environment.process_turn(), TurnStatus::AllClean);
    assert_eq!(environment.time_to_clean(), Some(2));
    assert_eq!(environment.move_count(), 1);
}
