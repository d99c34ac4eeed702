use crowd_geom::Vec2;
use crowd_orca::{AgentDefaults, Simulator, SimulatorError};

fn defaults() -> AgentDefaults {
    AgentDefaults {
        neighbor_dist: 15.0,
        max_neighbors: 10,
        time_horizon: 10.0,
        time_horizon_obst: 10.0,
        radius: 2.0,
        max_speed: 2.0,
        velocity: Vec2::ZERO,
    }
}

#[test]
fn add_agent_requires_defaults() {
    let mut sim = Simulator::new();
    assert_eq!(
        sim.add_agent(Vec2::ZERO),
        Err(SimulatorError::MissingDefaults)
    );
    assert_eq!(sim.agent_count(), 0);

    sim.set_agent_defaults(defaults());
    assert_eq!(sim.add_agent(Vec2::ZERO), Ok(0));

    // clear() drops the template along with everything else.
    sim.clear();
    assert_eq!(
        sim.add_agent(Vec2::ZERO),
        Err(SimulatorError::MissingDefaults)
    );
    // An explicit parameter set bypasses the template.
    assert_eq!(sim.add_agent_with_params(Vec2::ZERO, defaults()), 0);
}

#[test]
fn agent_ids_are_stable_insertion_indices() {
    let mut sim = Simulator::new();
    sim.set_agent_defaults(defaults());
    for k in 0..8 {
        let id = sim.add_agent(Vec2::new(k as f64, -(k as f64))).unwrap();
        assert_eq!(id, k);
    }
    assert_eq!(sim.agent_count(), 8);
    for k in 0..8 {
        assert_eq!(sim.agent_position(k), Vec2::new(k as f64, -(k as f64)));
    }
}

#[test]
fn agent_parameters_round_trip_through_accessors() {
    let mut sim = Simulator::new();
    sim.set_agent_defaults(defaults());
    let a = sim.add_agent(Vec2::new(1.0, 2.0)).unwrap();

    assert_eq!(sim.agent_radius(a), 2.0);
    assert_eq!(sim.agent_max_speed(a), 2.0);
    assert_eq!(sim.agent_neighbor_dist(a), 15.0);
    assert_eq!(sim.agent_max_neighbors(a), 10);
    assert_eq!(sim.agent_time_horizon(a), 10.0);
    assert_eq!(sim.agent_time_horizon_obst(a), 10.0);
    assert_eq!(sim.agent_velocity(a), Vec2::ZERO);

    sim.set_agent_radius(a, 0.75);
    sim.set_agent_max_speed(a, 3.5);
    sim.set_agent_neighbor_dist(a, 8.0);
    sim.set_agent_max_neighbors(a, 4);
    sim.set_agent_time_horizon(a, 2.0);
    sim.set_agent_time_horizon_obst(a, 1.0);
    sim.set_agent_position(a, Vec2::new(-3.0, 4.0));
    sim.set_agent_velocity(a, Vec2::new(0.5, 0.0));
    sim.set_agent_pref_velocity(a, Vec2::new(1.0, 1.0));

    assert_eq!(sim.agent_radius(a), 0.75);
    assert_eq!(sim.agent_max_speed(a), 3.5);
    assert_eq!(sim.agent_neighbor_dist(a), 8.0);
    assert_eq!(sim.agent_max_neighbors(a), 4);
    assert_eq!(sim.agent_time_horizon(a), 2.0);
    assert_eq!(sim.agent_time_horizon_obst(a), 1.0);
    assert_eq!(sim.agent_position(a), Vec2::new(-3.0, 4.0));
    assert_eq!(sim.agent_velocity(a), Vec2::new(0.5, 0.0));
    assert_eq!(sim.agent_pref_velocity(a), Vec2::new(1.0, 1.0));
}

#[test]
fn obstacle_chains_form_cycles_with_contiguous_ids() {
    let mut sim = Simulator::new();
    let square = [
        Vec2::new(-1.0, -1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(1.0, -1.0),
    ];
    assert_eq!(sim.add_obstacle(&square), Ok(0));
    for i in 0..4 {
        assert_eq!(sim.next_vertex_no(i), (i + 1) % 4);
        assert_eq!(sim.prev_vertex_no(i), (i + 3) % 4);
        assert_eq!(sim.prev_vertex_no(sim.next_vertex_no(i)), i);
    }

    assert_eq!(
        sim.add_obstacle(&[Vec2::ZERO]),
        Err(SimulatorError::TooFewVertices)
    );
    assert_eq!(sim.obstacle_vertex_count(), 4);

    // A second polygon continues the id sequence.
    assert_eq!(
        sim.add_obstacle(&[Vec2::new(3.0, 0.0), Vec2::new(4.0, 0.0)]),
        Ok(4)
    );
    assert_eq!(sim.next_vertex_no(4), 5);
    assert_eq!(sim.next_vertex_no(5), 4);
    assert!(sim.obstacle_vertex(4).convex);
    assert!(sim.obstacle_vertex(5).convex);
}

#[test]
fn unobstructed_agent_tracks_preferred_velocity_exactly() {
    let mut sim = Simulator::new();
    sim.set_time_step(1.0);
    sim.set_agent_defaults(AgentDefaults {
        neighbor_dist: 15.0,
        max_neighbors: 10,
        time_horizon: 10.0,
        time_horizon_obst: 10.0,
        radius: 0.5,
        max_speed: 1.0,
        velocity: Vec2::ZERO,
    });
    let a = sim.add_agent(Vec2::ZERO).unwrap();

    for _ in 0..7 {
        sim.set_agent_pref_velocity(a, Vec2::new(1.0, 0.0));
        sim.do_step();
    }

    assert_eq!(sim.agent_position(a), Vec2::new(7.0, 0.0));
    assert_eq!(sim.agent_velocity(a), Vec2::new(1.0, 0.0));
    assert!((sim.global_time() - 7.0).abs() < 1e-12);
}

#[test]
fn zero_preferences_leave_the_world_at_rest() {
    let mut sim = Simulator::new();
    sim.set_time_step(0.25);
    sim.set_agent_defaults(defaults());
    let a = sim.add_agent(Vec2::new(-5.0, 0.0)).unwrap();
    let b = sim.add_agent(Vec2::new(5.0, 0.0)).unwrap();

    for _ in 0..2 {
        sim.do_step();
    }

    assert_eq!(sim.agent_position(a), Vec2::new(-5.0, 0.0));
    assert_eq!(sim.agent_position(b), Vec2::new(5.0, 0.0));
    assert_eq!(sim.agent_velocity(a), Vec2::ZERO);
    assert_eq!(sim.agent_velocity(b), Vec2::ZERO);
}

fn run_reference_scenario() -> Vec<(Vec2, Vec2)> {
    let mut sim = Simulator::new();
    sim.set_time_step(0.2);
    sim.set_agent_defaults(defaults());

    sim.add_obstacle(&[
        Vec2::new(3.0, -4.0),
        Vec2::new(3.0, 4.0),
        Vec2::new(5.0, 4.0),
        Vec2::new(5.0, -4.0),
    ])
    .unwrap();
    sim.process_obstacles();

    for k in 0..12 {
        let angle = k as f64 * 0.5235987755982988;
        let a = sim
            .add_agent(Vec2::new(10.0 * angle.cos(), 10.0 * angle.sin()))
            .unwrap();
        sim.set_agent_pref_velocity(a, Vec2::new(-angle.cos(), -angle.sin()));
    }

    for _ in 0..50 {
        sim.do_step();
    }

    (0..sim.agent_count())
        .map(|i| (sim.agent_position(i), sim.agent_velocity(i)))
        .collect()
}

#[test]
fn identical_call_sequences_are_bit_identical() {
    let first = run_reference_scenario();
    let second = run_reference_scenario();
    // No randomness anywhere: byte-for-byte equality, not approximate.
    assert_eq!(first, second);
}

#[test]
fn agents_within_reflects_committed_positions() {
    let mut sim = Simulator::new();
    sim.set_agent_defaults(defaults());
    let a = sim.add_agent(Vec2::new(0.0, 0.0)).unwrap();
    let b = sim.add_agent(Vec2::new(6.0, 0.0)).unwrap();
    let c = sim.add_agent(Vec2::new(40.0, 0.0)).unwrap();

    assert_eq!(sim.agents_within(Vec2::ZERO, 10.0), vec![a, b]);
    assert_eq!(sim.agents_within(Vec2::new(40.0, 0.0), 1.0), vec![c]);

    // Move an agent and query again; the index must follow.
    sim.set_agent_position(b, Vec2::new(100.0, 0.0));
    assert_eq!(sim.agents_within(Vec2::ZERO, 10.0), vec![a]);
}

#[test]
fn global_time_advances_by_the_tick_length() {
    let mut sim = Simulator::new();
    assert_eq!(sim.time_step(), 0.1);
    sim.set_time_step(0.5);
    assert_eq!(sim.global_time(), 0.0);
    assert_eq!(sim.do_step(), 0.5);
    assert_eq!(sim.do_step(), 1.0);
    sim.clear();
    assert_eq!(sim.global_time(), 0.0);
    assert_eq!(sim.time_step(), 0.5);
}
