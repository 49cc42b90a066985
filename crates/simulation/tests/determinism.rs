//! Same seed, same run.

use meshsim_candidates::{
    EngineConfig, MeshPerformance, PerformanceConfig, PolicyEngine, RateScenario, ScenarioConfig,
};
use meshsim_core::Measurements;
use meshsim_simulation::{SimConfig, SimulationStats, Simulator};
use meshsim_types::NeighborBounds;
use tracing_test::traced_test;

fn run(seed: u64) -> (SimulationStats, Measurements, usize) {
    let config = SimConfig::new(NeighborBounds::new(3, 6).unwrap())
        .with_batch_period(5)
        .with_horizon(60)
        .with_seed(seed);
    let mut sim = Simulator::new(
        config,
        RateScenario::new(ScenarioConfig::default()),
        PolicyEngine::new(EngineConfig::default()),
        MeshPerformance::new(PerformanceConfig::default()),
    )
    .unwrap();
    let measurements = sim.run().unwrap();
    (sim.stats().clone(), measurements, sim.network().len())
}

#[traced_test]
#[test]
fn test_same_seed_same_outcome() {
    let (stats_a, measurements_a, peers_a) = run(42);
    let (stats_b, measurements_b, peers_b) = run(42);

    assert_eq!(stats_a, stats_b);
    assert_eq!(measurements_a, measurements_b);
    assert_eq!(peers_a, peers_b);
    assert_eq!(stats_a.rounds, 60);
    assert_eq!(stats_a.batches, 12);
}

#[traced_test]
#[test]
fn test_step_matches_run() {
    let config = SimConfig::default().with_horizon(20).with_seed(9);
    let build = || {
        Simulator::new(
            config.clone(),
            RateScenario::new(ScenarioConfig::default()),
            PolicyEngine::new(EngineConfig::default()),
            MeshPerformance::default(),
        )
        .unwrap()
    };

    let mut stepped = build();
    while !stepped.is_finished() {
        stepped.step().unwrap();
    }
    let mut ran = build();
    let measurements = ran.run().unwrap();

    assert_eq!(stepped.stats(), ran.stats());
    assert_eq!(stepped.measure(), measurements);
    assert!(stepped.step().is_err());
}
