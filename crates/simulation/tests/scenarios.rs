//! End-to-end runs over scripted and rate-driven scenarios.

use meshsim_candidates::{
    EngineConfig, MeshPerformance, PolicyEngine, RateScenario, RepairTrigger, ScenarioConfig,
    ScriptedScenario,
};
use meshsim_core::{ExternalOrder, Network, NewOrder, PeerSpec, RoundEvents};
use meshsim_simulation::{SimConfig, SimError, Simulator};
use meshsim_types::{NeighborBounds, OrderId, PeerId, PeerKind, PruneConfig, Round};
use tracing_test::traced_test;

type ScriptedSim = Simulator<ScriptedScenario, PolicyEngine, MeshPerformance>;

fn seeded_peer(orders: usize) -> PeerSpec {
    PeerSpec::new(PeerKind::Normal).with_orders(vec![NewOrder { expiration: 1_000 }; orders])
}

fn scripted(config: SimConfig, scenario: ScriptedScenario, engine: EngineConfig) -> ScriptedSim {
    Simulator::new(
        config,
        scenario,
        PolicyEngine::new(engine),
        MeshPerformance::default(),
    )
    .unwrap()
}

fn step_to(sim: &mut ScriptedSim, round: u64) {
    while sim.now().0 < round {
        sim.step().unwrap();
    }
}

/// A peer short of `max` neighbors has no non-full peer left to link to.
///
/// The non-full peers are then pairwise linked, so there are at most `max` of
/// them.
fn assert_repaired_to_max(network: &Network, max: usize) {
    let full = |id: PeerId| network.peer(id).unwrap().neighbor_count() == max;
    let mut short = 0;
    for peer in network.peers() {
        assert!(peer.neighbor_count() <= max);
        if peer.neighbor_count() < max {
            short += 1;
            assert!(network
                .ids()
                .into_iter()
                .filter(|id| *id != peer.id() && !peer.is_neighbor(*id))
                .all(full));
        }
    }
    assert!(short <= max, "{short} peers short of {max} neighbors");
}

#[traced_test]
#[test]
fn test_flooding_reaches_complete_graph_in_two_batches() {
    let mut initial = vec![seeded_peer(1)];
    initial.extend(std::iter::repeat(PeerSpec::new(PeerKind::Normal)).take(9));
    let config = SimConfig::new(NeighborBounds::new(9, 9).unwrap())
        .with_batch_period(2)
        .with_horizon(10);
    let mut sim = scripted(config, ScriptedScenario::new(initial), EngineConfig::flooding());

    // Genesis repair links everyone to everyone.
    assert!(sim.network().peers().all(|p| p.neighbor_count() == 9));

    let order = OrderId(0);
    step_to(&mut sim, 2);
    assert_eq!(sim.network().replica_count(order), 1);
    assert!(sim
        .network()
        .peers()
        .filter(|p| p.id() != PeerId(0))
        .all(|p| p.pending_info(order).is_some()));

    step_to(&mut sim, 4);
    assert_eq!(sim.network().replica_count(order), 10);
    let hops: Vec<u32> = sim
        .network()
        .peers()
        .filter_map(|p| p.stored_info(order))
        .map(|info| info.hops)
        .collect();
    assert_eq!(hops.iter().filter(|h| **h == 1).count(), 9);
}

#[traced_test]
#[test]
fn test_repair_to_max_fills_every_slot_it_can() {
    let config = SimConfig::new(NeighborBounds::new(2, 5).unwrap())
        .with_batch_period(10)
        .with_horizon(12)
        .with_seed(100);
    let scenario = ScriptedScenario::uniform(100, seeded_peer(1));
    let engine = EngineConfig::default().with_repair(RepairTrigger::BelowMax);
    let mut sim = scripted(config, scenario, engine);

    for _ in 0..12 {
        assert_repaired_to_max(sim.network(), 5);
        assert!(sim.network().peers().filter(|p| p.neighbor_count() == 5).count() >= 95);
        sim.step().unwrap();
    }
}

#[traced_test]
#[test]
fn test_growing_mesh_spreads_one_hop_per_batch() {
    let order = OrderId(0);
    let mut scenario = ScriptedScenario::uniform(100, PeerSpec::new(PeerKind::Normal));
    for round in 1..=50 {
        let mut events = RoundEvents {
            arrivals: vec![PeerSpec::new(PeerKind::Normal)],
            ..RoundEvents::default()
        };
        if round == 1 {
            events.external_orders.push(ExternalOrder {
                target: PeerId(0),
                expiration: 1_000,
            });
        }
        scenario = scenario.with_events(round, events);
    }
    let config = SimConfig::new(NeighborBounds::new(2, 5).unwrap())
        .with_batch_period(10)
        .with_horizon(50)
        .with_seed(7);
    let engine = EngineConfig::flooding().with_repair(RepairTrigger::BelowMax);
    let mut sim = scripted(config, scenario, engine);

    // The injected copy waits in peer 0's pending table until the first batch.
    let mut stored_at_boundary = 0;
    let mut pending_at_boundary = 1;

    while !sim.is_finished() {
        sim.step().unwrap();
        let round = sim.now().0;
        let network = sim.network();
        assert_eq!(network.len(), 100 + round as usize);
        assert_repaired_to_max(network, 5);

        let stored = network.replica_count(order);
        if round % 10 != 0 {
            assert_eq!(stored, stored_at_boundary, "round {round}");
            if round < 10 {
                assert!(network.peer(PeerId(0)).unwrap().pending_info(order).is_some());
            }
            continue;
        }

        // Every copy pending at the previous boundary is stored now, and
        // nothing else.
        assert_eq!(stored, stored_at_boundary + pending_at_boundary, "round {round}");
        let boundary = (round / 10) as u32;
        assert!(network
            .peers()
            .filter_map(|p| p.stored_info(order))
            .all(|info| info.hops < boundary));

        let pending = network
            .peers()
            .filter(|p| p.pending_info(order).is_some())
            .count();
        if round == 10 {
            assert_eq!(stored, 1);
            assert_eq!(pending, network.peer(PeerId(0)).unwrap().neighbor_count());
        }
        stored_at_boundary = stored;
        pending_at_boundary = pending;
    }

    // Five boundaries only reach peers up to four hops from peer 0.
    assert!(sim.network().replica_count(order) > 1);
    assert_eq!(sim.stats().batches, 5);
}

#[traced_test]
#[test]
fn test_departures_then_repair_restore_neighbors() {
    // With bounds [3, 3], four peers form a complete graph at genesis.
    let config = SimConfig::new(NeighborBounds::new(3, 3).unwrap())
        .with_batch_period(5)
        .with_horizon(4);
    let scenario = ScriptedScenario::uniform(4, PeerSpec::new(PeerKind::Normal))
        .with_events(
            1,
            RoundEvents {
                departures: vec![PeerId(1), PeerId(2)],
                ..RoundEvents::default()
            },
        )
        .with_events(
            2,
            RoundEvents {
                arrivals: vec![PeerSpec::new(PeerKind::Normal); 3],
                ..RoundEvents::default()
            },
        );
    let mut sim = scripted(config, scenario, EngineConfig::flooding());
    assert!(sim.network().peers().all(|p| p.neighbor_count() == 3));

    // Too few peers left to reach the minimum: linked to everyone remaining.
    sim.step().unwrap();
    let network = sim.network();
    assert_eq!(network.len(), 2);
    assert_eq!(sim.stats().links_lost, 5);
    for peer in network.peers() {
        assert_eq!(peer.neighbor_count(), network.len() - 1);
    }

    // Newcomers give peer 0 room to get back to the minimum in the same round.
    sim.step().unwrap();
    let network = sim.network();
    assert_eq!(network.len(), 5);
    assert_eq!(network.peer(PeerId(0)).unwrap().neighbor_count(), 3);
    assert_eq!(network.peer(PeerId(3)).unwrap().neighbor_count(), 3);
    assert_repaired_to_max(network, 3);
}

#[traced_test]
#[test]
fn test_prune_removes_both_sides_and_relayed_orders() {
    let config = SimConfig::new(NeighborBounds::new(1, 1).unwrap())
        .with_batch_period(2)
        .with_horizon(6)
        .with_prune(PruneConfig {
            threshold: 2.0,
            duration: 2,
            purge_orders: true,
        });
    let scenario = ScriptedScenario::new(vec![seeded_peer(1), PeerSpec::new(PeerKind::Normal)]);
    let mut sim = scripted(config, scenario, EngineConfig::flooding());
    assert!(sim.network().are_linked(PeerId(0), PeerId(1)));

    // First batch: scores are zero, one low batch each, order shared.
    step_to(&mut sim, 2);
    assert!(sim.network().are_linked(PeerId(0), PeerId(1)));
    assert_eq!(sim.stats().links_pruned, 0);

    // Second batch: peer 1 stores, then both ends give up on the link.
    step_to(&mut sim, 4);
    assert!(!sim.network().are_linked(PeerId(0), PeerId(1)));
    assert_eq!(sim.network().peer(PeerId(0)).unwrap().neighbor_count(), 0);
    assert_eq!(sim.network().peer(PeerId(1)).unwrap().neighbor_count(), 0);
    assert_eq!(sim.stats().links_pruned, 1);
    assert_eq!(sim.stats().orders_purged_by_prune, 1);
    assert!(!sim.network().peer(PeerId(1)).unwrap().holds(OrderId(0)));
    assert!(sim.network().peer(PeerId(0)).unwrap().has_stored(OrderId(0)));

    // The next round's repair links them again.
    sim.step().unwrap();
    assert!(sim.network().are_linked(PeerId(0), PeerId(1)));
}

#[traced_test]
#[test]
fn test_departure_orphans_and_cancellation() {
    let config = SimConfig::new(NeighborBounds::new(1, 2).unwrap())
        .with_batch_period(5)
        .with_horizon(5);
    let scenario = ScriptedScenario::new(vec![seeded_peer(1), seeded_peer(1), seeded_peer(0)])
        .with_events(
            1,
            RoundEvents {
                cancellations: vec![OrderId(1)],
                ..RoundEvents::default()
            },
        )
        .with_events(
            2,
            RoundEvents {
                departures: vec![PeerId(0)],
                ..RoundEvents::default()
            },
        );
    let mut sim = scripted(config, scenario, EngineConfig::flooding());

    step_to(&mut sim, 1);
    assert!(!sim.order_book().contains(OrderId(1)));
    assert_eq!(sim.order_book().retired().cancelled, 1);
    assert!(sim.network().peers().all(|p| !p.holds(OrderId(1))));

    // Order 0 only lived on peer 0; it is orphaned in the round peer 0 leaves.
    step_to(&mut sim, 2);
    assert!(!sim.network().contains(PeerId(0)));
    assert_eq!(sim.stats().peers_departed, 1);
    assert!(!sim.order_book().contains(OrderId(0)));
    assert_eq!(sim.order_book().retired().orphaned, 1);
}

#[traced_test]
#[test]
fn test_expiry_and_settlement() {
    let config = SimConfig::new(NeighborBounds::new(1, 2).unwrap())
        .with_batch_period(5)
        .with_horizon(10);
    let short = PeerSpec::new(PeerKind::Normal).with_orders(vec![
        NewOrder { expiration: 3 },
        NewOrder { expiration: 100 },
    ]);
    let scenario = ScriptedScenario::new(vec![short, seeded_peer(0)])
        .with_settlement(1, Round(4));
    let mut sim = scripted(config, scenario, EngineConfig::flooding());

    step_to(&mut sim, 2);
    assert!(sim.order_book().is_valid(OrderId(0)));
    step_to(&mut sim, 3);
    assert_eq!(sim.order_book().retired().expired, 1);
    assert!(sim.order_book().is_valid(OrderId(1)));
    step_to(&mut sim, 4);
    assert_eq!(sim.order_book().retired().settled, 1);
    assert!(sim.order_book().is_empty());
}

#[traced_test]
#[test]
fn test_external_order_to_unknown_peer_fails() {
    let config = SimConfig::new(NeighborBounds::new(1, 2).unwrap()).with_horizon(3);
    let scenario = ScriptedScenario::uniform(2, PeerSpec::new(PeerKind::Normal)).with_events(
        1,
        RoundEvents {
            external_orders: vec![ExternalOrder {
                target: PeerId(7),
                expiration: 10,
            }],
            ..RoundEvents::default()
        },
    );
    let mut sim = scripted(config, scenario, EngineConfig::flooding());

    assert!(matches!(sim.step(), Err(SimError::Policy(_))));
    assert!(sim.order_book().is_empty());
}

#[traced_test]
#[test]
fn test_free_riders_never_relay() {
    // A normal peer with an order, linked only through a free rider.
    let config = SimConfig::new(NeighborBounds::new(1, 1).unwrap())
        .with_batch_period(1)
        .with_horizon(6);
    let scenario = ScriptedScenario::new(vec![
        PeerSpec::new(PeerKind::FreeRider),
        PeerSpec::new(PeerKind::Normal),
    ])
    .with_events(
        1,
        RoundEvents {
            external_orders: vec![ExternalOrder {
                target: PeerId(0),
                expiration: 100,
            }],
            ..RoundEvents::default()
        },
    );
    let mut sim = scripted(config, scenario, EngineConfig::flooding());
    assert!(sim.network().are_linked(PeerId(0), PeerId(1)));

    step_to(&mut sim, 6);
    assert!(sim.network().peer(PeerId(0)).unwrap().has_stored(OrderId(0)));
    assert!(!sim.network().peer(PeerId(1)).unwrap().holds(OrderId(0)));
    assert_eq!(sim.stats().transmissions, 0);
}

#[traced_test]
#[test]
fn test_rate_scenario_growth_keeps_invariants() {
    let config = SimConfig::new(NeighborBounds::new(2, 5).unwrap())
        .with_batch_period(5)
        .with_horizon(80)
        .with_seed(2024);
    let mut sim = Simulator::new(
        config,
        RateScenario::new(ScenarioConfig::default()),
        PolicyEngine::new(EngineConfig::default()),
        MeshPerformance::default(),
    )
    .unwrap();

    let measurements = sim.run().unwrap();
    let stats = sim.stats();

    assert_eq!(stats.rounds, 80);
    assert!(stats.peers_arrived > 10);
    assert!(stats.transmissions > 0);
    assert!(sim.network().peers().all(|p| p.neighbor_count() <= 5));
    assert!(measurements.series("order_spreading").is_some());
}
