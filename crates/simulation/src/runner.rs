//! Round scheduler.

use crate::batch::{self, PruneOutcome, ShareOutcome};
use crate::repair::repair;
use crate::{SimConfig, SimError};
use meshsim_core::{
    Engine, ExternalOrder, Measurements, Network, OrderBook, Performance, PeerSpec, Scenario,
    SimView,
};
use meshsim_types::{InvalidReason, OrderId, PeerId, Provenance, Round};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

/// Statistics collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Rounds simulated after genesis.
    pub rounds: u64,

    /// Batch pipelines executed.
    pub batches: u64,

    /// Peers created, initial population included.
    pub peers_arrived: u64,

    pub peers_departed: u64,

    /// Orders seeded into new peers' storage.
    pub orders_seeded: u64,

    /// Orders injected from outside the mesh.
    pub orders_injected: u64,

    /// Peer records dropped because their order became invalid.
    pub records_purged: u64,

    pub links_created: u64,
    pub links_pruned: u64,

    /// Links lost because one end departed.
    pub links_lost: u64,

    /// Pending records promoted to storage.
    pub orders_stored: u64,

    /// Pending records dropped by the storing decision.
    pub orders_discarded: u64,

    /// (order, neighbor) transmissions.
    pub transmissions: u64,

    /// Transmissions that created or joined a pending record.
    pub transmissions_accepted: u64,

    /// Orders discarded because their relaying neighbor was pruned.
    pub orders_purged_by_prune: u64,
}

/// Deterministic round-based simulator.
///
/// Given the same configuration, policies and seed, every run produces the
/// same sequence of states. Each call to [`step`](Self::step) simulates one
/// round:
///
/// 1. Ask the scenario for this round's events.
/// 2. Remove departing peers and all their links.
/// 3. Invalidate cancelled, expired, settled and orphaned orders and purge
///    them everywhere.
/// 4. Create arriving peers with seeded storage; inject external orders.
/// 5. For every peer in id order: purge invalid orders, then repair
///    neighbors if the engine says so.
/// 6. On a batch boundary, run the batch pipeline for every peer.
pub struct Simulator<S, E, P> {
    config: SimConfig,
    scenario: S,
    engine: E,
    performance: P,
    network: Network,
    order_book: OrderBook,
    now: Round,
    rng: ChaCha8Rng,
    stats: SimulationStats,
}

impl<S: Scenario, E: Engine, P: Performance> Simulator<S, E, P> {
    /// Create a simulator and its initial population.
    ///
    /// The initial peers are created at genesis with their seeded orders and
    /// run one neighbor repair before the first round.
    pub fn new(
        config: SimConfig,
        scenario: S,
        engine: E,
        performance: P,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut sim = Self {
            config,
            scenario,
            engine,
            performance,
            network: Network::new(),
            order_book: OrderBook::new(),
            now: Round::GENESIS,
            rng,
            stats: SimulationStats::default(),
        };

        let initial = sim.scenario.initial_peers(&mut sim.rng);
        for spec in initial {
            sim.admit_peer(spec)?;
        }
        sim.local_updates()?;
        sim.verify()?;

        if sim.network.is_empty() {
            warn!("Simulation starts with no peers");
        }

        info!(
            peers = sim.network.len(),
            orders = sim.order_book.len(),
            horizon = sim.config.horizon,
            batch_period = sim.config.batch_period,
            seed = sim.config.seed,
            "Simulator initialized"
        );

        Ok(sim)
    }

    /// Current round.
    pub fn now(&self) -> Round {
        self.now
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn order_book(&self) -> &OrderBook {
        &self.order_book
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn scenario(&self) -> &S {
        &self.scenario
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Whether the horizon has been reached.
    pub fn is_finished(&self) -> bool {
        self.now.0 >= self.config.horizon
    }

    /// Read-only view of the current state.
    pub fn view(&self) -> SimView<'_> {
        SimView {
            now: self.now,
            network: &self.network,
            order_book: &self.order_book,
        }
    }

    /// Run the performance policy over the current state.
    pub fn measure(&self) -> Measurements {
        self.performance.measure(&self.view())
    }

    /// Step until the horizon and return the final measurements.
    pub fn run(&mut self) -> Result<Measurements, SimError> {
        while !self.is_finished() {
            self.step()?;
        }

        info!(
            rounds = self.stats.rounds,
            peers = self.network.len(),
            orders = self.order_book.len(),
            stored = self.stats.orders_stored,
            transmissions = self.stats.transmissions,
            "Simulation complete"
        );
        if self.order_book.is_empty() {
            warn!(round = self.now.0, "Measuring a mesh with no live orders");
        }

        Ok(self.measure())
    }

    /// Simulate one round.
    pub fn step(&mut self) -> Result<(), SimError> {
        if self.is_finished() {
            return Err(SimError::Finished(self.now));
        }
        self.now = self.now.next();

        let view = SimView {
            now: self.now,
            network: &self.network,
            order_book: &self.order_book,
        };
        let events = self.scenario.round_events(&view, &mut self.rng);
        if !events.is_empty() {
            debug!(
                round = self.now.0,
                departures = events.departures.len(),
                cancellations = events.cancellations.len(),
                arrivals = events.arrivals.len(),
                external_orders = events.external_orders.len(),
                "Round events"
            );
        }

        self.process_departures(&events.departures)?;
        self.process_invalidations(&events.cancellations)?;
        for spec in events.arrivals {
            self.admit_peer(spec)?;
        }
        for external in &events.external_orders {
            self.inject(*external)?;
        }
        self.local_updates()?;

        if self.now.closes_batch(self.config.batch_period) {
            self.run_batch()?;
        }

        self.verify()?;
        self.stats.rounds += 1;

        trace!(
            round = self.now.0,
            peers = self.network.len(),
            orders = self.order_book.len(),
            "Round complete"
        );
        Ok(())
    }

    fn process_departures(&mut self, departures: &[PeerId]) -> Result<(), SimError> {
        for id in departures {
            let links = self.network.peer(*id)?.neighbor_count();
            self.network.remove_peer(*id)?;
            self.stats.peers_departed += 1;
            self.stats.links_lost += links as u64;
        }
        Ok(())
    }

    fn process_invalidations(&mut self, cancellations: &[OrderId]) -> Result<(), SimError> {
        for id in cancellations {
            self.order_book.invalidate(*id, InvalidReason::Cancelled)?;
        }

        let now = self.now;
        let held = self.network.held_orders();
        let mut doomed = Vec::new();
        for order in self.order_book.valid_orders() {
            let reason = if order.is_expired(now) {
                InvalidReason::Expired
            } else if self.scenario.is_settled(order, now) {
                InvalidReason::Settled
            } else if !held.contains(&order.id) {
                InvalidReason::Orphaned
            } else {
                continue;
            };
            doomed.push((order.id, reason));
        }
        for (id, reason) in doomed {
            self.order_book.invalidate(id, reason)?;
        }

        let book = &self.order_book;
        let purged: usize = self
            .network
            .peers_mut()
            .map(|peer| peer.purge_invalid(book))
            .sum();
        self.stats.records_purged += purged as u64;

        let retired = self.order_book.retire_marked();
        if !retired.is_empty() {
            debug!(
                round = now.0,
                retired = retired.len(),
                records_purged = purged,
                "Orders invalidated"
            );
        }
        Ok(())
    }

    fn admit_peer(&mut self, spec: PeerSpec) -> Result<PeerId, SimError> {
        let id = self
            .network
            .spawn(spec.kind, self.now, self.config.incentive);
        for new_order in &spec.initial_orders {
            let order = self.order_book.create(self.now, id, new_order.expiration);
            self.network.peer_mut(id)?.seed_order(order, self.now)?;
            self.stats.orders_seeded += 1;
        }
        self.stats.peers_arrived += 1;
        Ok(id)
    }

    fn inject(&mut self, external: ExternalOrder) -> Result<OrderId, SimError> {
        // Check the target before the order exists, so a bad target leaves no trace.
        self.network.peer(external.target)?;
        let id = self
            .order_book
            .create(self.now, external.target, external.expiration);
        let order = self.order_book.order(id)?;
        self.network.peer_mut(external.target)?.receive_order(
            &self.engine,
            order,
            Provenance::External,
            0,
            self.now,
        )?;
        self.stats.orders_injected += 1;
        Ok(id)
    }

    fn local_updates(&mut self) -> Result<(), SimError> {
        let bounds = self.config.bounds;
        let goal = self.engine.repair_goal(&bounds);

        for id in self.network.ids() {
            let peer = self.network.peer_mut(id)?;
            self.stats.records_purged += peer.purge_invalid(&self.order_book) as u64;

            if self.engine.needs_repair(self.network.peer(id)?, &bounds) {
                let added = repair(
                    &mut self.network,
                    &self.engine,
                    id,
                    &bounds,
                    goal,
                    self.now,
                    &mut self.rng,
                )?;
                self.stats.links_created += added as u64;
            }
        }
        Ok(())
    }

    fn run_batch(&mut self) -> Result<(), SimError> {
        let now = self.now;

        let stored = batch::store_all(&mut self.network, &self.engine)
            .map_err(SimError::invariant(now))?;
        batch::score_all(&mut self.network, &self.engine, now)?;
        let pruned = match &self.config.prune {
            Some(prune) => batch::prune_all(&mut self.network, prune)?,
            None => PruneOutcome::default(),
        };
        batch::rotate_all(&mut self.network);
        let shared: ShareOutcome = batch::share_all(
            &mut self.network,
            &self.engine,
            &self.order_book,
            now,
            &mut self.rng,
        )?;

        self.stats.batches += 1;
        self.stats.orders_stored += stored.stored as u64;
        self.stats.orders_discarded += stored.discarded as u64;
        self.stats.links_pruned += pruned.links_removed as u64;
        self.stats.orders_purged_by_prune += pruned.orders_purged as u64;
        self.stats.transmissions += shared.transmitted as u64;
        self.stats.transmissions_accepted += shared.accepted as u64;

        debug!(
            round = now.0,
            stored = stored.stored,
            discarded = stored.discarded,
            pruned = pruned.links_removed,
            transmitted = shared.transmitted,
            accepted = shared.accepted,
            "Batch complete"
        );
        Ok(())
    }

    fn verify(&self) -> Result<(), SimError> {
        if !self.config.check_invariants {
            return Ok(());
        }
        let invariant = SimError::invariant(self.now);
        self.network
            .check_invariants(&self.config.bounds)
            .and_then(|_| self.network.check_no_invalid_orders(&self.order_book))
            .map_err(invariant)
    }
}
