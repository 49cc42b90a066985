//! Scenario candidates.
//!
//! [`RateScenario`] draws per-round event counts from a Poisson or Hawkes
//! process over a growth phase followed by a stable phase. [`ScriptedScenario`]
//! replays a fixed list of events and is mostly useful in tests.

use std::collections::BTreeMap;

use meshsim_core::{ExternalOrder, NewOrder, PeerSpec, RoundEvents, Scenario, SimView};
use meshsim_types::{Order, PeerId, PeerKind, Round};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sampling::{hawkes_counts, poisson, Gaussian, HawkesParams};
use crate::CandidateError;

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Expected events per round, by event type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRates {
    pub peer_arrival: f64,
    pub peer_departure: f64,
    pub order_arrival: f64,
    pub order_cancellation: f64,
}

/// A stretch of rounds with constant event rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub rounds: usize,
    pub rates: EventRates,
}

/// How per-round event counts are drawn from the phase rates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EventProcess {
    /// Independent Poisson counts per round.
    #[default]
    Poisson,
    /// Self-exciting counts. The phase rate is the base intensity.
    Hawkes { decay: f64, jump: f64 },
}

/// When an order counts as filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlePolicy {
    #[default]
    Never,
}

/// Initial storage of a peer type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeerProfile {
    /// Share of arriving peers of this type.
    pub ratio: f64,

    /// Size of the initial storage. Free riders never get one.
    pub initial_orders: Gaussian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Peers present at genesis.
    pub initial_peers: usize,

    pub growth: Phase,
    pub stable: Phase,
    pub process: EventProcess,

    /// Lifetime of every new order, in rounds.
    pub order_expiration: Gaussian,

    pub normal: PeerProfile,
    pub free_rider: PeerProfile,
    pub settle: SettlePolicy,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            initial_peers: 10,
            growth: Phase {
                rounds: 30,
                rates: EventRates {
                    peer_arrival: 3.0,
                    peer_departure: 0.0,
                    order_arrival: 15.0,
                    order_cancellation: 15.0,
                },
            },
            stable: Phase {
                rounds: 50,
                rates: EventRates {
                    peer_arrival: 2.0,
                    peer_departure: 2.0,
                    order_arrival: 15.0,
                    order_cancellation: 15.0,
                },
            },
            process: EventProcess::Poisson,
            order_expiration: Gaussian::new(500.0, 0.0),
            normal: PeerProfile {
                ratio: 0.9,
                initial_orders: Gaussian::new(6.0, 1.0),
            },
            free_rider: PeerProfile {
                ratio: 0.1,
                initial_orders: Gaussian::new(0.0, 0.0),
            },
            settle: SettlePolicy::Never,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), CandidateError> {
        let ratios = [
            ("normal.ratio", self.normal.ratio),
            ("free_rider.ratio", self.free_rider.ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(CandidateError::Probability { name, value });
            }
        }
        if self.normal.ratio + self.free_rider.ratio <= 0.0 {
            return Err(CandidateError::NoPeerType);
        }
        if let EventProcess::Hawkes { decay, jump } = self.process {
            if decay <= 0.0 || jump < 0.0 {
                return Err(CandidateError::Hawkes { decay, jump });
            }
        }
        Ok(())
    }

    /// Rounds covered by the two phases.
    pub fn scheduled_rounds(&self) -> usize {
        self.growth.rounds + self.stable.rounds
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Rate-driven scenario
// ═══════════════════════════════════════════════════════════════════════════

/// Event counts for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EventCounts {
    peer_arrivals: u64,
    peer_departures: u64,
    order_arrivals: u64,
    order_cancellations: u64,
}

/// Scenario driven by per-round event rates.
///
/// The whole count schedule is drawn when the initial peers are requested,
/// so the schedule does not depend on how the mesh evolves. Rounds past the
/// schedule are quiet.
#[derive(Debug, Clone)]
pub struct RateScenario {
    config: ScenarioConfig,
    schedule: Vec<EventCounts>,
}

impl RateScenario {
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            schedule: Vec::new(),
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    fn draw_schedule(&mut self, rng: &mut impl Rng) {
        let mut schedule = Vec::with_capacity(self.config.scheduled_rounds());
        for phase in [self.config.growth, self.config.stable] {
            let rates = phase.rates;
            let arrivals = self.counts(rng, rates.peer_arrival, phase.rounds);
            let departures = self.counts(rng, rates.peer_departure, phase.rounds);
            let orders = self.counts(rng, rates.order_arrival, phase.rounds);
            let cancellations = self.counts(rng, rates.order_cancellation, phase.rounds);
            for round in 0..phase.rounds {
                schedule.push(EventCounts {
                    peer_arrivals: arrivals[round],
                    peer_departures: departures[round],
                    order_arrivals: orders[round],
                    order_cancellations: cancellations[round],
                });
            }
        }
        self.schedule = schedule;
    }

    fn counts(&self, rng: &mut impl Rng, rate: f64, rounds: usize) -> Vec<u64> {
        match self.config.process {
            EventProcess::Poisson => (0..rounds).map(|_| poisson(rng, rate)).collect(),
            EventProcess::Hawkes { decay, jump } => hawkes_counts(
                rng,
                &HawkesParams {
                    base: rate,
                    initial: rate,
                    decay,
                    jump,
                },
                rounds,
            ),
        }
    }

    fn new_peer(&self, rng: &mut impl Rng) -> PeerSpec {
        let total = self.config.normal.ratio + self.config.free_rider.ratio;
        let free_rider = rng.gen_bool((self.config.free_rider.ratio / total).clamp(0.0, 1.0));
        if free_rider {
            return PeerSpec::new(PeerKind::FreeRider);
        }
        let count = self.config.normal.initial_orders.sample_count(rng);
        let orders = (0..count)
            .map(|_| NewOrder {
                expiration: self.config.order_expiration.sample_count(rng),
            })
            .collect();
        PeerSpec::new(PeerKind::Normal).with_orders(orders)
    }

    /// Mean initial storage of a kind, used to weight external order targets.
    fn target_weight(&self, kind: PeerKind) -> f64 {
        match kind {
            PeerKind::Normal => self.config.normal.initial_orders.mean.max(0.0),
            PeerKind::FreeRider => 0.0,
        }
    }
}

impl Scenario for RateScenario {
    fn initial_peers(&mut self, rng: &mut impl Rng) -> Vec<PeerSpec> {
        self.draw_schedule(rng);
        debug!(
            rounds = self.schedule.len(),
            initial_peers = self.config.initial_peers,
            "Event schedule drawn"
        );
        (0..self.config.initial_peers)
            .map(|_| self.new_peer(rng))
            .collect()
    }

    fn round_events(&mut self, view: &SimView<'_>, rng: &mut impl Rng) -> RoundEvents {
        let Some(counts) = (view.now.0 as usize)
            .checked_sub(1)
            .and_then(|slot| self.schedule.get(slot))
            .copied()
        else {
            return RoundEvents::default();
        };

        let live = view.network.ids();
        let departures = pick(rng, &live, counts.peer_departures as usize);
        let staying: Vec<PeerId> = live
            .into_iter()
            .filter(|id| !departures.contains(id))
            .collect();

        let valid = view.order_book.valid_ids();
        let cancellations = pick(rng, &valid, counts.order_cancellations as usize);

        let arrivals = (0..counts.peer_arrivals)
            .map(|_| self.new_peer(rng))
            .collect();

        let weights: Vec<f64> = staying
            .iter()
            .map(|id| {
                view.network
                    .get(*id)
                    .map_or(0.0, |peer| self.target_weight(peer.kind()))
            })
            .collect();
        // Fails when nobody can take orders, e.g. a mesh of free riders.
        let external_orders = match WeightedIndex::new(&weights) {
            Ok(targets) => (0..counts.order_arrivals)
                .map(|_| ExternalOrder {
                    target: staying[targets.sample(rng)],
                    expiration: self.config.order_expiration.sample_count(rng),
                })
                .collect(),
            Err(_) => Vec::new(),
        };

        RoundEvents {
            departures,
            cancellations,
            arrivals,
            external_orders,
        }
    }

    fn is_settled(&self, _order: &Order, _now: Round) -> bool {
        match self.config.settle {
            SettlePolicy::Never => false,
        }
    }
}

/// `min(count, len)` distinct items of `items`, in random order.
fn pick<T: Copy>(rng: &mut impl Rng, items: &[T], count: usize) -> Vec<T> {
    let amount = count.min(items.len());
    index::sample(rng, items.len(), amount)
        .into_iter()
        .map(|i| items[i])
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Scripted scenario
// ═══════════════════════════════════════════════════════════════════════════

/// Scenario replaying fixed events.
#[derive(Debug, Clone, Default)]
pub struct ScriptedScenario {
    initial: Vec<PeerSpec>,
    events: BTreeMap<u64, RoundEvents>,
    settled: Vec<(u64, Round)>,
}

impl ScriptedScenario {
    pub fn new(initial: Vec<PeerSpec>) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    /// `count` identical peers at genesis.
    pub fn uniform(count: usize, spec: PeerSpec) -> Self {
        Self::new(vec![spec; count])
    }

    /// Replace the events of `round`.
    pub fn with_events(mut self, round: u64, events: RoundEvents) -> Self {
        self.events.insert(round, events);
        self
    }

    /// Treat order `id` as filled from `round` on.
    pub fn with_settlement(mut self, id: u64, round: Round) -> Self {
        self.settled.push((id, round));
        self
    }
}

impl Scenario for ScriptedScenario {
    fn initial_peers(&mut self, _rng: &mut impl Rng) -> Vec<PeerSpec> {
        std::mem::take(&mut self.initial)
    }

    fn round_events(&mut self, view: &SimView<'_>, _rng: &mut impl Rng) -> RoundEvents {
        self.events.remove(&view.now.0).unwrap_or_default()
    }

    fn is_settled(&self, order: &Order, now: Round) -> bool {
        self.settled
            .iter()
            .any(|(id, round)| *id == order.id.0 && now >= *round)
    }
}
