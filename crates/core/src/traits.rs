//! Policy traits.
//!
//! A simulation is parameterized by three policies:
//!
//! - [`Scenario`]: what happens to the mesh from outside (arrivals, departures,
//!   cancellations, settlement).
//! - [`Engine`]: how a peer decides (acceptance, storage, scoring, sharing,
//!   neighbor recommendation, repair trigger).
//! - [`Performance`]: what is measured.
//!
//! The scheduler only depends on these signatures. Concrete candidates are
//! chosen once, when the simulator is built.

use crate::{Measurements, Network, OrderBook, Peer, PeerSpec, RoundEvents};
use meshsim_types::{NeighborBounds, Order, OrderId, OrderInfo, PeerId, Provenance, Round};

/// Read-only view of the simulation state handed to policies.
#[derive(Debug, Clone, Copy)]
pub struct SimView<'a> {
    /// The round being simulated.
    pub now: Round,

    /// Live peers and their links.
    pub network: &'a Network,

    /// Known orders and their validity.
    pub order_book: &'a OrderBook,
}

/// Generator of global events.
pub trait Scenario {
    /// Peers present when the simulation starts.
    fn initial_peers(&mut self, rng: &mut impl rand::Rng) -> Vec<PeerSpec>;

    /// Events for the round in `view.now`.
    ///
    /// Every peer and order referenced must exist in `view`; departing peers
    /// must not also be targeted by external orders.
    fn round_events(&mut self, view: &SimView<'_>, rng: &mut impl rand::Rng) -> RoundEvents;

    /// Whether `order` has been filled by `now`.
    fn is_settled(&self, _order: &Order, _now: Round) -> bool {
        false
    }
}

/// A peer's decision functions.
///
/// All methods are called with the deciding peer borrowed immutably; the
/// scheduler applies the decisions afterwards.
pub trait Engine {
    /// Admission of an arriving order into the pending table.
    fn accept_order(&self, peer: &Peer, order: &Order, provenance: &Provenance) -> bool;

    /// Admission of a pending record into local storage.
    fn store_order(&self, peer: &Peer, pending: &OrderInfo) -> bool;

    /// New score for every current neighbor of `peer`.
    fn score_neighbors(&self, peer: &Peer, now: Round) -> Vec<(PeerId, f64)>;

    /// Stored orders `peer` offers this batch.
    fn orders_to_share(&self, peer: &Peer, rng: &mut impl rand::Rng) -> Vec<OrderId>;

    /// Neighbors `peer` shares with this batch.
    fn beneficiaries(&self, peer: &Peer, now: Round, rng: &mut impl rand::Rng) -> Vec<PeerId>;

    /// Final per-pair filter applied to every (order, beneficiary) pair.
    fn should_share(&self, _peer: &Peer, _order: OrderId, _neighbor: PeerId) -> bool {
        true
    }

    /// Pick up to `count` candidates from `pool` for `requester` to invite.
    fn recommend_neighbors(
        &self,
        requester: &Peer,
        pool: &[PeerId],
        count: usize,
        rng: &mut impl rand::Rng,
    ) -> Vec<PeerId>;

    /// Whether `peer` should look for new neighbors this round.
    fn needs_repair(&self, peer: &Peer, bounds: &NeighborBounds) -> bool {
        peer.neighbor_count() < bounds.min
    }

    /// Neighbor count a repair keeps inviting toward.
    fn repair_goal(&self, bounds: &NeighborBounds) -> usize {
        bounds.min
    }
}

/// Measurement extraction over the live population.
pub trait Performance {
    fn measure(&self, view: &SimView<'_>) -> Measurements;
}
