//! Per-round global events produced by a scenario.

use meshsim_types::{OrderId, PeerId, PeerKind};

/// Terms of an order that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    /// Lifetime in rounds.
    pub expiration: u64,
}

/// A peer about to join the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSpec {
    pub kind: PeerKind,

    /// Orders seeded straight into the new peer's storage.
    pub initial_orders: Vec<NewOrder>,
}

impl PeerSpec {
    /// A peer with an empty storage.
    pub fn new(kind: PeerKind) -> Self {
        Self {
            kind,
            initial_orders: Vec::new(),
        }
    }

    /// Seed the peer with `orders`.
    pub fn with_orders(mut self, orders: Vec<NewOrder>) -> Self {
        self.initial_orders = orders;
        self
    }
}

/// An order injected into a peer from outside the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalOrder {
    pub target: PeerId,
    pub expiration: u64,
}

/// Everything a scenario decides for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundEvents {
    /// Peers leaving the mesh.
    pub departures: Vec<PeerId>,

    /// Orders cancelled by their owners.
    pub cancellations: Vec<OrderId>,

    /// Peers joining the mesh.
    pub arrivals: Vec<PeerSpec>,

    /// Orders entering the mesh through a live peer.
    pub external_orders: Vec<ExternalOrder>,
}

impl RoundEvents {
    pub fn is_empty(&self) -> bool {
        self.departures.is_empty()
            && self.cancellations.is_empty()
            && self.arrivals.is_empty()
            && self.external_orders.is_empty()
    }
}
