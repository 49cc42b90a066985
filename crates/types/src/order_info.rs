//! Peer-local order records.

use crate::{OrderId, PeerId, Round};
use std::fmt;

/// Where a peer got an order from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Seeded into the peer's storage when the peer was created.
    Initial,

    /// Injected from outside the mesh.
    External,

    /// Relayed by a neighbor.
    Neighbor(PeerId),
}

impl Provenance {
    /// The relaying neighbor, if any.
    pub fn sender(&self) -> Option<PeerId> {
        match self {
            Provenance::Neighbor(peer) => Some(*peer),
            Provenance::Initial | Provenance::External => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Initial => write!(f, "initial"),
            Provenance::External => write!(f, "external"),
            Provenance::Neighbor(peer) => write!(f, "{}", peer),
        }
    }
}

/// Lifecycle status of a peer-local order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Waiting for the next storing phase.
    Pending,

    /// Admitted to local storage and eligible for sharing.
    Stored,
}

/// A peer's record of one order.
///
/// A peer holds at most one `OrderInfo` per order. When several neighbors relay
/// the same order before the storing phase, the first relay owns the record and
/// the others are kept in `extra_senders` so they can still be credited.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderInfo {
    /// The order this record refers to.
    pub order: OrderId,

    /// Who delivered the copy this record tracks.
    pub provenance: Provenance,

    /// Round the copy arrived.
    pub arrival: Round,

    /// Number of relays between the originating peer and this one.
    pub hops: u32,

    /// Pending or stored.
    pub status: OrderStatus,

    /// Later relays of the same order received while this record was pending.
    pub extra_senders: Vec<PeerId>,
}

impl OrderInfo {
    /// Create a pending record.
    pub fn pending(order: OrderId, provenance: Provenance, arrival: Round, hops: u32) -> Self {
        Self {
            order,
            provenance,
            arrival,
            hops,
            status: OrderStatus::Pending,
            extra_senders: Vec::new(),
        }
    }

    /// Create a record that bypasses the pending table.
    pub fn seeded(order: OrderId, arrival: Round) -> Self {
        Self {
            order,
            provenance: Provenance::Initial,
            arrival,
            hops: 0,
            status: OrderStatus::Stored,
            extra_senders: Vec::new(),
        }
    }

    /// Whether `peer` delivered this order, either as the primary or as an extra sender.
    pub fn was_sent_by(&self, peer: PeerId) -> bool {
        self.provenance.sender() == Some(peer) || self.extra_senders.contains(&peer)
    }

    /// Every neighbor that delivered a copy, primary first.
    pub fn senders(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.provenance
            .sender()
            .into_iter()
            .chain(self.extra_senders.iter().copied())
    }
}
