//! Peer state machine.
//!
//! A peer owns three order tables and its side of every link:
//!
//! ```text
//!   receive_order ──► pending ──store_pending──► storage ──► unshared
//!                        │                          │
//!                        └──── purge / reject ──────┴──► (absent)
//! ```
//!
//! An order id is in at most one of `pending` and `storage`. Link records are
//! only created and removed through [`Network`](crate::Network), which updates
//! both sides in one call.

use crate::{Engine, InvariantViolation, OrderBook, PolicyError};
use indexmap::{IndexMap, IndexSet};
use meshsim_types::{
    IncentiveParams, NeighborBounds, Neighbor, Order, OrderId, OrderInfo, OrderStatus, PeerId,
    PeerKind, Provenance, Round,
};
use tracing::trace;

/// Outcome of offering an order to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// A new pending record was created.
    Pending,

    /// The sender was added to an existing pending record.
    ExtraSender,

    /// The acceptance policy refused the order.
    Rejected,

    /// The order is already in local storage.
    AlreadyStored,

    /// The same source already delivered this order and it is still pending.
    Duplicate,
}

/// Result of one storing phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    pub stored: usize,
    pub discarded: usize,
}

/// A node of the mesh.
#[derive(Debug, Clone)]
pub struct Peer {
    id: PeerId,
    kind: PeerKind,
    birth: Round,
    incentive: IncentiveParams,
    neighbors: IndexMap<PeerId, Neighbor>,
    pending: IndexMap<OrderId, OrderInfo>,
    storage: IndexMap<OrderId, OrderInfo>,
    unshared: IndexSet<OrderId>,
}

impl Peer {
    /// Create a peer with no neighbors and empty tables.
    pub fn new(id: PeerId, kind: PeerKind, birth: Round, incentive: IncentiveParams) -> Self {
        Self {
            id,
            kind,
            birth,
            incentive,
            neighbors: IndexMap::new(),
            pending: IndexMap::new(),
            storage: IndexMap::new(),
            unshared: IndexSet::new(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn kind(&self) -> PeerKind {
        self.kind
    }

    pub fn birth(&self) -> Round {
        self.birth
    }

    /// Rounds since the peer joined.
    pub fn age(&self, now: Round) -> u64 {
        now.since(self.birth)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Neighbors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_neighbor(&self, peer: PeerId) -> bool {
        self.neighbors.contains_key(&peer)
    }

    pub fn neighbor(&self, peer: PeerId) -> Option<&Neighbor> {
        self.neighbors.get(&peer)
    }

    /// Mutable access to a neighbor's score bookkeeping.
    pub fn neighbor_mut(&mut self, peer: PeerId) -> Option<&mut Neighbor> {
        self.neighbors.get_mut(&peer)
    }

    /// Neighbors in link order.
    pub fn neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values()
    }

    pub fn neighbor_ids(&self) -> Vec<PeerId> {
        self.neighbors.keys().copied().collect()
    }

    pub(crate) fn attach(&mut self, peer: PeerId, now: Round) {
        self.neighbors.insert(
            peer,
            Neighbor::new(peer, now, self.incentive.history_len),
        );
    }

    pub(crate) fn detach(&mut self, peer: PeerId) -> Option<Neighbor> {
        self.neighbors.shift_remove(&peer)
    }

    /// Close the current batch on every neighbor's contribution history.
    pub fn rotate_contributions(&mut self) {
        for neighbor in self.neighbors.values_mut() {
            neighbor.rotate();
        }
    }

    fn credit(&mut self, sender: PeerId, amount: f64) {
        // The sender may have been unlinked since it relayed.
        if let Some(neighbor) = self.neighbors.get_mut(&sender) {
            neighbor.credit(amount);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Orders
    // ═══════════════════════════════════════════════════════════════════════

    pub fn pending(&self) -> impl Iterator<Item = &OrderInfo> {
        self.pending.values()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_info(&self, order: OrderId) -> Option<&OrderInfo> {
        self.pending.get(&order)
    }

    pub fn stored(&self) -> impl Iterator<Item = &OrderInfo> {
        self.storage.values()
    }

    pub fn stored_count(&self) -> usize {
        self.storage.len()
    }

    pub fn stored_info(&self, order: OrderId) -> Option<&OrderInfo> {
        self.storage.get(&order)
    }

    pub fn has_stored(&self, order: OrderId) -> bool {
        self.storage.contains_key(&order)
    }

    /// Whether the order is pending or stored here.
    pub fn holds(&self, order: OrderId) -> bool {
        self.pending.contains_key(&order) || self.storage.contains_key(&order)
    }

    /// Stored orders that have not been offered to anyone yet.
    pub fn unshared(&self) -> &IndexSet<OrderId> {
        &self.unshared
    }

    pub fn clear_unshared(&mut self) {
        self.unshared.clear();
    }

    /// Put an order straight into storage, bypassing acceptance and the pending table.
    pub fn seed_order(&mut self, order: OrderId, now: Round) -> Result<(), PolicyError> {
        if self.holds(order) {
            return Err(PolicyError::DuplicateSeed {
                peer: self.id,
                order,
            });
        }
        self.storage.insert(order, OrderInfo::seeded(order, now));
        self.unshared.insert(order);
        Ok(())
    }

    /// Offer an order to this peer.
    ///
    /// `hops` is the relay distance of this copy from the originating peer.
    /// Relays from a neighbor are credited or penalized according to the
    /// peer's incentive parameters. Offering the same order from the same
    /// source twice before a storing phase leaves the tables unchanged.
    pub fn receive_order<E: Engine>(
        &mut self,
        engine: &E,
        order: &Order,
        provenance: Provenance,
        hops: u32,
        now: Round,
    ) -> Result<Arrival, PolicyError> {
        let sender = provenance.sender();
        if let Some(sender) = sender {
            if !self.neighbors.contains_key(&sender) {
                return Err(PolicyError::NotNeighbor {
                    peer: self.id,
                    sender,
                });
            }
        }

        if !engine.accept_order(self, order, &provenance) {
            if let Some(sender) = sender {
                self.credit(sender, self.incentive.penalty_a);
            }
            return Ok(Arrival::Rejected);
        }

        if let Some(stored) = self.storage.get(&order.id) {
            if let Some(sender) = sender {
                let reward = if stored.provenance.sender() == Some(sender) {
                    self.incentive.reward_a
                } else {
                    self.incentive.reward_b
                };
                self.credit(sender, reward);
            }
            return Ok(Arrival::AlreadyStored);
        }

        if let Some(record) = self.pending.get_mut(&order.id) {
            let Some(sender) = sender else {
                return Ok(Arrival::Duplicate);
            };
            if !record.was_sent_by(sender) {
                record.extra_senders.push(sender);
                return Ok(Arrival::ExtraSender);
            }
            self.credit(sender, self.incentive.penalty_b);
            return Ok(Arrival::Duplicate);
        }

        trace!(peer = %self.id, order = %order.id, %provenance, hops, "Order pending");
        self.pending
            .insert(order.id, OrderInfo::pending(order.id, provenance, now, hops));
        Ok(Arrival::Pending)
    }

    /// Run the storing phase: every pending record is either stored or dropped.
    ///
    /// The pending table is empty afterwards whatever the engine decides.
    pub fn store_pending<E: Engine>(&mut self, engine: &E) -> StoreOutcome {
        let pending = std::mem::take(&mut self.pending);
        let mut outcome = StoreOutcome::default();

        for (id, mut info) in pending {
            if engine.store_order(self, &info) {
                if let Some(sender) = info.provenance.sender() {
                    self.credit(sender, self.incentive.reward_d);
                }
                for extra in info.extra_senders.clone() {
                    self.credit(extra, self.incentive.reward_e);
                }
                info.status = OrderStatus::Stored;
                self.storage.insert(id, info);
                self.unshared.insert(id);
                outcome.stored += 1;
            } else {
                for sender in info.senders().collect::<Vec<_>>() {
                    self.credit(sender, self.incentive.reward_c);
                }
                outcome.discarded += 1;
            }
        }

        outcome
    }

    /// Drop every record of `order`. Returns whether anything was removed.
    pub fn purge(&mut self, order: OrderId) -> bool {
        let pending = self.pending.shift_remove(&order).is_some();
        let stored = self.storage.shift_remove(&order).is_some();
        self.unshared.shift_remove(&order);
        pending || stored
    }

    /// Drop every record whose order is no longer valid in `book`.
    pub fn purge_invalid(&mut self, book: &OrderBook) -> usize {
        let before = self.pending.len() + self.storage.len();
        self.pending.retain(|id, _| book.is_valid(*id));
        self.storage.retain(|id, _| book.is_valid(*id));
        self.unshared.retain(|id| book.is_valid(*id));
        before - self.pending.len() - self.storage.len()
    }

    /// Drop every order relayed by `neighbor`.
    ///
    /// A pending record that other neighbors also relayed survives with the
    /// next sender promoted to primary.
    pub fn purge_relayed_by(&mut self, neighbor: PeerId) -> usize {
        let from_neighbor = Provenance::Neighbor(neighbor);
        let mut removed = 0;

        let stored: Vec<OrderId> = self
            .storage
            .values()
            .filter(|info| info.provenance == from_neighbor)
            .map(|info| info.order)
            .collect();
        for id in stored {
            self.storage.shift_remove(&id);
            self.unshared.shift_remove(&id);
            removed += 1;
        }

        self.pending.retain(|_, info| {
            info.extra_senders.retain(|sender| *sender != neighbor);
            if info.provenance != from_neighbor {
                return true;
            }
            if info.extra_senders.is_empty() {
                removed += 1;
                return false;
            }
            let next = info.extra_senders.remove(0);
            info.provenance = Provenance::Neighbor(next);
            true
        });

        removed
    }

    /// Check the peer-local invariants.
    pub fn check_invariants(&self, bounds: &NeighborBounds) -> Result<(), InvariantViolation> {
        if self.neighbors.contains_key(&self.id) {
            return Err(InvariantViolation::SelfLink { peer: self.id });
        }
        if self.neighbors.len() > bounds.max {
            return Err(InvariantViolation::NeighborOverflow {
                peer: self.id,
                count: self.neighbors.len(),
                max: bounds.max,
            });
        }
        if let Some(order) = self.pending.keys().find(|id| self.storage.contains_key(*id)) {
            return Err(InvariantViolation::DuplicateOrderRecord {
                peer: self.id,
                order: *order,
            });
        }
        Ok(())
    }

    /// Fail if the pending table is not empty.
    pub fn check_pending_cleared(&self) -> Result<(), InvariantViolation> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(InvariantViolation::PendingNotCleared {
                peer: self.id,
                count: self.pending.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_engine::{PermissiveEngine, RefusingEngine};
    use meshsim_types::InvalidReason;

    fn peer_with_neighbors(id: u64, neighbors: &[u64]) -> Peer {
        let mut peer = Peer::new(
            PeerId(id),
            PeerKind::Normal,
            Round(0),
            IncentiveParams::default(),
        );
        for n in neighbors {
            peer.attach(PeerId(*n), Round(0));
        }
        peer
    }

    fn order(id: u64) -> Order {
        Order::new(OrderId(id), Round(0), PeerId(99), 100)
    }

    #[test]
    fn test_external_arrival_is_idempotent() {
        let mut peer = peer_with_neighbors(0, &[]);
        let engine = PermissiveEngine;
        let o = order(1);

        let first = peer
            .receive_order(&engine, &o, Provenance::External, 0, Round(1))
            .unwrap();
        let snapshot: Vec<_> = peer.pending().cloned().collect();
        let second = peer
            .receive_order(&engine, &o, Provenance::External, 0, Round(1))
            .unwrap();

        assert_eq!(first, Arrival::Pending);
        assert_eq!(second, Arrival::Duplicate);
        assert_eq!(peer.pending().cloned().collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn test_internal_duplicate_is_penalized_once_recorded() {
        let mut peer = peer_with_neighbors(0, &[1]);
        let engine = PermissiveEngine;
        let o = order(1);
        let from = Provenance::Neighbor(PeerId(1));

        peer.receive_order(&engine, &o, from, 1, Round(1)).unwrap();
        let again = peer.receive_order(&engine, &o, from, 1, Round(1)).unwrap();

        assert_eq!(again, Arrival::Duplicate);
        assert_eq!(peer.pending_count(), 1);
        assert!(peer.pending_info(OrderId(1)).unwrap().extra_senders.is_empty());
        let penalty = IncentiveParams::default().penalty_b;
        assert_eq!(
            peer.neighbor(PeerId(1)).unwrap().current_contribution(),
            penalty
        );
    }

    #[test]
    fn test_second_sender_becomes_extra_sender() {
        let mut peer = peer_with_neighbors(0, &[1, 2]);
        let engine = PermissiveEngine;
        let o = order(1);

        peer.receive_order(&engine, &o, Provenance::Neighbor(PeerId(1)), 1, Round(1))
            .unwrap();
        let arrival = peer
            .receive_order(&engine, &o, Provenance::Neighbor(PeerId(2)), 2, Round(2))
            .unwrap();

        assert_eq!(arrival, Arrival::ExtraSender);
        let record = peer.pending_info(OrderId(1)).unwrap();
        assert_eq!(record.provenance, Provenance::Neighbor(PeerId(1)));
        assert_eq!(record.extra_senders, vec![PeerId(2)]);
    }

    #[test]
    fn test_non_neighbor_sender_is_rejected() {
        let mut peer = peer_with_neighbors(0, &[1]);
        let result = peer.receive_order(
            &PermissiveEngine,
            &order(1),
            Provenance::Neighbor(PeerId(5)),
            1,
            Round(1),
        );
        assert_eq!(
            result,
            Err(PolicyError::NotNeighbor {
                peer: PeerId(0),
                sender: PeerId(5)
            })
        );
    }

    #[test]
    fn test_refused_order_penalizes_sender() {
        let mut peer = peer_with_neighbors(0, &[1]);
        let incentive = IncentiveParams {
            penalty_a: -2.0,
            ..Default::default()
        };
        peer.incentive = incentive;

        let arrival = peer
            .receive_order(
                &RefusingEngine,
                &order(1),
                Provenance::Neighbor(PeerId(1)),
                1,
                Round(1),
            )
            .unwrap();

        assert_eq!(arrival, Arrival::Rejected);
        assert_eq!(peer.pending_count(), 0);
        assert_eq!(peer.neighbor(PeerId(1)).unwrap().current_contribution(), -2.0);
    }

    #[test]
    fn test_store_pending_credits_senders_and_clears() {
        let mut peer = peer_with_neighbors(0, &[1, 2]);
        peer.incentive = IncentiveParams {
            reward_d: 1.0,
            reward_e: 0.25,
            ..Default::default()
        };
        let engine = PermissiveEngine;
        let o = order(1);
        peer.receive_order(&engine, &o, Provenance::Neighbor(PeerId(1)), 1, Round(1))
            .unwrap();
        peer.receive_order(&engine, &o, Provenance::Neighbor(PeerId(2)), 1, Round(1))
            .unwrap();

        let outcome = peer.store_pending(&engine);

        assert_eq!(outcome, StoreOutcome { stored: 1, discarded: 0 });
        assert!(peer.check_pending_cleared().is_ok());
        assert!(peer.has_stored(OrderId(1)));
        assert!(peer.unshared().contains(&OrderId(1)));
        assert_eq!(peer.stored_info(OrderId(1)).unwrap().status, OrderStatus::Stored);
        assert_eq!(peer.neighbor(PeerId(1)).unwrap().current_contribution(), 1.0);
        assert_eq!(peer.neighbor(PeerId(2)).unwrap().current_contribution(), 0.25);
    }

    #[test]
    fn test_already_stored_rewards() {
        let mut peer = peer_with_neighbors(0, &[1, 2]);
        peer.incentive = IncentiveParams {
            reward_a: 0.5,
            reward_b: 0.1,
            reward_d: 0.0,
            ..Default::default()
        };
        let engine = PermissiveEngine;
        let o = order(1);
        peer.receive_order(&engine, &o, Provenance::Neighbor(PeerId(1)), 1, Round(1))
            .unwrap();
        peer.store_pending(&engine);

        let same = peer
            .receive_order(&engine, &o, Provenance::Neighbor(PeerId(1)), 1, Round(2))
            .unwrap();
        let other = peer
            .receive_order(&engine, &o, Provenance::Neighbor(PeerId(2)), 1, Round(2))
            .unwrap();

        assert_eq!(same, Arrival::AlreadyStored);
        assert_eq!(other, Arrival::AlreadyStored);
        assert_eq!(peer.pending_count(), 0);
        assert_eq!(peer.neighbor(PeerId(1)).unwrap().current_contribution(), 0.5);
        assert_eq!(peer.neighbor(PeerId(2)).unwrap().current_contribution(), 0.1);
    }

    #[test]
    fn test_purge_relayed_by_promotes_extra_sender() {
        let mut peer = peer_with_neighbors(0, &[1, 2]);
        let engine = PermissiveEngine;
        peer.receive_order(&engine, &order(1), Provenance::Neighbor(PeerId(1)), 1, Round(1))
            .unwrap();
        peer.store_pending(&engine);
        peer.receive_order(&engine, &order(2), Provenance::Neighbor(PeerId(1)), 1, Round(2))
            .unwrap();
        peer.receive_order(&engine, &order(2), Provenance::Neighbor(PeerId(2)), 1, Round(2))
            .unwrap();
        peer.receive_order(&engine, &order(3), Provenance::Neighbor(PeerId(1)), 1, Round(2))
            .unwrap();

        let removed = peer.purge_relayed_by(PeerId(1));

        assert_eq!(removed, 2);
        assert!(!peer.has_stored(OrderId(1)));
        assert!(!peer.unshared().contains(&OrderId(1)));
        assert!(peer.pending_info(OrderId(3)).is_none());
        let survivor = peer.pending_info(OrderId(2)).unwrap();
        assert_eq!(survivor.provenance, Provenance::Neighbor(PeerId(2)));
        assert!(survivor.extra_senders.is_empty());
    }

    #[test]
    fn test_purge_invalid_uses_order_book() {
        let mut book = OrderBook::new();
        let keep = book.create(Round(0), PeerId(9), 100);
        let drop = book.create(Round(0), PeerId(9), 100);

        let mut peer = peer_with_neighbors(0, &[]);
        peer.seed_order(keep, Round(0)).unwrap();
        peer.seed_order(drop, Round(0)).unwrap();
        book.invalidate(drop, InvalidReason::Cancelled).unwrap();

        assert_eq!(peer.purge_invalid(&book), 1);
        assert_eq!(peer.purge_invalid(&book), 0);
        assert!(peer.has_stored(keep));
        assert!(!peer.holds(drop));
    }

    #[test]
    fn test_seed_rejects_duplicates() {
        let mut peer = peer_with_neighbors(0, &[]);
        peer.seed_order(OrderId(4), Round(0)).unwrap();
        assert_eq!(
            peer.seed_order(OrderId(4), Round(0)),
            Err(PolicyError::DuplicateSeed {
                peer: PeerId(0),
                order: OrderId(4)
            })
        );
    }

    #[test]
    fn test_overflow_is_detected() {
        let peer = peer_with_neighbors(0, &[1, 2, 3]);
        let bounds = NeighborBounds::new(1, 2).unwrap();
        assert_eq!(
            peer.check_invariants(&bounds),
            Err(InvariantViolation::NeighborOverflow {
                peer: PeerId(0),
                count: 3,
                max: 2
            })
        );
    }
}
