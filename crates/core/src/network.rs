//! Peer arena and neighbor graph.
//!
//! Peers never reference each other directly. Links are pairs of
//! [`Neighbor`](meshsim_types::Neighbor) records keyed by [`PeerId`], and every
//! change to them goes through [`Network::link`], [`Network::unlink`] or
//! [`Network::remove_peer`], which always update both sides before returning.

use crate::{Arrival, Engine, InvariantViolation, OrderBook, Peer, PolicyError};
use indexmap::IndexMap;
use meshsim_types::{
    IncentiveParams, NeighborBounds, OrderId, PeerId, PeerKind, Provenance, Round,
};
use std::collections::HashSet;
use tracing::{debug, trace};

/// All live peers, in id order.
#[derive(Debug, Default)]
pub struct Network {
    peers: IndexMap<PeerId, Peer>,
    next_id: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new isolated peer and return its id.
    pub fn spawn(&mut self, kind: PeerKind, birth: Round, incentive: IncentiveParams) -> PeerId {
        let id = PeerId(self.next_id);
        self.next_id += 1;
        self.peers.insert(id, Peer::new(id, kind, birth, incentive));
        trace!(peer = %id, %kind, birth = birth.0, "Peer spawned");
        id
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    /// Look up a peer, failing if it does not exist.
    pub fn peer(&self, id: PeerId) -> Result<&Peer, PolicyError> {
        self.peers.get(&id).ok_or(PolicyError::UnknownPeer(id))
    }

    pub fn peer_mut(&mut self, id: PeerId) -> Result<&mut Peer, PolicyError> {
        self.peers.get_mut(&id).ok_or(PolicyError::UnknownPeer(id))
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Live peer ids in ascending order.
    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Mutable access to every peer. Links cannot be changed through a `&mut Peer`.
    pub fn peers_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.values_mut()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Number of peers ever created.
    pub fn spawned(&self) -> u64 {
        self.next_id
    }

    pub fn are_linked(&self, a: PeerId, b: PeerId) -> bool {
        self.peers.get(&a).is_some_and(|peer| peer.is_neighbor(b))
    }

    /// Link two peers.
    ///
    /// Capacity is not checked here; callers decide whether both sides accept.
    pub fn link(&mut self, a: PeerId, b: PeerId, now: Round) -> Result<(), PolicyError> {
        if a == b {
            return Err(PolicyError::SelfLink(a));
        }
        if !self.peers.contains_key(&b) {
            return Err(PolicyError::UnknownPeer(b));
        }
        if self.peer(a)?.is_neighbor(b) {
            return Err(PolicyError::LinkExists { a, b });
        }

        self.peer_mut(a)?.attach(b, now);
        self.peer_mut(b)?.attach(a, now);
        debug!(%a, %b, round = now.0, "Link established");
        Ok(())
    }

    /// Tear down the link between two peers.
    pub fn unlink(&mut self, a: PeerId, b: PeerId) -> Result<(), PolicyError> {
        if !self.peers.contains_key(&b) {
            return Err(PolicyError::UnknownPeer(b));
        }
        if self.peer_mut(a)?.detach(b).is_none() {
            return Err(PolicyError::NoLink { a, b });
        }
        self.peer_mut(b)?.detach(a);
        debug!(%a, %b, "Link removed");
        Ok(())
    }

    /// Remove a peer and every link it takes part in.
    pub fn remove_peer(&mut self, id: PeerId) -> Result<Peer, PolicyError> {
        let neighbors = self.peer(id)?.neighbor_ids();
        for neighbor in &neighbors {
            if let Some(peer) = self.peers.get_mut(neighbor) {
                peer.detach(id);
            }
        }
        let mut peer = self
            .peers
            .shift_remove(&id)
            .ok_or(PolicyError::UnknownPeer(id))?;
        for neighbor in neighbors {
            peer.detach(neighbor);
        }
        debug!(peer = %id, "Peer removed");
        Ok(peer)
    }

    /// Relay a stored order from `from` to its neighbor `to`.
    ///
    /// The recipient applies its own acceptance; the copy's hop count is one
    /// more than the sender's.
    pub fn deliver<E: Engine>(
        &mut self,
        engine: &E,
        book: &OrderBook,
        from: PeerId,
        to: PeerId,
        order: OrderId,
        now: Round,
    ) -> Result<Arrival, PolicyError> {
        let order = book.order(order)?;
        let sender = self.peer(from)?;
        if !sender.is_neighbor(to) {
            return Err(PolicyError::NoLink { a: from, b: to });
        }
        let hops = sender
            .stored_info(order.id)
            .map(|info| info.hops + 1)
            .unwrap_or(1);

        self.peer_mut(to)?
            .receive_order(engine, order, Provenance::Neighbor(from), hops, now)
    }

    /// Every order id pending or stored at some live peer.
    pub fn held_orders(&self) -> HashSet<OrderId> {
        self.peers
            .values()
            .flat_map(|peer| {
                peer.pending()
                    .chain(peer.stored())
                    .map(|info| info.order)
            })
            .collect()
    }

    /// Number of live peers storing `order`.
    pub fn replica_count(&self, order: OrderId) -> usize {
        self.peers
            .values()
            .filter(|peer| peer.has_stored(order))
            .count()
    }

    /// Check the bilateral invariant and every peer's local invariants.
    pub fn check_invariants(&self, bounds: &NeighborBounds) -> Result<(), InvariantViolation> {
        for peer in self.peers.values() {
            peer.check_invariants(bounds)?;
            for neighbor in peer.neighbors() {
                let Some(other) = self.peers.get(&neighbor.peer) else {
                    return Err(InvariantViolation::DanglingNeighbor {
                        peer: peer.id(),
                        neighbor: neighbor.peer,
                    });
                };
                if !other.is_neighbor(peer.id()) {
                    return Err(InvariantViolation::UnilateralLink {
                        holder: peer.id(),
                        missing: neighbor.peer,
                    });
                }
            }
        }
        Ok(())
    }

    /// Fail if any live peer still holds an order `book` considers invalid.
    pub fn check_no_invalid_orders(&self, book: &OrderBook) -> Result<(), InvariantViolation> {
        for peer in self.peers.values() {
            if let Some(info) = peer
                .pending()
                .chain(peer.stored())
                .find(|info| !book.is_valid(info.order))
            {
                return Err(InvariantViolation::InvalidOrderHeld {
                    peer: peer.id(),
                    order: info.order,
                });
            }
        }
        Ok(())
    }
}
