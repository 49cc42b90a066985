//! Error types for the core state.

use meshsim_types::{OrderId, PeerId};
use thiserror::Error;

/// A policy handed the core a reference it cannot honor.
///
/// These indicate a misconfigured scenario or engine candidate and are
/// surfaced at the call site that received the bad reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    #[error("{peer} received an order from non-neighbor {sender}")]
    NotNeighbor { peer: PeerId, sender: PeerId },

    #[error("{0} cannot link to itself")]
    SelfLink(PeerId),

    #[error("{a} and {b} are already linked")]
    LinkExists { a: PeerId, b: PeerId },

    #[error("{a} and {b} are not linked")]
    NoLink { a: PeerId, b: PeerId },

    #[error("{peer} already holds {order}")]
    DuplicateSeed { peer: PeerId, order: OrderId },

    #[error("{peer} has no neighbor {neighbor}")]
    UnknownNeighbor { peer: PeerId, neighbor: PeerId },

    #[error("{peer} cannot share {order}: not in its storage")]
    NotStored { peer: PeerId, order: OrderId },

    #[error("{candidate} was recommended to {requester} but is not an eligible candidate")]
    InvalidRecommendation { requester: PeerId, candidate: PeerId },
}

/// A broken structural invariant.
///
/// Invariant violations are defects in the simulator itself and are never
/// repaired at run time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("unilateral link: {holder} lists {missing} but not the reverse")]
    UnilateralLink { holder: PeerId, missing: PeerId },

    #[error("{peer} lists departed peer {neighbor} as a neighbor")]
    DanglingNeighbor { peer: PeerId, neighbor: PeerId },

    #[error("{peer} lists itself as a neighbor")]
    SelfLink { peer: PeerId },

    #[error("{peer} has {count} neighbors, above the maximum of {max}")]
    NeighborOverflow { peer: PeerId, count: usize, max: usize },

    #[error("{peer} holds {order} both pending and stored")]
    DuplicateOrderRecord { peer: PeerId, order: OrderId },

    #[error("{peer} still has {count} pending orders after storing")]
    PendingNotCleared { peer: PeerId, count: usize },

    #[error("{peer} still holds invalidated {order}")]
    InvalidOrderHeld { peer: PeerId, order: OrderId },
}
