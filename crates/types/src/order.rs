//! Order records and validity state.

use crate::{OrderId, PeerId, Round};
use std::fmt;

/// An order circulating in the mesh.
///
/// The terms are immutable once created. Validity is not part of the order
/// itself; it lives in the global order book, which is the single ground truth
/// every peer consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Unique order id.
    pub id: OrderId,

    /// Round in which the order entered the mesh.
    pub birth: Round,

    /// Peer that originated the order.
    pub creator: PeerId,

    /// Lifetime in rounds. The order expires once `now - birth >= expiration`.
    pub expiration: u64,
}

impl Order {
    /// Create a new order.
    pub fn new(id: OrderId, birth: Round, creator: PeerId, expiration: u64) -> Self {
        Self {
            id,
            birth,
            creator,
            expiration,
        }
    }

    /// Age of the order at `now`.
    pub fn age(&self, now: Round) -> u64 {
        now.since(self.birth)
    }

    /// Whether the order has outlived its expiration at `now`.
    pub fn is_expired(&self, now: Round) -> bool {
        self.age(now) >= self.expiration
    }
}

/// Why an order stopped being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// Cancelled by its owner.
    Cancelled,

    /// Lived past its expiration.
    Expired,

    /// Filled.
    Settled,

    /// No peer holds a replica any more.
    Orphaned,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Cancelled => write!(f, "cancelled"),
            InvalidReason::Expired => write!(f, "expired"),
            InvalidReason::Settled => write!(f, "settled"),
            InvalidReason::Orphaned => write!(f, "orphaned"),
        }
    }
}

/// Validity of an order in the global order book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validity {
    #[default]
    Valid,
    Invalid(InvalidReason),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}
