//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Peer identifier.
///
/// Identifiers are assigned in creation order and never reused within a run,
/// so sorting by id is the same as sorting by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

/// Order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order({})", self.0)
    }
}

/// Discrete simulation time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Round(pub u64);

impl Round {
    /// The round at which the initial population is created.
    pub const GENESIS: Self = Round(0);

    /// Get the next round.
    pub fn next(self) -> Self {
        Round(self.0 + 1)
    }

    /// Number of rounds elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn since(self, earlier: Round) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Whether this round closes a batch period of `period` rounds.
    ///
    /// Genesis never closes a batch. A period of zero disables batching.
    pub fn closes_batch(self, period: u64) -> bool {
        period > 0 && self.0 > 0 && self.0 % period == 0
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Round({})", self.0)
    }
}

/// Behavioral class of a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    /// Relays and stores orders, may originate orders.
    #[default]
    Normal,

    /// Listens to orders but never shares and never originates any.
    FreeRider,
}

impl PeerKind {
    /// Whether this kind of peer shares orders with its neighbors.
    pub fn shares(self) -> bool {
        matches!(self, PeerKind::Normal)
    }
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerKind::Normal => write!(f, "normal"),
            PeerKind::FreeRider => write!(f, "free_rider"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_arithmetic() {
        let r = Round(7);
        assert_eq!(r.next(), Round(8));
        assert_eq!(r.since(Round(2)), 5);
        assert_eq!(Round(2).since(r), 0);
    }

    #[test]
    fn test_batch_boundaries() {
        assert!(!Round::GENESIS.closes_batch(10));
        assert!(!Round(9).closes_batch(10));
        assert!(Round(10).closes_batch(10));
        assert!(Round(20).closes_batch(10));
        assert!(!Round(10).closes_batch(0));
    }

    #[test]
    fn test_identifier_display() {
        assert_eq!(PeerId(3).to_string(), "Peer(3)");
        assert_eq!(OrderId(12).to_string(), "Order(12)");
        assert_eq!(PeerKind::FreeRider.to_string(), "free_rider");
    }
}
