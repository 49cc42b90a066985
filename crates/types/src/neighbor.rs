//! Peer-local neighbor records.

use crate::{PeerId, Round};
use std::collections::VecDeque;

/// One side of a bilateral link, as seen by the peer holding it.
///
/// Each neighbor carries a fixed-length history of per-batch contributions.
/// The back of the history is the batch in progress; rewards and penalties for
/// the neighbor's relays are credited there, and the history rotates once the
/// peer has finished sharing for the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// The linked peer.
    pub peer: PeerId,

    /// Round the link was established.
    pub established: Round,

    /// Score from the most recent scoring phase.
    pub score: f64,

    /// Consecutive scoring phases in which `score` fell below the prune threshold.
    pub low_score_batches: u32,

    contributions: VecDeque<f64>,
}

impl Neighbor {
    /// Create a neighbor record with a zeroed contribution history.
    ///
    /// A `history_len` of zero is treated as one.
    pub fn new(peer: PeerId, established: Round, history_len: usize) -> Self {
        Self {
            peer,
            established,
            score: 0.0,
            low_score_batches: 0,
            contributions: std::iter::repeat(0.0).take(history_len.max(1)).collect(),
        }
    }

    /// Add `amount` to the contribution of the batch in progress.
    pub fn credit(&mut self, amount: f64) {
        if let Some(current) = self.contributions.back_mut() {
            *current += amount;
        }
    }

    /// Contribution of the batch in progress.
    pub fn current_contribution(&self) -> f64 {
        self.contributions.back().copied().unwrap_or_default()
    }

    /// Contribution history, oldest batch first.
    pub fn contributions(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.contributions.iter().copied()
    }

    /// Close the batch in progress: drop the oldest entry and open a new one.
    pub fn rotate(&mut self) {
        self.contributions.pop_front();
        self.contributions.push_back(0.0);
    }

    /// Rounds since the link was established.
    pub fn age(&self, now: Round) -> u64 {
        now.since(self.established)
    }
}
