//! Batch pipeline: storing, scoring, pruning and sharing.
//!
//! Each phase runs for every live peer before the next phase starts:
//!
//! ```text
//! store_all ─► score_all ─► prune_all ─► rotate_all ─► share_all
//! ```
//!
//! Storing completes everywhere before anything is shared, so a shared order
//! always lands in the recipient's pending table and waits for the next batch.
//! Contribution histories rotate before sharing, so credits earned by relays
//! count toward the next batch for every peer alike. Together these make the
//! outcome independent of the order in which peers are visited.

use meshsim_core::{
    Arrival, Engine, InvariantViolation, Network, OrderBook, PolicyError, StoreOutcome,
};
use meshsim_types::{OrderId, PeerId, PruneConfig, Round};
use tracing::debug;

/// Totals from one sharing phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShareOutcome {
    /// (order, beneficiary) pairs transmitted.
    pub transmitted: usize,

    /// Transmissions that created or joined a pending record.
    pub accepted: usize,

    /// Transmissions the recipient refused or already had.
    pub ignored: usize,
}

/// Totals from one pruning phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub links_removed: usize,
    pub orders_purged: usize,
}

/// Storing phase for every peer.
///
/// Fails if any pending table is non-empty afterwards.
pub(crate) fn store_all<E: Engine>(
    network: &mut Network,
    engine: &E,
) -> Result<StoreOutcome, InvariantViolation> {
    let mut total = StoreOutcome::default();
    for peer in network.peers_mut() {
        let outcome = peer.store_pending(engine);
        peer.check_pending_cleared()?;
        total.stored += outcome.stored;
        total.discarded += outcome.discarded;
    }
    Ok(total)
}

/// Recompute every neighbor score.
pub(crate) fn score_all<E: Engine>(
    network: &mut Network,
    engine: &E,
    now: Round,
) -> Result<(), PolicyError> {
    for id in network.ids() {
        let scores = engine.score_neighbors(network.peer(id)?, now);
        let peer = network.peer_mut(id)?;
        for (neighbor, score) in scores {
            peer.neighbor_mut(neighbor)
                .ok_or(PolicyError::UnknownNeighbor { peer: id, neighbor })?
                .score = score;
        }
    }
    Ok(())
}

/// Tear down links whose score stayed below the threshold for too long.
///
/// Every peer updates its low-score counters first; links are removed
/// afterwards, so a link counted as lazy by both ends is removed once.
pub(crate) fn prune_all(
    network: &mut Network,
    prune: &PruneConfig,
) -> Result<PruneOutcome, PolicyError> {
    let mut doomed: Vec<(PeerId, PeerId)> = Vec::new();

    for peer in network.peers_mut() {
        let id = peer.id();
        for neighbor_id in peer.neighbor_ids() {
            let Some(neighbor) = peer.neighbor_mut(neighbor_id) else {
                continue;
            };
            if neighbor.score < prune.threshold {
                neighbor.low_score_batches += 1;
            } else {
                neighbor.low_score_batches = 0;
            }
            if neighbor.low_score_batches >= prune.duration {
                doomed.push((id, neighbor_id));
            }
        }
    }

    let mut outcome = PruneOutcome::default();
    for (pruner, pruned) in doomed {
        // The other end may have pruned this link already.
        if network.are_linked(pruner, pruned) {
            network.unlink(pruner, pruned)?;
            outcome.links_removed += 1;
            debug!(%pruner, %pruned, "Neighbor pruned");
        }
        if prune.purge_orders {
            outcome.orders_purged += network.peer_mut(pruner)?.purge_relayed_by(pruned);
        }
    }
    Ok(outcome)
}

/// Open a new contribution slot for every neighbor record.
pub(crate) fn rotate_all(network: &mut Network) {
    for peer in network.peers_mut() {
        peer.rotate_contributions();
    }
}

/// Sharing phase for every peer.
pub(crate) fn share_all<E: Engine>(
    network: &mut Network,
    engine: &E,
    book: &OrderBook,
    now: Round,
    rng: &mut impl rand::Rng,
) -> Result<ShareOutcome, PolicyError> {
    let mut outcome = ShareOutcome::default();

    for id in network.ids() {
        let transmissions = plan_sharing(network, engine, id, now, rng)?;
        network.peer_mut(id)?.clear_unshared();

        for (order, beneficiary) in transmissions {
            outcome.transmitted += 1;
            match network.deliver(engine, book, id, beneficiary, order, now)? {
                Arrival::Pending | Arrival::ExtraSender => outcome.accepted += 1,
                Arrival::Rejected | Arrival::AlreadyStored | Arrival::Duplicate => {
                    outcome.ignored += 1
                }
            }
        }
    }

    Ok(outcome)
}

/// Decide which (order, beneficiary) pairs `id` transmits this batch.
fn plan_sharing<E: Engine>(
    network: &Network,
    engine: &E,
    id: PeerId,
    now: Round,
    rng: &mut impl rand::Rng,
) -> Result<Vec<(OrderId, PeerId)>, PolicyError> {
    let peer = network.peer(id)?;
    if !peer.kind().shares() || peer.neighbor_count() == 0 {
        return Ok(Vec::new());
    }

    let orders = engine.orders_to_share(peer, rng);
    let beneficiaries = engine.beneficiaries(peer, now, rng);

    for order in &orders {
        if !peer.has_stored(*order) {
            return Err(PolicyError::NotStored {
                peer: id,
                order: *order,
            });
        }
    }
    for beneficiary in &beneficiaries {
        if !peer.is_neighbor(*beneficiary) {
            return Err(PolicyError::UnknownNeighbor {
                peer: id,
                neighbor: *beneficiary,
            });
        }
    }

    let mut pairs = Vec::with_capacity(orders.len() * beneficiaries.len());
    for order in &orders {
        for beneficiary in &beneficiaries {
            if engine.should_share(peer, *order, *beneficiary) {
                pairs.push((*order, *beneficiary));
            }
        }
    }
    Ok(pairs)
}
