//! Neighbor repair.
//!
//! A peer short of neighbors asks the engine for candidates among live peers it
//! is not linked to, and invites them. A candidate accepts unless it is already
//! at the maximum. Invitations continue over the shrinking candidate pool until
//! the repair goal is reached or the pool runs dry.

use meshsim_core::{Engine, Network, PolicyError};
use meshsim_types::{NeighborBounds, PeerId, Round};
use tracing::debug;

/// Try to bring `requester` up to `goal` neighbors. Returns the number of links added.
///
/// Each selection asks for as many candidates as the requester has free slots,
/// so a single pass can overshoot `goal` up to the maximum.
pub(crate) fn repair<E: Engine>(
    network: &mut Network,
    engine: &E,
    requester: PeerId,
    bounds: &NeighborBounds,
    goal: usize,
    now: Round,
    rng: &mut impl rand::Rng,
) -> Result<usize, PolicyError> {
    let peer = network.peer(requester)?;
    let count = peer.neighbor_count();
    let goal = goal.min(bounds.max);
    if count >= goal {
        return Ok(0);
    }

    let minimum = goal - count;
    let mut selection = bounds.max - count;
    let mut pool: Vec<PeerId> = network
        .ids()
        .into_iter()
        .filter(|id| *id != requester && !peer.is_neighbor(*id))
        .collect();
    let mut added = 0;

    while added < minimum && selection > 0 && !pool.is_empty() {
        let picks = engine.recommend_neighbors(network.peer(requester)?, &pool, selection, rng);
        if picks.is_empty() {
            break;
        }

        let mut added_now = 0;
        for candidate in &picks {
            if !pool.contains(candidate) {
                return Err(PolicyError::InvalidRecommendation {
                    requester,
                    candidate: *candidate,
                });
            }
            if !bounds.has_room(network.peer(requester)?.neighbor_count()) {
                break;
            }
            if network.are_linked(requester, *candidate) {
                continue;
            }
            if bounds.has_room(network.peer(*candidate)?.neighbor_count()) {
                network.link(requester, *candidate, now)?;
                added_now += 1;
            }
        }

        added += added_now;
        selection = selection.saturating_sub(added_now);
        pool.retain(|id| !picks.contains(id));
    }

    if added > 0 {
        debug!(
            peer = %requester,
            added,
            neighbors = count + added,
            "Neighbor repair"
        );
    }
    Ok(added)
}
