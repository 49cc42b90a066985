//! Configurable decision engine.
//!
//! Each decision point of [`Engine`] is a small tagged enum so that a whole
//! engine can be described in a config file:
//!
//! ```toml
//! [engine.share]
//! method = "all_new_selected_old"
//! max_to_share = 5000
//! old_share_prob = 0.5
//!
//! [engine.beneficiaries]
//! method = "tit_for_tat"
//! baby_ending_age = 0
//! mutual_helpers = 3
//! optimistic_choices = 1
//! ```

use meshsim_core::{Engine, Peer};
use meshsim_types::{NeighborBounds, Order, OrderId, OrderInfo, PeerId, Provenance, Round};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::CandidateError;

// ═══════════════════════════════════════════════════════════════════════════
// Policy enums
// ═══════════════════════════════════════════════════════════════════════════

/// Admission of arriving orders.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AcceptPolicy {
    #[default]
    Always,
    Never,
    /// Accept while fewer than `limit` orders are pending.
    MaxPending { limit: usize },
}

/// Admission of pending records into storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum StorePolicy {
    /// Store every pending record.
    #[default]
    First,
    /// Store while the peer holds fewer than `max_orders` orders.
    Capacity { max_orders: usize },
}

/// Which stored orders are offered in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SharePolicy {
    /// Every stored order.
    All,
    /// Orders stored since the last batch first, up to `max_to_share`; the
    /// remaining quota goes to a random `old_share_prob` fraction of older ones.
    AllNewSelectedOld {
        max_to_share: usize,
        old_share_prob: f64,
    },
}

impl Default for SharePolicy {
    fn default() -> Self {
        Self::AllNewSelectedOld {
            max_to_share: 5000,
            old_share_prob: 0.5,
        }
    }
}

/// Neighbor scoring from contribution histories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScorePolicy {
    /// Weighted sum of the contribution slots, oldest slot first.
    Weighted { weights: Vec<f64> },
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self::Weighted {
            weights: vec![1.0, 1.0, 1.0],
        }
    }
}

/// Which neighbors receive a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BeneficiaryPolicy {
    /// Every neighbor.
    All,
    /// Young peers pick at random. Older peers pick their best scorers plus a
    /// few random others.
    TitForTat {
        baby_ending_age: u64,
        mutual_helpers: usize,
        optimistic_choices: usize,
    },
}

impl Default for BeneficiaryPolicy {
    fn default() -> Self {
        Self::TitForTat {
            baby_ending_age: 0,
            mutual_helpers: 3,
            optimistic_choices: 1,
        }
    }
}

/// Neighbor recommendation during repair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RecommendPolicy {
    /// Uniform sample of the candidate pool.
    #[default]
    Random,
}

/// When a peer looks for new neighbors, and how many it aims for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairTrigger {
    /// Repair below the minimum, aiming at the minimum.
    #[default]
    BelowMin,
    /// Repair below the maximum, aiming at the maximum.
    BelowMax,
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine config
// ═══════════════════════════════════════════════════════════════════════════

/// Full description of a [`PolicyEngine`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub accept: AcceptPolicy,
    pub store: StorePolicy,
    pub share: SharePolicy,
    pub score: ScorePolicy,
    pub beneficiaries: BeneficiaryPolicy,
    pub recommend: RecommendPolicy,
    pub repair: RepairTrigger,
}

impl EngineConfig {
    /// Accept, store and share everything with every neighbor.
    pub fn flooding() -> Self {
        Self {
            share: SharePolicy::All,
            beneficiaries: BeneficiaryPolicy::All,
            ..Self::default()
        }
    }

    pub fn with_accept(mut self, accept: AcceptPolicy) -> Self {
        self.accept = accept;
        self
    }

    pub fn with_store(mut self, store: StorePolicy) -> Self {
        self.store = store;
        self
    }

    pub fn with_share(mut self, share: SharePolicy) -> Self {
        self.share = share;
        self
    }

    pub fn with_score(mut self, score: ScorePolicy) -> Self {
        self.score = score;
        self
    }

    pub fn with_beneficiaries(mut self, beneficiaries: BeneficiaryPolicy) -> Self {
        self.beneficiaries = beneficiaries;
        self
    }

    pub fn with_repair(mut self, repair: RepairTrigger) -> Self {
        self.repair = repair;
        self
    }

    pub fn validate(&self) -> Result<(), CandidateError> {
        if let SharePolicy::AllNewSelectedOld { old_share_prob, .. } = self.share {
            if !(0.0..=1.0).contains(&old_share_prob) {
                return Err(CandidateError::Probability {
                    name: "old_share_prob",
                    value: old_share_prob,
                });
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════════

/// [`Engine`] assembled from an [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    config: EngineConfig,
}

impl PolicyEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Pick `amount` items of `items` at random, keeping their relative order.
fn sample<T: Copy>(rng: &mut impl Rng, items: &[T], amount: usize) -> Vec<T> {
    let amount = amount.min(items.len());
    let mut picked = index::sample(rng, items.len(), amount).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| items[i]).collect()
}

impl Engine for PolicyEngine {
    fn accept_order(&self, peer: &Peer, _order: &Order, _provenance: &Provenance) -> bool {
        match self.config.accept {
            AcceptPolicy::Always => true,
            AcceptPolicy::Never => false,
            AcceptPolicy::MaxPending { limit } => peer.pending_count() < limit,
        }
    }

    fn store_order(&self, peer: &Peer, _pending: &OrderInfo) -> bool {
        match self.config.store {
            StorePolicy::First => true,
            StorePolicy::Capacity { max_orders } => peer.stored_count() < max_orders,
        }
    }

    fn score_neighbors(&self, peer: &Peer, _now: Round) -> Vec<(PeerId, f64)> {
        let ScorePolicy::Weighted { weights } = &self.config.score;
        peer.neighbors()
            .map(|neighbor| {
                let score: f64 = neighbor
                    .contributions()
                    .zip(weights)
                    .map(|(contribution, weight)| contribution * weight)
                    .sum();
                (neighbor.peer, score)
            })
            .collect()
    }

    fn orders_to_share(&self, peer: &Peer, rng: &mut impl Rng) -> Vec<OrderId> {
        match self.config.share {
            SharePolicy::All => peer.stored().map(|info| info.order).collect(),
            SharePolicy::AllNewSelectedOld {
                max_to_share,
                old_share_prob,
            } => {
                let (new, old): (Vec<OrderId>, Vec<OrderId>) = peer
                    .stored()
                    .map(|info| info.order)
                    .partition(|order| peer.unshared().contains(order));

                let mut chosen = sample(rng, &new, max_to_share);
                let quota = max_to_share - chosen.len();
                let wanted = (old.len() as f64 * old_share_prob).round() as usize;
                chosen.extend(sample(rng, &old, quota.min(wanted)));
                chosen
            }
        }
    }

    fn beneficiaries(&self, peer: &Peer, now: Round, rng: &mut impl Rng) -> Vec<PeerId> {
        match self.config.beneficiaries {
            BeneficiaryPolicy::All => peer.neighbor_ids(),
            BeneficiaryPolicy::TitForTat {
                baby_ending_age,
                mutual_helpers,
                optimistic_choices,
            } => {
                let ids = peer.neighbor_ids();
                if peer.age(now) <= baby_ending_age {
                    return sample(rng, &ids, mutual_helpers + optimistic_choices);
                }

                let mut ranked: Vec<(PeerId, f64)> =
                    peer.neighbors().map(|n| (n.peer, n.score)).collect();
                // Stable: equal scores keep link order.
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

                // Trailing zero scores are dropped from the helpers. A penalized
                // neighbor with a negative score still fills a helper slot.
                let mut mutual = mutual_helpers.min(ranked.len());
                while mutual > 0 && ranked[mutual - 1].1 == 0.0 {
                    mutual -= 1;
                }

                let mut chosen: Vec<PeerId> = ranked[..mutual].iter().map(|(id, _)| *id).collect();
                let rest: Vec<PeerId> = ranked[mutual..].iter().map(|(id, _)| *id).collect();
                chosen.extend(sample(rng, &rest, optimistic_choices));
                chosen
            }
        }
    }

    fn recommend_neighbors(
        &self,
        _requester: &Peer,
        pool: &[PeerId],
        count: usize,
        rng: &mut impl Rng,
    ) -> Vec<PeerId> {
        match self.config.recommend {
            RecommendPolicy::Random => {
                let amount = count.min(pool.len());
                index::sample(rng, pool.len(), amount)
                    .into_iter()
                    .map(|i| pool[i])
                    .collect()
            }
        }
    }

    fn needs_repair(&self, peer: &Peer, bounds: &NeighborBounds) -> bool {
        peer.neighbor_count() < self.repair_goal(bounds)
    }

    fn repair_goal(&self, bounds: &NeighborBounds) -> usize {
        match self.config.repair {
            RepairTrigger::BelowMin => bounds.min,
            RepairTrigger::BelowMax => bounds.max,
        }
    }
}
