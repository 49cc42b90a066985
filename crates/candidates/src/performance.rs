//! Measurements over the live population.

use std::collections::HashMap;

use meshsim_core::{Measurement, Measurements, Peer, Performance, SimView};
use meshsim_types::{OrderId, PeerKind, Round};
use serde::{Deserialize, Serialize};

use crate::CandidateError;

/// Measurement names produced by [`MeshPerformance`].
pub mod names {
    pub const ORDER_SPREADING: &str = "order_spreading";
    pub const NORMAL_SATISFACTION: &str = "normal_peer_satisfaction";
    pub const FREE_RIDER_SATISFACTION: &str = "free_rider_satisfaction";
    pub const FAIRNESS: &str = "fairness";
    pub const NEIGHBOR_COUNT: &str = "neighbor_count";
    pub const MEAN_REPLICATION: &str = "mean_replication";
}

/// Which measurements to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureSet {
    pub order_spreading: bool,
    pub normal_satisfaction: bool,
    pub free_rider_satisfaction: bool,
    pub fairness: bool,
    pub topology: bool,
}

impl Default for MeasureSet {
    fn default() -> Self {
        Self {
            order_spreading: true,
            normal_satisfaction: true,
            free_rider_satisfaction: true,
            fairness: true,
            topology: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Orders at or past this age are left out of spreading and satisfaction.
    pub max_age_to_track: u64,

    /// Peers younger than this are left out of satisfaction.
    pub adult_age: u64,

    /// Width of each age bin, in rounds.
    pub statistical_window: u64,

    pub measures: MeasureSet,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_age_to_track: 50,
            adult_age: 30,
            statistical_window: 5,
            measures: MeasureSet::default(),
        }
    }
}

impl PerformanceConfig {
    pub fn validate(&self) -> Result<(), CandidateError> {
        if self.statistical_window == 0 {
            return Err(CandidateError::ZeroWindow);
        }
        if self.max_age_to_track == 0 {
            return Err(CandidateError::ZeroMaxAge);
        }
        Ok(())
    }

    /// Number of age bins.
    pub fn bins(&self) -> usize {
        ((self.max_age_to_track.saturating_sub(1)) / self.statistical_window.max(1) + 1) as usize
    }

    fn bin_of(&self, age: u64) -> Option<usize> {
        (age < self.max_age_to_track).then(|| (age / self.statistical_window.max(1)) as usize)
    }
}

/// Spreading, satisfaction, fairness and topology measurements.
#[derive(Debug, Clone, Default)]
pub struct MeshPerformance {
    config: PerformanceConfig,
}

impl MeshPerformance {
    pub fn new(config: PerformanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Fraction of live peers storing each order, averaged per age bin.
    ///
    /// A bin with no order in it is `None`.
    fn order_spreading(&self, view: &SimView<'_>, replicas: &HashMap<OrderId, usize>) -> Measurement {
        let population = view.network.len();
        if population == 0 || view.order_book.is_empty() {
            return Measurement::Missing;
        }

        let bins = self.config.bins();
        let mut sums = vec![0.0; bins];
        let mut counts = vec![0usize; bins];
        for order in view.order_book.valid_orders() {
            let Some(bin) = self.config.bin_of(order.age(view.now)) else {
                continue;
            };
            let holders = replicas.get(&order.id).copied().unwrap_or_default();
            sums[bin] += holders as f64 / population as f64;
            counts[bin] += 1;
        }

        Measurement::Series(
            sums.into_iter()
                .zip(counts)
                .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
                .collect(),
        )
    }

    /// Satisfaction of one peer: per age bin, the share of live orders of that
    /// age the peer stores, averaged over the non-empty bins.
    fn satisfaction(&self, peer: &Peer, totals: &[usize], view: &SimView<'_>) -> Option<f64> {
        let mut stored = vec![0usize; totals.len()];
        for info in peer.stored() {
            let Some(order) = view.order_book.get(info.order) else {
                continue;
            };
            if let Some(bin) = self.config.bin_of(order.age(view.now)) {
                stored[bin] += 1;
            }
        }

        let ratios: Vec<f64> = stored
            .iter()
            .zip(totals)
            .filter(|(_, total)| **total > 0)
            .map(|(held, total)| *held as f64 / *total as f64)
            .collect();
        if ratios.is_empty() {
            return None;
        }
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    }

    fn satisfaction_of(&self, kind: PeerKind, view: &SimView<'_>) -> Measurement {
        let mut totals = vec![0usize; self.config.bins()];
        for order in view.order_book.valid_orders() {
            if let Some(bin) = self.config.bin_of(order.age(view.now)) {
                totals[bin] += 1;
            }
        }

        let samples: Vec<f64> = view
            .network
            .peers()
            .filter(|peer| peer.kind() == kind && is_adult(peer, view.now, self.config.adult_age))
            .filter_map(|peer| self.satisfaction(peer, &totals, view))
            .collect();
        if samples.is_empty() {
            Measurement::Missing
        } else {
            Measurement::Samples(samples)
        }
    }
}

fn is_adult(peer: &Peer, now: Round, adult_age: u64) -> bool {
    peer.age(now) >= adult_age
}

impl Performance for MeshPerformance {
    fn measure(&self, view: &SimView<'_>) -> Measurements {
        let measures = self.config.measures;
        let mut out = Measurements::new();

        let mut replicas: HashMap<OrderId, usize> = HashMap::new();
        for peer in view.network.peers() {
            for info in peer.stored() {
                *replicas.entry(info.order).or_default() += 1;
            }
        }

        if measures.order_spreading {
            out.insert(names::ORDER_SPREADING, self.order_spreading(view, &replicas));
        }
        if measures.normal_satisfaction {
            out.insert(
                names::NORMAL_SATISFACTION,
                self.satisfaction_of(PeerKind::Normal, view),
            );
        }
        if measures.free_rider_satisfaction {
            out.insert(
                names::FREE_RIDER_SATISFACTION,
                self.satisfaction_of(PeerKind::FreeRider, view),
            );
        }
        if measures.fairness {
            // No fairness model is defined yet; report a neutral zero.
            let fairness = if view.network.is_empty() {
                Measurement::Missing
            } else {
                Measurement::Scalar(0.0)
            };
            out.insert(names::FAIRNESS, fairness);
        }
        if measures.topology {
            let counts: Vec<f64> = view
                .network
                .peers()
                .map(|peer| peer.neighbor_count() as f64)
                .collect();
            out.insert(
                names::NEIGHBOR_COUNT,
                if counts.is_empty() {
                    Measurement::Missing
                } else {
                    Measurement::Samples(counts)
                },
            );

            let valid = view.order_book.valid_orders().count();
            let replication = if valid == 0 {
                Measurement::Missing
            } else {
                let total: usize = view
                    .order_book
                    .valid_orders()
                    .map(|order| replicas.get(&order.id).copied().unwrap_or_default())
                    .sum();
                Measurement::Scalar(total as f64 / valid as f64)
            };
            out.insert(names::MEAN_REPLICATION, replication);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_core::{Network, OrderBook};
    use meshsim_types::{IncentiveParams, PeerId};

    fn view<'a>(now: u64, network: &'a Network, book: &'a OrderBook) -> SimView<'a> {
        SimView {
            now: Round(now),
            network,
            order_book: book,
        }
    }

    #[test]
    fn test_bins() {
        let config = PerformanceConfig::default();
        assert_eq!(config.bins(), 10);
        assert_eq!(config.bin_of(0), Some(0));
        assert_eq!(config.bin_of(49), Some(9));
        assert_eq!(config.bin_of(50), None);
    }

    #[test]
    fn test_spreading_ratio() {
        let mut network = Network::new();
        let mut book = OrderBook::new();
        for _ in 0..4 {
            network.spawn(PeerKind::Normal, Round(0), IncentiveParams::default());
        }
        // Order 0, age 2: held by two of four peers.
        let young = book.create(Round(8), PeerId(0), 100);
        network.peer_mut(PeerId(0)).unwrap().seed_order(young, Round(8)).unwrap();
        network.peer_mut(PeerId(1)).unwrap().seed_order(young, Round(8)).unwrap();
        // Order 1, age 7: held by one peer.
        let older = book.create(Round(3), PeerId(2), 100);
        network.peer_mut(PeerId(2)).unwrap().seed_order(older, Round(3)).unwrap();

        let performance = MeshPerformance::new(PerformanceConfig {
            max_age_to_track: 15,
            statistical_window: 5,
            ..PerformanceConfig::default()
        });
        let out = performance.measure(&view(10, &network, &book));

        assert_eq!(
            out.series(names::ORDER_SPREADING),
            Some(&[Some(0.5), Some(0.25), None][..])
        );
        assert_eq!(out.scalar(names::MEAN_REPLICATION), Some(1.5));
    }

    #[test]
    fn test_satisfaction_counts_adults_only() {
        let mut network = Network::new();
        let mut book = OrderBook::new();
        let adult = network.spawn(PeerKind::Normal, Round(0), IncentiveParams::default());
        network.spawn(PeerKind::Normal, Round(35), IncentiveParams::default());
        let rider = network.spawn(PeerKind::FreeRider, Round(0), IncentiveParams::default());

        let a = book.create(Round(39), adult, 100);
        book.create(Round(39), adult, 100);
        network.peer_mut(adult).unwrap().seed_order(a, Round(39)).unwrap();
        network.peer_mut(rider).unwrap().seed_order(a, Round(39)).unwrap();

        let performance = MeshPerformance::new(PerformanceConfig::default());
        let out = performance.measure(&view(40, &network, &book));

        assert_eq!(out.samples(names::NORMAL_SATISFACTION), Some(&[0.5][..]));
        assert_eq!(out.samples(names::FREE_RIDER_SATISFACTION), Some(&[0.5][..]));
        assert_eq!(out.scalar(names::FAIRNESS), Some(0.0));
    }

    #[test]
    fn test_empty_mesh_is_missing() {
        let network = Network::new();
        let book = OrderBook::new();
        let performance = MeshPerformance::default();
        let out = performance.measure(&view(1, &network, &book));

        assert_eq!(out.get(names::ORDER_SPREADING), Some(&Measurement::Missing));
        assert_eq!(out.get(names::NEIGHBOR_COUNT), Some(&Measurement::Missing));
        assert_eq!(out.get(names::FAIRNESS), Some(&Measurement::Missing));
    }

    #[test]
    fn test_disabled_measures_are_absent() {
        let network = Network::new();
        let book = OrderBook::new();
        let performance = MeshPerformance::new(PerformanceConfig {
            measures: MeasureSet {
                topology: false,
                ..MeasureSet::default()
            },
            ..PerformanceConfig::default()
        });
        let out = performance.measure(&view(1, &network, &book));
        assert!(out.get(names::NEIGHBOR_COUNT).is_none());
        assert!(out.get(names::FAIRNESS).is_some());
    }
}
