//! Random draws used by the scenario candidates.
//!
//! All samplers take the caller's rng so a seeded run stays reproducible.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest rate drawn in one Knuth pass. `exp(-rate)` underflows well above this.
const POISSON_CHUNK: f64 = 500.0;

/// Poisson draw with mean `rate`.
///
/// Large rates are split into chunks; a sum of independent Poisson draws is
/// Poisson with the summed rate.
pub fn poisson(rng: &mut impl Rng, rate: f64) -> u64 {
    if rate.is_nan() || rate <= 0.0 {
        return 0;
    }
    let mut remaining = rate;
    let mut total = 0;
    while remaining > 0.0 {
        let chunk = remaining.min(POISSON_CHUNK);
        remaining -= chunk;
        total += knuth_poisson(rng, chunk);
    }
    total
}

fn knuth_poisson(rng: &mut impl Rng, rate: f64) -> u64 {
    let limit = (-rate).exp();
    let mut product: f64 = rng.gen();
    let mut count = 0;
    while product > limit {
        product *= rng.gen::<f64>();
        count += 1;
    }
    count
}

/// Normal draw (Box-Muller).
pub fn gaussian(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return mean;
    }
    // gen() is in [0, 1); shift away from zero for the logarithm.
    let u1 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let radius = (-2.0 * u1.ln()).sqrt();
    mean + std_dev * radius * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Normal distribution rounded to a non-negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f64,
    pub std_dev: f64,
}

impl Gaussian {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// `max(0, round(draw))`.
    pub fn sample_count(&self, rng: &mut impl Rng) -> u64 {
        let draw = gaussian(rng, self.mean, self.std_dev).round();
        if draw > 0.0 {
            draw as u64
        } else {
            0
        }
    }
}

/// Self-exciting point process with exponentially decaying intensity.
///
/// The intensity starts at `initial`, decays toward `base` at rate `decay`,
/// and jumps by `jump` at every event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HawkesParams {
    pub base: f64,
    pub initial: f64,
    pub decay: f64,
    pub jump: f64,
}

/// Event counts of a Hawkes process over `rounds` unit intervals.
///
/// Event times come from exact simulation of the decaying intensity: each
/// inter-arrival is the smaller of a decay-driven candidate and an
/// exponential draw at the base rate.
pub fn hawkes_counts(rng: &mut impl Rng, params: &HawkesParams, rounds: usize) -> Vec<u64> {
    let mut counts = vec![0u64; rounds];
    let horizon = rounds as f64;
    if rounds == 0 || params.decay <= 0.0 {
        return counts;
    }

    let mut intensity = params.initial.max(params.base);
    let mut time = 0.0;
    loop {
        let excess = intensity - params.base;
        let u1 = 1.0 - rng.gen::<f64>();
        let d = 1.0 + params.decay * u1.ln() / excess.max(f64::MIN_POSITIVE);
        let s1 = if excess > 0.0 && d > 0.0 {
            -d.ln() / params.decay
        } else {
            f64::INFINITY
        };
        let u2 = 1.0 - rng.gen::<f64>();
        let s2 = if params.base > 0.0 {
            -u2.ln() / params.base
        } else {
            f64::INFINITY
        };

        let wait = s1.min(s2);
        if !wait.is_finite() {
            break;
        }
        time += wait;
        if time >= horizon {
            break;
        }

        counts[time as usize] += 1;
        intensity = params.base + excess * (-params.decay * wait).exp() + params.jump;
    }
    counts
}
