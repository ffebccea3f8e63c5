use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::crash_point::{generate_crash_point, survival_probability, tier_index, CRASH_TIERS};
use crate::multiplier::time_to_reach;

/// Expected value of always cashing out at one target multiplier.
#[derive(Debug, Clone, Copy)]
pub struct EdgeResult {
    pub target: f64,
    /// P(crash point >= target)
    pub win_probability: f64,
    /// Expected return per unit bet for the player (0.0 = break even).
    pub expected_return: f64,
    /// House edge as a fraction. Positive means house advantage.
    pub house_edge: f64,
}

/// Monte-Carlo summary of drawn crash points.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub rounds: u64,
    /// Draws per entry of `CRASH_TIERS`
    pub tier_counts: [u64; 4],
    pub mean_crash_point: f64,
    pub median_crash_point: f64,
    /// Average running time of a round, in seconds
    pub mean_round_secs: f64,
}

impl SimulationReport {
    pub fn tier_share(&self, idx: usize) -> f64 {
        if self.rounds == 0 {
            return 0.0;
        }
        self.tier_counts[idx] as f64 / self.rounds as f64
    }
}

/// Exact and simulated outcome analysis for the crash distribution.
///
/// The crash point is piecewise uniform over `CRASH_TIERS`, so the win
/// probability of any cash-out target has a closed form. The simulator
/// draws through the same `generate_crash_point` the engine uses.
pub struct EdgeCalculator {
    rng: ChaCha8Rng,
}

impl EdgeCalculator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn for_target(target: f64) -> EdgeResult {
        let target = target.max(1.0);
        let win_probability = survival_probability(target);
        let expected_return = win_probability * target - 1.0;
        EdgeResult {
            target,
            win_probability,
            expected_return,
            house_edge: -expected_return,
        }
    }

    /// Target among `candidates` with the highest expected return
    pub fn best_target(candidates: &[f64]) -> Option<EdgeResult> {
        candidates
            .iter()
            .map(|&t| Self::for_target(t))
            .max_by(|a, b| a.expected_return.total_cmp(&b.expected_return))
    }

    /// Mean crash point in closed form: the mean of each uniform band,
    /// weighted by its probability
    pub fn expected_crash_point() -> f64 {
        CRASH_TIERS
            .iter()
            .map(|tier| tier.probability() * (tier.lower + tier.upper) / 2.0)
            .sum()
    }

    pub fn simulate(&mut self, rounds: u64) -> SimulationReport {
        Self::simulate_with(&mut self.rng, rounds)
    }

    fn simulate_with<R: Rng>(rng: &mut R, rounds: u64) -> SimulationReport {
        let mut tier_counts = [0u64; 4];
        let mut points = Vec::with_capacity(rounds as usize);
        let mut total_secs = 0.0;

        for _ in 0..rounds {
            let point = generate_crash_point(rng);
            if let Some(idx) = tier_index(point) {
                tier_counts[idx] += 1;
            }
            total_secs += time_to_reach(point);
            points.push(point);
        }

        points.sort_by(|a, b| a.total_cmp(b));
        let (mean_crash_point, median_crash_point, mean_round_secs) = if points.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let n = points.len() as f64;
            (
                points.iter().sum::<f64>() / n,
                points[points.len() / 2],
                total_secs / n,
            )
        };

        SimulationReport {
            rounds,
            tier_counts,
            mean_crash_point,
            median_crash_point,
            mean_round_secs,
        }
    }
}
