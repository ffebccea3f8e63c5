use rand::Rng;
use serde::{Deserialize, Serialize};

/// One band of the crash point distribution. A uniform draw in
/// `[draw_start, draw_end)` selects the band, a second draw places the
/// crash point uniformly in `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrashTier {
    pub draw_start: f64,
    pub draw_end: f64,
    pub lower: f64,
    pub upper: f64,
}

impl CrashTier {
    pub fn probability(&self) -> f64 {
        self.draw_end - self.draw_start
    }

    pub fn contains(&self, crash_point: f64) -> bool {
        crash_point >= self.lower && crash_point < self.upper
    }
}

/// Heavy-tailed table favouring low multipliers
pub const CRASH_TIERS: [CrashTier; 4] = [
    CrashTier { draw_start: 0.0, draw_end: 0.50, lower: 1.0, upper: 2.5 },
    CrashTier { draw_start: 0.50, draw_end: 0.80, lower: 2.5, upper: 5.0 },
    CrashTier { draw_start: 0.80, draw_end: 0.95, lower: 5.0, upper: 10.0 },
    CrashTier { draw_start: 0.95, draw_end: 1.0, lower: 10.0, upper: 50.0 },
];

/// Draw the hidden crash point for a new round
pub fn generate_crash_point<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let tier_draw: f64 = rng.gen();
    let within_draw: f64 = rng.gen();
    crash_point_from_draws(tier_draw, within_draw)
}

/// Map two uniform draws in `[0, 1)` onto the tier table
pub fn crash_point_from_draws(tier_draw: f64, within_draw: f64) -> f64 {
    let tier = tier_for_draw(tier_draw);
    let within = within_draw.clamp(0.0, 1.0);
    (tier.lower + within * (tier.upper - tier.lower)).max(1.0)
}

fn tier_for_draw(tier_draw: f64) -> &'static CrashTier {
    CRASH_TIERS
        .iter()
        .find(|tier| tier_draw < tier.draw_end)
        .unwrap_or(&CRASH_TIERS[CRASH_TIERS.len() - 1])
}

/// Index into `CRASH_TIERS` of the band a crash point falls in
pub fn tier_index(crash_point: f64) -> Option<usize> {
    CRASH_TIERS.iter().position(|tier| tier.contains(crash_point))
}

/// Exact probability that a round's crash point is at least `target`
pub fn survival_probability(target: f64) -> f64 {
    if target <= 1.0 {
        return 1.0;
    }
    CRASH_TIERS
        .iter()
        .map(|tier| {
            let reach = if target <= tier.lower {
                1.0
            } else if target >= tier.upper {
                0.0
            } else {
                (tier.upper - target) / (tier.upper - tier.lower)
            };
            tier.probability() * reach
        })
        .sum()
}

/// Colour band of a settled multiplier in the history strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeTier {
    /// Below 2x
    Low,
    /// 2x up to 5x
    Medium,
    /// 5x and above
    High,
}

impl OutcomeTier {
    pub fn classify(multiplier: f64) -> Self {
        if multiplier < 2.0 {
            OutcomeTier::Low
        } else if multiplier < 5.0 {
            OutcomeTier::Medium
        } else {
            OutcomeTier::High
        }
    }
}
