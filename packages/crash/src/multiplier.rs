/// Below this many seconds the multiplier is held at 1.0 so the curve
/// leaves the origin without a visible jump.
pub const WARMUP_SECS: f64 = 0.1;

/// Exponent rate of the growth curve
pub const GROWTH_RATE: f64 = 0.2;

/// Damping applied to the exponential term
pub const GROWTH_DIVISOR: f64 = 4.0;

/// Multiplier after `elapsed` seconds of a running round.
///
/// `1 + (e^(0.2 * t) - 1) / 4`: slow early growth that accelerates later,
/// so a median round (~1.75x) lasts several seconds.
pub fn calculate_multiplier(elapsed: f64) -> f64 {
    if elapsed.is_nan() || elapsed < WARMUP_SECS {
        return 1.0;
    }
    1.0 + ((GROWTH_RATE * elapsed).exp() - 1.0) / GROWTH_DIVISOR
}

/// Seconds of running time until the curve first reaches `multiplier`
pub fn time_to_reach(multiplier: f64) -> f64 {
    if multiplier <= 1.0 {
        return 0.0;
    }
    let t = (GROWTH_DIVISOR * (multiplier - 1.0) + 1.0).ln() / GROWTH_RATE;
    t.max(WARMUP_SECS)
}
