use serde::{Deserialize, Serialize};

use crate::CrashError;

/// Timing, sampling and bankroll parameters for a crash table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrashRules {
    /// Seconds counted down before each round starts
    pub countdown_seconds: u32,

    /// Delay between a crash and the next countdown
    pub settle_delay_ms: u64,

    /// Minimum spacing between processed frames (~60 updates/second)
    pub frame_interval_ms: u64,

    /// Minimum spacing between plotted samples, in seconds
    pub sample_interval_secs: f64,

    /// Most recent samples kept for plotting
    pub max_samples: usize,

    /// Settled outcomes kept in the history
    pub history_len: usize,

    /// Balance for a player with nothing stored yet
    pub starting_balance: u64,

    /// Credit granted by `add_test_balance`
    pub test_balance_grant: u64,

    /// Bet amount a fresh session starts with
    pub default_bet: u64,

    /// Auto cash-out threshold a fresh session starts with
    pub default_auto_cash_out: f64,

    /// Below this balance the presentation layer should offer a top-up
    pub low_balance_threshold: u64,
}

impl Default for CrashRules {
    fn default() -> Self {
        Self {
            countdown_seconds: 10,
            settle_delay_ms: 3_000,
            frame_interval_ms: 16,
            sample_interval_secs: 0.05,
            max_samples: 300,
            history_len: 10,
            starting_balance: 1_000,
            test_balance_grant: 500,
            default_bet: 10,
            default_auto_cash_out: 2.0,
            low_balance_threshold: 100,
        }
    }
}

impl CrashRules {
    /// Short countdown and settle delay, for demos and soak runs
    pub fn fast() -> Self {
        Self {
            countdown_seconds: 3,
            settle_delay_ms: 1_000,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CrashError> {
        if self.countdown_seconds == 0 {
            return Err(CrashError::InvalidRules("countdown must be at least one second"));
        }
        if self.frame_interval_ms == 0 {
            return Err(CrashError::InvalidRules("frame interval must be non-zero"));
        }
        if !(self.sample_interval_secs.is_finite() && self.sample_interval_secs >= 0.0) {
            return Err(CrashError::InvalidRules("sample interval must be a non-negative number"));
        }
        if self.max_samples == 0 {
            return Err(CrashError::InvalidRules("sample cap must be non-zero"));
        }
        if self.history_len == 0 {
            return Err(CrashError::InvalidRules("history length must be non-zero"));
        }
        if !(self.default_auto_cash_out.is_finite() && self.default_auto_cash_out >= 1.0) {
            return Err(CrashError::InvalidRules("auto cash-out threshold must be at least 1.0"));
        }
        Ok(())
    }
}
