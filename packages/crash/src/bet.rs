use serde::{Deserialize, Serialize};

/// Where a newly placed bet lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetPlacement {
    /// Placed during the countdown, rides the upcoming round
    ThisRound,
    /// Placed after the round started, queued for the next one
    NextRound,
}

/// The player's single outstanding bet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub amount: u64,
    pub active: bool,
    pub auto_cash_out: Option<f64>,
    pub pending_for_next_round: bool,
}

impl Bet {
    pub fn new(amount: u64, auto_cash_out: Option<f64>, placement: BetPlacement) -> Self {
        Self {
            amount,
            active: true,
            auto_cash_out,
            pending_for_next_round: placement == BetPlacement::NextRound,
        }
    }

    /// Whether the bet takes part in the round currently in progress
    pub fn is_live(&self) -> bool {
        self.active && !self.pending_for_next_round
    }

    pub fn potential_payout(&self, multiplier: f64) -> u64 {
        payout(self.amount, multiplier)
    }

    /// Auto cash-out fires once the multiplier reaches the bet's threshold
    pub fn should_auto_cash_out(&self, auto_mode: bool, multiplier: f64) -> bool {
        if !auto_mode || !self.is_live() {
            return false;
        }
        matches!(self.auto_cash_out, Some(threshold) if multiplier >= threshold)
    }
}

/// `floor(amount * multiplier)`
pub fn payout(amount: u64, multiplier: f64) -> u64 {
    (amount as f64 * multiplier).floor() as u64
}

/// Shortcut bet sizes offered next to the amount input
pub struct BetSizing;

impl BetSizing {
    pub fn half(balance: u64) -> u64 {
        (balance / 2).max(balance.min(1))
    }

    pub fn max(balance: u64) -> u64 {
        balance
    }
}
