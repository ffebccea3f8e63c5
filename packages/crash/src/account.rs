use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::crash_point::OutcomeTier;
use crate::storage::{KeyValueStore, BALANCE_KEY, HIGHEST_MULTIPLIER_KEY};
use crate::{CrashRules, StorageError};

/// A settled entry in the history strip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// The round ended at this crash point
    Crashed(f64),
    /// The player cashed out at this multiplier
    CashedOut(f64),
}

impl RoundOutcome {
    pub fn multiplier(&self) -> f64 {
        match self {
            RoundOutcome::Crashed(m) | RoundOutcome::CashedOut(m) => *m,
        }
    }

    pub fn tier(&self) -> OutcomeTier {
        OutcomeTier::classify(self.multiplier())
    }
}

/// Player state that outlives a single round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerAccount {
    pub balance: u64,
    pub highest_multiplier: f64,
    /// Most recent first
    pub history: VecDeque<RoundOutcome>,
    pub history_len: usize,
}

impl PlayerAccount {
    pub fn new(balance: u64, history_len: usize) -> Self {
        Self {
            balance,
            highest_multiplier: 1.0,
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    /// Restore balance and high-water mark from the store. Missing or
    /// unreadable values fall back to the defaults; history always starts empty.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, rules: &CrashRules) -> Self {
        let mut account = Self::new(rules.starting_balance, rules.history_len);

        match store.get(BALANCE_KEY) {
            Ok(Some(raw)) => match raw.trim().parse::<u64>() {
                Ok(balance) => account.balance = balance,
                Err(_) => log::warn!("Ignoring unreadable stored balance {raw:?}"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read stored balance: {e}"),
        }

        match store.get(HIGHEST_MULTIPLIER_KEY) {
            Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(m) if m.is_finite() && m >= 1.0 => account.highest_multiplier = m,
                _ => log::warn!("Ignoring unreadable stored highest multiplier {raw:?}"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read stored highest multiplier: {e}"),
        }

        account
    }

    pub fn persist_balance<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        store.set(BALANCE_KEY, &self.balance.to_string())
    }

    pub fn persist_highest<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        store.set(HIGHEST_MULTIPLIER_KEY, &self.highest_multiplier.to_string())
    }

    pub fn debit(&mut self, amount: u64) {
        self.balance = self.balance.saturating_sub(amount);
    }

    pub fn credit(&mut self, amount: u64) {
        self.balance = self.balance.saturating_add(amount);
    }

    /// Returns true if `multiplier` is a new high-water mark
    pub fn record_multiplier(&mut self, multiplier: f64) -> bool {
        if multiplier > self.highest_multiplier {
            self.highest_multiplier = multiplier;
            true
        } else {
            false
        }
    }

    pub fn push_history(&mut self, outcome: RoundOutcome) {
        self.history.push_front(outcome);
        self.history.truncate(self.history_len);
    }

    pub fn is_low_balance(&self, rules: &CrashRules) -> bool {
        self.balance < rules.low_balance_threshold
    }
}
