use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::account::{PlayerAccount, RoundOutcome};
use crate::bet::{Bet, BetPlacement};
use crate::crash_point::generate_crash_point;
use crate::multiplier::calculate_multiplier;
use crate::round::{RoundPhase, RoundState, Sample};
use crate::storage::KeyValueStore;
use crate::{CrashError, CrashRules};

/// Result of a one-second countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Not counting down
    Ignored,
    Ticking(u32),
    /// The countdown reached zero and the round is now running
    Started,
}

/// Result of a frame update while running
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Round is not running
    Idle,
    /// Called again before the minimum frame spacing elapsed
    Throttled,
    Advanced(f64),
    /// The live bet reached its auto cash-out threshold and paid out
    AutoCashedOut(u64),
    /// The multiplier reached the crash point
    Crashed(f64),
}

/// Everything a presentation layer needs to draw the chart, HUD and controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub phase: RoundPhase,
    pub multiplier: f64,
    pub countdown_remaining: u32,
    /// Only revealed once the round has crashed
    pub crash_point: Option<f64>,
    pub samples: Vec<Sample>,
    pub balance: u64,
    pub highest_multiplier: f64,
    pub history: Vec<RoundOutcome>,
    pub bet: Option<Bet>,
    pub has_active_bet: bool,
    pub cashed_out_at: Option<f64>,
    /// What cashing out right now would pay
    pub potential_payout: Option<u64>,
    pub auto_mode: bool,
    pub auto_cash_out: f64,
    pub low_balance: bool,
}

/// Authoritative crash round lifecycle: countdown, running, crashed.
///
/// Time is passed in explicitly as milliseconds on a monotonic clock, so the
/// engine itself never sleeps or schedules anything. `RoundDriver` feeds it
/// real time; tests feed it whatever timestamps they need.
pub struct RoundEngine<S: KeyValueStore, R: Rng = ChaCha8Rng> {
    rules: CrashRules,
    round: RoundState,
    account: PlayerAccount,
    bet: Option<Bet>,
    cashed_out_at: Option<f64>,
    auto_mode: bool,
    auto_cash_out: f64,
    last_frame_ms: Option<u64>,
    crashed_at_ms: Option<u64>,
    store: S,
    rng: R,
}

impl<S: KeyValueStore> RoundEngine<S, ChaCha8Rng> {
    pub fn new(rules: CrashRules, store: S) -> Result<Self, CrashError> {
        Self::with_rng(rules, store, ChaCha8Rng::from_entropy())
    }
}

impl<S: KeyValueStore, R: Rng> RoundEngine<S, R> {
    pub fn with_rng(rules: CrashRules, store: S, rng: R) -> Result<Self, CrashError> {
        rules.validate()?;
        let account = PlayerAccount::load(&store, &rules);
        log::info!(
            "Loaded account: balance {}, best {:.2}x",
            account.balance,
            account.highest_multiplier
        );

        Ok(Self {
            round: RoundState::new(rules.countdown_seconds, rules.max_samples),
            account,
            bet: None,
            cashed_out_at: None,
            auto_mode: false,
            auto_cash_out: rules.default_auto_cash_out,
            last_frame_ms: None,
            crashed_at_ms: None,
            rules,
            store,
            rng,
        })
    }

    pub fn rules(&self) -> &CrashRules {
        &self.rules
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn account(&self) -> &PlayerAccount {
        &self.account
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase
    }

    pub fn current_multiplier(&self) -> f64 {
        self.round.current_multiplier
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.round.countdown_remaining
    }

    pub fn balance(&self) -> u64 {
        self.account.balance
    }

    pub fn bet(&self) -> Option<&Bet> {
        self.bet.as_ref()
    }

    pub fn has_active_bet(&self) -> bool {
        self.bet.map(|b| b.active).unwrap_or(false)
    }

    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    // ── Phase transitions ──

    /// Enter the countdown and clear everything left over from the last round.
    /// Only reached through `complete_settle`, so a round always settles first.
    fn start_countdown(&mut self) {
        self.round.reset_for_countdown(self.rules.countdown_seconds);
        self.cashed_out_at = None;
        self.last_frame_ms = None;
        self.crashed_at_ms = None;
        log::info!("Next round in {}s", self.rules.countdown_seconds);
    }

    /// One-second countdown step; starts the round when it reaches zero
    pub fn countdown_tick(&mut self, now_ms: u64) -> CountdownOutcome {
        if self.round.phase != RoundPhase::CountingDown {
            return CountdownOutcome::Ignored;
        }

        self.round.countdown_remaining = self.round.countdown_remaining.saturating_sub(1);
        if self.round.countdown_remaining == 0 {
            self.begin_round(now_ms);
            CountdownOutcome::Started
        } else {
            CountdownOutcome::Ticking(self.round.countdown_remaining)
        }
    }

    /// Draw a crash point and start the multiplier running. Does nothing
    /// unless counting down.
    pub fn begin_round(&mut self, now_ms: u64) -> bool {
        if self.round.phase != RoundPhase::CountingDown {
            return false;
        }
        let crash_point = generate_crash_point(&mut self.rng);
        self.round.start_running(crash_point, now_ms);
        self.cashed_out_at = None;
        self.last_frame_ms = None;
        self.crashed_at_ms = None;

        // Bets queued during the previous round join this one
        if let Some(bet) = self.bet.as_mut() {
            if bet.pending_for_next_round {
                bet.pending_for_next_round = false;
                log::info!("Queued bet of {} joins round {}", bet.amount, self.round.round_id);
            }
        }

        log::info!("Round {} started", self.round.round_id);
        log::debug!("Round {} crash point {:.2}x", self.round.round_id, crash_point);
        true
    }

    /// Advance the running round to `now_ms`
    pub fn frame(&mut self, now_ms: u64) -> FrameOutcome {
        if !self.round.is_running() {
            return FrameOutcome::Idle;
        }
        if let Some(last) = self.last_frame_ms {
            if now_ms.saturating_sub(last) < self.rules.frame_interval_ms {
                return FrameOutcome::Throttled;
            }
        }
        self.last_frame_ms = Some(now_ms);

        let elapsed = self.round.elapsed_secs(now_ms);
        // Never move backwards, even if the caller's clock does
        let multiplier = calculate_multiplier(elapsed).max(self.round.current_multiplier);
        self.round.current_multiplier = multiplier;

        let due = match self.round.last_sample() {
            Some(last) => elapsed - last.elapsed >= self.rules.sample_interval_secs,
            None => true,
        };
        if due {
            self.round.push_sample(Sample {
                elapsed,
                multiplier: multiplier.min(self.round.crash_point),
            });
        }

        if multiplier >= self.round.crash_point {
            return FrameOutcome::Crashed(self.crash(now_ms));
        }

        let auto = self
            .bet
            .map(|bet| bet.should_auto_cash_out(self.auto_mode, multiplier))
            .unwrap_or(false);
        if auto {
            if let Some(payout) = self.cash_out() {
                return FrameOutcome::AutoCashedOut(payout);
            }
        }

        FrameOutcome::Advanced(multiplier)
    }

    fn crash(&mut self, now_ms: u64) -> f64 {
        self.round.crash();
        self.crashed_at_ms = Some(now_ms);
        let crash_point = self.round.crash_point;
        // A cashed-out round already has its entry
        if self.cashed_out_at.is_none() {
            self.account.push_history(RoundOutcome::Crashed(crash_point));
        }

        if let Some(bet) = self.bet {
            if bet.is_live() {
                self.bet = None;
                log::info!("Bet of {} lost in the crash", bet.amount);
            }
        }

        log::info!("Round {} crashed at {:.2}x", self.round.round_id, crash_point);
        crash_point
    }

    /// When the post-crash delay ends, if the round has crashed
    pub fn settle_deadline(&self) -> Option<u64> {
        if self.round.phase != RoundPhase::Crashed {
            return None;
        }
        self.crashed_at_ms
            .map(|at| at.saturating_add(self.rules.settle_delay_ms))
    }

    /// Restart the countdown once the settle delay has elapsed
    pub fn complete_settle(&mut self, now_ms: u64) -> bool {
        match self.settle_deadline() {
            Some(deadline) if now_ms >= deadline => {
                self.start_countdown();
                true
            }
            _ => false,
        }
    }

    // ── Player actions ──

    pub fn place_bet(&mut self, amount: u64) -> Result<BetPlacement, CrashError> {
        if amount < 1 {
            return Err(CrashError::InvalidAmount(amount));
        }
        if self.bet.is_some() {
            return Err(CrashError::BetAlreadyPlaced);
        }
        if amount > self.account.balance {
            return Err(CrashError::InsufficientBalance {
                requested: amount,
                available: self.account.balance,
            });
        }

        let placement = if self.round.phase == RoundPhase::CountingDown {
            BetPlacement::ThisRound
        } else {
            BetPlacement::NextRound
        };

        self.account.debit(amount);
        self.persist_balance();
        self.bet = Some(Bet::new(amount, Some(self.auto_cash_out), placement));

        match placement {
            BetPlacement::ThisRound => log::info!("Bet {amount} on the upcoming round"),
            BetPlacement::NextRound => log::info!("Bet {amount} queued for the next round"),
        }
        Ok(placement)
    }

    /// Lock in the current multiplier. Silently does nothing outside a
    /// running round or without a live bet.
    pub fn cash_out(&mut self) -> Option<u64> {
        if !self.round.is_running() {
            return None;
        }
        let bet = self.bet.filter(|b| b.is_live())?;

        let multiplier = self.round.current_multiplier;
        let payout = bet.potential_payout(multiplier);

        self.account.credit(payout);
        self.persist_balance();
        if self.account.record_multiplier(multiplier) {
            self.persist_highest();
        }
        self.account.push_history(RoundOutcome::CashedOut(multiplier));
        self.cashed_out_at = Some(multiplier);
        self.bet = None;

        log::info!(
            "Cashed out {} at {:.2}x for {}",
            bet.amount,
            multiplier,
            payout
        );
        Some(payout)
    }

    pub fn add_test_balance(&mut self) {
        self.account.credit(self.rules.test_balance_grant);
        self.persist_balance();
        log::info!("Added {} test balance", self.rules.test_balance_grant);
    }

    pub fn set_auto_mode(&mut self, enabled: bool) {
        self.auto_mode = enabled;
    }

    /// Threshold for new bets and the outstanding one
    pub fn set_auto_cash_out(&mut self, threshold: f64) -> Result<(), CrashError> {
        if !(threshold.is_finite() && threshold >= 1.0) {
            return Err(CrashError::InvalidThreshold(threshold));
        }
        self.auto_cash_out = threshold;
        if let Some(bet) = self.bet.as_mut() {
            bet.auto_cash_out = Some(threshold);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let potential_payout = match self.bet {
            Some(bet) if bet.is_live() && self.round.is_running() => {
                Some(bet.potential_payout(self.round.current_multiplier))
            }
            _ => None,
        };

        RoundSnapshot {
            round_id: self.round.round_id,
            phase: self.round.phase,
            multiplier: self.round.current_multiplier,
            countdown_remaining: self.round.countdown_remaining,
            crash_point: self.round.revealed_crash_point(),
            samples: self.round.samples.iter().copied().collect(),
            balance: self.account.balance,
            highest_multiplier: self.account.highest_multiplier,
            history: self.account.history.iter().copied().collect(),
            bet: self.bet,
            has_active_bet: self.has_active_bet(),
            cashed_out_at: self.cashed_out_at,
            potential_payout,
            auto_mode: self.auto_mode,
            auto_cash_out: self.auto_cash_out,
            low_balance: self.account.is_low_balance(&self.rules),
        }
    }

    // ── Persistence ──

    fn persist_balance(&mut self) {
        if let Err(e) = self.account.persist_balance(&mut self.store) {
            log::warn!("Failed to persist balance {}: {e}", self.account.balance);
        }
    }

    fn persist_highest(&mut self) {
        if let Err(e) = self.account.persist_highest(&mut self.store) {
            log::warn!(
                "Failed to persist highest multiplier {:.2}: {e}",
                self.account.highest_multiplier
            );
        }
    }
}

#[cfg(test)]
mod tests;
