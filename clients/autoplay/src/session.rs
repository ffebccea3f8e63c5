use crash::{payout, BetPlacement, KeyValueStore, RoundEngine, RoundSnapshot};
use rand_chacha::ChaCha8Rng;

/// How one round went for the bot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundResult {
    /// Sat the round out
    Skipped,
    Won { stake: u64, multiplier: f64, payout: u64 },
    Lost { stake: u64 },
}

/// Running totals across every round the bot has seen
#[derive(Debug, Default)]
pub struct Session {
    pub rounds: u64,
    pub wins: u64,
    pub losses: u64,
    pub wagered: u64,
    pub returned: u64,
    pub top_ups: u64,
}

impl Session {
    /// Settle a crashed round. `stake` is the bet that rode this round, if any.
    pub fn record(&mut self, snapshot: &RoundSnapshot, stake: Option<u64>) -> RoundResult {
        self.rounds += 1;
        let Some(stake) = stake else {
            return RoundResult::Skipped;
        };

        self.wagered += stake;
        match snapshot.cashed_out_at {
            Some(multiplier) => {
                let won = payout(stake, multiplier);
                self.wins += 1;
                self.returned += won;
                RoundResult::Won {
                    stake,
                    multiplier,
                    payout: won,
                }
            }
            None => {
                self.losses += 1;
                RoundResult::Lost { stake }
            }
        }
    }

    /// Bet on the upcoming round, topping up first if the balance ran dry.
    /// Returns the stake that rides the round.
    pub fn place_bet<S: KeyValueStore>(
        &mut self,
        engine: &mut RoundEngine<S, ChaCha8Rng>,
        amount: u64,
    ) -> Option<u64> {
        // A bet queued after a missed countdown rides this round instead
        if let Some(held) = engine.bet() {
            return Some(held.amount);
        }
        if engine.balance() < amount {
            engine.add_test_balance();
            self.top_ups += 1;
        }
        match engine.place_bet(amount) {
            Ok(BetPlacement::ThisRound) => Some(amount),
            Ok(BetPlacement::NextRound) => {
                log::warn!("Bet of {amount} missed the countdown, queued for the next round");
                None
            }
            Err(e) => {
                log::warn!("Could not place bet of {amount}: {e}");
                None
            }
        }
    }

    pub fn net(&self) -> i64 {
        self.returned as i64 - self.wagered as i64
    }

    /// Returned per unit wagered, as a percentage
    pub fn return_to_player(&self) -> f64 {
        if self.wagered == 0 {
            return 0.0;
        }
        self.returned as f64 / self.wagered as f64 * 100.0
    }
}
