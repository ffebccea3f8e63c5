mod account;
mod bet;
mod crash_point;
mod engine;
mod error;
mod multiplier;
mod round;
mod rules;
mod storage;
#[cfg(feature = "runtime")]
mod driver;
#[cfg(feature = "edge")]
mod edge;

pub use account::{PlayerAccount, RoundOutcome};
pub use bet::{payout, Bet, BetPlacement, BetSizing};
pub use crash_point::{
    crash_point_from_draws, generate_crash_point, survival_probability, tier_index, CrashTier,
    OutcomeTier, CRASH_TIERS,
};
pub use engine::{CountdownOutcome, FrameOutcome, RoundEngine, RoundSnapshot};
pub use error::{CrashError, StorageError};
pub use multiplier::{calculate_multiplier, time_to_reach};
pub use round::{RoundPhase, RoundState, Sample};
pub use rules::CrashRules;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, BALANCE_KEY, HIGHEST_MULTIPLIER_KEY};
#[cfg(feature = "runtime")]
pub use driver::RoundDriver;
#[cfg(feature = "edge")]
pub use edge::{EdgeCalculator, EdgeResult, SimulationReport};
