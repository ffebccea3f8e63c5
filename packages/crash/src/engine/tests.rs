use super::*;
use crate::storage::{MemoryStore, BALANCE_KEY, HIGHEST_MULTIPLIER_KEY};
use crate::StorageError;

fn engine() -> RoundEngine<MemoryStore, ChaCha8Rng> {
    RoundEngine::with_rng(
        CrashRules::default(),
        MemoryStore::new(),
        ChaCha8Rng::seed_from_u64(42),
    )
    .unwrap()
}

/// Start a round at t=0 with a fixed crash point
fn running_engine(crash_point: f64) -> RoundEngine<MemoryStore, ChaCha8Rng> {
    let mut engine = engine();
    engine.begin_round(0);
    engine.round.crash_point = crash_point;
    engine
}

/// Feed 16ms frames from `from_ms` until something other than `Advanced` happens
fn run_frames<S: KeyValueStore, R: Rng>(
    engine: &mut RoundEngine<S, R>,
    from_ms: u64,
    until_ms: u64,
) -> (u64, FrameOutcome) {
    let mut now = from_ms;
    let mut outcome = FrameOutcome::Idle;
    while now <= until_ms {
        outcome = engine.frame(now);
        match outcome {
            FrameOutcome::Advanced(_) | FrameOutcome::Throttled => {}
            _ => return (now, outcome),
        }
        now += 16;
    }
    (now, outcome)
}

/// Store whose writes always fail
struct FullStore;

impl KeyValueStore for FullStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "quota exceeded",
        )))
    }
}

#[test]
fn test_engine_starts_counting_down() {
    let engine = engine();
    assert_eq!(engine.phase(), RoundPhase::CountingDown);
    assert_eq!(engine.countdown_remaining(), 10);
    assert_eq!(engine.current_multiplier(), 1.0);
    assert_eq!(engine.balance(), 1_000);
    assert!(!engine.has_active_bet());
}

#[test]
fn test_invalid_rules_rejected() {
    let rules = CrashRules {
        history_len: 0,
        ..CrashRules::default()
    };
    assert!(RoundEngine::new(rules, MemoryStore::new()).is_err());
}

#[test]
fn test_countdown_ticks_then_begins_round() {
    let mut engine = engine();
    for expected in (1..10).rev() {
        assert_eq!(engine.countdown_tick(0), CountdownOutcome::Ticking(expected));
    }
    assert_eq!(engine.countdown_tick(10_000), CountdownOutcome::Started);
    assert_eq!(engine.phase(), RoundPhase::Running);
    assert_eq!(engine.round().start_time_ms, Some(10_000));
    assert_eq!(engine.round().samples.len(), 1);
    assert!(engine.round().crash_point >= 1.0);

    // Extra ticks while running do nothing
    assert_eq!(engine.countdown_tick(11_000), CountdownOutcome::Ignored);
}

#[test]
fn test_frame_idle_outside_running() {
    let mut engine = engine();
    assert_eq!(engine.frame(0), FrameOutcome::Idle);
}

#[test]
fn test_frames_throttled_below_interval() {
    let mut engine = running_engine(50.0);
    assert!(matches!(engine.frame(1_000), FrameOutcome::Advanced(_)));
    assert_eq!(engine.frame(1_010), FrameOutcome::Throttled);
    assert!(matches!(engine.frame(1_016), FrameOutcome::Advanced(_)));
}

#[test]
fn test_multiplier_monotonic_within_round() {
    let mut engine = running_engine(50.0);
    let mut previous = engine.current_multiplier();
    let mut now = 0;
    while now < 20_000 {
        engine.frame(now);
        assert!(engine.current_multiplier() >= previous);
        previous = engine.current_multiplier();
        now += 17;
    }

    // A clock that jumps backwards does not pull the multiplier down
    let before = engine.current_multiplier();
    engine.frame(5_000);
    assert_eq!(engine.current_multiplier(), before);
}

#[test]
fn test_samples_rate_limited_and_capped() {
    let mut engine = running_engine(50.0);

    // Frames every 16ms over 1s: samples only every >= 50ms
    let mut now = 16;
    while now <= 1_000 {
        engine.frame(now);
        now += 16;
    }
    let samples = &engine.round().samples;
    assert!(samples.len() <= 21, "len = {}", samples.len());
    for pair in samples.iter().collect::<Vec<_>>().windows(2) {
        assert!(pair[1].elapsed - pair[0].elapsed >= 0.05 - 1e-9);
    }

    // Long round: the cap holds and the oldest samples are gone
    while now <= 40_000 {
        engine.frame(now);
        now += 16;
    }
    let samples = &engine.round().samples;
    assert_eq!(samples.len(), 300);
    assert!(samples.front().map(|s| s.elapsed).unwrap_or(0.0) > 0.0);
}

#[test]
fn test_crash_clamps_and_records_history() {
    let mut engine = running_engine(1.5);
    let (_, outcome) = run_frames(&mut engine, 0, 60_000);
    assert_eq!(outcome, FrameOutcome::Crashed(1.5));
    assert_eq!(engine.phase(), RoundPhase::Crashed);
    assert_eq!(engine.current_multiplier(), 1.5);
    assert_eq!(engine.account().history[0], RoundOutcome::Crashed(1.5));
    assert!(engine.round().samples.iter().all(|s| s.multiplier <= 1.5));
    assert_eq!(engine.snapshot().crash_point, Some(1.5));

    // No more updates after the crash
    assert_eq!(engine.frame(100_000), FrameOutcome::Idle);
}

#[test]
fn test_crash_point_hidden_until_crash() {
    let engine = running_engine(3.0);
    assert_eq!(engine.snapshot().crash_point, None);
}

#[test]
fn test_place_bet_debits_balance() {
    let mut engine = engine();
    assert_eq!(engine.place_bet(100), Ok(BetPlacement::ThisRound));
    assert_eq!(engine.balance(), 900);
    let bet = engine.bet().copied().unwrap();
    assert_eq!(bet.amount, 100);
    assert!(bet.active);
    assert!(!bet.pending_for_next_round);
    assert_eq!(engine.store().get(BALANCE_KEY).unwrap().as_deref(), Some("900"));
}

#[test]
fn test_place_bet_insufficient_balance() {
    let mut engine = engine();
    assert_eq!(
        engine.place_bet(1_001),
        Err(CrashError::InsufficientBalance {
            requested: 1_001,
            available: 1_000
        })
    );
    assert_eq!(engine.balance(), 1_000);
    assert!(engine.bet().is_none());
}

#[test]
fn test_place_bet_invalid_amount() {
    let mut engine = engine();
    assert_eq!(engine.place_bet(0), Err(CrashError::InvalidAmount(0)));
    assert_eq!(engine.balance(), 1_000);
}

#[test]
fn test_only_one_outstanding_bet() {
    let mut engine = engine();
    engine.place_bet(10).unwrap();
    assert_eq!(engine.place_bet(10), Err(CrashError::BetAlreadyPlaced));
    assert_eq!(engine.balance(), 990);
}

#[test]
fn test_cash_out_pays_floor_of_multiplier() {
    let mut engine = engine();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 5.0;
    engine.round.current_multiplier = 2.0;

    assert_eq!(engine.cash_out(), Some(200));
    assert_eq!(engine.balance(), 1_100);
    assert!(!engine.has_active_bet());
    assert_eq!(engine.account().highest_multiplier, 2.0);
    assert_eq!(engine.account().history[0], RoundOutcome::CashedOut(2.0));
    assert_eq!(engine.snapshot().cashed_out_at, Some(2.0));
    assert_eq!(
        engine.store().get(HIGHEST_MULTIPLIER_KEY).unwrap().as_deref(),
        Some("2")
    );
}

#[test]
fn test_cash_out_during_live_frames() {
    let mut engine = engine();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 10.0;
    // Run to ~2x
    let mut now = 0;
    while engine.current_multiplier() < 2.0 {
        engine.frame(now);
        now += 16;
    }
    let multiplier = engine.current_multiplier();
    let payout = engine.cash_out().unwrap();
    assert_eq!(payout, (100.0 * multiplier).floor() as u64);
    assert!((200..=201).contains(&payout));

    // The round keeps running for spectators
    assert_eq!(engine.phase(), RoundPhase::Running);
    assert!(matches!(engine.frame(now), FrameOutcome::Advanced(_)));
}

#[test]
fn test_cash_out_noop_out_of_phase() {
    let mut engine = engine();
    // No bet
    assert_eq!(engine.cash_out(), None);

    // Bet placed but round not running yet
    engine.place_bet(50).unwrap();
    assert_eq!(engine.cash_out(), None);
    assert_eq!(engine.balance(), 950);

    // Second cash-out in the same round
    engine.begin_round(0);
    engine.round.crash_point = 5.0;
    engine.round.current_multiplier = 1.5;
    assert_eq!(engine.cash_out(), Some(75));
    assert_eq!(engine.cash_out(), None);
    assert_eq!(engine.balance(), 1_025);
}

#[test]
fn test_crash_forfeits_live_bet() {
    let mut engine = engine();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 1.3;

    let (_, outcome) = run_frames(&mut engine, 0, 60_000);
    assert_eq!(outcome, FrameOutcome::Crashed(1.3));
    assert_eq!(engine.balance(), 900);
    assert!(engine.bet().is_none());
    assert_eq!(engine.cash_out(), None);
    assert_eq!(engine.balance(), 900);
}

#[test]
fn test_bet_mid_round_queued_for_next_round() {
    let mut engine = running_engine(1.2);
    assert_eq!(engine.place_bet(100), Ok(BetPlacement::NextRound));
    assert_eq!(engine.balance(), 900);

    // Not part of this round: no cash-out, no forfeit
    engine.round.current_multiplier = 1.1;
    assert_eq!(engine.cash_out(), None);
    let (crashed_at, outcome) = run_frames(&mut engine, 0, 60_000);
    assert_eq!(outcome, FrameOutcome::Crashed(1.2));
    let bet = engine.bet().copied().unwrap();
    assert!(bet.active && bet.pending_for_next_round);
    assert!(engine.snapshot().bet.map(|b| b.pending_for_next_round).unwrap_or(false));

    // Next round picks it up
    assert!(engine.complete_settle(crashed_at + 3_000));
    engine.begin_round(crashed_at + 13_000);
    let bet = engine.bet().copied().unwrap();
    assert!(bet.is_live());
}

#[test]
fn test_bet_after_crash_waits_for_next_round() {
    let mut engine = running_engine(1.1);
    run_frames(&mut engine, 0, 60_000);
    assert_eq!(engine.phase(), RoundPhase::Crashed);
    assert_eq!(engine.place_bet(25), Ok(BetPlacement::NextRound));
}

#[test]
fn test_auto_cash_out_at_threshold() {
    let mut engine = engine();
    engine.set_auto_mode(true);
    engine.set_auto_cash_out(1.5).unwrap();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 4.0;

    let (now, outcome) = run_frames(&mut engine, 0, 60_000);
    let payout = match outcome {
        FrameOutcome::AutoCashedOut(payout) => payout,
        other => panic!("expected auto cash-out, got {other:?}"),
    };
    assert!((150..=151).contains(&payout));
    assert_eq!(engine.balance(), 900 + payout);
    assert!(engine.bet().is_none());

    // Display keeps running until the crash
    let (_, outcome) = run_frames(&mut engine, now + 16, 120_000);
    assert_eq!(outcome, FrameOutcome::Crashed(4.0));
    assert_eq!(engine.balance(), 900 + payout);
    // One entry per round: the cash-out, not the crash
    assert_eq!(engine.account().history.len(), 1);
    assert!(matches!(engine.account().history[0], RoundOutcome::CashedOut(_)));
}

#[test]
fn test_cashed_out_round_records_single_outcome() {
    let mut engine = engine();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 3.0;
    engine.round.current_multiplier = 2.0;
    assert_eq!(engine.cash_out(), Some(200));

    let (_, outcome) = run_frames(&mut engine, 0, 120_000);
    assert_eq!(outcome, FrameOutcome::Crashed(3.0));
    assert_eq!(
        engine.account().history.iter().copied().collect::<Vec<_>>(),
        vec![RoundOutcome::CashedOut(2.0)]
    );
}

#[test]
fn test_round_cannot_restart_before_settling() {
    let mut engine = engine();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 5.0;
    let (now, _) = run_frames(&mut engine, 0, 2_000);
    let round_id = engine.round().round_id;
    let multiplier = engine.current_multiplier();
    assert!(multiplier > 1.0);

    // Mid-round: no fresh crash point, the bet stays live
    assert!(!engine.begin_round(now));
    assert_eq!(engine.round().round_id, round_id);
    assert_eq!(engine.round().crash_point, 5.0);
    assert_eq!(engine.phase(), RoundPhase::Running);
    assert!(engine.has_active_bet());

    // Settling early does nothing either
    assert!(!engine.complete_settle(now + 60_000));
    assert_eq!(engine.phase(), RoundPhase::Running);
    assert_eq!(engine.current_multiplier(), multiplier);
    assert!(engine.account().history.is_empty());

    // Once crashed, a restart still waits for the settle delay
    let (crashed_at, outcome) = run_frames(&mut engine, now + 16, 120_000);
    assert_eq!(outcome, FrameOutcome::Crashed(5.0));
    assert!(!engine.begin_round(crashed_at + 16));
    assert_eq!(engine.phase(), RoundPhase::Crashed);
    assert!(!engine.complete_settle(crashed_at + 1_000));
    assert_eq!(engine.phase(), RoundPhase::Crashed);
    assert_eq!(engine.round().round_id, round_id);
}

#[test]
fn test_auto_cash_out_disabled_without_mode() {
    let mut engine = engine();
    engine.set_auto_cash_out(1.5).unwrap();
    engine.place_bet(100).unwrap();
    engine.begin_round(0);
    engine.round.crash_point = 2.0;

    let (_, outcome) = run_frames(&mut engine, 0, 60_000);
    assert_eq!(outcome, FrameOutcome::Crashed(2.0));
    assert_eq!(engine.balance(), 900);
}

#[test]
fn test_set_auto_cash_out_validates() {
    let mut engine = engine();
    assert_eq!(
        engine.set_auto_cash_out(0.9),
        Err(CrashError::InvalidThreshold(0.9))
    );
    assert!(engine.set_auto_cash_out(f64::INFINITY).is_err());
    engine.place_bet(10).unwrap();
    engine.set_auto_cash_out(3.0).unwrap();
    assert_eq!(engine.bet().and_then(|b| b.auto_cash_out), Some(3.0));
}

#[test]
fn test_add_test_balance() {
    let mut engine = engine();
    engine.add_test_balance();
    assert_eq!(engine.balance(), 1_500);
    assert_eq!(engine.store().get(BALANCE_KEY).unwrap().as_deref(), Some("1500"));
}

#[test]
fn test_full_cycle_returns_to_countdown() {
    let mut engine = engine();
    for _ in 0..10 {
        engine.countdown_tick(0);
    }
    assert_eq!(engine.phase(), RoundPhase::Running);
    engine.round.crash_point = 1.8;

    let (crashed_at, outcome) = run_frames(&mut engine, 0, 60_000);
    assert_eq!(outcome, FrameOutcome::Crashed(1.8));
    assert_eq!(engine.settle_deadline(), Some(crashed_at + 3_000));

    // Too early
    assert!(!engine.complete_settle(crashed_at + 2_999));
    assert_eq!(engine.phase(), RoundPhase::Crashed);

    assert!(engine.complete_settle(crashed_at + 3_000));
    assert_eq!(engine.phase(), RoundPhase::CountingDown);
    assert_eq!(engine.countdown_remaining(), 10);
    assert_eq!(engine.current_multiplier(), 1.0);
    assert!(engine.round().samples.is_empty());
    assert_eq!(engine.settle_deadline(), None);
    assert_eq!(engine.snapshot().crash_point, None);
}

#[test]
fn test_history_capped_over_many_rounds() {
    let mut engine = engine();
    let mut now = 0;
    for _ in 0..25 {
        engine.begin_round(now);
        engine.round.crash_point = 1.05;
        let (crashed_at, _) = run_frames(&mut engine, now, now + 60_000);
        now = crashed_at + 3_000;
        engine.complete_settle(now);
    }
    assert_eq!(engine.account().history.len(), 10);
    assert_eq!(engine.round().round_id, 25);
}

#[test]
fn test_storage_failure_keeps_memory_state() {
    let mut engine =
        RoundEngine::with_rng(CrashRules::default(), FullStore, ChaCha8Rng::seed_from_u64(1))
            .unwrap();
    engine.place_bet(100).unwrap();
    assert_eq!(engine.balance(), 900);
    engine.add_test_balance();
    assert_eq!(engine.balance(), 1_400);
}

#[test]
fn test_account_restored_from_store() {
    let mut store = MemoryStore::new();
    store.set(BALANCE_KEY, "250").unwrap();
    store.set(HIGHEST_MULTIPLIER_KEY, "4.2").unwrap();
    let engine =
        RoundEngine::with_rng(CrashRules::default(), store, ChaCha8Rng::seed_from_u64(3)).unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.balance, 250);
    assert_eq!(snapshot.highest_multiplier, 4.2);
    assert!(snapshot.history.is_empty());
}

#[test]
fn test_snapshot_potential_payout() {
    let mut engine = engine();
    engine.place_bet(40).unwrap();
    assert_eq!(engine.snapshot().potential_payout, None);
    engine.begin_round(0);
    engine.round.crash_point = 9.0;
    engine.round.current_multiplier = 2.5;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.potential_payout, Some(100));
    assert!(snapshot.has_active_bet);
    assert_eq!(snapshot.phase, RoundPhase::Running);
}

#[test]
fn test_low_balance_flag() {
    let mut store = MemoryStore::new();
    store.set(BALANCE_KEY, "50").unwrap();
    let mut engine =
        RoundEngine::with_rng(CrashRules::default(), store, ChaCha8Rng::seed_from_u64(9)).unwrap();
    assert!(engine.snapshot().low_balance);
    engine.add_test_balance();
    assert!(!engine.snapshot().low_balance);
}
