use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::engine::{CountdownOutcome, FrameOutcome, RoundEngine, RoundSnapshot};
use crate::round::RoundPhase;
use crate::storage::KeyValueStore;

type SharedEngine<S, R> = Arc<Mutex<RoundEngine<S, R>>>;

/// Runs a `RoundEngine` against real time.
///
/// A single background task owns the countdown interval, the frame interval
/// and the post-crash sleep, so every engine mutation is serialized through
/// one mutex. Player commands go through `with_engine`; presentation reads
/// `RoundSnapshot`s from the watch channel. The task stops on `shutdown`, and
/// is aborted if the driver is dropped without it.
pub struct RoundDriver<S: KeyValueStore, R: Rng> {
    engine: SharedEngine<S, R>,
    snapshots: Arc<watch::Sender<RoundSnapshot>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<S, R> RoundDriver<S, R>
where
    S: KeyValueStore + Send + 'static,
    R: Rng + Send + 'static,
{
    /// Start the countdown and the timers. Must be called inside a tokio runtime.
    pub fn spawn(engine: RoundEngine<S, R>) -> Self {
        let (tx, _rx) = watch::channel(engine.snapshot());
        let snapshots = Arc::new(tx);
        let engine = Arc::new(Mutex::new(engine));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_rounds(
            Arc::clone(&engine),
            Arc::clone(&snapshots),
            shutdown_rx,
        ));

        Self {
            engine,
            snapshots,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Run a command against the engine and publish the resulting state
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut RoundEngine<S, R>) -> T) -> T {
        let mut engine = lock(&self.engine);
        let result = f(&mut engine);
        self.snapshots.send_replace(engine.snapshot());
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<RoundSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the timers and wait for the background task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Round driver task ended abnormally: {e}");
            }
        }
    }
}

impl<S: KeyValueStore, R: Rng> Drop for RoundDriver<S, R> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock<S: KeyValueStore, R: Rng>(engine: &SharedEngine<S, R>) -> MutexGuard<'_, RoundEngine<S, R>> {
    // A panicked command leaves the engine in a consistent state between
    // operations, so keep going with it
    engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn millis_since(epoch: Instant, at: Instant) -> u64 {
    at.saturating_duration_since(epoch).as_millis() as u64
}

fn now_ms(epoch: Instant) -> u64 {
    millis_since(epoch, Instant::now())
}

async fn run_rounds<S, R>(
    engine: SharedEngine<S, R>,
    snapshots: Arc<watch::Sender<RoundSnapshot>>,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: KeyValueStore + Send + 'static,
    R: Rng + Send + 'static,
{
    let epoch = Instant::now();
    let second = Duration::from_secs(1);
    let (frame_period, mut last_phase) = {
        let engine = lock(&engine);
        if engine.phase() == RoundPhase::CountingDown {
            log::info!("Next round in {}s", engine.countdown_remaining());
        }
        snapshots.send_replace(engine.snapshot());
        (
            Duration::from_millis(engine.rules().frame_interval_ms),
            engine.phase(),
        )
    };

    let mut countdown = interval_at(Instant::now() + second, second);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames = interval(frame_period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let (phase, settle_at) = {
            let engine = lock(&engine);
            (engine.phase(), engine.settle_deadline())
        };
        if phase != last_phase {
            match phase {
                RoundPhase::CountingDown => countdown.reset(),
                RoundPhase::Running => frames.reset(),
                RoundPhase::Crashed => {}
            }
            last_phase = phase;
        }
        let settle_deadline = settle_at
            .map(|ms| epoch + Duration::from_millis(ms))
            .unwrap_or_else(Instant::now);

        tokio::select! {
            _ = &mut shutdown => break,
            _ = countdown.tick(), if phase == RoundPhase::CountingDown => {
                let mut engine = lock(&engine);
                if let CountdownOutcome::Ticking(remaining) = engine.countdown_tick(now_ms(epoch)) {
                    log::debug!("Countdown {remaining}s");
                }
                snapshots.send_replace(engine.snapshot());
            }
            scheduled = frames.tick(), if phase == RoundPhase::Running => {
                // Stamp the frame with its slot, not the wake-up time, so a late
                // wake-up never lands inside the engine's throttle window
                let mut engine = lock(&engine);
                if let FrameOutcome::AutoCashedOut(payout) = engine.frame(millis_since(epoch, scheduled)) {
                    log::debug!("Auto cash-out paid {payout}");
                }
                snapshots.send_replace(engine.snapshot());
            }
            _ = sleep_until(settle_deadline), if phase == RoundPhase::Crashed => {
                let mut engine = lock(&engine);
                engine.complete_settle(now_ms(epoch));
                snapshots.send_replace(engine.snapshot());
            }
        }
    }

    log::info!("Round driver stopped");
}
