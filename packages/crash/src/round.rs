use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Current phase of the round cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    CountingDown,
    Running,
    Crashed,
}

/// One plotted point of the multiplier curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub elapsed: f64,
    pub multiplier: f64,
}

/// The single active round owned by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub round_id: u64,
    pub phase: RoundPhase,
    /// Hidden from the player until the round crashes
    pub crash_point: f64,
    /// Set when the round enters `Running`
    pub start_time_ms: Option<u64>,
    pub current_multiplier: f64,
    pub samples: VecDeque<Sample>,
    pub countdown_remaining: u32,
    pub max_samples: usize,
}

impl RoundState {
    pub fn new(countdown_seconds: u32, max_samples: usize) -> Self {
        Self {
            round_id: 0,
            phase: RoundPhase::CountingDown,
            crash_point: 1.0,
            start_time_ms: None,
            current_multiplier: 1.0,
            samples: VecDeque::with_capacity(max_samples),
            countdown_remaining: countdown_seconds,
            max_samples,
        }
    }

    /// Clear per-round transient state and enter the countdown
    pub fn reset_for_countdown(&mut self, countdown_seconds: u32) {
        self.phase = RoundPhase::CountingDown;
        self.countdown_remaining = countdown_seconds;
        self.current_multiplier = 1.0;
        self.start_time_ms = None;
        self.samples.clear();
    }

    pub fn start_running(&mut self, crash_point: f64, now_ms: u64) {
        self.round_id += 1;
        self.phase = RoundPhase::Running;
        self.crash_point = crash_point;
        self.start_time_ms = Some(now_ms);
        self.current_multiplier = 1.0;
        self.countdown_remaining = 0;
        self.samples.clear();
        self.samples.push_back(Sample {
            elapsed: 0.0,
            multiplier: 1.0,
        });
    }

    /// Seconds since the round started running
    pub fn elapsed_secs(&self, now_ms: u64) -> f64 {
        match self.start_time_ms {
            Some(start) => now_ms.saturating_sub(start) as f64 / 1000.0,
            None => 0.0,
        }
    }

    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Append a sample, evicting the oldest beyond the cap
    pub fn push_sample(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    pub fn crash(&mut self) {
        self.current_multiplier = self.crash_point;
        self.phase = RoundPhase::Crashed;
    }

    pub fn is_running(&self) -> bool {
        self.phase == RoundPhase::Running
    }

    /// Crash point, revealed only once the round has crashed
    pub fn revealed_crash_point(&self) -> Option<f64> {
        if self.phase == RoundPhase::Crashed {
            Some(self.crash_point)
        } else {
            None
        }
    }
}
