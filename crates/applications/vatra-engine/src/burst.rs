//! Burst detection
//!
//! A windowed arrival-rate classifier. Arrivals are counted in fixed-length
//! windows; when a window closes with a count above the burst threshold the
//! cluster is in a burst and idle machines are parked at a lighter sleep
//! tier so they wake fast. The burst ends after enough consecutive quiet
//! windows.

use std::collections::VecDeque;

use tracing::debug;
use vatra_core::{SState, SimTime};

use crate::config::SchedulerConfig;

#[derive(Debug)]
pub struct BurstDetector {
    window: SimTime,
    history: usize,
    burst_threshold: u32,
    quiet_threshold: u32,
    quiet_windows: u32,
    burst_tier: SState,
    calm_tier: SState,

    /// Arrival counts of the most recent closed windows, oldest first.
    ring: VecDeque<u32>,
    current: u32,
    window_start: SimTime,
    in_burst: bool,
    quiet: u32,
    tier: SState,
}

impl BurstDetector {
    pub fn new(cfg: &SchedulerConfig) -> Self {
        BurstDetector {
            window: cfg.burst_window,
            history: cfg.burst_history,
            burst_threshold: cfg.burst_threshold,
            quiet_threshold: cfg.quiet_threshold,
            quiet_windows: cfg.quiet_windows,
            burst_tier: cfg.burst_sleep_state,
            calm_tier: cfg.calm_sleep_state,
            ring: VecDeque::with_capacity(cfg.burst_history),
            current: 0,
            window_start: 0,
            in_burst: false,
            quiet: 0,
            tier: cfg.sleep_state,
        }
    }

    /// The sleep tier the detector currently prescribes for idle machines.
    pub fn tier(&self) -> SState {
        self.tier
    }

    pub fn in_burst(&self) -> bool {
        self.in_burst
    }

    /// Record one task arrival. Returns the new sleep tier if the arrival
    /// closed a window that changed the classification; tier changes only
    /// happen on window close, so repeated arrivals within one window are
    /// idempotent.
    pub fn on_arrival(&mut self, now: SimTime) -> Option<SState> {
        let changed = self.roll_to(now);
        self.current += 1;
        changed
    }

    /// Advance the window clock without recording an arrival.
    pub fn roll_to(&mut self, now: SimTime) -> Option<SState> {
        let mut changed = None;
        while now >= self.window_start + self.window {
            let count = self.current;
            self.current = 0;
            self.window_start += self.window;
            if self.ring.len() == self.history {
                self.ring.pop_front();
            }
            self.ring.push_back(count);

            if !self.in_burst && count > self.burst_threshold {
                self.in_burst = true;
                self.quiet = 0;
                if self.tier != self.burst_tier {
                    self.tier = self.burst_tier;
                    changed = Some(self.tier);
                }
                debug!(count, tier = %self.tier, "burst began");
            } else if self.in_burst && count < self.quiet_threshold {
                self.quiet += 1;
                if self.quiet >= self.quiet_windows {
                    self.in_burst = false;
                    self.quiet = 0;
                    if self.tier != self.calm_tier {
                        self.tier = self.calm_tier;
                        changed = Some(self.tier);
                    }
                    debug!(tier = %self.tier, "burst ended");
                }
            } else {
                self.quiet = 0;
            }
        }
        changed
    }
}
