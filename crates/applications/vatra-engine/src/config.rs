//! Scheduler configuration
//!
//! All policy knobs live here: the sleep tier used for idle machines, the
//! consolidation and shedding thresholds, the burst-detector windows, and
//! the weights of the machine-scoring function. Defaults are the tuned
//! build-time values; the CLI can override any of them.

use serde::{Deserialize, Serialize};
use vatra_core::{SState, SimTime};

/// Weights of the machine-scoring function (see [`crate::score`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Power-phase factor (running beats waking beats sleeping).
    pub state: f64,
    /// Sleep-tier factor (lighter tiers wake faster).
    pub s_state: f64,
    /// Core-fill factor (prefer filling machines that already host VMs).
    pub cores: f64,
    /// Free-memory fraction.
    pub mem: f64,
    /// GPU availability when the task can use one.
    pub gpu: f64,
    /// Priority-affinity factor (avoid priority conflicts).
    pub priority: f64,
    /// Penalty per task already queued for a waking machine.
    pub pending: f64,
    /// Recency of the last phase change for non-running machines.
    pub time: f64,
    /// Normalised MIPS at the machine's current p-state.
    pub mips: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            state: 1.0,
            s_state: 0.6,
            cores: 0.8,
            mem: 0.5,
            gpu: 0.4,
            priority: 1.2,
            pending: 0.9,
            time: 0.1,
            mips: 0.6,
        }
    }
}

/// Policy configuration for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sleep tier commanded for an idle machine. The burst detector may
    /// retarget this at runtime.
    pub sleep_state: SState,

    /// Sleep tier that maps to the `Standby` phase on arrival; any other
    /// non-running tier maps to `Off`.
    pub standby_state: SState,

    /// Lower bound on the fraction of machines kept running cluster-wide.
    pub min_pm_fraction_on: f64,

    /// Below this utilisation a running machine becomes a consolidation
    /// source.
    pub consolidation_util_threshold: f64,

    /// Above this utilisation an SLA warning triggers load shedding.
    pub sla_shed_util_threshold: f64,

    pub weights: ScoreWeights,

    /// Burst-detector window length in microseconds.
    pub burst_window: SimTime,
    /// Number of windows of history the detector keeps.
    pub burst_history: usize,
    /// Arrivals per window above which a burst begins.
    pub burst_threshold: u32,
    /// Arrivals per window below which a window counts as quiet.
    pub quiet_threshold: u32,
    /// Consecutive quiet windows that end a burst.
    pub quiet_windows: u32,
    /// Sleep tier used while a burst is active.
    pub burst_sleep_state: SState,
    /// Sleep tier used outside bursts.
    pub calm_sleep_state: SState,

    /// Down-clock lightly loaded machines on periodic checks.
    pub dvfs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            sleep_state: SState::S1,
            standby_state: SState::S0i1,
            min_pm_fraction_on: 0.25,
            consolidation_util_threshold: 0.3,
            sla_shed_util_threshold: 0.8,
            weights: ScoreWeights::default(),
            burst_window: 100_000,
            burst_history: 5,
            burst_threshold: 50,
            quiet_threshold: 10,
            quiet_windows: 3,
            burst_sleep_state: SState::S0i1,
            calm_sleep_state: SState::S1,
            dvfs: false,
        }
    }
}

impl SchedulerConfig {
    /// Minimum number of machines that must stay running for a cluster of
    /// `total` machines.
    pub fn min_on_floor(&self, total: usize) -> usize {
        (self.min_pm_fraction_on * total as f64).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_ordered() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.consolidation_util_threshold < cfg.sla_shed_util_threshold);
        assert!(cfg.quiet_threshold < cfg.burst_threshold);
        assert!(cfg.burst_sleep_state < cfg.calm_sleep_state);
    }

    #[test]
    fn test_min_on_floor() {
        let cfg = SchedulerConfig { min_pm_fraction_on: 0.25, ..Default::default() };
        assert_eq!(cfg.min_on_floor(16), 4);
        assert_eq!(cfg.min_on_floor(3), 0);
        assert_eq!(cfg.min_on_floor(5), 1);
    }
}
