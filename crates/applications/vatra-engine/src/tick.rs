//! Periodic check
//!
//! The tick driver runs the maintenance work that is not tied to a specific
//! event: rolling the burst detector forward through quiet stretches,
//! reacting to cluster-wide overload by raising the running floor and
//! pre-waking machines, sweeping idle machines to sleep, and optionally
//! down-clocking lightly loaded cores.

use tracing::{debug, info};
use vatra_core::{ClusterSim, MachineId, PState, PowerPhase, Result, SimTime};

use crate::scheduler::Scheduler;

impl Scheduler {
    pub fn on_periodic_check(&mut self, sim: &mut dyn ClusterSim, now: SimTime) -> Result<()> {
        if let Some(tier) = self.burst.roll_to(now) {
            self.cfg.sleep_state = tier;
            self.realign_sleepers(sim, tier);
        }

        self.overload_check(sim, now);
        self.consolidate(sim, now);

        if self.cfg.dvfs {
            self.retune_core_performance(sim);
        }
        Ok(())
    }

    /// Raise the running floor and pre-wake machines when the cluster runs
    /// hot: core fill above 0.9, or crowded VMs while most machines are
    /// already awake.
    fn overload_check(&mut self, sim: &mut dyn ClusterSim, _now: SimTime) {
        let total = self.model.machines.len();
        if total == 0 {
            return;
        }

        let (on_cores, on_vms) = self
            .model
            .machines
            .values()
            .filter(|m| m.phase == PowerPhase::On)
            .fold((0u64, 0u64), |(c, v), m| (c + m.num_cpus as u64, v + m.residents.len() as u64));
        let core_fill = if on_cores == 0 { 1.0 } else { on_vms as f64 / on_cores as f64 };

        let vms = self.model.total_vms();
        let tasks_per_vm =
            if vms == 0 { 0.0 } else { self.model.total_tasks() as f64 / vms as f64 };

        let off = self
            .model
            .machines
            .values()
            .filter(|m| {
                matches!(m.phase, PowerPhase::Off | PowerPhase::Standby | PowerPhase::TurningOff)
            })
            .count();
        let off_ratio = off as f64 / total as f64;

        if core_fill > 0.9 || (tasks_per_vm > 10.0 && off_ratio < 0.5) {
            self.cfg.min_pm_fraction_on = (self.cfg.min_pm_fraction_on + 0.1).min(1.0);
            let floor = self.cfg.min_on_floor(total);
            let waking = self
                .model
                .machines
                .values()
                .filter(|m| m.phase == PowerPhase::TurningOn)
                .count();
            let deficit = floor.saturating_sub(self.model.on_count + waking);
            info!(
                core_fill,
                tasks_per_vm,
                floor,
                deficit,
                "cluster overloaded, raising the running floor"
            );

            if deficit > 0 {
                // Shallowest sleepers wake fastest.
                let mut sleepers: Vec<MachineId> = self
                    .model
                    .machines
                    .iter()
                    .filter(|(_, m)| matches!(m.phase, PowerPhase::Off | PowerPhase::Standby))
                    .map(|(id, _)| *id)
                    .collect();
                sleepers.sort_by_key(|pm| (self.model.machine(*pm).s_state, *pm));
                for pm in sleepers.into_iter().take(deficit) {
                    self.command_wake(sim, pm);
                }
            }
        }
    }

    /// Down-clock lightly loaded machines, bucketed by utilisation.
    fn retune_core_performance(&mut self, sim: &mut dyn ClusterSim) {
        let running: Vec<MachineId> = self
            .model
            .machines
            .iter()
            .filter(|(_, m)| m.phase == PowerPhase::On)
            .map(|(id, _)| *id)
            .collect();
        for pm in running {
            let util = self.utilization(sim, pm);
            let target = if util < 0.25 {
                PState::P3
            } else if util < 0.5 {
                PState::P2
            } else if util < 0.75 {
                PState::P1
            } else {
                PState::P0
            };
            let info = sim.machine_info(pm);
            if info.p_state != target {
                debug!(%pm, util, ?target, "retuning core performance");
                for core in 0..info.num_cpus {
                    sim.set_core_performance(pm, core, target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::sim::{MachineSpec, SimCluster, TaskSpec};
    use vatra_core::SState;

    #[test]
    fn test_tick_sweeps_idle_machine_to_sleep() {
        let mut sim = SimCluster::new(vec![MachineSpec::default(); 2]);
        let cfg = SchedulerConfig { min_pm_fraction_on: 0.5, ..Default::default() };
        let mut sched = Scheduler::new(cfg);
        sched.init(&mut sim, 0);

        sched.on_periodic_check(&mut sim, 1_000_000).unwrap();

        // Two idle machines, floor of one: exactly one goes to sleep.
        assert_eq!(sched.model().on_count, 1);
        assert_eq!(sched.model().machine(MachineId(1)).phase, PowerPhase::On);
        assert_eq!(sched.model().machine(MachineId(0)).phase, PowerPhase::TurningOff);
        sched.check_invariants().unwrap();
    }

    #[test]
    fn test_overload_prewakes_sleepers() {
        let mut sim = SimCluster::new(vec![
            MachineSpec { num_cpus: 1, ..Default::default() },
            MachineSpec { num_cpus: 1, initial_s_state: SState::S1, ..Default::default() },
            MachineSpec { num_cpus: 1, initial_s_state: SState::S4, ..Default::default() },
            MachineSpec { num_cpus: 1, initial_s_state: SState::S5, ..Default::default() },
        ]);
        let cfg = SchedulerConfig { min_pm_fraction_on: 0.5, ..Default::default() };
        let mut sched = Scheduler::new(cfg);
        sched.init(&mut sim, 0);

        // Saturate the single running core.
        let t = sim.submit(TaskSpec::default());
        sched.on_new_task(&mut sim, 0, t).unwrap();

        sched.on_periodic_check(&mut sim, 1_000_000).unwrap();

        // Fill is 1.0 > 0.9: the floor rises to two machines, and the
        // shallow S1 sleeper is the one pre-woken.
        assert!(sched.config().min_pm_fraction_on > 0.5);
        assert_eq!(sched.model().machine(MachineId(1)).phase, PowerPhase::TurningOn);
        assert_eq!(sched.model().machine(MachineId(2)).phase, PowerPhase::Off);
        assert_eq!(sched.model().machine(MachineId(3)).phase, PowerPhase::Off);
        sched.check_invariants().unwrap();
    }

    #[test]
    fn test_dvfs_downclocks_idle_machines() {
        let mut sim = SimCluster::new(vec![MachineSpec::default()]);
        let cfg = SchedulerConfig { dvfs: true, min_pm_fraction_on: 1.0, ..Default::default() };
        let mut sched = Scheduler::new(cfg);
        sched.init(&mut sim, 0);

        sched.on_periodic_check(&mut sim, 1_000_000).unwrap();
        assert_eq!(sim.machine_info(MachineId(0)).p_state, PState::P3);

        // Load it up and the cores clock back towards P0.
        for _ in 0..4 {
            let t = sim.submit(TaskSpec::default());
            sched.on_new_task(&mut sim, 0, t).unwrap();
        }
        sched.on_periodic_check(&mut sim, 2_000_000).unwrap();
        assert_eq!(sim.machine_info(MachineId(0)).p_state, PState::P0);
    }
}
