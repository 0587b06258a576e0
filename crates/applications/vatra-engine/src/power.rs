//! Power-state controller
//!
//! Machines move along the sleep ladder asynchronously: the engine commands
//! a transition and reconciles its phase mirror when the simulator delivers
//! the completion. Tasks committed to a machine mid-transition wait in its
//! pending queue; arrival at S0 drains the queue, arrival at a sleep tier
//! with a non-empty queue triggers an immediate re-wake.

use tracing::debug;
use vatra_core::{ClusterSim, MachineId, PowerPhase, Result, SState, SimTime, TaskId};

use crate::scheduler::Scheduler;

impl Scheduler {
    /// Command a wake to S0 and mark the machine as turning on.
    pub(crate) fn command_wake(&mut self, sim: &mut dyn ClusterSim, pm: MachineId) {
        sim.set_machine_state(pm, SState::S0);
        self.model.machine_mut(pm).phase = PowerPhase::TurningOn;
        debug!(%pm, "waking machine");
    }

    /// Command a sleep transition and mark the machine as turning off. The
    /// running count drops here, at command time, so the floor checks see
    /// the machine as unavailable immediately.
    pub(crate) fn command_sleep(&mut self, sim: &mut dyn ClusterSim, pm: MachineId, tier: SState) {
        if self.model.machine(pm).phase == PowerPhase::On {
            self.model.on_count -= 1;
        }
        sim.set_machine_state(pm, tier);
        self.model.machine_mut(pm).phase = PowerPhase::TurningOff;
        debug!(%pm, %tier, "machine going to sleep");
    }

    /// Re-issue sleep commands so parked machines match a new sleep tier,
    /// after the burst detector retargets it.
    pub(crate) fn realign_sleepers(&mut self, sim: &mut dyn ClusterSim, tier: SState) {
        let stale: Vec<MachineId> = self
            .model
            .machines
            .iter()
            .filter(|(_, m)| {
                matches!(m.phase, PowerPhase::Off | PowerPhase::Standby) && m.s_state != tier
            })
            .map(|(id, _)| *id)
            .collect();
        for pm in stale {
            self.command_sleep(sim, pm, tier);
        }
    }

    pub fn on_state_change_complete(
        &mut self,
        sim: &mut dyn ClusterSim,
        time: SimTime,
        pm: MachineId,
    ) -> Result<()> {
        let info = sim.machine_info(pm);
        {
            let m = self.model.machine_mut(pm);
            m.last_change = time;
            m.s_state = info.s_state;
        }

        if info.s_state == SState::S0 {
            if self.model.machine(pm).phase != PowerPhase::On {
                self.model.machine_mut(pm).phase = PowerPhase::On;
                self.model.on_count += 1;
            }
            let pending: Vec<TaskId> =
                std::mem::take(&mut self.model.machine_mut(pm).pending).into_iter().collect();
            if !pending.is_empty() {
                debug!(%pm, queued = pending.len(), "machine awake, draining pending placements");
            }
            for task in pending {
                let t = sim.task_info(task);
                self.assign_to_machine(sim, time, pm, task, &t);
            }
        } else if !self.model.machine(pm).pending.is_empty() {
            // Tasks were committed here while the sleep transition was in
            // flight: wake straight back up.
            debug!(%pm, s_state = %info.s_state, "sleep arrival with pending work, re-waking");
            self.command_wake(sim, pm);
        } else {
            let phase = if info.s_state == self.cfg.standby_state {
                PowerPhase::Standby
            } else {
                PowerPhase::Off
            };
            self.model.machine_mut(pm).phase = phase;
        }
        Ok(())
    }
}
