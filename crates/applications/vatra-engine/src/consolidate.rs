//! Completion handling and consolidation
//!
//! When a task completes, its VM is retired if nothing else runs there and
//! no migration is in flight. The interesting part is the sweep that
//! follows: running machines below the consolidation threshold get their
//! VMs migrated onto denser machines so the emptied sources can be put to
//! sleep, bounded below by the configured running floor.

use tracing::{debug, info};
use vatra_core::{ClusterSim, MachineId, PowerPhase, Result, SimTime, TaskId, VatraError, VmId};

use crate::scheduler::Scheduler;

impl Scheduler {
    pub fn on_task_complete(
        &mut self,
        sim: &mut dyn ClusterSim,
        now: SimTime,
        task: TaskId,
    ) -> Result<()> {
        let vm = self.model.assignments.remove(&task).ok_or(VatraError::UnknownTask(task))?;
        self.model.task_priority.remove(&task);
        self.model.task_memory.remove(&task);

        let info = sim.task_info(task);
        self.model.completed[info.sla.index()] += 1;

        if let Some(rec) = self.model.vms.get_mut(&vm) {
            rec.tasks.retain(|t| *t != task);
        }
        debug!(%task, %vm, sla = %info.sla, "task complete");

        // An empty VM is only shut down once no migration holds it; the
        // migration-done handler retires it otherwise.
        let idle = self.model.vms.get(&vm).map_or(false, |rec| rec.tasks.is_empty());
        if idle && !self.model.in_flight.contains_key(&vm) {
            let host = self.model.vms[&vm].host;
            sim.shutdown_vm(vm);
            self.model.machine_mut(host).residents.remove(&vm);
            self.model.vms.remove(&vm);
            debug!(%vm, %host, "idle VM retired");
        }

        self.consolidate(sim, now);
        Ok(())
    }

    /// Sweep under-utilised running machines: migrate their VMs onto denser
    /// machines and put the emptied sources to sleep. Also run from the
    /// periodic check so an idle machine never survives two ticks.
    pub(crate) fn consolidate(&mut self, sim: &mut dyn ClusterSim, _now: SimTime) {
        let ranked = self.ranked_on_machines(sim);
        let floor = self.cfg.min_on_floor(self.model.machines.len());

        for &(src, util) in &ranked {
            // Ascending order: the first machine at or above the threshold
            // ends the sweep.
            if util >= self.cfg.consolidation_util_threshold {
                break;
            }
            if self.model.machine(src).phase != PowerPhase::On {
                continue;
            }

            // Snapshot: migrations mutate the resident set under us.
            let residents: Vec<VmId> = self.model.machine(src).residents.iter().copied().collect();
            let mut all_moved = true;
            for vm in residents {
                match self.find_dense_destination(sim, vm, &ranked, src) {
                    Some(dest) => self.begin_migration(sim, vm, dest),
                    None => all_moved = false,
                }
            }

            let drained = self.model.machine(src).residents.is_empty();
            if all_moved
                && drained
                && self.model.on_count > floor
                && !self.model.is_migration_target(src)
            {
                let tier = self.cfg.sleep_state;
                self.command_sleep(sim, src, tier);
                info!(%src, %tier, "consolidated machine to sleep");
            }
        }
    }

    /// Pick a destination for a VM leaving an under-utilised source: scan
    /// the utilisation ranking from the dense end and take the first
    /// running machine of matching architecture with room for the VM.
    fn find_dense_destination(
        &self,
        sim: &dyn ClusterSim,
        vm: VmId,
        ranked: &[(MachineId, f64)],
        src: MachineId,
    ) -> Option<MachineId> {
        let rec = self.model.vms.get(&vm)?;
        let needed = self.model.vm_memory(vm);
        for &(dest, _) in ranked.iter().rev() {
            if dest == src || self.model.machine(dest).phase != PowerPhase::On {
                continue;
            }
            if self.model.machine(dest).arch != rec.arch {
                continue;
            }
            let info = sim.machine_info(dest);
            if info.memory_used_mb + self.inbound_memory(dest) + needed <= info.memory_mb {
                return Some(dest);
            }
        }
        None
    }
}
