//! Task placement
//!
//! Handles new-task arrivals: every machine of the required architecture is
//! ranked by the scoring function and the winner receives the task. Running
//! machines get the task immediately through the VM-selection subroutine;
//! sleeping machines are woken with the task queued; machines already in
//! transition just queue it and let the power controller finish the job.

use tracing::debug;
use vatra_core::{
    ClusterSim, MachineId, PowerPhase, Result, SimTime, TaskId, TaskInfo, VatraError, VmId,
};

use crate::model::VmRecord;
use crate::scheduler::Scheduler;
use crate::score::machine_score;

enum VmChoice {
    Fresh,
    Existing(VmId),
}

impl Scheduler {
    pub fn on_new_task(
        &mut self,
        sim: &mut dyn ClusterSim,
        now: SimTime,
        task: TaskId,
    ) -> Result<()> {
        if let Some(tier) = self.burst.on_arrival(now) {
            self.cfg.sleep_state = tier;
            self.realign_sleepers(sim, tier);
        }

        let t = sim.task_info(task);
        let candidates = self.model.machines_of_arch(t.required_arch);
        let mut best: Option<(MachineId, f64)> = None;
        for &pm in candidates {
            let info = sim.machine_info(pm);
            let score =
                machine_score(&self.cfg.weights, &self.model, pm, &info, &t, now, self.max_mips);
            // Strictly-greater keeps the lowest id on ties.
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((pm, score));
            }
        }
        let Some((pm, score)) = best else {
            return Err(VatraError::NoCompatibleMachine { task, arch: t.required_arch });
        };
        debug!(%task, %pm, score, phase = ?self.model.machine(pm).phase, "placement decision");

        match self.model.machine(pm).phase {
            PowerPhase::On => self.assign_to_machine(sim, now, pm, task, &t),
            PowerPhase::Off | PowerPhase::Standby => {
                self.command_wake(sim, pm);
                self.model.machine_mut(pm).pending.push_back(task);
            }
            // Already waking: ride the transition in progress. Already
            // draining: the completion handler will observe the queue and
            // wake the machine straight back up.
            PowerPhase::TurningOn | PowerPhase::TurningOff => {
                self.model.machine_mut(pm).pending.push_back(task);
            }
        }
        Ok(())
    }

    /// VM-selection subroutine for a running machine: create a fresh VM
    /// while cores are free, otherwise share the resident VM of matching
    /// guest type with the fewest priority conflicts (then fewest tasks).
    /// If nothing matches, a fresh VM is created even past the core count.
    pub(crate) fn assign_to_machine(
        &mut self,
        sim: &mut dyn ClusterSim,
        _now: SimTime,
        pm: MachineId,
        task: TaskId,
        t: &TaskInfo,
    ) {
        let mirror = self.model.machine(pm);
        let choice = if mirror.residents.len() < mirror.num_cpus as usize {
            VmChoice::Fresh
        } else {
            let mut best: Option<(usize, usize, VmId)> = None;
            for &vm in &mirror.residents {
                let rec = &self.model.vms[&vm];
                if rec.vm_type != t.required_vm_type {
                    continue;
                }
                let key = (self.model.vm_conflicts(vm, t.priority), rec.tasks.len(), vm);
                if best.map_or(true, |b| key < b) {
                    best = Some(key);
                }
            }
            match best {
                Some((_, _, vm)) => VmChoice::Existing(vm),
                None => VmChoice::Fresh,
            }
        };

        let vm = match choice {
            VmChoice::Existing(vm) => vm,
            VmChoice::Fresh => {
                let vm = sim.create_vm(t.required_vm_type, t.required_arch);
                sim.attach_vm(vm, pm);
                self.model.vms.insert(
                    vm,
                    VmRecord {
                        vm_type: t.required_vm_type,
                        arch: t.required_arch,
                        host: pm,
                        tasks: Vec::new(),
                    },
                );
                self.model.machine_mut(pm).residents.insert(vm);
                vm
            }
        };

        sim.add_task(vm, task, t.priority);
        self.model.assignments.insert(task, vm);
        if let Some(rec) = self.model.vms.get_mut(&vm) {
            rec.tasks.push(task);
        }
        self.model.task_priority.insert(task, t.priority);
        self.model.task_memory.insert(task, t.memory_mb);
        debug!(%task, %vm, %pm, "task assigned");
    }
}
