//! In-memory cluster model
//!
//! The engine's mirror of the simulator-owned physical state: machine power
//! phases, VM residency, task assignment, pending placements and in-flight
//! migrations. One owned struct, threaded by reference through the handlers;
//! every handler must re-establish the model invariants before returning.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use vatra_core::{
    CpuArch, MachineId, PowerPhase, Priority, Result, SState, SimTime, TaskId, VatraError, VmId,
    VmType,
};

/// Engine-side mirror of one machine.
#[derive(Debug, Clone)]
pub struct MachineMirror {
    pub arch: CpuArch,
    pub num_cpus: u32,
    pub memory_mb: u64,
    pub has_gpu: bool,
    pub phase: PowerPhase,
    pub s_state: SState,
    /// VMs hosted here. A migrating VM leaves the source set at migration
    /// begin and joins the target set at completion.
    pub residents: BTreeSet<VmId>,
    /// Tasks committed to this machine while it is not yet running.
    pub pending: VecDeque<TaskId>,
    pub last_change: SimTime,
}

/// Engine-side mirror of one VM.
#[derive(Debug, Clone)]
pub struct VmRecord {
    pub vm_type: VmType,
    pub arch: CpuArch,
    /// Current host, or the pending target while the VM is in flight.
    pub host: MachineId,
    pub tasks: Vec<TaskId>,
}

/// The cluster model. Mirrors everything the policies need so that handlers
/// only query the simulator for snapshots they cannot derive locally.
#[derive(Debug, Default)]
pub struct ClusterModel {
    pub machines: BTreeMap<MachineId, MachineMirror>,
    pub vms: HashMap<VmId, VmRecord>,
    /// Task -> VM hosting it. A task has exactly one assignment until its
    /// completion is delivered.
    pub assignments: HashMap<TaskId, VmId>,
    pub task_priority: HashMap<TaskId, Priority>,
    pub task_memory: HashMap<TaskId, u64>,
    /// VM -> migration target for every in-flight migration.
    pub in_flight: HashMap<VmId, MachineId>,
    /// Machines currently in the `On` phase.
    pub on_count: usize,
    pub by_arch: HashMap<CpuArch, Vec<MachineId>>,
    pub completed: [u64; 4],
    pub violations: [u64; 4],
}

impl ClusterModel {
    pub fn insert_machine(&mut self, id: MachineId, mirror: MachineMirror) {
        if mirror.phase == PowerPhase::On {
            self.on_count += 1;
        }
        self.by_arch.entry(mirror.arch).or_default().push(id);
        self.machines.insert(id, mirror);
    }

    pub fn machine(&self, id: MachineId) -> &MachineMirror {
        &self.machines[&id]
    }

    pub fn machine_mut(&mut self, id: MachineId) -> &mut MachineMirror {
        self.machines.get_mut(&id).expect("machine ids are fixed at init")
    }

    /// Candidate machines of one architecture, in stable id order.
    pub fn machines_of_arch(&self, arch: CpuArch) -> &[MachineId] {
        self.by_arch.get(&arch).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Core-fill term of the scoring function: resident VMs per core, or
    /// zero once the machine is saturated.
    pub fn core_fill(&self, pm: MachineId) -> f64 {
        let m = self.machine(pm);
        let vms = m.residents.len() as u32;
        if vms >= m.num_cpus {
            0.0
        } else {
            vms as f64 / m.num_cpus as f64
        }
    }

    /// Raw resident-VMs-per-core ratio, uncapped. Used by the utilisation
    /// sub-score, where a saturated machine must rank as busy, not idle.
    pub fn fill_ratio(&self, pm: MachineId) -> f64 {
        let m = self.machine(pm);
        if m.num_cpus == 0 {
            return 0.0;
        }
        m.residents.len() as f64 / m.num_cpus as f64
    }

    /// Count of tasks on `pm` that conflict with a task of `priority`:
    /// HIGH conflicts with resident HIGH tasks, MID with HIGH and MID,
    /// LOW with everything.
    pub fn priority_conflicts(&self, pm: MachineId, priority: Priority) -> usize {
        self.machine(pm)
            .residents
            .iter()
            .map(|vm| self.vm_conflicts(*vm, priority))
            .sum()
    }

    /// Same conflict count, restricted to one VM.
    pub fn vm_conflicts(&self, vm: VmId, priority: Priority) -> usize {
        let Some(rec) = self.vms.get(&vm) else { return 0 };
        rec.tasks
            .iter()
            .filter(|t| {
                let p = self.task_priority.get(t).copied().unwrap_or(Priority::Low);
                match priority {
                    Priority::High => p == Priority::High,
                    Priority::Mid => p == Priority::High || p == Priority::Mid,
                    Priority::Low => true,
                }
            })
            .count()
    }

    /// Memory committed by the tasks of one VM, from the engine's mirror.
    pub fn vm_memory(&self, vm: VmId) -> u64 {
        self.vms
            .get(&vm)
            .map(|rec| {
                rec.tasks
                    .iter()
                    .map(|t| self.task_memory.get(t).copied().unwrap_or(0))
                    .sum()
            })
            .unwrap_or(0)
    }

    /// A machine is a migration target iff some in-flight VM is headed to it.
    pub fn is_migration_target(&self, pm: MachineId) -> bool {
        self.in_flight.values().any(|dest| *dest == pm)
    }

    pub fn total_tasks(&self) -> usize {
        self.assignments.len()
    }

    pub fn total_vms(&self) -> usize {
        self.vms.len()
    }

    /// Verify the cross-table invariants that must hold between handler
    /// invocations. Called from tests and debug builds after every event.
    pub fn check_invariants(&self, min_on_floor: usize) -> Result<()> {
        // Every live task is on exactly one VM, and that VM is either
        // resident on its recorded host or in flight.
        for (task, vm) in &self.assignments {
            let rec = self
                .vms
                .get(vm)
                .ok_or_else(|| VatraError::invariant(format!("{task} assigned to missing {vm}")))?;
            if !rec.tasks.contains(task) {
                return Err(VatraError::invariant(format!("{task} not listed on {vm}")));
            }
            let resident = self.machines.get(&rec.host).is_some_and(|m| m.residents.contains(vm));
            let in_flight = self.in_flight.contains_key(vm);
            if resident == in_flight {
                return Err(VatraError::invariant(format!(
                    "{vm} must be resident or in flight, not both/neither (resident={resident})"
                )));
            }
        }

        // In-flight VMs are absent from every resident set.
        for vm in self.in_flight.keys() {
            if self.machines.values().any(|m| m.residents.contains(vm)) {
                return Err(VatraError::invariant(format!("in-flight {vm} still resident")));
            }
        }

        // Pending queues exist only on machines in transition.
        for (id, m) in &self.machines {
            if !m.pending.is_empty()
                && !matches!(
                    m.phase,
                    PowerPhase::TurningOn | PowerPhase::TurningOff | PowerPhase::Standby
                )
            {
                return Err(VatraError::invariant(format!(
                    "{id} has {} pending tasks in phase {:?}",
                    m.pending.len(),
                    m.phase
                )));
            }
        }

        // The running count matches the phases and respects the floor.
        // Machines already commanded awake count towards the floor, since a
        // freshly raised floor is met through transitions that are still in
        // flight.
        let on = self.machines.values().filter(|m| m.phase == PowerPhase::On).count();
        if on != self.on_count {
            return Err(VatraError::invariant(format!(
                "on_count {} does not match {} machines in On phase",
                self.on_count, on
            )));
        }
        let waking = self.machines.values().filter(|m| m.phase == PowerPhase::TurningOn).count();
        if on + waking < min_on_floor {
            return Err(VatraError::invariant(format!(
                "{on} running and {waking} waking, below the floor of {min_on_floor}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(arch: CpuArch, cpus: u32) -> MachineMirror {
        MachineMirror {
            arch,
            num_cpus: cpus,
            memory_mb: 32_768,
            has_gpu: false,
            phase: PowerPhase::On,
            s_state: SState::S0,
            residents: BTreeSet::new(),
            pending: VecDeque::new(),
            last_change: 0,
        }
    }

    fn model_with_two_machines() -> ClusterModel {
        let mut model = ClusterModel::default();
        model.insert_machine(MachineId(0), mirror(CpuArch::X86, 4));
        model.insert_machine(MachineId(1), mirror(CpuArch::Arm, 4));
        model
    }

    fn place_task(model: &mut ClusterModel, vm: VmId, pm: MachineId, task: TaskId, prio: Priority) {
        model.vms.entry(vm).or_insert(VmRecord {
            vm_type: VmType::Linux,
            arch: CpuArch::X86,
            host: pm,
            tasks: Vec::new(),
        });
        model.vms.get_mut(&vm).unwrap().tasks.push(task);
        model.machine_mut(pm).residents.insert(vm);
        model.assignments.insert(task, vm);
        model.task_priority.insert(task, prio);
        model.task_memory.insert(task, 1024);
    }

    #[test]
    fn test_core_fill_saturation() {
        let mut model = model_with_two_machines();
        assert_eq!(model.core_fill(MachineId(0)), 0.0);

        for i in 0..4 {
            place_task(&mut model, VmId(i), MachineId(0), TaskId(i), Priority::Mid);
        }
        // Saturated: the scoring term collapses to zero...
        assert_eq!(model.core_fill(MachineId(0)), 0.0);
        // ...but the raw ratio keeps reporting a full machine.
        assert_eq!(model.fill_ratio(MachineId(0)), 1.0);
    }

    #[test]
    fn test_priority_conflicts() {
        let mut model = model_with_two_machines();
        place_task(&mut model, VmId(0), MachineId(0), TaskId(0), Priority::High);
        place_task(&mut model, VmId(1), MachineId(0), TaskId(1), Priority::Mid);
        place_task(&mut model, VmId(2), MachineId(0), TaskId(2), Priority::Low);

        assert_eq!(model.priority_conflicts(MachineId(0), Priority::High), 1);
        assert_eq!(model.priority_conflicts(MachineId(0), Priority::Mid), 2);
        assert_eq!(model.priority_conflicts(MachineId(0), Priority::Low), 3);
        assert_eq!(model.priority_conflicts(MachineId(1), Priority::Low), 0);
    }

    #[test]
    fn test_invariants_catch_inflight_resident_vm() {
        let mut model = model_with_two_machines();
        place_task(&mut model, VmId(0), MachineId(0), TaskId(0), Priority::Mid);
        assert!(model.check_invariants(0).is_ok());

        // A VM both resident and in flight violates the migration invariant.
        model.in_flight.insert(VmId(0), MachineId(1));
        assert!(model.check_invariants(0).is_err());

        // Removing it from the resident set restores consistency.
        model.machine_mut(MachineId(0)).residents.remove(&VmId(0));
        assert!(model.check_invariants(0).is_ok());
    }

    #[test]
    fn test_invariants_catch_pending_on_running_machine() {
        let mut model = model_with_two_machines();
        model.machine_mut(MachineId(0)).pending.push_back(TaskId(9));
        assert!(model.check_invariants(0).is_err());

        model.machine_mut(MachineId(0)).phase = PowerPhase::TurningOn;
        model.on_count -= 1;
        assert!(model.check_invariants(0).is_ok());
    }

    #[test]
    fn test_is_migration_target() {
        let mut model = model_with_two_machines();
        assert!(!model.is_migration_target(MachineId(1)));
        model.in_flight.insert(VmId(3), MachineId(1));
        assert!(model.is_migration_target(MachineId(1)));
    }
}
