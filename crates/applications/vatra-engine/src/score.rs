//! Machine scoring
//!
//! Ranks candidate machines for a task as a weighted scalar (higher is
//! better). The score favours machines that are already running at a light
//! sleep tier, have room, satisfy GPU needs, carry few priority conflicts
//! and have no wake queue. The same module also provides the utilisation
//! sub-score used to pick consolidation sources and shedding targets.

use vatra_core::{MachineId, MachineInfo, PowerPhase, Priority, SState, SimTime, SlaClass, TaskInfo};

use crate::config::ScoreWeights;
use crate::model::ClusterModel;

/// Power-phase preference: running beats waking beats sleeping beats
/// draining.
pub fn phase_factor(phase: PowerPhase) -> f64 {
    match phase {
        PowerPhase::On => 1.0,
        PowerPhase::TurningOn => 0.7,
        PowerPhase::Standby => 0.6,
        PowerPhase::Off => 0.5,
        PowerPhase::TurningOff => 0.2,
    }
}

/// Sleep-tier preference: lighter tiers wake faster.
pub fn s_state_factor(s: SState) -> f64 {
    match s {
        SState::S0 => 1.0,
        SState::S0i1 => 0.88,
        SState::S1 => 0.8,
        SState::S2 => 0.6,
        SState::S3 => 0.4,
        SState::S4 => 0.2,
        SState::S5 => 0.1,
    }
}

/// Utilisation sub-score: core fill and memory use, weighted 3:1, averaged.
pub fn utilization(fill_ratio: f64, mem_used_fraction: f64) -> f64 {
    (3.0 * fill_ratio + mem_used_fraction) / 4.0
}

/// Score one candidate machine for one task. The caller guarantees the CPU
/// architectures match.
pub fn machine_score(
    w: &ScoreWeights,
    model: &ClusterModel,
    pm: MachineId,
    info: &MachineInfo,
    task: &TaskInfo,
    now: SimTime,
    max_mips: u64,
) -> f64 {
    let mirror = model.machine(pm);

    let fill = model.core_fill(pm);
    let mem_free = (1.0 - info.memory_used_fraction()).clamp(0.0, 1.0);
    let gpu = if info.has_gpu && task.gpu_capable { 1.0 } else { 0.0 };
    let conflicts = model.priority_conflicts(pm, task.priority);
    let affinity = 1.0 / (1.0 + conflicts as f64);

    let mut mips_norm = if max_mips == 0 {
        0.0
    } else {
        info.mips[info.p_state.index()] as f64 / max_mips as f64
    };
    // Latency-sensitive work goes to fast machines that are also lightly
    // loaded, so the MIPS term decays with fill for SLA1.
    if task.sla == SlaClass::Sla1 {
        mips_norm *= 1.0 - fill;
    }

    let recency = if mirror.phase == PowerPhase::On {
        1.0
    } else {
        let age_secs = now.saturating_sub(mirror.last_change) as f64 / 1_000_000.0;
        1.0 / (1.0 + age_secs)
    };

    w.state * phase_factor(mirror.phase)
        + w.s_state * s_state_factor(mirror.s_state)
        + w.cores * fill
        + w.mem * mem_free
        + w.gpu * gpu
        + w.priority * affinity
        + w.mips * mips_norm
        + w.time * recency
        - w.pending * mirror.pending.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MachineMirror, VmRecord};
    use std::collections::{BTreeSet, VecDeque};
    use vatra_core::{CpuArch, PState, TaskId, VmId, VmType};

    fn mirror(phase: PowerPhase, s_state: SState) -> MachineMirror {
        MachineMirror {
            arch: CpuArch::X86,
            num_cpus: 4,
            memory_mb: 32_768,
            has_gpu: false,
            phase,
            s_state,
            residents: BTreeSet::new(),
            pending: VecDeque::new(),
            last_change: 0,
        }
    }

    fn info(id: u64) -> MachineInfo {
        MachineInfo {
            id: MachineId(id),
            arch: CpuArch::X86,
            num_cpus: 4,
            memory_mb: 32_768,
            memory_used_mb: 0,
            has_gpu: false,
            mips: [2000, 1500, 1000, 600],
            s_state: SState::S0,
            p_state: PState::P0,
        }
    }

    fn task() -> TaskInfo {
        TaskInfo {
            id: TaskId(0),
            required_arch: CpuArch::X86,
            required_vm_type: VmType::Linux,
            memory_mb: 1024,
            gpu_capable: false,
            sla: SlaClass::Sla2,
            priority: Priority::Mid,
            remaining_instructions: 1_000_000,
            arrival: 0,
            completion: None,
        }
    }

    fn add_vm(model: &mut ClusterModel, pm: MachineId, vm: VmId, tasks: &[(TaskId, Priority)]) {
        model.vms.insert(
            vm,
            VmRecord {
                vm_type: VmType::Linux,
                arch: CpuArch::X86,
                host: pm,
                tasks: tasks.iter().map(|(t, _)| *t).collect(),
            },
        );
        for (t, p) in tasks {
            model.task_priority.insert(*t, *p);
            model.assignments.insert(*t, vm);
        }
        model.machine_mut(pm).residents.insert(vm);
    }

    #[test]
    fn test_running_machine_outranks_sleeping_one() {
        let mut model = ClusterModel::default();
        model.insert_machine(MachineId(0), mirror(PowerPhase::On, SState::S0));
        model.insert_machine(MachineId(1), mirror(PowerPhase::Off, SState::S1));

        let w = ScoreWeights::default();
        let t = task();
        let on = machine_score(&w, &model, MachineId(0), &info(0), &t, 0, 2000);
        let off = machine_score(&w, &model, MachineId(1), &info(1), &t, 0, 2000);
        assert!(on > off, "running machine should win: {on} vs {off}");
    }

    #[test]
    fn test_saturated_machine_loses_to_sleeping_one() {
        let mut model = ClusterModel::default();
        model.insert_machine(MachineId(0), mirror(PowerPhase::On, SState::S0));
        model.insert_machine(MachineId(1), mirror(PowerPhase::Off, SState::S1));
        for i in 0..4 {
            add_vm(&mut model, MachineId(0), VmId(i), &[(TaskId(i), Priority::Mid)]);
        }

        let w = ScoreWeights::default();
        let t = task();
        let mut full = info(0);
        full.memory_used_mb = 4096;
        let on = machine_score(&w, &model, MachineId(0), &full, &t, 0, 2000);
        let off = machine_score(&w, &model, MachineId(1), &info(1), &t, 0, 2000);
        assert!(off > on, "saturated machine should lose to a wakeable one: {on} vs {off}");
    }

    #[test]
    fn test_pending_queue_penalises() {
        let mut model = ClusterModel::default();
        model.insert_machine(MachineId(0), mirror(PowerPhase::TurningOn, SState::S1));
        model.insert_machine(MachineId(1), mirror(PowerPhase::TurningOn, SState::S1));
        model.machine_mut(MachineId(1)).pending.push_back(TaskId(5));

        let w = ScoreWeights::default();
        let t = task();
        let clean = machine_score(&w, &model, MachineId(0), &info(0), &t, 0, 2000);
        let queued = machine_score(&w, &model, MachineId(1), &info(1), &t, 0, 2000);
        assert!(clean > queued);
        assert!((clean - queued - w.pending).abs() < 1e-9);
    }

    #[test]
    fn test_sla1_prefers_idle_fast_machine() {
        let mut model = ClusterModel::default();
        model.insert_machine(MachineId(0), mirror(PowerPhase::On, SState::S0));
        model.insert_machine(MachineId(1), mirror(PowerPhase::On, SState::S0));
        // Two Low tasks on pm0: no priority conflict for a High SLA1 task,
        // but the MIPS term decays with fill.
        add_vm(&mut model, MachineId(0), VmId(0), &[(TaskId(1), Priority::Low)]);
        add_vm(&mut model, MachineId(0), VmId(1), &[(TaskId(2), Priority::Low)]);

        let w = ScoreWeights { cores: 0.0, mem: 0.0, ..Default::default() };
        let mut t = task();
        t.sla = SlaClass::Sla1;
        t.priority = Priority::High;
        let busy = machine_score(&w, &model, MachineId(0), &info(0), &t, 0, 2000);
        let idle = machine_score(&w, &model, MachineId(1), &info(1), &t, 0, 2000);
        assert!(idle > busy);
    }

    #[test]
    fn test_utilization_weighting() {
        assert_eq!(utilization(1.0, 1.0), 1.0);
        assert_eq!(utilization(0.0, 0.0), 0.0);
        assert_eq!(utilization(1.0, 0.0), 0.75);
        assert_eq!(utilization(0.0, 1.0), 0.25);
    }

    #[test]
    fn test_recency_decays_for_sleeping_machines() {
        let mut model = ClusterModel::default();
        model.insert_machine(MachineId(0), mirror(PowerPhase::Off, SState::S1));
        let w = ScoreWeights::default();
        let t = task();
        let fresh = machine_score(&w, &model, MachineId(0), &info(0), &t, 0, 2000);
        let stale = machine_score(&w, &model, MachineId(0), &info(0), &t, 10_000_000, 2000);
        assert!(fresh > stale);
    }
}
