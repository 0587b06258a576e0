//! Core types shared across Vatra components

use serde::{Deserialize, Serialize};

/// Simulation timestamp in microseconds.
pub type SimTime = u64;

/// Unique identifier for a physical machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId(pub u64);

/// Unique identifier for a virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmId(pub u64);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pm{}", self.0)
    }
}

impl std::fmt::Display for VmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vm{}", self.0)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task{}", self.0)
    }
}

/// CPU architecture of a machine or required by a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuArch {
    X86,
    Arm,
    Power,
    Riscv,
}

impl std::fmt::Display for CpuArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuArch::X86 => write!(f, "x86"),
            CpuArch::Arm => write!(f, "arm"),
            CpuArch::Power => write!(f, "power"),
            CpuArch::Riscv => write!(f, "riscv"),
        }
    }
}

/// Guest type a VM runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmType {
    Linux,
    LinuxRt,
    Win,
    Aix,
}

/// Machine power tier. `S0` is running; deeper tiers are slower to wake
/// but cheaper to maintain. Declaration order is the ladder order, so the
/// derived `Ord` compares by depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SState {
    S0,
    S0i1,
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl SState {
    /// Position on the sleep ladder, 0 for running.
    pub fn depth(self) -> u8 {
        match self {
            SState::S0 => 0,
            SState::S0i1 => 1,
            SState::S1 => 2,
            SState::S2 => 3,
            SState::S3 => 4,
            SState::S4 => 5,
            SState::S5 => 6,
        }
    }

    pub fn is_sleep(self) -> bool {
        self != SState::S0
    }
}

impl std::fmt::Display for SState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SState::S0 => write!(f, "S0"),
            SState::S0i1 => write!(f, "S0i1"),
            SState::S1 => write!(f, "S1"),
            SState::S2 => write!(f, "S2"),
            SState::S3 => write!(f, "S3"),
            SState::S4 => write!(f, "S4"),
            SState::S5 => write!(f, "S5"),
        }
    }
}

/// Core clock/performance tier of an active machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PState {
    P0,
    P1,
    P2,
    P3,
}

impl PState {
    /// Index into per-p-state MIPS tables.
    pub fn index(self) -> usize {
        match self {
            PState::P0 => 0,
            PState::P1 => 1,
            PState::P2 => 2,
            PState::P3 => 3,
        }
    }
}

/// Task scheduling priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Mid,
    Low,
}

/// Service-level agreement class. Lower classes carry tighter latency
/// allowances; `Sla3` is best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlaClass {
    Sla0,
    Sla1,
    Sla2,
    Sla3,
}

impl SlaClass {
    pub const ALL: [SlaClass; 4] = [SlaClass::Sla0, SlaClass::Sla1, SlaClass::Sla2, SlaClass::Sla3];

    /// Index into per-class counter arrays.
    pub fn index(self) -> usize {
        match self {
            SlaClass::Sla0 => 0,
            SlaClass::Sla1 => 1,
            SlaClass::Sla2 => 2,
            SlaClass::Sla3 => 3,
        }
    }
}

impl std::fmt::Display for SlaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SLA{}", self.index())
    }
}

/// Power phase of a machine as tracked by the engine. Transitions between
/// the running and sleeping ends of the ladder are asynchronous, so the
/// engine observes the intermediate `TurningOn`/`TurningOff` phases until
/// the simulator delivers the matching state-change completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerPhase {
    On,
    TurningOn,
    TurningOff,
    Standby,
    Off,
}

/// Static and dynamic properties of a machine, as reported by the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub id: MachineId,
    pub arch: CpuArch,
    pub num_cpus: u32,
    pub memory_mb: u64,
    pub memory_used_mb: u64,
    pub has_gpu: bool,
    /// MIPS per core at each p-state, indexed by [`PState::index`].
    pub mips: [u64; 4],
    pub s_state: SState,
    pub p_state: PState,
}

impl MachineInfo {
    /// Fraction of machine memory currently committed, clamped to [0, 1].
    pub fn memory_used_fraction(&self) -> f64 {
        if self.memory_mb == 0 {
            return 0.0;
        }
        (self.memory_used_mb as f64 / self.memory_mb as f64).clamp(0.0, 1.0)
    }
}

/// Task requirements and progress, as reported by the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub required_arch: CpuArch,
    pub required_vm_type: VmType,
    pub memory_mb: u64,
    pub gpu_capable: bool,
    pub sla: SlaClass,
    pub priority: Priority,
    pub remaining_instructions: u64,
    pub arrival: SimTime,
    pub completion: Option<SimTime>,
}

/// VM residency and assignment snapshot, as reported by the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInfo {
    pub id: VmId,
    pub vm_type: VmType,
    pub arch: CpuArch,
    /// Host machine; during a migration this is the pending target.
    pub host: Option<MachineId>,
    pub active_tasks: Vec<TaskId>,
}

/// Inbound events the engine handles, delivered one at a time by the
/// simulator. Each handler runs to completion before the next event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    NewTask { time: SimTime, task: TaskId },
    TaskComplete { time: SimTime, task: TaskId },
    MigrationDone { time: SimTime, vm: VmId },
    StateChangeComplete { time: SimTime, pm: MachineId },
    MemoryWarning { time: SimTime, pm: MachineId },
    SlaWarning { time: SimTime, task: TaskId },
    PeriodicCheck { time: SimTime },
    SimulationComplete { time: SimTime },
}

impl Event {
    pub fn time(&self) -> SimTime {
        match *self {
            Event::NewTask { time, .. }
            | Event::TaskComplete { time, .. }
            | Event::MigrationDone { time, .. }
            | Event::StateChangeComplete { time, .. }
            | Event::MemoryWarning { time, .. }
            | Event::SlaWarning { time, .. }
            | Event::PeriodicCheck { time }
            | Event::SimulationComplete { time } => time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sstate_ladder_order() {
        assert!(SState::S0 < SState::S0i1);
        assert!(SState::S0i1 < SState::S1);
        assert!(SState::S4 < SState::S5);
        assert_eq!(SState::S0.depth(), 0);
        assert_eq!(SState::S5.depth(), 6);
        assert!(!SState::S0.is_sleep());
        assert!(SState::S0i1.is_sleep());
    }

    #[test]
    fn test_memory_used_fraction_clamps() {
        let mut info = MachineInfo {
            id: MachineId(0),
            arch: CpuArch::X86,
            num_cpus: 4,
            memory_mb: 1024,
            memory_used_mb: 512,
            has_gpu: false,
            mips: [2000, 1500, 1000, 600],
            s_state: SState::S0,
            p_state: PState::P0,
        };
        assert_eq!(info.memory_used_fraction(), 0.5);

        // Overcommitted machines report a full fraction, not > 1.
        info.memory_used_mb = 4096;
        assert_eq!(info.memory_used_fraction(), 1.0);

        info.memory_mb = 0;
        assert_eq!(info.memory_used_fraction(), 0.0);
    }

    #[test]
    fn test_event_time_accessor() {
        let e = Event::NewTask { time: 42, task: TaskId(7) };
        assert_eq!(e.time(), 42);
        let e = Event::PeriodicCheck { time: 9 };
        assert_eq!(e.time(), 9);
    }
}
