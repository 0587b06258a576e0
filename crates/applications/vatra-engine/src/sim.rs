//! Reference discrete-event simulator
//!
//! An in-process stand-in for the external simulator: enough machine and
//! task physics to exercise the engine end to end. Owns the event queue
//! (a min-heap of timed events), the physical cluster state, energy
//! accounting and SLA compliance bookkeeping. Implements [`ClusterSim`] so
//! the engine drives it exactly like the real boundary.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use vatra_core::{
    ClusterSim, CpuArch, Event, MachineId, MachineInfo, PState, Priority, Result, SState, SimTime,
    SlaClass, TaskId, TaskInfo, VatraError, VmId, VmInfo, VmType,
};

use crate::config::SchedulerConfig;
use crate::report::Report;
use crate::scheduler::Scheduler;

/// Entering any sleep tier takes a fixed short transition.
const SLEEP_ENTRY_US: u64 = 1_000;
/// Migration cost: setup plus copy time proportional to VM memory.
const MIGRATION_BASE_US: u64 = 1_000;
const MIGRATION_US_PER_MB: u64 = 50;
/// SLA warnings fire at this fraction of the allowance.
const SLA_WARN_FRACTION: f64 = 0.9;

/// Wake latency back to S0, by the tier being left.
fn wake_latency_us(from: SState) -> u64 {
    match from {
        SState::S0 => 1_000,
        SState::S0i1 => 1_000,
        SState::S1 => 10_000,
        SState::S2 => 50_000,
        SState::S3 => 100_000,
        SState::S4 => 1_000_000,
        SState::S5 => 10_000_000,
    }
}

/// Allowed slowdown over the ideal runtime, per SLA class. `Sla3` is
/// best-effort and always compliant.
fn sla_allowance(sla: SlaClass) -> Option<f64> {
    match sla {
        SlaClass::Sla0 => Some(1.2),
        SlaClass::Sla1 => Some(1.5),
        SlaClass::Sla2 => Some(2.0),
        SlaClass::Sla3 => None,
    }
}

/// Static description of one machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    pub arch: CpuArch,
    pub num_cpus: u32,
    pub memory_mb: u64,
    pub has_gpu: bool,
    /// MIPS per core at each p-state.
    pub mips: [u64; 4],
    pub initial_s_state: SState,
}

impl Default for MachineSpec {
    fn default() -> Self {
        MachineSpec {
            arch: CpuArch::X86,
            num_cpus: 4,
            memory_mb: 32_768,
            has_gpu: false,
            mips: [2000, 1500, 1000, 600],
            initial_s_state: SState::S0,
        }
    }
}

/// Static description of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub arrival: SimTime,
    pub instructions: u64,
    pub arch: CpuArch,
    pub vm_type: VmType,
    pub memory_mb: u64,
    pub gpu_capable: bool,
    pub sla: SlaClass,
    pub priority: Priority,
}

impl Default for TaskSpec {
    fn default() -> Self {
        TaskSpec {
            arrival: 0,
            // Five seconds on a 2000-MIPS core.
            instructions: 10_000_000_000,
            arch: CpuArch::X86,
            vm_type: VmType::Linux,
            memory_mb: 1024,
            gpu_capable: false,
            sla: SlaClass::Sla2,
            priority: Priority::Mid,
        }
    }
}

#[derive(Debug)]
struct SimMachine {
    spec: MachineSpec,
    s_state: SState,
    cores: Vec<PState>,
    memory_used_mb: u64,
    active_tasks: u32,
    /// Commanded transitions not yet completed, in command order.
    transitions: VecDeque<SState>,
    energy_j: f64,
    last_accrual: SimTime,
}

impl SimMachine {
    fn new(spec: MachineSpec) -> Self {
        let s_state = spec.initial_s_state;
        let cores = vec![PState::P0; spec.num_cpus as usize];
        SimMachine {
            spec,
            s_state,
            cores,
            memory_used_mb: 0,
            active_tasks: 0,
            transitions: VecDeque::new(),
            energy_j: 0.0,
            last_accrual: 0,
        }
    }

    fn effective_mips(&self) -> u64 {
        self.spec.mips[self.cores[0].index()]
    }

    fn power_w(&self) -> f64 {
        match self.s_state {
            SState::S0 => {
                if self.active_tasks > 0 {
                    match self.cores[0] {
                        PState::P0 => 200.0,
                        PState::P1 => 160.0,
                        PState::P2 => 120.0,
                        PState::P3 => 90.0,
                    }
                } else {
                    60.0
                }
            }
            SState::S0i1 => 12.0,
            SState::S1 => 10.0,
            SState::S2 => 8.0,
            SState::S3 => 5.0,
            SState::S4 => 2.0,
            SState::S5 => 1.0,
        }
    }

    /// Integrate energy up to `now` before any state change.
    fn accrue(&mut self, now: SimTime) {
        let dt = now.saturating_sub(self.last_accrual);
        self.energy_j += self.power_w() * dt as f64 / 1_000_000.0;
        self.last_accrual = now;
    }
}

#[derive(Debug)]
struct SimVm {
    vm_type: VmType,
    arch: CpuArch,
    host: Option<MachineId>,
    migrating_to: Option<MachineId>,
    tasks: Vec<TaskId>,
}

#[derive(Debug)]
struct SimTask {
    spec: TaskSpec,
    priority: Priority,
    vm: Option<VmId>,
    started: Option<SimTime>,
    completion: Option<SimTime>,
    deadline: Option<SimTime>,
}

#[derive(Debug, Clone, Copy)]
enum SimEventKind {
    Arrival(TaskId),
    Completion(TaskId),
    MigrationDone(VmId),
    StateChange(MachineId),
    SlaCheck(TaskId),
    MemoryWarning(MachineId),
    Tick,
}

/// Timed event wrapper for priority queue ordering.
#[derive(Debug)]
struct TimedEvent {
    time: SimTime,
    seq: u64,
    kind: SimEventKind,
}

// Reverse comparison for min-heap behaviour; the sequence number keeps
// same-timestamp events in command order.
impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.cmp(&self.time).then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for TimedEvent {}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

/// The simulated cluster.
pub struct SimCluster {
    machines: Vec<SimMachine>,
    tasks: BTreeMap<TaskId, SimTask>,
    vms: HashMap<VmId, SimVm>,
    queue: BinaryHeap<TimedEvent>,
    next_task: u64,
    next_vm: u64,
    seq: u64,
    now: SimTime,
    tick_interval: Option<SimTime>,
    horizon: SimTime,
    sla_done: [u64; 4],
    sla_ok: [u64; 4],
    finished: bool,
}

impl SimCluster {
    pub fn new(specs: Vec<MachineSpec>) -> Self {
        SimCluster {
            machines: specs.into_iter().map(SimMachine::new).collect(),
            tasks: BTreeMap::new(),
            vms: HashMap::new(),
            queue: BinaryHeap::new(),
            next_task: 0,
            next_vm: 0,
            seq: 0,
            now: 0,
            tick_interval: None,
            horizon: 0,
            sla_done: [0; 4],
            sla_ok: [0; 4],
            finished: false,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Deliver periodic checks every `interval` until `horizon`.
    pub fn schedule_ticks(&mut self, interval: SimTime, horizon: SimTime) {
        self.tick_interval = Some(interval);
        self.horizon = horizon;
        self.push(interval, SimEventKind::Tick);
    }

    /// Register a task; its arrival event fires at `spec.arrival`.
    pub fn submit(&mut self, spec: TaskSpec) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        let arrival = spec.arrival;
        let priority = spec.priority;
        self.tasks.insert(
            id,
            SimTask { spec, priority, vm: None, started: None, completion: None, deadline: None },
        );
        self.push(arrival, SimEventKind::Arrival(id));
        id
    }

    fn push(&mut self, time: SimTime, kind: SimEventKind) {
        self.seq += 1;
        self.queue.push(TimedEvent { time, seq: self.seq, kind });
    }

    fn machine(&self, pm: MachineId) -> &SimMachine {
        &self.machines[pm.0 as usize]
    }

    fn machine_mut(&mut self, pm: MachineId) -> &mut SimMachine {
        &mut self.machines[pm.0 as usize]
    }

    /// Pop the next event for the engine. Stale events (completions of
    /// finished tasks, SLA checks for retired work) are consumed silently.
    /// Once the queue drains, a single simulation-complete event fires.
    pub fn next_event(&mut self) -> Option<Event> {
        loop {
            let Some(te) = self.queue.pop() else {
                if self.finished {
                    return None;
                }
                self.finished = true;
                self.now = self.now.max(self.horizon);
                return Some(Event::SimulationComplete { time: self.now });
            };
            self.now = self.now.max(te.time);
            let time = self.now;

            match te.kind {
                SimEventKind::Arrival(task) => return Some(Event::NewTask { time, task }),
                SimEventKind::Completion(task) => {
                    if self.complete_task(task, time) {
                        return Some(Event::TaskComplete { time, task });
                    }
                }
                SimEventKind::MigrationDone(vm) => {
                    if self.finish_migration(vm) {
                        return Some(Event::MigrationDone { time, vm });
                    }
                }
                SimEventKind::StateChange(pm) => {
                    let m = self.machine_mut(pm);
                    m.accrue(time);
                    if let Some(target) = m.transitions.pop_front() {
                        m.s_state = target;
                    }
                    return Some(Event::StateChangeComplete { time, pm });
                }
                SimEventKind::SlaCheck(task) => {
                    // A warning racing a completion at the same timestamp is
                    // still delivered; the engine must tolerate it. Checks
                    // for work that finished earlier are consumed here.
                    let deliver = self.tasks.get(&task).map_or(false, |t| {
                        (t.completion.is_none() && t.vm.is_some())
                            || t.completion == Some(time)
                    });
                    if deliver {
                        return Some(Event::SlaWarning { time, task });
                    }
                }
                SimEventKind::MemoryWarning(pm) => return Some(Event::MemoryWarning { time, pm }),
                SimEventKind::Tick => {
                    if let Some(interval) = self.tick_interval {
                        if time + interval <= self.horizon {
                            self.push(time + interval, SimEventKind::Tick);
                        }
                    }
                    return Some(Event::PeriodicCheck { time });
                }
            }
        }
    }

    /// Retire a task: record SLA compliance, free its memory, detach it
    /// from its VM. Returns false if the task already finished or was never
    /// placed.
    fn complete_task(&mut self, task: TaskId, time: SimTime) -> bool {
        let Some(t) = self.tasks.get_mut(&task) else { return false };
        if t.completion.is_some() || t.vm.is_none() {
            return false;
        }
        t.completion = Some(time);
        let idx = t.spec.sla.index();
        self.sla_done[idx] += 1;
        if t.deadline.map_or(true, |d| time <= d) {
            self.sla_ok[idx] += 1;
        }
        let memory = t.spec.memory_mb;
        let vm_id = t.vm.take().expect("checked above");

        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.tasks.retain(|id| *id != task);
            // Memory is accounted on the physical host for the whole
            // flight, so release it there even mid-migration.
            if let Some(pm) = vm.host {
                let m = &mut self.machines[pm.0 as usize];
                m.accrue(time);
                m.memory_used_mb = m.memory_used_mb.saturating_sub(memory);
                m.active_tasks = m.active_tasks.saturating_sub(1);
            }
        }
        true
    }

    /// Land a migrating VM on its target: move memory and task accounting
    /// from the old host to the new one.
    fn finish_migration(&mut self, vm_id: VmId) -> bool {
        let Some(vm) = self.vms.get_mut(&vm_id) else { return false };
        let Some(dest) = vm.migrating_to.take() else { return false };
        let old = vm.host;
        vm.host = Some(dest);
        let moved_tasks = vm.tasks.len() as u32;
        let moved_mem: u64 =
            vm.tasks.iter().filter_map(|t| self.tasks.get(t)).map(|t| t.spec.memory_mb).sum();

        if let Some(src) = old {
            let m = &mut self.machines[src.0 as usize];
            m.accrue(self.now);
            m.memory_used_mb = m.memory_used_mb.saturating_sub(moved_mem);
            m.active_tasks = m.active_tasks.saturating_sub(moved_tasks);
        }
        let d = &mut self.machines[dest.0 as usize];
        d.accrue(self.now);
        d.memory_used_mb += moved_mem;
        d.active_tasks += moved_tasks;
        if d.memory_used_mb > d.spec.memory_mb {
            self.push(self.now, SimEventKind::MemoryWarning(dest));
        }
        true
    }

    /// Test hook: finish a task immediately, out of band. The scheduled
    /// completion event becomes stale and is consumed silently.
    pub fn force_complete(&mut self, task: TaskId) {
        self.complete_task(task, self.now);
    }
}

impl ClusterSim for SimCluster {
    fn machine_count(&self) -> usize {
        self.machines.len()
    }

    fn machine_ids(&self) -> Vec<MachineId> {
        (0..self.machines.len() as u64).map(MachineId).collect()
    }

    fn machine_info(&self, pm: MachineId) -> MachineInfo {
        let m = self.machine(pm);
        MachineInfo {
            id: pm,
            arch: m.spec.arch,
            num_cpus: m.spec.num_cpus,
            memory_mb: m.spec.memory_mb,
            memory_used_mb: m.memory_used_mb,
            has_gpu: m.spec.has_gpu,
            mips: m.spec.mips,
            s_state: m.s_state,
            p_state: m.cores[0],
        }
    }

    fn task_info(&self, task: TaskId) -> TaskInfo {
        let t = &self.tasks[&task];
        TaskInfo {
            id: task,
            required_arch: t.spec.arch,
            required_vm_type: t.spec.vm_type,
            memory_mb: t.spec.memory_mb,
            gpu_capable: t.spec.gpu_capable,
            sla: t.spec.sla,
            priority: t.priority,
            remaining_instructions: if t.completion.is_some() { 0 } else { t.spec.instructions },
            arrival: t.spec.arrival,
            completion: t.completion,
        }
    }

    fn vm_info(&self, vm: VmId) -> VmInfo {
        let v = &self.vms[&vm];
        VmInfo {
            id: vm,
            vm_type: v.vm_type,
            arch: v.arch,
            // A migrating VM reports its pending target.
            host: v.migrating_to.or(v.host),
            active_tasks: v.tasks.clone(),
        }
    }

    fn sla_report(&self, class: SlaClass) -> f64 {
        let idx = class.index();
        if self.sla_done[idx] == 0 {
            100.0
        } else {
            self.sla_ok[idx] as f64 / self.sla_done[idx] as f64 * 100.0
        }
    }

    fn cluster_energy(&self) -> f64 {
        let joules: f64 = self
            .machines
            .iter()
            .map(|m| m.energy_j + m.power_w() * self.now.saturating_sub(m.last_accrual) as f64 / 1_000_000.0)
            .sum();
        joules / 3_600_000.0
    }

    fn create_vm(&mut self, vm_type: VmType, arch: CpuArch) -> VmId {
        let id = VmId(self.next_vm);
        self.next_vm += 1;
        self.vms.insert(id, SimVm { vm_type, arch, host: None, migrating_to: None, tasks: Vec::new() });
        id
    }

    fn attach_vm(&mut self, vm: VmId, pm: MachineId) {
        if let Some(v) = self.vms.get_mut(&vm) {
            v.host = Some(pm);
        }
    }

    fn add_task(&mut self, vm: VmId, task: TaskId, priority: Priority) {
        let now = self.now;
        let Some(v) = self.vms.get_mut(&vm) else { return };
        let Some(pm) = v.host else { return };
        v.tasks.push(task);

        let (mips, p0_mips, capacity, used) = {
            let m = &mut self.machines[pm.0 as usize];
            m.accrue(now);
            m.active_tasks += 1;
            let t = &self.tasks[&task];
            m.memory_used_mb += t.spec.memory_mb;
            (m.effective_mips(), m.spec.mips[0], m.spec.memory_mb, m.memory_used_mb)
        };
        if used > capacity {
            self.push(now, SimEventKind::MemoryWarning(pm));
        }

        let (arrival, instructions, sla) = {
            let t = self.tasks.get_mut(&task).expect("task registered at submit");
            t.vm = Some(vm);
            t.priority = priority;
            t.started = Some(now);
            (t.spec.arrival, t.spec.instructions, t.spec.sla)
        };

        // One instruction per microsecond per MIPS.
        let duration = instructions / mips.max(1);
        self.push(now + duration, SimEventKind::Completion(task));

        if let Some(factor) = sla_allowance(sla) {
            let ideal = instructions / p0_mips.max(1);
            let allowed = (ideal as f64 * factor) as u64;
            let deadline = arrival + allowed;
            if let Some(t) = self.tasks.get_mut(&task) {
                t.deadline = Some(deadline);
            }
            let warn_at = (arrival + (allowed as f64 * SLA_WARN_FRACTION) as u64).max(now);
            self.push(warn_at, SimEventKind::SlaCheck(task));
        }
    }

    fn migrate_vm(&mut self, vm: VmId, dest: MachineId) {
        let now = self.now;
        let Some(v) = self.vms.get_mut(&vm) else { return };
        v.migrating_to = Some(dest);
        let moved_mem: u64 =
            v.tasks.iter().filter_map(|t| self.tasks.get(t)).map(|t| t.spec.memory_mb).sum();
        let latency = MIGRATION_BASE_US + moved_mem * MIGRATION_US_PER_MB;
        self.push(now + latency, SimEventKind::MigrationDone(vm));
    }

    fn shutdown_vm(&mut self, vm: VmId) {
        let Some(v) = self.vms.remove(&vm) else { return };
        let freed: u64 =
            v.tasks.iter().filter_map(|t| self.tasks.get(t)).map(|t| t.spec.memory_mb).sum();
        if let Some(pm) = v.host {
            let now = self.now;
            let m = &mut self.machines[pm.0 as usize];
            m.accrue(now);
            m.memory_used_mb = m.memory_used_mb.saturating_sub(freed);
            m.active_tasks = m.active_tasks.saturating_sub(v.tasks.len() as u32);
        }
        for task in v.tasks {
            if let Some(t) = self.tasks.get_mut(&task) {
                t.vm = None;
            }
        }
    }

    fn set_machine_state(&mut self, pm: MachineId, state: SState) {
        let now = self.now;
        let m = self.machine_mut(pm);
        m.accrue(now);
        // Latency depends on the tier the machine will be leaving when this
        // command starts executing.
        let from = m.transitions.back().copied().unwrap_or(m.s_state);
        let latency = if state == SState::S0 { wake_latency_us(from) } else { SLEEP_ENTRY_US };
        m.transitions.push_back(state);
        self.push(now + latency, SimEventKind::StateChange(pm));
    }

    fn set_core_performance(&mut self, pm: MachineId, core: u32, p_state: PState) {
        let now = self.now;
        let m = self.machine_mut(pm);
        m.accrue(now);
        if let Some(slot) = m.cores.get_mut(core as usize) {
            *slot = p_state;
        }
    }

    fn set_task_priority(&mut self, task: TaskId, priority: Priority) {
        if let Some(t) = self.tasks.get_mut(&task) {
            t.priority = priority;
        }
    }
}

/// One simulation run: the reference cluster plus a scheduler, stepped one
/// event at a time with invariant checks between handlers in debug builds.
pub struct Simulation {
    pub sim: SimCluster,
    pub sched: Scheduler,
}

impl Simulation {
    pub fn new(machines: Vec<MachineSpec>, cfg: SchedulerConfig) -> Self {
        Simulation { sim: SimCluster::new(machines), sched: Scheduler::new(cfg) }
    }

    pub fn submit(&mut self, spec: TaskSpec) -> TaskId {
        self.sim.submit(spec)
    }

    pub fn schedule_ticks(&mut self, interval: SimTime, horizon: SimTime) {
        self.sim.schedule_ticks(interval, horizon);
    }

    pub fn run(&mut self) -> Result<Report> {
        let now = self.sim.now();
        self.sched.init(&mut self.sim, now);
        while let Some(event) = self.sim.next_event() {
            if let Some(report) = self.sched.handle(&mut self.sim, event)? {
                return Ok(report);
            }
            if cfg!(debug_assertions) {
                self.sched.check_invariants()?;
            }
        }
        Err(VatraError::invariant("simulator drained without delivering completion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_pop_in_time_order() {
        let mut sim = SimCluster::new(vec![MachineSpec::default()]);
        sim.submit(TaskSpec { arrival: 300, ..Default::default() });
        sim.submit(TaskSpec { arrival: 100, ..Default::default() });
        sim.submit(TaskSpec { arrival: 200, ..Default::default() });

        let times: Vec<SimTime> = std::iter::from_fn(|| sim.next_event())
            .take(3)
            .map(|e| e.time())
            .collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_same_timestamp_keeps_command_order() {
        let mut sim = SimCluster::new(vec![MachineSpec::default()]);
        let a = sim.submit(TaskSpec::default());
        let b = sim.submit(TaskSpec::default());
        let first = sim.next_event().unwrap();
        let second = sim.next_event().unwrap();
        assert_eq!(first, Event::NewTask { time: 0, task: a });
        assert_eq!(second, Event::NewTask { time: 0, task: b });
    }

    #[test]
    fn test_state_change_round_trip() {
        let mut sim = SimCluster::new(vec![MachineSpec::default()]);
        sim.set_machine_state(MachineId(0), SState::S1);
        let e = sim.next_event().unwrap();
        assert_eq!(e, Event::StateChangeComplete { time: SLEEP_ENTRY_US, pm: MachineId(0) });
        assert_eq!(sim.machine_info(MachineId(0)).s_state, SState::S1);

        // Waking from S1 costs its wake latency.
        sim.set_machine_state(MachineId(0), SState::S0);
        let e = sim.next_event().unwrap();
        assert_eq!(
            e,
            Event::StateChangeComplete {
                time: SLEEP_ENTRY_US + wake_latency_us(SState::S1),
                pm: MachineId(0)
            }
        );
        assert_eq!(sim.machine_info(MachineId(0)).s_state, SState::S0);
    }

    #[test]
    fn test_task_completion_records_compliance() {
        let mut sim = SimCluster::new(vec![MachineSpec::default()]);
        let task = sim.submit(TaskSpec { sla: SlaClass::Sla0, ..Default::default() });
        assert!(matches!(sim.next_event(), Some(Event::NewTask { .. })));

        let vm = sim.create_vm(VmType::Linux, CpuArch::X86);
        sim.attach_vm(vm, MachineId(0));
        sim.add_task(vm, task, Priority::Mid);

        // Drain until the completion fires; the on-time run is compliant.
        loop {
            match sim.next_event() {
                Some(Event::TaskComplete { task: t, .. }) => {
                    assert_eq!(t, task);
                    break;
                }
                Some(_) => continue,
                None => panic!("completion never fired"),
            }
        }
        assert_eq!(sim.sla_report(SlaClass::Sla0), 100.0);
        assert_eq!(sim.task_info(task).remaining_instructions, 0);
    }

    #[test]
    fn test_overcommit_emits_memory_warning() {
        let mut sim = SimCluster::new(vec![MachineSpec { memory_mb: 1000, ..Default::default() }]);
        let task = sim.submit(TaskSpec { memory_mb: 1500, ..Default::default() });
        assert!(matches!(sim.next_event(), Some(Event::NewTask { .. })));

        let vm = sim.create_vm(VmType::Linux, CpuArch::X86);
        sim.attach_vm(vm, MachineId(0));
        sim.add_task(vm, task, Priority::Mid);

        assert_eq!(sim.next_event(), Some(Event::MemoryWarning { time: 0, pm: MachineId(0) }));
    }

    #[test]
    fn test_energy_accrues_more_when_awake() {
        let mut awake = SimCluster::new(vec![MachineSpec::default()]);
        let mut asleep =
            SimCluster::new(vec![MachineSpec { initial_s_state: SState::S5, ..Default::default() }]);
        awake.now = 3_600_000_000;
        asleep.now = 3_600_000_000;

        // One idle hour at S0 (60 W) vs one hour at S5 (1 W).
        assert!((awake.cluster_energy() - 0.06).abs() < 1e-6);
        assert!((asleep.cluster_energy() - 0.001).abs() < 1e-6);
    }
}
