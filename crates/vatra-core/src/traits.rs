//! The simulator boundary
//!
//! The `ClusterSim` trait is the interface the engine drives the simulator
//! through. The engine works through this interface ONLY - never concrete
//! types - so tests can substitute a scripted double for the real simulator.
//!
//! Commands with asynchronous completion (`migrate_vm`, `set_machine_state`)
//! return immediately; the simulator delivers the matching
//! [`Event::MigrationDone`](crate::Event) / [`Event::StateChangeComplete`](crate::Event)
//! later. Every query returns a snapshot of the simulator's state at call time.

use crate::types::*;

/// The event/command API the simulator exposes to the engine.
pub trait ClusterSim {
    /// Total number of machines in the cluster.
    fn machine_count(&self) -> usize;

    /// Identifiers of every machine, in stable ascending order.
    fn machine_ids(&self) -> Vec<MachineId>;

    fn machine_info(&self, pm: MachineId) -> MachineInfo;
    fn task_info(&self, task: TaskId) -> TaskInfo;
    fn vm_info(&self, vm: VmId) -> VmInfo;

    /// Compliance percentage (0-100) for the given SLA class so far.
    fn sla_report(&self, class: SlaClass) -> f64;

    /// Cumulative cluster energy in kWh.
    fn cluster_energy(&self) -> f64;

    /// Create a VM of the given guest type on the given architecture.
    /// The VM is not hosted anywhere until [`ClusterSim::attach_vm`].
    fn create_vm(&mut self, vm_type: VmType, arch: CpuArch) -> VmId;

    fn attach_vm(&mut self, vm: VmId, pm: MachineId);

    fn add_task(&mut self, vm: VmId, task: TaskId, priority: Priority);

    /// Begin migrating a VM to another machine. Completion is delivered
    /// asynchronously; the VM cannot receive commands until then.
    fn migrate_vm(&mut self, vm: VmId, dest: MachineId);

    fn shutdown_vm(&mut self, vm: VmId);

    /// Begin a power-state transition. Exactly one
    /// `StateChangeComplete` is delivered per call.
    fn set_machine_state(&mut self, pm: MachineId, state: SState);

    fn set_core_performance(&mut self, pm: MachineId, core: u32, p_state: PState);

    fn set_task_priority(&mut self, task: TaskId, priority: Priority);
}
