//! Migration lifecycle
//!
//! A migrating VM leaves its source resident set the moment the command is
//! issued and exists only in the in-flight table until the simulator
//! delivers the completion. Nothing may shut the VM down in between; if its
//! last task finished mid-flight, the completion handler retires it on
//! arrival instead.

use tracing::debug;
use vatra_core::{ClusterSim, MachineId, Result, SimTime, VatraError, VmId};

use crate::scheduler::Scheduler;

impl Scheduler {
    /// Issue a migration command and update the bookkeeping: the VM is no
    /// longer resident anywhere, and the target machine becomes a migration
    /// target that must not be put to sleep.
    pub(crate) fn begin_migration(&mut self, sim: &mut dyn ClusterSim, vm: VmId, dest: MachineId) {
        sim.migrate_vm(vm, dest);
        if let Some(rec) = self.model.vms.get_mut(&vm) {
            let src = rec.host;
            rec.host = dest;
            self.model.machine_mut(src).residents.remove(&vm);
            self.model.in_flight.insert(vm, dest);
            debug!(%vm, %src, %dest, "migration began");
        }
    }

    pub fn on_migration_done(
        &mut self,
        sim: &mut dyn ClusterSim,
        _now: SimTime,
        vm: VmId,
    ) -> Result<()> {
        let dest = self.model.in_flight.remove(&vm).ok_or(VatraError::UnknownVm(vm))?;
        let landed = sim.vm_info(vm).host;
        if landed != Some(dest) {
            return Err(VatraError::invariant(format!(
                "{vm} landed on {landed:?}, expected {dest}"
            )));
        }

        self.model.machine_mut(dest).residents.insert(vm);

        // The VM's last task may have completed while it was in flight; the
        // deferred shutdown happens here.
        let idle = self.model.vms.get(&vm).map_or(true, |rec| rec.tasks.is_empty());
        if idle {
            sim.shutdown_vm(vm);
            self.model.machine_mut(dest).residents.remove(&vm);
            self.model.vms.remove(&vm);
            debug!(%vm, %dest, "VM arrived empty and was retired");
        } else {
            debug!(%vm, %dest, "migration complete");
        }
        Ok(())
    }
}
