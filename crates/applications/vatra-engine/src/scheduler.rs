//! The event reactor
//!
//! `Scheduler` owns the cluster model and policy state and exposes one
//! entry point per inbound simulator event. The simulator invokes one
//! handler at a time; each runs to completion, re-establishing the model
//! invariants before it returns. Commands back to the simulator go through
//! the [`ClusterSim`] trait passed into every handler.
//!
//! The handlers themselves live in the policy modules: placement in
//! [`crate::placement`], completion and consolidation in
//! [`crate::consolidate`], migration bookkeeping in [`crate::migration`],
//! power-state reconciliation in [`crate::power`], SLA reaction in
//! [`crate::sla`], and the periodic check in [`crate::tick`].

use std::cmp::Ordering;

use tracing::info;
use vatra_core::{ClusterSim, Event, MachineId, PowerPhase, Result, SState, SimTime, VmId};

use crate::burst::BurstDetector;
use crate::config::SchedulerConfig;
use crate::model::{ClusterModel, MachineMirror};
use crate::report::Report;
use crate::score;

pub struct Scheduler {
    pub(crate) cfg: SchedulerConfig,
    pub(crate) model: ClusterModel,
    pub(crate) burst: BurstDetector,
    /// Fastest P0 rating in the cluster, for MIPS normalisation.
    pub(crate) max_mips: u64,
}

impl Scheduler {
    pub fn new(cfg: SchedulerConfig) -> Self {
        let burst = BurstDetector::new(&cfg);
        Scheduler { cfg, model: ClusterModel::default(), burst, max_mips: 0 }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    pub fn model(&self) -> &ClusterModel {
        &self.model
    }

    /// Mirror the cluster once at startup. Machines the simulator reports
    /// as running start in the `On` phase; anything else is `Off`.
    pub fn init(&mut self, sim: &mut dyn ClusterSim, now: SimTime) {
        for pm in sim.machine_ids() {
            let info = sim.machine_info(pm);
            let phase = if info.s_state == SState::S0 { PowerPhase::On } else { PowerPhase::Off };
            self.max_mips = self.max_mips.max(info.mips[0]);
            self.model.insert_machine(
                pm,
                MachineMirror {
                    arch: info.arch,
                    num_cpus: info.num_cpus,
                    memory_mb: info.memory_mb,
                    has_gpu: info.has_gpu,
                    phase,
                    s_state: info.s_state,
                    residents: Default::default(),
                    pending: Default::default(),
                    last_change: now,
                },
            );
        }
        info!(machines = self.model.machines.len(), on = self.model.on_count, "scheduler initialised");
    }

    /// Dispatch one inbound event. Returns the final report when the
    /// simulation-complete event fires.
    pub fn handle(&mut self, sim: &mut dyn ClusterSim, event: Event) -> Result<Option<Report>> {
        match event {
            Event::NewTask { time, task } => self.on_new_task(sim, time, task)?,
            Event::TaskComplete { time, task } => self.on_task_complete(sim, time, task)?,
            Event::MigrationDone { time, vm } => self.on_migration_done(sim, time, vm)?,
            Event::StateChangeComplete { time, pm } => {
                self.on_state_change_complete(sim, time, pm)?
            }
            Event::MemoryWarning { time, pm } => self.on_memory_warning(sim, time, pm)?,
            Event::SlaWarning { time, task } => self.on_sla_warning(sim, time, task)?,
            Event::PeriodicCheck { time } => self.on_periodic_check(sim, time)?,
            Event::SimulationComplete { time } => {
                return self.on_simulation_complete(sim, time).map(Some)
            }
        }
        Ok(None)
    }

    /// Final event: shut everything down and assemble the report.
    pub fn on_simulation_complete(
        &mut self,
        sim: &mut dyn ClusterSim,
        time: SimTime,
    ) -> Result<Report> {
        let vms: Vec<VmId> = self.model.vms.keys().copied().collect();
        for vm in vms {
            sim.shutdown_vm(vm);
        }
        for m in self.model.machines.values_mut() {
            m.residents.clear();
        }
        self.model.vms.clear();
        self.model.in_flight.clear();
        self.model.assignments.clear();
        self.model.task_priority.clear();
        self.model.task_memory.clear();

        let report = Report::collect(sim, time, &self.model);
        info!(seconds = report.sim_seconds, energy_kwh = report.total_energy_kwh, "simulation complete");
        Ok(report)
    }

    /// Verify the model invariants, using the configured running floor.
    pub fn check_invariants(&self) -> Result<()> {
        self.model.check_invariants(self.cfg.min_on_floor(self.model.machines.len()))
    }

    /// Utilisation sub-score of one machine: engine-side core fill plus the
    /// simulator's memory snapshot, weighted 3:1. VMs migrating towards the
    /// machine count as load so parallel migrations spread out.
    pub(crate) fn utilization(&self, sim: &dyn ClusterSim, pm: MachineId) -> f64 {
        let m = self.model.machine(pm);
        let inbound = self.model.in_flight.values().filter(|dest| **dest == pm).count();
        let fill = if m.num_cpus == 0 {
            0.0
        } else {
            (m.residents.len() + inbound) as f64 / m.num_cpus as f64
        };
        let info = sim.machine_info(pm);
        score::utilization(fill, info.memory_used_fraction())
    }

    /// Memory already committed to in-flight migrations towards a machine.
    pub(crate) fn inbound_memory(&self, pm: MachineId) -> u64 {
        self.model
            .in_flight
            .iter()
            .filter(|(_, dest)| **dest == pm)
            .map(|(vm, _)| self.model.vm_memory(*vm))
            .sum()
    }

    /// Every running machine, sorted ascending by utilisation with a stable
    /// id tie-break.
    pub(crate) fn ranked_on_machines(&self, sim: &dyn ClusterSim) -> Vec<(MachineId, f64)> {
        let mut ranked: Vec<(MachineId, f64)> = self
            .model
            .machines
            .iter()
            .filter(|(_, m)| m.phase == PowerPhase::On)
            .map(|(id, _)| (*id, self.utilization(sim, *id)))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
        });
        ranked
    }
}
