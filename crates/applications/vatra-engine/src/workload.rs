//! Synthetic workload generation
//!
//! Produces machine fleets and task streams for the CLI and stress tests:
//! mixed architectures, exponential inter-arrival times (optionally
//! compressed into bursts), log-normal task sizes and a weighted SLA mix.
//! Deterministic under a fixed seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, LogNormal};
use vatra_core::{CpuArch, Priority, SState, SimTime, SlaClass, VmType};

use crate::sim::{MachineSpec, TaskSpec};

pub struct WorkloadGenerator {
    rng: StdRng,
}

impl WorkloadGenerator {
    pub fn new(seed: u64) -> Self {
        WorkloadGenerator { rng: StdRng::seed_from_u64(seed) }
    }

    /// A fleet of `total` machines: mostly x86, with an ARM tail and a GPU
    /// slice, all starting awake.
    pub fn fleet(&mut self, total: usize, arm_fraction: f64, gpu_fraction: f64) -> Vec<MachineSpec> {
        (0..total)
            .map(|_| {
                let arm = self.rng.gen_bool(arm_fraction.clamp(0.0, 1.0));
                MachineSpec {
                    arch: if arm { CpuArch::Arm } else { CpuArch::X86 },
                    num_cpus: if arm { 8 } else { 4 },
                    memory_mb: if arm { 16_384 } else { 32_768 },
                    has_gpu: self.rng.gen_bool(gpu_fraction.clamp(0.0, 1.0)),
                    mips: if arm { [1200, 900, 600, 400] } else { [2000, 1500, 1000, 600] },
                    initial_s_state: SState::S0,
                }
            })
            .collect()
    }

    /// A stream of `count` tasks arriving over roughly `horizon`
    /// microseconds. `burstiness` above zero compresses arrivals into the
    /// front of each window, which is what trips the burst detector.
    pub fn tasks(
        &mut self,
        count: usize,
        horizon: SimTime,
        fleet: &[MachineSpec],
        burstiness: f64,
    ) -> Vec<TaskSpec> {
        let mean_gap = (horizon as f64 / count.max(1) as f64).max(1.0);
        let inter_arrival = Exp::new(1.0 / mean_gap).expect("positive rate");
        // Median ~4e9 instructions (two seconds at 2000 MIPS), heavy tail.
        let size = LogNormal::new(22.1, 0.8).expect("valid lognormal");

        let arm_exists = fleet.iter().any(|m| m.arch == CpuArch::Arm);
        let mut clock = 0.0f64;
        (0..count)
            .map(|_| {
                let gap: f64 = inter_arrival.sample(&mut self.rng);
                clock += if burstiness > 0.0 && self.rng.gen_bool(burstiness.clamp(0.0, 1.0)) {
                    gap * 0.05
                } else {
                    gap
                };

                let sla = match self.rng.gen_range(0..10) {
                    0 => SlaClass::Sla0,
                    1..=2 => SlaClass::Sla1,
                    3..=6 => SlaClass::Sla2,
                    _ => SlaClass::Sla3,
                };
                let priority = match sla {
                    SlaClass::Sla0 => Priority::High,
                    SlaClass::Sla1 | SlaClass::Sla2 => Priority::Mid,
                    SlaClass::Sla3 => Priority::Low,
                };
                TaskSpec {
                    arrival: clock as SimTime,
                    instructions: (size.sample(&mut self.rng) as u64).clamp(100_000_000, 200_000_000_000),
                    arch: if arm_exists && self.rng.gen_bool(0.2) {
                        CpuArch::Arm
                    } else {
                        CpuArch::X86
                    },
                    vm_type: if self.rng.gen_bool(0.9) { VmType::Linux } else { VmType::Win },
                    memory_mb: self.rng.gen_range(256..4096),
                    gpu_capable: self.rng.gen_bool(0.15),
                    sla,
                    priority,
                }
            })
            .collect()
    }
}
