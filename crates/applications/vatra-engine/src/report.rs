//! Final reporting
//!
//! At simulation end the engine emits per-SLA compliance against the fixed
//! targets, cluster energy, and simulated wall time. The report serialises
//! to JSON for downstream tooling and prints as the classic end-of-run
//! summary.

use serde::{Deserialize, Serialize};
use vatra_core::{ClusterSim, SimTime, SlaClass};

use crate::model::ClusterModel;

/// Compliance targets per class, in percent. `Sla3` is best-effort.
pub const SLA_TARGETS: [Option<f64>; 4] = [Some(95.0), Some(90.0), Some(80.0), None];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaLine {
    pub class: SlaClass,
    /// Percentage of completed tasks that met their allowance.
    pub compliance: f64,
    pub target: Option<f64>,
    pub completed: u64,
    pub violations: u64,
}

impl SlaLine {
    pub fn met(&self) -> bool {
        self.target.map_or(true, |t| self.compliance >= t)
    }
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub sla: Vec<SlaLine>,
    pub total_energy_kwh: f64,
    pub sim_seconds: f64,
    pub tasks_completed: u64,
}

impl Report {
    pub fn collect(sim: &dyn ClusterSim, time: SimTime, model: &ClusterModel) -> Self {
        let sla = SlaClass::ALL
            .iter()
            .map(|&class| SlaLine {
                class,
                compliance: sim.sla_report(class),
                target: SLA_TARGETS[class.index()],
                completed: model.completed[class.index()],
                violations: model.violations[class.index()],
            })
            .collect();
        Report {
            sla,
            total_energy_kwh: sim.cluster_energy(),
            sim_seconds: time as f64 / 1_000_000.0,
            tasks_completed: model.completed.iter().sum(),
        }
    }

    /// True when every class with a target met it.
    pub fn all_targets_met(&self) -> bool {
        self.sla.iter().all(SlaLine::met)
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SLA compliance report")?;
        for line in &self.sla {
            match line.target {
                Some(target) => writeln!(
                    f,
                    "  {}: {:>5.1}% (target {:.0}%)  {}",
                    line.class,
                    line.compliance,
                    target,
                    if line.met() { "pass" } else { "FAIL" }
                )?,
                None => writeln!(f, "  {}: {:>5.1}% (best effort)", line.class, line.compliance)?,
            }
        }
        writeln!(f, "Tasks completed: {}", self.tasks_completed)?;
        writeln!(f, "Total energy {:.3} kWh", self.total_energy_kwh)?;
        write!(f, "Simulation run finished in {:.2} seconds", self.sim_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(class: SlaClass, compliance: f64) -> SlaLine {
        SlaLine {
            class,
            compliance,
            target: SLA_TARGETS[class.index()],
            completed: 10,
            violations: 0,
        }
    }

    #[test]
    fn test_targets_met() {
        assert!(line(SlaClass::Sla0, 97.0).met());
        assert!(!line(SlaClass::Sla0, 94.9).met());
        // Best effort never fails.
        assert!(line(SlaClass::Sla3, 0.0).met());
    }

    #[test]
    fn test_report_renders_pass_and_fail() {
        let report = Report {
            sla: vec![line(SlaClass::Sla0, 97.0), line(SlaClass::Sla1, 42.0)],
            total_energy_kwh: 1.5,
            sim_seconds: 300.0,
            tasks_completed: 20,
        };
        let text = report.to_string();
        assert!(text.contains("SLA0:  97.0% (target 95%)  pass"));
        assert!(text.contains("SLA1:  42.0% (target 90%)  FAIL"));
        assert!(text.contains("Total energy 1.500 kWh"));
        assert!(!report.all_targets_met());
    }

    #[test]
    fn test_report_serialises() {
        let report = Report {
            sla: vec![line(SlaClass::Sla2, 88.0)],
            total_energy_kwh: 0.25,
            sim_seconds: 1.0,
            tasks_completed: 5,
        };
        let json = serde_json::to_string(&report).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tasks_completed, 5);
        assert_eq!(parsed.sla[0].class, SlaClass::Sla2);
    }
}
