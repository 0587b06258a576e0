//! Error types for Vatra

use thiserror::Error;

use crate::types::{CpuArch, TaskId, VmId};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, VatraError>;

/// Errors the engine can surface. Warnings delivered by the simulator
/// (memory overcommit, SLA misses) are events, not errors; everything
/// transient is recovered locally by retrying on a later event.
#[derive(Error, Debug)]
pub enum VatraError {
    /// No machine of the required CPU architecture exists. Fatal: the
    /// simulation cannot place the task, now or ever.
    #[error("no machine with CPU architecture {arch} can host {task}")]
    NoCompatibleMachine { task: TaskId, arch: CpuArch },

    /// A cluster-model invariant failed to hold between handlers.
    #[error("cluster invariant violated: {0}")]
    InvariantViolation(String),

    /// The simulator delivered an event for a task the engine never placed.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// The simulator delivered an event for a VM the engine is not tracking.
    #[error("unknown VM {0}")]
    UnknownVm(VmId),
}

impl VatraError {
    /// Create an invariant-violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
