// SPDX-License-Identifier: Apache-2.0
//! The execution-backend seam.
//!
//! The device scheduler drives exactly one backend instance from its single
//! worker thread, so implementations only need to be `Send`; no concurrent
//! backend calls are ever issued.

use crate::error::Result;

/// Exec-variant selection handed to the engine.
///
/// Variant numbering follows the engine: 0 = state vector, 1 = MPS,
/// 2 = stabilizer, 3 = tensor network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecSelection {
    /// A directly selected engine variant.
    Variant(u32),
    /// The engine's default variant with two optimization passes applied.
    OptimizedDefault,
}

impl ExecSelection {
    /// Map a job's requested simulation type and exec type onto the engine
    /// selection.
    ///
    /// Simulation types 2 and 3 are composite engines that only run their
    /// exec variant 0; type 4 is the accelerated engine, which supports
    /// exec variants 0 and 1 and falls back to 0 for anything else.
    pub fn for_job(sim_type: u32, sim_exec_type: u32) -> Self {
        match sim_type {
            0 | 1 => {
                if sim_exec_type >= 4 {
                    ExecSelection::OptimizedDefault
                } else {
                    ExecSelection::Variant(sim_exec_type)
                }
            }
            2 | 3 => ExecSelection::Variant(0),
            4 => match sim_exec_type {
                0 | 1 => ExecSelection::Variant(sim_exec_type),
                _ => ExecSelection::Variant(0),
            },
            // Unknown simulation types behave like the composite arm.
            _ => ExecSelection::Variant(0),
        }
    }

    /// The `(variant, optimization_passes)` pair the engine C contract takes.
    pub fn as_raw(self) -> (u32, u32) {
        match self {
            ExecSelection::Variant(v) => (v, 0),
            ExecSelection::OptimizedDefault => (0, 2),
        }
    }
}

/// Full configuration applied to the backend before each execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub num_qubits: usize,
    pub sim_type: u32,
    pub exec: ExecSelection,
    /// Bond-dimension cap for MPS-style variants; `None` means unlimited.
    pub max_bond_dim: Option<u64>,
}

/// A stateful circuit-execution engine.
///
/// `execute` is synchronous and unbounded: the engine either returns a
/// result text blob or blocks, there is no cancellation channel.
pub trait SimulatorBackend: Send {
    /// Apply a configuration. Must be called before each `execute`.
    fn configure(&mut self, config: &BackendConfig) -> Result<()>;

    /// Run a program and return the engine's result text.
    fn execute(&mut self, program: &str, config_json: &str) -> Result<String>;
}

/// Produces backend instances for the scheduler's `start`.
///
/// Loading is fallible; a failed load leaves the device offline.
pub trait BackendLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn SimulatorBackend>>;
}
