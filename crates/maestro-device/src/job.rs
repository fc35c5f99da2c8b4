//! Job records, handles, and parameters.

use std::fmt;

use serde::Serialize;

use crate::error::{DeviceError, DeviceResult};
use crate::histogram::Histogram;
use crate::session::SessionDefaults;
use crate::status::JobStatus;

/// Opaque handle addressing a job in the scheduler's arena.
///
/// Handles are monotonically increasing and unique for the scheduler's
/// lifetime; queue order by ascending handle is submission order. A handle
/// stays valid until the job is freed, after which every operation on it
/// reports [`DeviceError::JobNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobHandle(pub(crate) u64);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Circuit program encodings a job may declare.
///
/// Only OpenQASM 2 executes; the others are recognized but rejected as
/// unsupported when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFormat {
    OpenQasm2,
    OpenQasm3,
    Qir,
}

/// Parameters settable on a job while it is still `Created`.
#[derive(Debug, Clone)]
pub enum JobParam {
    Program(String),
    Format(ProgramFormat),
    Shots(u64),
    QubitCount(usize),
    SimType(u32),
    SimExecType(u32),
    MaxBondDim(u64),
}

/// An owned job record. Lives in the scheduler's arena; callers only ever
/// hold a [`JobHandle`].
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) status: JobStatus,
    pub(crate) program: String,
    pub(crate) format: ProgramFormat,
    pub(crate) num_shots: u64,
    pub(crate) qubit_count: usize,
    pub(crate) sim_type: u32,
    pub(crate) sim_exec_type: u32,
    pub(crate) max_bond_dim: Option<u64>,
    pub(crate) results: Histogram,
}

/// Wire shape of the config blob passed to the backend. Field order here is
/// the wire order.
#[derive(Serialize)]
struct ExecConfigBlob {
    shots: u64,
    #[serde(
        rename = "matrix_product_state_max_bond_dimension",
        skip_serializing_if = "Option::is_none"
    )]
    max_bond_dim: Option<u64>,
}

impl Job {
    pub(crate) fn new(defaults: &SessionDefaults) -> Self {
        Self {
            status: JobStatus::Created,
            program: String::new(),
            format: ProgramFormat::OpenQasm2,
            num_shots: 1,
            qubit_count: defaults.qubit_count,
            sim_type: defaults.sim_type,
            sim_exec_type: defaults.sim_exec_type,
            max_bond_dim: defaults.max_bond_dim,
            results: Histogram::default(),
        }
    }

    /// Apply a parameter. The `Created`-only guard lives in the scheduler;
    /// this only rejects unsupported values.
    pub(crate) fn apply(&mut self, param: JobParam) -> DeviceResult<()> {
        match param {
            JobParam::Program(program) => self.program = program,
            JobParam::Format(format) => {
                if format != ProgramFormat::OpenQasm2 {
                    return Err(DeviceError::NotSupported(format!(
                        "program format {format:?}"
                    )));
                }
                self.format = format;
            }
            JobParam::Shots(shots) => {
                if shots == 0 {
                    return Err(DeviceError::InvalidArgument(
                        "shot count must be nonzero".into(),
                    ));
                }
                self.num_shots = shots;
            }
            JobParam::QubitCount(n) => {
                if n == 0 {
                    return Err(DeviceError::InvalidArgument(
                        "qubit count must be nonzero".into(),
                    ));
                }
                self.qubit_count = n;
            }
            JobParam::SimType(t) => self.sim_type = t,
            JobParam::SimExecType(t) => self.sim_exec_type = t,
            JobParam::MaxBondDim(dim) => self.max_bond_dim = Some(dim),
        }
        Ok(())
    }

    /// Config blob handed to the backend alongside the program text.
    pub(crate) fn config_json(&self) -> String {
        let blob = ExecConfigBlob {
            shots: self.num_shots,
            max_bond_dim: self.max_bond_dim,
        };
        // Two scalar fields; serialization cannot fail.
        serde_json::to_string(&blob).unwrap_or_default()
    }
}
