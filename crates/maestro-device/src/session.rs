//! Device sessions.
//!
//! A session is the allocation context a caller opens before creating jobs.
//! It carries device-level defaults that seed every job created under it;
//! once initialized, its parameters are frozen. Sessions do not own jobs.

use crate::error::{DeviceError, DeviceResult};
use crate::scheduler::DeviceScheduler;

/// Lifecycle phase of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Freshly allocated; parameters may still be set.
    Allocated,
    /// Initialized against an operable device; parameters are frozen.
    Initialized,
}

/// Defaults a session hands to each job it creates.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub qubit_count: usize,
    pub sim_type: u32,
    pub sim_exec_type: u32,
    pub max_bond_dim: Option<u64>,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            qubit_count: 64,
            sim_type: 0,
            sim_exec_type: 0,
            max_bond_dim: None,
        }
    }
}

/// Parameters settable on a session while it is still `Allocated`.
#[derive(Debug, Clone)]
pub enum SessionParam {
    /// Opaque credential; stored, not validated here.
    Token(String),
    QubitCount(usize),
    SimType(u32),
    SimExecType(u32),
    MaxBondDim(u64),
}

/// A device session.
#[derive(Debug)]
pub struct Session {
    status: SessionStatus,
    token: Option<String>,
    defaults: SessionDefaults,
}

impl Session {
    /// Allocate a new session with device defaults.
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Allocated,
            token: None,
            defaults: SessionDefaults::default(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    /// Set a parameter. Legal only while `Allocated`.
    pub fn set_parameter(&mut self, param: SessionParam) -> DeviceResult<()> {
        if self.status != SessionStatus::Allocated {
            return Err(DeviceError::BadState {
                operation: "session set_parameter",
                found: "Initialized".to_string(),
            });
        }
        match param {
            SessionParam::Token(token) => self.token = Some(token),
            SessionParam::QubitCount(n) => self.defaults.qubit_count = n,
            SessionParam::SimType(t) => self.defaults.sim_type = t,
            SessionParam::SimExecType(t) => self.defaults.sim_exec_type = t,
            SessionParam::MaxBondDim(dim) => self.defaults.max_bond_dim = Some(dim),
        }
        Ok(())
    }

    /// Initialize the session against a device. Fails `Fatal` when the
    /// device is not operable, and `BadState` when already initialized.
    pub fn initialize(&mut self, scheduler: &DeviceScheduler) -> DeviceResult<()> {
        if self.status == SessionStatus::Initialized {
            return Err(DeviceError::BadState {
                operation: "session initialize",
                found: "Initialized".to_string(),
            });
        }
        let device = scheduler.device_status();
        if !device.is_operable() {
            return Err(DeviceError::Fatal(format!(
                "device is {device}, cannot initialize session"
            )));
        }
        self.status = SessionStatus::Initialized;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
