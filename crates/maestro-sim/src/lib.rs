// SPDX-License-Identifier: Apache-2.0
//! # maestro-sim
//!
//! Execution-backend interface for the Maestro device engine.
//!
//! The device scheduler in `maestro-device` is generic over a
//! [`SimulatorBackend`]: a stateful engine that is configured per job and
//! synchronously executes a program into a result text blob. Two
//! implementations live here:
//!
//! - [`DynamicBackend`] loads a real engine shared library and drives it
//!   through a narrow C contract;
//! - [`mock::MockBackend`] is a deterministic in-memory engine used by the
//!   scheduler's tests.
//!
//! Backends are produced through a [`BackendLoader`], so the scheduler's
//! start path can fail a load without caring which implementation is behind
//! it.

pub mod backend;
pub mod error;
pub mod loader;
pub mod mock;

pub use backend::{BackendConfig, BackendLoader, ExecSelection, SimulatorBackend};
pub use error::{Result, SimError};
pub use loader::{DynamicBackend, DynamicLoader};
