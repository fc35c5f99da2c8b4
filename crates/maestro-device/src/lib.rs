//! # maestro-device
//!
//! Device-side execution engine for the Maestro simulator: sessions, a job
//! arena with opaque handles, a single-worker FIFO scheduler, and the
//! result-histogram codec.
//!
//! ```
//! use std::time::Duration;
//!
//! use maestro_device::{DeviceScheduler, JobParam, ResultKind, Session};
//! use maestro_sim::mock::{MockBackend, MockLoader};
//!
//! # fn main() -> maestro_device::DeviceResult<()> {
//! let scheduler = DeviceScheduler::new(MockLoader::new(MockBackend::new()));
//! scheduler.start()?;
//!
//! let mut session = Session::new();
//! session.initialize(&scheduler)?;
//!
//! let job = scheduler.create_job(&session)?;
//! scheduler.set_job_parameter(job, JobParam::QubitCount(2))?;
//! scheduler.set_job_parameter(job, JobParam::Shots(100))?;
//! scheduler.set_job_parameter(job, JobParam::Program("OPENQASM 2.0;".into()))?;
//! scheduler.submit(job)?;
//! scheduler.wait(job, Duration::from_secs(5))?;
//!
//! let size = scheduler.get_results(job, ResultKind::HistKeys, None)?;
//! let mut keys = vec![0u8; size];
//! scheduler.get_results(job, ResultKind::HistKeys, Some(&mut keys))?;
//! assert_eq!(&keys, b"11\0");
//!
//! scheduler.free_job(job)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod histogram;
pub mod job;
pub mod scheduler;
pub mod session;
pub mod status;

pub use error::{DeviceError, DeviceResult};
pub use histogram::{Histogram, ResultKind};
pub use job::{JobHandle, JobParam, ProgramFormat};
pub use scheduler::DeviceScheduler;
pub use session::{Session, SessionParam, SessionStatus};
pub use status::{DeviceStatus, JobStatus};
