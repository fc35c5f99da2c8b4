//! Device- and job-level status types.

use std::fmt;

/// Status of the device as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Offline,
    Idle,
    Busy,
    Error,
    Maintenance,
}

impl DeviceStatus {
    /// Whether sessions may be initialized against the device.
    pub fn is_operable(self) -> bool {
        matches!(self, DeviceStatus::Idle | DeviceStatus::Busy)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStatus::Offline => "Offline",
            DeviceStatus::Idle => "Idle",
            DeviceStatus::Busy => "Busy",
            DeviceStatus::Error => "Error",
            DeviceStatus::Maintenance => "Maintenance",
        };
        f.write_str(name)
    }
}

/// Status of a single job.
///
/// `Done` and `Canceled` are terminal. A job's histogram is non-empty only
/// in `Done` and is never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Created,
    Queued,
    Running,
    Done,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Canceled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Created => "Created",
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Done => "Done",
            JobStatus::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}
