//! The device scheduler: job arena, FIFO queue, and the worker thread.
//!
//! One mutex guards all scheduler state; two condition variables signal
//! "work is ready or stop was requested" (worker side) and "a job reached a
//! terminal result" (waiter side). The worker is a single dedicated thread,
//! so at most one job is ever `Running`, and that job is exactly the one
//! recorded in `current`.

use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use maestro_sim::{BackendConfig, BackendLoader, ExecSelection, SimulatorBackend};

use crate::error::{DeviceError, DeviceResult};
use crate::histogram::{Histogram, ResultKind};
use crate::job::{Job, JobHandle, JobParam};
use crate::session::{Session, SessionStatus};
use crate::status::{DeviceStatus, JobStatus};

struct SchedState {
    device_status: DeviceStatus,
    next_job_id: u64,
    jobs: FxHashMap<u64, Job>,
    /// Pending job ids; ascending id is submission order, so popping the
    /// first element gives strict FIFO.
    queue: BTreeSet<u64>,
    /// The job the worker is executing right now. Cleared by `cancel` and
    /// `free_job` to tell the worker its in-flight result is unwanted.
    current: Option<u64>,
    stop: bool,
}

struct Shared {
    state: Mutex<SchedState>,
    work_ready: Condvar,
    job_done: Condvar,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SchedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caller-owned execution engine for one device.
///
/// Create it with a [`BackendLoader`], call [`start`](Self::start), and
/// drive jobs through their lifecycle. Dropping the scheduler stops the
/// worker, so test teardown is deterministic.
pub struct DeviceScheduler {
    shared: Arc<Shared>,
    loader: Box<dyn BackendLoader>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceScheduler {
    pub fn new(loader: impl BackendLoader + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedState {
                    device_status: DeviceStatus::Offline,
                    next_job_id: 0,
                    jobs: FxHashMap::default(),
                    queue: BTreeSet::new(),
                    current: None,
                    stop: false,
                }),
                work_ready: Condvar::new(),
                job_done: Condvar::new(),
            }),
            loader: Box::new(loader),
            worker: Mutex::new(None),
        }
    }

    /// Load the backend and spawn the worker thread. Idempotent while the
    /// worker is alive. On load failure the device stays `Offline` and no
    /// retry is attempted until the next `start` call.
    pub fn start(&self) -> DeviceResult<()> {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Ok(());
        }

        let backend = self.loader.load().map_err(|err| {
            error!(%err, "backend load failed, device stays offline");
            DeviceError::Fatal(format!("backend load failed: {err}"))
        })?;

        {
            let mut state = self.shared.lock_state();
            state.stop = false;
            state.device_status = if state.queue.is_empty() {
                DeviceStatus::Idle
            } else {
                DeviceStatus::Busy
            };
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("maestro-worker".into())
            .spawn(move || worker_loop(&shared, backend))
            .map_err(|err| DeviceError::Fatal(format!("worker spawn failed: {err}")))?;
        *worker = Some(handle);
        info!("device scheduler started");
        Ok(())
    }

    /// Stop the worker and mark the device `Offline`. Idempotent. A job
    /// in flight finishes first; still-queued jobs keep their `Queued`
    /// status and run again after a later `start`.
    pub fn stop(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        {
            let mut state = self.shared.lock_state();
            state.stop = true;
        }
        self.shared.work_ready.notify_all();
        let _ = handle.join();

        self.shared.lock_state().device_status = DeviceStatus::Offline;
        info!("device scheduler stopped");
    }

    pub fn device_status(&self) -> DeviceStatus {
        self.shared.lock_state().device_status
    }

    /// Allocate a job in the arena, seeded from the session's defaults.
    /// The session must be initialized.
    pub fn create_job(&self, session: &Session) -> DeviceResult<JobHandle> {
        if session.status() != SessionStatus::Initialized {
            return Err(DeviceError::BadState {
                operation: "create_job",
                found: "Allocated".to_string(),
            });
        }
        let mut state = self.shared.lock_state();
        state.next_job_id += 1;
        let id = state.next_job_id;
        state.jobs.insert(id, Job::new(session.defaults()));
        debug!(job = id, "job created");
        Ok(JobHandle(id))
    }

    /// Set a job parameter. Legal only while the job is still `Created`.
    pub fn set_job_parameter(&self, handle: JobHandle, param: JobParam) -> DeviceResult<()> {
        let mut state = self.shared.lock_state();
        let job = state
            .jobs
            .get_mut(&handle.0)
            .ok_or(DeviceError::JobNotFound(handle))?;
        if job.status != JobStatus::Created {
            return Err(DeviceError::BadState {
                operation: "set_job_parameter",
                found: job.status.to_string(),
            });
        }
        job.apply(param)
    }

    /// Enqueue the job for execution. Legal for any non-`Done` job;
    /// re-submitting an already-queued job is a no-op, and a `Running` job
    /// is already scheduled.
    pub fn submit(&self, handle: JobHandle) -> DeviceResult<()> {
        let mut state = self.shared.lock_state();
        let job = state
            .jobs
            .get_mut(&handle.0)
            .ok_or(DeviceError::JobNotFound(handle))?;
        match job.status {
            JobStatus::Done => Err(DeviceError::BadState {
                operation: "submit",
                found: "Done".to_string(),
            }),
            JobStatus::Running => Ok(()),
            JobStatus::Created | JobStatus::Queued | JobStatus::Canceled => {
                job.status = JobStatus::Queued;
                state.queue.insert(handle.0);
                if state.device_status == DeviceStatus::Idle {
                    state.device_status = DeviceStatus::Busy;
                }
                drop(state);
                self.shared.work_ready.notify_one();
                Ok(())
            }
        }
    }

    /// Cancel the job. A queued job never runs; a running job flips to
    /// `Canceled` immediately and its in-flight backend call finishes into
    /// the void. Cancel of a finished job is a state error; cancel of an
    /// already-canceled job is a no-op.
    pub fn cancel(&self, handle: JobHandle) -> DeviceResult<()> {
        let mut state = self.shared.lock_state();
        let job = state
            .jobs
            .get_mut(&handle.0)
            .ok_or(DeviceError::JobNotFound(handle))?;
        match job.status {
            JobStatus::Done => Err(DeviceError::BadState {
                operation: "cancel",
                found: "Done".to_string(),
            }),
            JobStatus::Canceled => Ok(()),
            JobStatus::Created => {
                job.status = JobStatus::Canceled;
                Ok(())
            }
            JobStatus::Queued => {
                job.status = JobStatus::Canceled;
                state.queue.remove(&handle.0);
                settle_device_status(&mut state);
                debug!(job = handle.0, "queued job canceled");
                Ok(())
            }
            JobStatus::Running => {
                job.status = JobStatus::Canceled;
                state.current = None;
                debug!(job = handle.0, "running job canceled, result will be discarded");
                Ok(())
            }
        }
    }

    /// Read the job's status. No transition; callable from any state.
    pub fn check(&self, handle: JobHandle) -> DeviceResult<JobStatus> {
        let state = self.shared.lock_state();
        state
            .jobs
            .get(&handle.0)
            .map(|job| job.status)
            .ok_or(DeviceError::JobNotFound(handle))
    }

    /// Block until the job is `Done` or the timeout elapses. Returns
    /// immediately when already `Done`; a canceled job never satisfies the
    /// wait. The deadline is re-checked across spurious wakeups.
    pub fn wait(&self, handle: JobHandle, timeout: Duration) -> DeviceResult<()> {
        // A budget too large to represent as a deadline means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.lock_state();
        loop {
            let job = state
                .jobs
                .get(&handle.0)
                .ok_or(DeviceError::JobNotFound(handle))?;
            if job.status == JobStatus::Done {
                return Ok(());
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DeviceError::Timeout);
                    }
                    self.shared
                        .job_done
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .shared
                    .job_done
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Two-phase result query on a finished job. See [`Histogram::query`]
    /// for the probe/copy contract.
    pub fn get_results(
        &self,
        handle: JobHandle,
        kind: ResultKind,
        buf: Option<&mut [u8]>,
    ) -> DeviceResult<usize> {
        let state = self.shared.lock_state();
        let job = state
            .jobs
            .get(&handle.0)
            .ok_or(DeviceError::JobNotFound(handle))?;
        if job.status != JobStatus::Done {
            return Err(DeviceError::BadState {
                operation: "get_results",
                found: job.status.to_string(),
            });
        }
        job.results.query(kind, buf)
    }

    /// Remove the job from the arena, implicitly canceling it when still
    /// queued or running. Pending waiters observe `JobNotFound`.
    pub fn free_job(&self, handle: JobHandle) -> DeviceResult<()> {
        let mut state = self.shared.lock_state();
        let job = state
            .jobs
            .remove(&handle.0)
            .ok_or(DeviceError::JobNotFound(handle))?;
        match job.status {
            JobStatus::Queued => {
                state.queue.remove(&handle.0);
                settle_device_status(&mut state);
            }
            JobStatus::Running => {
                state.current = None;
            }
            _ => {}
        }
        drop(state);
        self.shared.job_done.notify_all();
        debug!(job = handle.0, "job freed");
        Ok(())
    }
}

impl Drop for DeviceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A `Busy` device with an empty queue and nothing in flight is idle again.
/// Unscheduling the last queued job must restore this; the worker never
/// wakes for it.
fn settle_device_status(state: &mut SchedState) {
    if state.device_status == DeviceStatus::Busy
        && state.queue.is_empty()
        && state.current.is_none()
    {
        state.device_status = DeviceStatus::Idle;
    }
}

fn worker_loop(shared: &Shared, mut backend: Box<dyn SimulatorBackend>) {
    loop {
        let (id, program, config, config_json) = {
            let mut state = shared.lock_state();
            while state.queue.is_empty() && !state.stop {
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.stop {
                break;
            }
            let Some(id) = state.queue.pop_first() else {
                continue;
            };
            let Some(job) = state.jobs.get_mut(&id) else {
                debug!(job = id, "queued job vanished before execution");
                continue;
            };
            job.status = JobStatus::Running;
            let program = job.program.clone();
            let config = BackendConfig {
                num_qubits: job.qubit_count,
                sim_type: job.sim_type,
                exec: ExecSelection::for_job(job.sim_type, job.sim_exec_type),
                max_bond_dim: job.max_bond_dim,
            };
            let config_json = job.config_json();
            state.current = Some(id);
            state.device_status = DeviceStatus::Busy;
            (id, program, config, config_json)
        };

        debug!(job = id, "executing");
        let outcome = backend
            .configure(&config)
            .and_then(|()| backend.execute(&program, &config_json));

        let mut state = shared.lock_state();
        if state.current == Some(id) {
            state.current = None;
            if let Some(job) = state.jobs.get_mut(&id) {
                job.results = match outcome {
                    Ok(text) => Histogram::from_result_text(&text),
                    Err(err) => {
                        warn!(job = id, %err, "backend execution failed, job completes empty");
                        Histogram::default()
                    }
                };
                job.status = JobStatus::Done;
                debug!(job = id, "done");
            }
        } else {
            debug!(job = id, "in-flight result discarded");
        }
        state.device_status = if state.queue.is_empty() {
            DeviceStatus::Idle
        } else {
            DeviceStatus::Busy
        };
        drop(state);
        shared.job_done.notify_all();
    }
}
