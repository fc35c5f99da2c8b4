//! End-to-end lifecycle tests over the mock engine.

use std::time::{Duration, Instant};

use maestro_device::{
    DeviceError, DeviceScheduler, DeviceStatus, JobParam, JobStatus, ResultKind, Session,
};
use maestro_sim::mock::{MockBackend, MockLoader};

fn started(backend: MockBackend) -> DeviceScheduler {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let sched = DeviceScheduler::new(MockLoader::new(backend));
    sched.start().unwrap();
    sched
}

fn session_for(sched: &DeviceScheduler) -> Session {
    let mut session = Session::new();
    session.initialize(sched).unwrap();
    session
}

/// Poll until `cond` holds, with a hard cap so a broken scheduler fails the
/// test instead of hanging it.
fn eventually(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn deterministic_two_qubit_round_trip() {
    let sched = started(MockBackend::new());
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.set_job_parameter(job, JobParam::QubitCount(2)).unwrap();
    sched.set_job_parameter(job, JobParam::Shots(100)).unwrap();
    sched
        .set_job_parameter(job, JobParam::Program("OPENQASM 2.0; x q; cx q[0], q[1];".into()))
        .unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();

    let key_size = sched.get_results(job, ResultKind::HistKeys, None).unwrap();
    let mut keys = vec![0u8; key_size];
    sched
        .get_results(job, ResultKind::HistKeys, Some(&mut keys))
        .unwrap();
    assert_eq!(&keys, b"11\0");

    let val_size = sched.get_results(job, ResultKind::HistValues, None).unwrap();
    assert_eq!(val_size, 8);
    let mut values = vec![0u8; val_size];
    sched
        .get_results(job, ResultKind::HistValues, Some(&mut values))
        .unwrap();
    assert_eq!(u64::from_ne_bytes(values.try_into().unwrap()), 100);

    sched.free_job(job).unwrap();
    assert!(matches!(
        sched.check(job),
        Err(DeviceError::JobNotFound(_))
    ));
}

#[test]
fn jobs_execute_in_submission_order() {
    let backend = MockBackend::new().with_latency(Duration::from_millis(20));
    let log = backend.call_log();
    let sched = started(backend);
    let session = session_for(&sched);

    let mut jobs = Vec::new();
    for name in ["first", "second", "third"] {
        let job = sched.create_job(&session).unwrap();
        sched
            .set_job_parameter(job, JobParam::Program(name.into()))
            .unwrap();
        jobs.push(job);
    }
    for &job in &jobs {
        sched.submit(job).unwrap();
    }
    for &job in &jobs {
        sched.wait(job, Duration::from_secs(5)).unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.executes, vec!["first", "second", "third"]);
}

#[test]
fn canceled_queued_job_never_runs() {
    let backend = MockBackend::new().with_latency(Duration::from_millis(50));
    let log = backend.call_log();
    let sched = started(backend);
    let session = session_for(&sched);

    let blocker = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(blocker, JobParam::Program("blocker".into()))
        .unwrap();
    let victim = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(victim, JobParam::Program("victim".into()))
        .unwrap();

    sched.submit(blocker).unwrap();
    sched.submit(victim).unwrap();
    sched.cancel(victim).unwrap();
    assert_eq!(sched.check(victim).unwrap(), JobStatus::Canceled);

    sched.wait(blocker, Duration::from_secs(5)).unwrap();
    eventually(|| sched.device_status() == DeviceStatus::Idle);

    assert!(matches!(
        sched.get_results(victim, ResultKind::HistKeys, None),
        Err(DeviceError::BadState { .. })
    ));

    let log = log.lock().unwrap();
    assert_eq!(log.executes, vec!["blocker"]);
}

#[test]
fn canceling_the_only_queued_job_returns_device_idle() {
    let sched = started(MockBackend::new().with_latency(Duration::from_millis(50)));
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.cancel(job).unwrap();

    // Whether the cancel beat the worker to the queue or caught the job
    // already running, the device must settle back to Idle.
    eventually(|| sched.device_status() == DeviceStatus::Idle);
    assert_eq!(sched.check(job).unwrap(), JobStatus::Canceled);
}

#[test]
fn freeing_the_only_queued_job_returns_device_idle() {
    let sched = started(MockBackend::new().with_latency(Duration::from_millis(50)));
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.free_job(job).unwrap();

    eventually(|| sched.device_status() == DeviceStatus::Idle);
}

#[test]
fn wait_accepts_an_unbounded_budget() {
    let sched = started(MockBackend::new().with_latency(Duration::from_millis(20)));
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::MAX).unwrap();
    assert_eq!(sched.check(job).unwrap(), JobStatus::Done);
}

#[test]
fn resubmission_is_guarded_by_done_only() {
    let backend = MockBackend::new().with_latency(Duration::from_millis(50));
    let log = backend.call_log();
    let sched = started(backend);
    let session = session_for(&sched);

    let blocker = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(blocker, JobParam::Program("blocker".into()))
        .unwrap();
    let job = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(job, JobParam::Program("job".into()))
        .unwrap();

    sched.submit(blocker).unwrap();
    sched.submit(job).unwrap();
    // Re-submitting a queued job is an idempotent insert.
    sched.submit(job).unwrap();

    sched.wait(job, Duration::from_secs(5)).unwrap();
    assert_eq!(log.lock().unwrap().executes, vec!["blocker", "job"]);

    // Re-submitting a finished job is a state error.
    assert!(matches!(
        sched.submit(job),
        Err(DeviceError::BadState { .. })
    ));
}

#[test]
fn canceling_running_job_discards_its_result() {
    let backend = MockBackend::new().with_latency(Duration::from_millis(50));
    let sched = started(backend);
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(job, JobParam::Program("slow".into()))
        .unwrap();
    sched.submit(job).unwrap();
    eventually(|| sched.check(job).unwrap() == JobStatus::Running);

    sched.cancel(job).unwrap();
    assert_eq!(sched.check(job).unwrap(), JobStatus::Canceled);

    // The in-flight call finishes into the void and the device recovers.
    eventually(|| sched.device_status() == DeviceStatus::Idle);
    assert_eq!(sched.check(job).unwrap(), JobStatus::Canceled);
    assert!(matches!(
        sched.get_results(job, ResultKind::HistKeys, None),
        Err(DeviceError::BadState { .. })
    ));
}

#[test]
fn wait_is_immediate_for_finished_jobs() {
    let sched = started(MockBackend::new());
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();
    // Already done: a zero budget still succeeds.
    sched.wait(job, Duration::ZERO).unwrap();
}

#[test]
fn wait_times_out_for_unsubmitted_and_canceled_jobs() {
    let sched = started(MockBackend::new());
    let session = session_for(&sched);

    let idle = sched.create_job(&session).unwrap();
    assert!(matches!(
        sched.wait(idle, Duration::from_millis(20)),
        Err(DeviceError::Timeout)
    ));

    sched.cancel(idle).unwrap();
    assert!(matches!(
        sched.wait(idle, Duration::from_millis(20)),
        Err(DeviceError::Timeout)
    ));
}

#[test]
fn check_is_idempotent() {
    let sched = started(MockBackend::new());
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    assert_eq!(sched.check(job).unwrap(), JobStatus::Created);
    assert_eq!(sched.check(job).unwrap(), JobStatus::Created);

    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();
    assert_eq!(sched.check(job).unwrap(), JobStatus::Done);
    assert_eq!(sched.check(job).unwrap(), JobStatus::Done);
}

#[test]
fn undersized_result_buffer_is_rejected_untouched() {
    let sched = started(MockBackend::new());
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.set_job_parameter(job, JobParam::QubitCount(4)).unwrap();
    sched.set_job_parameter(job, JobParam::Shots(7)).unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();

    let required = sched.get_results(job, ResultKind::HistKeys, None).unwrap();
    assert_eq!(required, 5); // "1111" + NUL

    let mut small = [0x77u8; 2];
    let err = sched
        .get_results(job, ResultKind::HistKeys, Some(&mut small))
        .unwrap_err();
    assert!(matches!(
        err,
        DeviceError::BufferTooSmall {
            required: 5,
            provided: 2
        }
    ));
    assert_eq!(small, [0x77; 2]);

    let mut exact = vec![0u8; required];
    sched
        .get_results(job, ResultKind::HistKeys, Some(&mut exact))
        .unwrap();
    assert_eq!(&exact, b"1111\0");
}

#[test]
fn results_only_readable_when_done() {
    let sched = started(MockBackend::new().with_latency(Duration::from_millis(50)));
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    assert!(matches!(
        sched.get_results(job, ResultKind::HistKeys, None),
        Err(DeviceError::BadState { .. })
    ));

    sched.submit(job).unwrap();
    assert!(matches!(
        sched.get_results(job, ResultKind::HistKeys, None),
        Err(DeviceError::BadState { .. })
    ));

    sched.wait(job, Duration::from_secs(5)).unwrap();
    assert!(sched.get_results(job, ResultKind::HistKeys, None).is_ok());
}

#[test]
fn unsupported_result_kinds_are_rejected() {
    let sched = started(MockBackend::new());
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();

    for kind in [
        ResultKind::ProbsSparse,
        ResultKind::ProbsDense,
        ResultKind::StateVectorDense,
    ] {
        assert!(matches!(
            sched.get_results(job, kind, None),
            Err(DeviceError::NotSupported(_))
        ));
    }
}

#[test]
fn backend_execute_failure_completes_job_empty() {
    let sched = started(MockBackend::failing());
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();

    assert_eq!(sched.check(job).unwrap(), JobStatus::Done);
    assert_eq!(sched.get_results(job, ResultKind::HistKeys, None).unwrap(), 0);
    assert_eq!(
        sched.get_results(job, ResultKind::HistValues, None).unwrap(),
        0
    );
}

#[test]
fn malformed_result_text_completes_job_empty() {
    let sched = started(MockBackend::with_response("not json at all"));
    let session = session_for(&sched);

    let job = sched.create_job(&session).unwrap();
    sched.submit(job).unwrap();
    sched.wait(job, Duration::from_secs(5)).unwrap();

    assert_eq!(sched.check(job).unwrap(), JobStatus::Done);
    assert_eq!(sched.get_results(job, ResultKind::HistKeys, None).unwrap(), 0);
}

#[test]
fn stop_leaves_queued_jobs_queued() {
    let backend = MockBackend::new().with_latency(Duration::from_millis(50));
    let sched = started(backend);
    let session = session_for(&sched);

    let blocker = sched.create_job(&session).unwrap();
    let queued = sched.create_job(&session).unwrap();
    sched.submit(blocker).unwrap();
    sched.submit(queued).unwrap();

    sched.stop();
    assert_eq!(sched.device_status(), DeviceStatus::Offline);
    assert_eq!(sched.check(queued).unwrap(), JobStatus::Queued);

    // A restart picks the leftover queue back up.
    sched.start().unwrap();
    sched.wait(queued, Duration::from_secs(5)).unwrap();
    assert_eq!(sched.check(queued).unwrap(), JobStatus::Done);
}

#[test]
fn start_failure_leaves_device_offline() {
    let sched = DeviceScheduler::new(MockLoader::failing());
    assert!(matches!(sched.start(), Err(DeviceError::Fatal(_))));
    assert_eq!(sched.device_status(), DeviceStatus::Offline);

    let mut session = Session::new();
    assert!(matches!(
        session.initialize(&sched),
        Err(DeviceError::Fatal(_))
    ));
}

#[test]
fn freeing_a_queued_job_unschedules_it() {
    let backend = MockBackend::new().with_latency(Duration::from_millis(50));
    let log = backend.call_log();
    let sched = started(backend);
    let session = session_for(&sched);

    let blocker = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(blocker, JobParam::Program("blocker".into()))
        .unwrap();
    let freed = sched.create_job(&session).unwrap();
    sched
        .set_job_parameter(freed, JobParam::Program("freed".into()))
        .unwrap();

    sched.submit(blocker).unwrap();
    sched.submit(freed).unwrap();
    sched.free_job(freed).unwrap();

    sched.wait(blocker, Duration::from_secs(5)).unwrap();
    eventually(|| sched.device_status() == DeviceStatus::Idle);

    let log = log.lock().unwrap();
    assert_eq!(log.executes, vec!["blocker"]);
}
