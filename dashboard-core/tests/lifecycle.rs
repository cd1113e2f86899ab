//! End-to-end coverage of the six canonical scenarios, driven against a
//! real Postgres instance via `#[sqlx::test]` rather than through HTTP —
//! `dashboard-server` is a thin axum layer with no behaviour of its own
//! to exercise beyond what these calls already drive.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde_json::json;
use sqlx::PgPool;

use dashboard_core::arr::ArrJobProcessor;
use dashboard_core::db::store::CONTROLLER_HOSTNAME;
use dashboard_core::db::{Migrator, Store};
use dashboard_core::error::CoreError;
use dashboard_core::queue::JobQueue;
use dashboard_core::scan::media::{run_internal_scan, CodecSkipPolicy};
use dashboard_core::scan::ScanOrchestrator;
use dashboard_core::session::SessionRegistry;

const FRESH: Duration = Duration::from_secs(5 * 60);

/// Scenario 1: worker handshake and job lifecycle.
#[sqlx::test]
async fn worker_handshake_and_job_lifecycle(pool: PgPool) {
    let store = Store::new(pool);
    let sessions = SessionRegistry::new(store.clone(), FRESH);
    let queue = JobQueue::new(store.clone());

    sessions.register("w1", "T1", "V").await.expect("register");

    queue
        .enqueue("/m/a.mkv", "transcode", "pending", json!({}))
        .await
        .expect("enqueue");

    sessions.validate("w1", "T1").await.expect("validate");
    let claimed = queue.claim_one("w1").await.expect("claim").expect("a job is available");
    assert_eq!(claimed.filepath, "/m/a.mkv");
    assert_eq!(claimed.job_type, "transcode");

    let job = store.get_job(claimed.id).await.expect("job exists");
    assert_eq!(job.status, "encoding");
    assert_eq!(job.assigned_to.as_deref(), Some("w1"));

    queue
        .complete_transcode(claimed.id, 1000, 400, "w1")
        .await
        .expect("complete");

    assert!(store.get_job(claimed.id).await.is_err(), "job row is deleted on completion");

    let history = store.list_history().await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].original_size, 1000);
    assert_eq!(history[0].new_size, 400);
}

/// Scenario 2: uniqueness enforcement, then acceptance once the prior
/// session has gone stale.
#[sqlx::test]
async fn registration_conflict_then_stale_replacement(pool: PgPool) {
    let store = Store::new(pool);
    let sessions = SessionRegistry::new(store.clone(), FRESH);

    sessions.register("w1", "T1", "V").await.expect("first register");

    let err = sessions.register("w1", "T2", "V").await.unwrap_err();
    match err {
        CoreError::RegistrationConflict(hostname) => assert_eq!(hostname, "w1"),
        other => panic!("expected RegistrationConflict, got {other:?}"),
    }

    // Simulate the freshness window elapsing without a heartbeat.
    sqlx::query("UPDATE nodes SET last_heartbeat = now() - interval '6 minutes' WHERE hostname = 'w1'")
        .execute(store.pool())
        .await
        .expect("backdate heartbeat");

    sessions.register("w1", "T2", "V").await.expect("stale replacement succeeds");
    sessions.validate("w1", "T2").await.expect("new token is now live");
}

/// Scenario 3: internal scanner skips hevc, keeps h264.
#[sqlx::test]
async fn internal_scan_skips_hevc_keeps_h264(pool: PgPool) {
    let store = Store::new(pool);
    let orchestrator = ScanOrchestrator::new();

    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("movies");
    std::fs::create_dir_all(&root).expect("mkdir");
    std::fs::write(root.join("a.mkv"), b"fake-h264").expect("write a");
    std::fs::write(root.join("b.mkv"), b"fake-hevc").expect("write b");

    let guard = orchestrator
        .try_start(dashboard_core::scan::ScanSource::Internal, dashboard_core::scan::ScanType::Media)
        .expect("start scan");

    let outcome = run_internal_scan(&store, &guard, &[root.clone()], &CodecSkipPolicy::default(), false, |path| {
        if path.file_name().and_then(|n| n.to_str()) == Some("b.mkv") {
            Some("hevc".to_string())
        } else {
            Some("h264".to_string())
        }
    })
    .await
    .expect("scan completes");

    assert_eq!(outcome.candidates_seen, 2);
    assert_eq!(outcome.jobs_inserted, 1);

    let jobs = store
        .list_jobs(&Default::default(), 0, 10)
        .await
        .expect("list jobs");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].filepath, root.join("a.mkv").to_string_lossy().to_string());
    assert_eq!(jobs[0].job_type, "transcode");
    assert_eq!(jobs[0].status, "pending");
}

/// Scenario 4: scanner mutual exclusion, covered at the unit level in
/// `scan::mod`'s own tests (`second_scan_is_busy_while_first_runs`); here
/// we only check that the dispatcher's scheduled path observes `Busy`
/// without propagating it as an error.
#[sqlx::test]
async fn media_scan_busy_does_not_fail_the_caller(pool: PgPool) {
    let store = Store::new(pool);
    let orchestrator = ScanOrchestrator::new();
    let _held = orchestrator
        .try_start(dashboard_core::scan::ScanSource::Internal, dashboard_core::scan::ScanType::Media)
        .expect("first scan starts");

    let err = orchestrator
        .try_start(dashboard_core::scan::ScanSource::Sonarr, dashboard_core::scan::ScanType::Rename)
        .unwrap_err();
    assert!(matches!(err, CoreError::Busy));

    // A Busy rename attempt must not touch the database.
    assert!(store.list_jobs(&Default::default(), 0, 10).await.unwrap().is_empty());
}

/// Scenario 5: Quality Mismatch is an internal job, never claimable.
#[sqlx::test]
async fn quality_mismatch_never_dispatched(pool: PgPool) {
    let store = Store::new(pool);
    let queue = JobQueue::new(store.clone());

    store
        .insert_job(
            "/tv/show/s01e01.mkv",
            "Quality Mismatch",
            "pending",
            json!({"source": "sonarr"}),
        )
        .await
        .expect("insert quality mismatch job");

    let claimed = queue.claim_one("w1").await.expect("claim attempt");
    assert!(claimed.is_none(), "Quality Mismatch rows must never be claimed");

    let jobs = store.list_jobs(&Default::default(), 0, 10).await.expect("list");
    assert_eq!(jobs.len(), 1, "the job stays visible for operators");
    assert_eq!(jobs[0].status, "pending");
}

/// Scenario 6: stuck-job detection.
#[sqlx::test]
async fn stuck_job_is_detected_when_worker_moves_on(pool: PgPool) {
    let store = Store::new(pool);
    let queue = JobQueue::new(store.clone());
    let sessions = SessionRegistry::new(store.clone(), FRESH);

    sessions.register("w1", "T1", "V").await.expect("register");

    queue.enqueue("/m/job10.mkv", "transcode", "pending", json!({})).await.expect("enqueue 10");
    let job10 = queue.claim_one("w1").await.expect("claim 10").expect("available");

    queue.enqueue("/m/job11.mkv", "transcode", "pending", json!({})).await.expect("enqueue 11");
    let job11 = queue.claim_one("w1").await.expect("claim 11").expect("available");
    queue.complete_transcode(job11.id, 10, 5, "w1").await.expect("complete 11");

    let stuck = queue.stuck_jobs(ChronoDuration::from_std(FRESH).unwrap()).await.expect("stuck jobs");
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].id, job10.id);
    assert_eq!(stuck[0].assigned_to, "w1");
}

/// Item 1/2: Rename Job rows are held at `awaiting_approval`, only reach
/// `pending` via `requeue_job`, and `claim_rename_jobs` assigns them to
/// the controller sentinel rather than leaving `assigned_to` null.
#[sqlx::test]
async fn rename_job_is_gated_then_claimed_onto_controller(pool: PgPool) {
    Migrator::run(&pool).await.expect("seed controller node");
    let store = Store::new(pool);

    store
        .insert_job(
            "/tv/show/s01e01.mkv",
            "Rename Job",
            "awaiting_approval",
            json!({"source": "sonarr", "seriesId": 1, "episodeFileId": 2}),
        )
        .await
        .expect("insert rename job");

    let job = store
        .list_jobs(&Default::default(), 0, 10)
        .await
        .expect("list")
        .into_iter()
        .next()
        .expect("one job");
    assert_eq!(job.status, "awaiting_approval");

    // Not claimable while held.
    assert!(store.claim_rename_jobs(10).await.expect("claim attempt").is_empty());

    store.requeue_job(job.id).await.expect("operator requeues it");
    let requeued = store.get_job(job.id).await.expect("job still exists");
    assert_eq!(requeued.status, "pending");
    assert_eq!(requeued.assigned_to, None);

    let claimed = store.claim_rename_jobs(10).await.expect("claim after requeue");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, "encoding");
    assert_eq!(claimed[0].assigned_to.as_deref(), Some(CONTROLLER_HOSTNAME));

    // Controller sentinel stays invisible to operators.
    let nodes = store.list_nodes().await.expect("list nodes");
    assert!(nodes.iter().all(|n| n.hostname != CONTROLLER_HOSTNAME));
}

/// `ArrJobProcessor::drain_once` on a claimed job with no provider client
/// configured fails the job rather than leaving it stuck in `encoding`
/// forever — and the failure path still goes through the same
/// `assigned_to`-populated row `claim_rename_jobs` produced.
#[sqlx::test]
async fn arr_job_processor_fails_rename_job_when_no_provider_configured(pool: PgPool) {
    Migrator::run(&pool).await.expect("seed controller node");
    let store = Store::new(pool);

    store
        .insert_job(
            "/tv/show/s01e02.mkv",
            "Rename Job",
            "pending",
            json!({"source": "sonarr", "seriesId": 1, "episodeFileId": 2}),
        )
        .await
        .expect("insert rename job");

    let processor = ArrJobProcessor::new(store.clone(), None, None, None);
    processor.drain_once().await.expect("drain does not error");

    let failures = store.list_failures().await.expect("list failures");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].filepath, "/tv/show/s01e02.mkv");
}
