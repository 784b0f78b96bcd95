//! End-to-end: a short staged run against a wiremock gateway, driven by the
//! real runner loop.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::test_config;
use tpo_loadgen::domain::{Stage, TargetEnv};
use tpo_loadgen::runner::{self, AppState};
use tpo_loadgen::workload::TaskKind;

#[tokio::test]
async fn short_run_completes_and_records_order_and_release_traffic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    // One three-second stage; release_wait is zero so queued releases go out
    // as soon as a worker picks the release task.
    let cfg = test_config(
        TargetEnv::Alb,
        &server.uri(),
        &[(TaskKind::Order, 1), (TaskKind::Release, 1)],
        vec![Stage::new(6.0, 0.05, 2.0)],
    );
    let state = AppState::new(cfg);

    let result = tokio::time::timeout(Duration::from_secs(30), runner::run(state.clone())).await;
    result.expect("run should finish well before the timeout").unwrap();

    let status = state.status.read().await;
    assert!(status.finished);
    assert_eq!(status.active_users, 0);
    assert_eq!(status.stage_count, 1);

    let snapshot = state.stats.snapshot();
    assert!(snapshot.total.requests > 0, "no traffic was generated");
    assert_eq!(snapshot.total.failures, 0);
    assert!(
        snapshot.rows.iter().any(|r| r.name.contains("_ORDER_")),
        "no order traffic in {:?}",
        snapshot.rows.iter().map(|r| &r.name).collect::<Vec<_>>()
    );
    assert!(
        snapshot.rows.iter().any(|r| r.name.contains("_RELEASE_")),
        "no release traffic in {:?}",
        snapshot.rows.iter().map(|r| &r.name).collect::<Vec<_>>()
    );
    // alb display names for this run.
    assert!(snapshot.rows.iter().all(|r| r.name.starts_with("ALB_")));
}

#[tokio::test]
async fn cancelled_run_stops_workers_and_reports() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    // A stage far longer than the test; only cancellation can end the run.
    let cfg = test_config(
        TargetEnv::Alb,
        &server.uri(),
        &[(TaskKind::Order, 1)],
        vec![Stage::new(10.0, 60.0, 2.0)],
    );
    let state = AppState::new(cfg);

    let handle = tokio::spawn(runner::run(state.clone()));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    state.cancel.cancel();

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("cancelled run should wind down promptly")
        .expect("runner task should not panic")
        .unwrap();

    let status = state.status.read().await;
    assert!(status.finished);
    assert_eq!(status.active_users, 0);
}

#[tokio::test]
async fn pending_releases_wait_out_the_release_delay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let mut cfg = test_config(
        TargetEnv::Alb,
        &server.uri(),
        &[(TaskKind::Order, 1), (TaskKind::Release, 1)],
        vec![Stage::new(6.0, 0.05, 2.0)],
    );
    // Far longer than the run itself: no release may be sent.
    cfg.workload.release_wait_secs = 3600;
    let state = AppState::new(cfg);

    tokio::time::timeout(Duration::from_secs(30), runner::run(state.clone()))
        .await
        .expect("run should finish well before the timeout")
        .unwrap();

    let snapshot = state.stats.snapshot();
    assert!(snapshot.rows.iter().any(|r| r.name.contains("_ORDER_")));
    assert!(
        !snapshot.rows.iter().any(|r| r.name.contains("_RELEASE_")),
        "releases went out before their delay"
    );
}
