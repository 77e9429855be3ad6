// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for daemon client behavior.

use super::*;
use loy_core::LoyaltyConfig;
use std::fs;
use tempfile::tempdir;
use tokio::net::UnixListener;

fn paths_in(dir: &Path) -> DaemonPaths {
    let paths = DaemonPaths::resolve(&dir.join("loyalty.toml"), &LoyaltyConfig::default());
    fs::create_dir_all(&paths.data_dir).unwrap();
    paths
}

/// connect() runs while the daemon may still be initializing, so it must
/// never clean up the pid file the daemon wrote first.
#[test]
fn connect_does_not_delete_pid_file() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    fs::write(&paths.lock_path, "12345\n").unwrap();

    let result = DaemonClient::connect(&paths);

    assert!(matches!(result, Err(ClientError::DaemonNotRunning)));
    assert!(paths.lock_path.exists(), "connect() must not delete pid file");
    assert_eq!(read_daemon_pid(&paths), Some(12345));
}

#[tokio::test]
async fn stop_without_daemon_clears_stale_pid() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    fs::write(&paths.lock_path, "12345\n").unwrap();

    assert!(!daemon_stop(&paths).await.unwrap());
    assert!(!paths.lock_path.exists());
}

#[test]
fn startup_failure_prefers_the_logged_error() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    let log = loy_daemon::DaemonLog::new(&paths.log_path);
    log.mark_startup().unwrap();
    log.record_startup_error(&"platform.base_url is set but platform.access_token is missing");

    let err = wrap_with_startup_error(ClientError::DaemonStartTimeout, &paths);

    match err {
        ClientError::DaemonStartFailed(message) => assert!(message.contains("access_token")),
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Serve a single canned response on the daemon socket
async fn serve_once(paths: &DaemonPaths, response: Response) -> tokio::task::JoinHandle<Request> {
    let listener = UnixListener::bind(&paths.socket_path).unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let bytes = protocol::read_message(&mut stream).await.unwrap();
        let request: Request = protocol::decode(&bytes).unwrap();
        let data = protocol::encode(&response).unwrap();
        protocol::write_message(&mut stream, &data).await.unwrap();
        request
    })
}

#[tokio::test]
async fn redeem_rejection_surfaces_reason() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    let server = serve_once(
        &paths,
        Response::RedeemRejected {
            reason: "insufficient_points".to_string(),
            message: "insufficient points: balance 100, cost 500".to_string(),
        },
    )
    .await;

    let client = DaemonClient::connect(&paths).unwrap();
    let err = client.redeem("cus-1", "five").await.unwrap_err();

    match err {
        ClientError::RedeemRejected { reason, .. } => assert_eq!(reason, "insufficient_points"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        server.await.unwrap(),
        Request::Redeem {
            customer: "cus-1".to_string(),
            reward_id: RewardId::new("five"),
        }
    );
}

#[tokio::test]
async fn error_response_becomes_rejected() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    let _server = serve_once(
        &paths,
        Response::Error {
            message: "customer not found: cus-9".to_string(),
        },
    )
    .await;

    let client = DaemonClient::connect(&paths).unwrap();
    let err = client.tier("cus-9").await.unwrap_err();

    assert_eq!(err.to_string(), "customer not found: cus-9");
}

#[tokio::test]
async fn mismatched_response_is_unexpected() {
    let temp = tempdir().unwrap();
    let paths = paths_in(temp.path());
    let _server = serve_once(&paths, Response::Pong).await;

    let client = DaemonClient::connect(&paths).unwrap();
    assert!(matches!(
        client.run_job(Job::Audit).await,
        Err(ClientError::UnexpectedResponse)
    ));
}
