// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Start a real `loyd`, talk to it over its socket, and stop it.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use loy_core::LoyaltyConfig;
use loy_daemon::protocol::{decode, encode, read_message, write_message};
use loy_daemon::{DaemonPaths, Job, JobReport, Request, Response};
use tempfile::TempDir;
use tokio::net::UnixStream;

const CONFIG: &str = r#"
[store]
data_dir = "data"

[jobs]
accrual_interval = "1h"

[[reward]]
id = "five"
title = "5 off"
points_cost = 500
value_minor = 500
"#;

struct Daemon {
    child: Child,
    paths: DaemonPaths,
}

impl Daemon {
    fn start(dir: &TempDir) -> Self {
        let config_path = dir.path().join("loyalty.toml");
        std::fs::write(&config_path, CONFIG).unwrap();
        let paths = DaemonPaths::resolve(&config_path, &LoyaltyConfig::parse(CONFIG).unwrap());

        let mut child = Command::new(env!("CARGO_BIN_EXE_loyd"))
            .arg(&config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn loyd");

        let stdout = child.stdout.take().unwrap();
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).unwrap();
        assert_eq!(line.trim(), "READY");

        Self { child, paths }
    }

    async fn send(&self, request: Request) -> Response {
        let mut stream = UnixStream::connect(&self.paths.socket_path).await.unwrap();
        write_message(&mut stream, &encode(&request).unwrap())
            .await
            .unwrap();
        decode(&read_message(&mut stream).await.unwrap()).unwrap()
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[tokio::test]
async fn adjust_history_and_shutdown() {
    let dir = TempDir::new().unwrap();
    let mut daemon = Daemon::start(&dir);

    assert_eq!(daemon.send(Request::Ping).await, Response::Pong);

    // Unknown customers cannot be adjusted
    let response = daemon
        .send(Request::Adjust {
            customer: "cus-1".to_string(),
            change: 100,
            reason: "welcome".to_string(),
            adjustment_id: "adj-1".to_string(),
        })
        .await;
    assert!(matches!(response, Response::Error { .. }));

    let response = daemon
        .send(Request::RecordOrder {
            customer: "cus-1".to_string(),
            order_number: "#1001".to_string(),
            total_minor: 60_000,
            currency: "EUR".to_string(),
        })
        .await;
    assert!(
        matches!(response, Response::Error { .. }),
        "orders need a known customer: {:?}",
        response
    );

    match daemon.send(Request::RunJob { job: Job::Audit }).await {
        Response::JobDone {
            report: JobReport::Audit(report),
        } => assert!(report.violations.is_empty()),
        other => panic!("unexpected response: {:?}", other),
    }

    match daemon.send(Request::Status).await {
        Response::Status { engine, .. } => assert_eq!(engine.rewards, 1),
        other => panic!("unexpected response: {:?}", other),
    }

    assert_eq!(daemon.send(Request::Shutdown).await, Response::ShuttingDown);

    let mut exited = false;
    for _ in 0..100 {
        if daemon.child.try_wait().unwrap().is_some() {
            exited = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(exited, "loyd did not exit after shutdown");
    assert!(!daemon.paths.socket_path.exists());
    assert!(!daemon.paths.lock_path.exists());
    assert!(daemon.paths.wal_path.exists());
}

#[tokio::test]
async fn second_daemon_refuses_to_start() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::start(&dir);

    let status = Command::new(env!("CARGO_BIN_EXE_loyd"))
        .arg(dir.path().join("loyalty.toml"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());

    let log = std::fs::read_to_string(&daemon.paths.log_path).unwrap();
    assert!(log.contains("Failed to acquire lock"));
    assert!(daemon.paths.socket_path.exists());
}
