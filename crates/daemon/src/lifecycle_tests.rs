// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

const OFFLINE: &str = r#"
[[offer]]
id = "welcome"
name = "Welcome bonus"
offer_type = "POINTS"
points_cost = 100
active = true

[[reward]]
id = "five"
title = "5 off"
points_cost = 500
value_minor = 500
"#;

fn write_config(dir: &TempDir, toml: &str) -> Config {
    let path = dir.path().join("loyalty.toml");
    std::fs::write(&path, toml).unwrap();
    Config::load(&path).unwrap()
}

#[tokio::test]
async fn startup_creates_runtime_files_and_shutdown_removes_them() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, OFFLINE);

    let state = startup(&config).await.unwrap();
    let paths = config.paths.clone();

    assert!(paths.socket_path.exists());
    assert!(paths.wal_path.exists());
    let pid = std::fs::read_to_string(&paths.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert_eq!(
        std::fs::read_to_string(&paths.version_path).unwrap(),
        env!("CARGO_PKG_VERSION")
    );
    assert!(state.context.engine.store().offer(&"welcome".into()).is_some());
    assert_eq!(state.engine().catalog().len(), 1);

    state.shutdown().await.unwrap();

    assert!(!paths.socket_path.exists());
    assert!(!paths.lock_path.exists());
    assert!(!paths.version_path.exists());
    assert!(paths.wal_path.exists());
}

#[tokio::test]
async fn second_daemon_fails_without_touching_the_first() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, OFFLINE);

    let first = startup(&config).await.unwrap();
    let second = startup(&config).await;

    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert!(config.paths.socket_path.exists());
    assert!(config.paths.lock_path.exists());

    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn base_url_without_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "[platform]\nbase_url = \"http://127.0.0.1:9\"\n",
    );

    let result = startup(&config).await;

    assert!(matches!(result, Err(LifecycleError::MissingAccessToken)));
    assert!(!config.paths.lock_path.exists());
    assert!(!config.paths.socket_path.exists());
}

#[test]
fn missing_config_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let result = Config::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(LifecycleError::Config(_))));
}

#[test]
fn http_platform_selected_when_configured() {
    let config = LoyaltyConfig::parse(
        "[platform]\nbase_url = \"http://127.0.0.1:9\"\naccess_token = \"secret\"\n",
    )
    .unwrap();
    assert!(!select_platform(&config).unwrap().is_offline());
    assert!(select_platform(&LoyaltyConfig::default())
        .unwrap()
        .is_offline());
}
