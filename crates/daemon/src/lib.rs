// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loyalty daemon library
//!
//! The wire protocol and path layout are shared with the `loy` CLI.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod jobs;
pub mod lifecycle;
pub mod logging;
pub mod paths;
pub mod platform;
pub mod protocol;
pub mod server;

pub use lifecycle::{Config, DaemonEngine, DaemonState, LifecycleError};
pub use logging::{last_startup_error, DaemonLog, STARTUP_MARKER_PREFIX};
pub use paths::DaemonPaths;
pub use protocol::{Job, JobReport, ProtocolError, Request, Response, PROTOCOL_VERSION};

