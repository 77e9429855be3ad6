// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between `loy` and `loyd`
//!
//! Each message is a 4-byte big-endian length followed by that many bytes
//! of JSON. One request and one response per connection.

use chrono::{DateTime, Utc};
use loy_core::{LedgerEntry, Order, RewardId};
use loy_engine::{
    AccrualReport, AuditReport, BackfillReport, EngineStatus, ImportReport, OfferReport,
    ReconcileReport, Redemption, TierStatus,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bumped when request or response shapes change
pub const PROTOCOL_VERSION: &str = "1";

/// Read/write deadline for a single message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a message body
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timed out")]
    Timeout,
}

/// Batch jobs that can be triggered on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    Accrual,
    Offers,
    Reconcile,
    Backfill,
    Audit,
}

impl Job {
    pub fn name(self) -> &'static str {
        match self {
            Job::Accrual => "accrual",
            Job::Offers => "offers",
            Job::Reconcile => "reconcile",
            Job::Backfill => "backfill",
            Job::Audit => "audit",
        }
    }
}

/// Outcome of a job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    Accrual(AccrualReport),
    Offers(OfferReport),
    Reconcile(ReconcileReport),
    Backfill(BackfillReport),
    Audit(AuditReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Hello {
        version: String,
    },
    Status,
    Shutdown,
    Redeem {
        customer: String,
        reward_id: RewardId,
    },
    History {
        customer: String,
        #[serde(default)]
        since: Option<DateTime<Utc>>,
    },
    Tier {
        customer: String,
    },
    RunJob {
        job: Job,
    },
    Adjust {
        customer: String,
        change: i64,
        reason: String,
        adjustment_id: String,
    },
    Import {
        customer: String,
    },
    RecordOrder {
        customer: String,
        order_number: String,
        total_minor: i64,
        currency: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Hello {
        version: String,
    },
    Status {
        uptime_secs: u64,
        engine: EngineStatus,
    },
    ShuttingDown,
    Redeemed {
        redemption: Redemption,
    },
    /// Redemption refused; `reason` is a stable machine-readable code
    RedeemRejected {
        reason: String,
        message: String,
    },
    History {
        entries: Vec<LedgerEntry>,
    },
    Tier {
        status: TierStatus,
    },
    JobDone {
        report: JobReport,
    },
    Adjusted {
        entry: LedgerEntry,
    },
    Imported {
        report: ImportReport,
    },
    OrderRecorded {
        order: Order,
    },
    Error {
        message: String,
    },
}

/// Serialize to JSON without the length prefix
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = u32::try_from(data.len()).map_err(|_| ProtocolError::MessageTooLarge {
        size: data.len(),
        max: MAX_MESSAGE_SIZE,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
