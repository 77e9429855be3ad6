// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;
use std::time::Instant;

use loy_adapters::CommercePlatform;
use loy_core::{Clock, IdGen};
use loy_engine::Engine;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::jobs::run_job;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Everything a connection handler needs. Cheap to clone.
pub struct ServerContext<P, C, I> {
    pub engine: Engine<P, C, I>,
    pub start_time: Instant,
    /// Notified when a client asks the daemon to stop
    pub shutdown: Arc<Notify>,
}

impl<P: Clone, C: Clone, I: Clone> Clone for ServerContext<P, C, I> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            start_time: self.start_time,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<P, C, I, S>(
    ctx: ServerContext<P, C, I>,
    stream: S,
) -> Result<(), ServerError>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            let response = Response::Error {
                message: e.to_string(),
            };
            let _ = protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await;
            return Err(ServerError::Protocol(e));
        }
    };

    debug!(?request, "received request");
    let response = handle_request(&ctx, request).await;
    debug!(?response, "sending response");

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

fn error_response(e: impl std::fmt::Display) -> Response {
    Response::Error {
        message: e.to_string(),
    }
}

/// Handle a single request and return a response
pub async fn handle_request<P, C, I>(ctx: &ServerContext<P, C, I>, request: Request) -> Response
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    let engine = &ctx.engine;
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            engine: engine.status(),
        },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        Request::Redeem {
            customer,
            reward_id,
        } => match engine.redeem(&customer, &reward_id).await {
            Ok(redemption) => Response::Redeemed { redemption },
            Err(e) => Response::RedeemRejected {
                reason: e.reason().to_string(),
                message: e.to_string(),
            },
        },

        Request::History { customer, since } => {
            let entries = match since {
                Some(since) => engine.ledger_since(&customer, since),
                None => engine.ledger_history(&customer),
            };
            match entries {
                Ok(entries) => Response::History { entries },
                Err(e) => error_response(e),
            }
        }

        Request::Tier { customer } => match engine.current_tier(&customer) {
            Ok(status) => Response::Tier { status },
            Err(e) => error_response(e),
        },

        Request::RunJob { job } => Response::JobDone {
            report: run_job(engine, job).await,
        },

        Request::Adjust {
            customer,
            change,
            reason,
            adjustment_id,
        } => match engine
            .adjust_points(&customer, change, &reason, &adjustment_id)
            .await
        {
            Ok(entry) => Response::Adjusted { entry },
            Err(e) => error_response(e),
        },

        Request::Import { customer } => match engine.import_customer(&customer).await {
            Ok(report) => Response::Imported { report },
            Err(e) => error_response(e),
        },

        Request::RecordOrder {
            customer,
            order_number,
            total_minor,
            currency,
        } => match engine
            .record_order(&customer, &order_number, total_minor, &currency)
            .await
        {
            Ok(order) => Response::OrderRecorded { order },
            Err(e) => error_response(e),
        },
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
