// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control socket server and connection handling.

use pw_adapters::{AuthAdapter, DatastoreAdapter, MutationAdapter};
use pw_engine::QueueError;
use tokio::net::UnixStream;
use tracing::{debug, error, warn};

use crate::lifecycle::DaemonState;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Handle a single client connection
pub async fn handle_connection<M, D, A>(
    daemon: &DaemonState<M, D, A>,
    stream: UnixStream,
) -> Result<(), ServerError>
where
    M: MutationAdapter,
    D: DatastoreAdapter,
    A: AuthAdapter,
{
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "failed to read request");
            return Err(ServerError::Protocol(e));
        }
    };

    debug!(?request, "received request");
    let response = handle_request(daemon, request).await;
    debug!(?response, "sending response");

    let written = protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await;

    // Reply first so the caller sees the acknowledgement
    if response == Response::ShuttingDown {
        daemon.request_shutdown();
    }

    written.map_err(ServerError::Protocol)
}

/// Handle a single request and return a response
pub async fn handle_request<M, D, A>(daemon: &DaemonState<M, D, A>, request: Request) -> Response
where
    M: MutationAdapter,
    D: DatastoreAdapter,
    A: AuthAdapter,
{
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: daemon.start_time.elapsed().as_secs(),
            healthy: daemon.health.is_healthy(),
            queue_len: daemon.queue.len(),
            peers: daemon.hub.peer_count(),
            clients: daemon.notify.client_count(),
        },

        Request::Enqueue {
            kind,
            actor_id,
            target_id,
            payload,
        } => match daemon.queue.enqueue(kind, actor_id, target_id, payload) {
            Ok(id) => Response::Enqueued { id },
            Err(e @ QueueError::QueueFull { .. }) => {
                warn!(actor_id, target_id, "enqueue rejected, queue full");
                Response::Error {
                    message: e.to_string(),
                }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Flush => {
            let report = daemon.processor.process_all_now().await;
            Response::Flushed {
                processed: report.processed,
                failed: report.failed,
            }
        }

        Request::BroadcastProgress {
            user_id,
            entity_id,
            position,
            sub_position_id,
        } => match daemon
            .hub
            .broadcast_progress(user_id, entity_id, position, sub_position_id)
        {
            Ok(delivered) => Response::Broadcast { delivered },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::NotifyTopic {
            topic_id,
            name,
            extra,
        } => Response::Notified {
            recipients: daemon.notify.spawn_notify_topic(topic_id, name, extra),
        },

        Request::NotifyUser {
            user_id,
            name,
            extra,
        } => Response::Notified {
            recipients: daemon.notify.spawn_notify_user(user_id, name, extra),
        },

        Request::Shutdown => Response::ShuttingDown,
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
