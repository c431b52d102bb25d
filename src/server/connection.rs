//! Per-connection dispatch loop.
//!
//! Requests on one connection are handled strictly in order:
//!
//! ```text
//! read frame ─► unpack args ─► lookup ─► spawn handler ─► pack outputs ─► write
//!     ▲                                                                    │
//!     └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any framing error, unknown service, or handler panic ends the loop and
//! closes the connection. Shutdown is only observed while waiting for the
//! next request, so a request already being handled always gets its
//! response.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::config::{Runtime, ServerConfig};
use crate::error::{RpcError, Result};
use crate::handler::{encode_outputs, HandlerRegistry};
use crate::protocol::Message;
use crate::transport::{BoxedReader, BoxedWriter, Connection};

/// Everything a connection loop needs, shared by all connections.
pub(crate) struct ConnectionContext {
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) config: ServerConfig,
}

/// Resolve once shutdown has been signalled or the server handle is gone.
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Serve requests on `conn` until the peer leaves, an error poisons the
/// stream, or the server shuts down.
pub(crate) async fn serve_connection(
    conn: Connection,
    ctx: Arc<ConnectionContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Connection {
        mut reader,
        mut writer,
        peer,
    } = conn;
    tracing::debug!(%peer, "connection accepted");

    let reason = loop {
        let read = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => break "server shutting down".to_string(),
            read = read_request(&mut reader, &ctx.config) => read,
        };

        let request = match read {
            Ok(request) => request,
            Err(RpcError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                break "closed by peer".to_string()
            }
            Err(e) => break e.to_string(),
        };

        let response = match handle_request(&ctx.registry, request).await {
            Ok(response) => response,
            Err(e @ (RpcError::UnknownService(_) | RpcError::UnknownMethod(_))) => {
                tracing::warn!(%peer, error = %e, "unregistered target, closing connection");
                break e.to_string();
            }
            Err(e @ RpcError::HandlerPanic(_)) => {
                tracing::error!(%peer, error = %e, "closing connection");
                break e.to_string();
            }
            Err(e) => break e.to_string(),
        };

        if let Err(e) = write_response(&mut writer, &response, ctx.config.write_timeout).await {
            break format!("failed to write response: {e}");
        }
    };

    let _ = writer.shutdown().await;
    tracing::debug!(%peer, %reason, "connection closed");
}

async fn read_request(reader: &mut BoxedReader, config: &ServerConfig) -> Result<Message> {
    let read = Message::read_from_limited(reader, config.max_frame_len);
    match config.read_timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| RpcError::Timeout)?,
        None => read.await,
    }
}

async fn write_response(
    writer: &mut BoxedWriter,
    response: &Message,
    limit: Option<Duration>,
) -> Result<()> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, response.write_to(writer))
            .await
            .map_err(|_| RpcError::Timeout)?,
        None => response.write_to(writer).await,
    }
}

/// Run one request to completion and build its response.
///
/// Argument binding failures are answered with an error in the error slot;
/// lookup failures and panics are returned so the caller closes the
/// connection.
pub(crate) async fn handle_request(registry: &HandlerRegistry, request: Message) -> Result<Message> {
    if !request.header.is_request() {
        return Err(RpcError::Protocol(format!(
            "expected a request frame, got {:?}",
            request.header.msg_type
        )));
    }

    let started = Instant::now();
    let runtime = Runtime::for_header(&request.header);
    let args = runtime.unpack(&request.payload)?;
    let handler = registry.lookup(&request.object, &request.method)?;

    // The whole call runs inside the task so a panic in the handler's
    // synchronous part is caught too.
    let outputs = match tokio::spawn(async move { handler.call(args).await }).await {
        Ok(Ok(outputs)) => outputs,
        Ok(Err(e)) => {
            tracing::debug!(
                object = %request.object,
                method = %request.method,
                seq = request.seq,
                error = %e,
                "invocation failed, ignorable"
            );
            encode_outputs::<(), _>(Err(e))?
        }
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            return Err(RpcError::HandlerPanic(format!(
                "{}.{}: {}",
                request.object, request.method, message
            )));
        }
        Err(e) => {
            return Err(RpcError::HandlerPanic(format!(
                "{}.{} was cancelled: {}",
                request.object, request.method, e
            )))
        }
    };

    let payload = runtime.pack(&outputs)?;
    tracing::debug!(
        object = %request.object,
        method = %request.method,
        seq = request.seq,
        elapsed = ?started.elapsed(),
        "request handled"
    );

    Ok(Message::response(request.header, request.seq, payload))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
