//! Client builder, connection state and response correlation.
//!
//! A [`Client`] owns one connection. Calls from any number of tasks share
//! it: each call writes its request under the writer lock, registers a
//! pending entry keyed by its sequence number, and waits. A single
//! background reader task matches responses to waiting calls by `seq`, so
//! responses may arrive in any order.
//!
//! ```text
//!  call ──► pack ──► register(seq) ──► write ──► wait ◄──┐
//!                                                         │
//!  reader task ──► read frame ──► pending.complete(seq) ──┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wirecall::client::Client;
//! use wirecall::protocol::Compression;
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let client = Client::builder()
//!         .compression(Compression::Lz4)
//!         .connect("127.0.0.1:6060")
//!         .await?;
//!
//!     let greeting: String = client.call("User.SayHello", ("hello",)).await?;
//!     println!("{greeting}");
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

mod pending;
mod stub;

pub use stub::{parse_service_path, Stub};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::codec::Value;
use crate::config::{ClientConfig, FailMode, Network, Runtime};
use crate::error::{RpcError, Result};
use crate::id::{IdGenerator, Snowflake};
use crate::protocol::{Compression, Message, MessageType, Serialization};
use crate::transport::{self, BoxedReader, BoxedWriter};

use pending::{PendingCalls, PendingGuard};

/// Builder for configuring and connecting a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            ids: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    pub fn serialization(mut self, serialization: Serialization) -> Self {
        self.config.serialization = serialization;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the dial deadline.
    ///
    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-call response deadline. `None` waits indefinitely.
    ///
    /// Default: 5 seconds
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the deadline for writing one request.
    ///
    /// Default: 1 second
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the version byte written into request headers.
    pub fn version(mut self, version: u8) -> Self {
        self.config.version = version;
        self
    }

    /// Record a retry count. The call path does not retry.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Record a failure policy. The call path does not consult it.
    pub fn fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.config.fail_mode = fail_mode;
        self
    }

    /// Use a custom sequence number source.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Dial `addr` and start the response reader.
    pub async fn connect(self, addr: &str) -> Result<Client> {
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(Snowflake::default()) as Arc<dyn IdGenerator>);
        Client::connect_with(self.config, ids, addr).await
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared with the reader task.
struct Shared {
    pending: PendingCalls,
    server_shutdown: AtomicBool,
}

impl Shared {
    /// Mark the connection unusable, then fail everything still waiting.
    ///
    /// The flag is set before draining so that a call registering
    /// concurrently either gets drained or observes the flag.
    fn shut_down(&self) -> usize {
        self.server_shutdown.store(true, Ordering::SeqCst);
        self.pending.fail_all()
    }

    fn is_server_shutdown(&self) -> bool {
        self.server_shutdown.load(Ordering::SeqCst)
    }
}

struct Inner {
    config: ClientConfig,
    runtime: Runtime,
    addr: String,
    writer: tokio::sync::Mutex<BoxedWriter>,
    shared: Arc<Shared>,
    ids: Arc<dyn IdGenerator>,
    closed: AtomicBool,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn take_reader_task(&self) -> Option<JoinHandle<()>> {
        self.reader_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Write one request frame, marking the connection broken on failure.
    async fn send(&self, msg: &Message) -> Result<()> {
        let mut writer = self.writer.lock().await;

        let result = match self.config.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, msg.write_to(&mut *writer)).await {
                Ok(result) => result,
                Err(_) => Err(RpcError::Timeout),
            },
            None => msg.write_to(&mut *writer).await,
        };

        if let Err(e) = &result {
            // A partial frame leaves the stream unusable.
            tracing::warn!(addr = %self.addr, error = %e, "write failed, marking connection broken");
            self.shared.server_shutdown.store(true, Ordering::SeqCst);
            let _ = writer.shutdown().await;
        }
        result
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.take_reader_task() {
            task.abort();
        }
    }
}

/// A connected RPC client. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect to `addr` with default configuration.
    pub async fn connect(addr: &str) -> Result<Self> {
        ClientBuilder::new().connect(addr).await
    }

    async fn connect_with(
        config: ClientConfig,
        ids: Arc<dyn IdGenerator>,
        addr: &str,
    ) -> Result<Self> {
        let conn = transport::connect(config.network, addr, config.connect_timeout).await?;
        let runtime = Runtime::new(config.serialization, config.compression);

        let shared = Arc::new(Shared {
            pending: PendingCalls::new(),
            server_shutdown: AtomicBool::new(false),
        });
        let reader_task = tokio::spawn(read_loop(
            conn.reader,
            shared.clone(),
            config.max_frame_len,
            addr.to_string(),
        ));

        tracing::info!(
            peer = %conn.peer,
            serialization = ?runtime.serialization,
            compression = ?runtime.compression,
            "connected"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                runtime,
                addr: addr.to_string(),
                writer: tokio::sync::Mutex::new(conn.writer),
                shared,
                ids,
                closed: AtomicBool::new(false),
                reader_task: Mutex::new(Some(reader_task)),
            }),
        })
    }

    /// Invoke `object.method` with raw argument values.
    ///
    /// Returns the decoded output list as sent by the server, without
    /// interpreting the `[value, error]` convention.
    pub async fn call_values(
        &self,
        object: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>> {
        self.invoke(object, method, &args, self.inner.config.read_timeout)
            .await
    }

    /// Build a typed stub for `"Object.Method"`.
    pub fn stub<A, R>(&self, path: &str) -> Result<Stub<A, R>> {
        let (object, method) = parse_service_path(path)?;
        Ok(Stub::new(self.clone(), object, method))
    }

    /// Build a stub for `path` and call it once.
    pub async fn call<A, R>(&self, path: &str, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned + Default,
    {
        self.stub::<A, R>(path)?.call(args).await
    }

    pub(crate) async fn invoke(
        &self,
        object: &str,
        method: &str,
        args: &[Value],
        deadline: Option<Duration>,
    ) -> Result<Vec<Value>> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(RpcError::ClientClosed);
        }
        if inner.shared.is_server_shutdown() {
            return Err(RpcError::ServerUnavailable);
        }

        let payload = inner.runtime.pack(args)?;
        let seq = inner.ids.next_id();

        let rx = inner.shared.pending.register(seq);
        let _guard = PendingGuard::new(&inner.shared.pending, seq);

        // The reader may have drained the table just before we registered.
        if inner.shared.is_server_shutdown() {
            return Err(RpcError::ServerUnavailable);
        }

        let header = inner.runtime.header(MessageType::Request, inner.config.version);
        let request = Message::request(header, seq, object, method, payload);
        inner.send(&request).await?;

        let outcome = match deadline {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(object, method, seq, timeout = ?limit, "call timed out");
                    return Err(RpcError::Timeout);
                }
            },
            None => rx.await,
        };

        let response = match outcome {
            Ok(Some(response)) => response,
            Ok(None) | Err(_) => return Err(RpcError::ServerUnavailable),
        };

        Runtime::for_header(&response.header).unpack(&response.payload)
    }

    /// Close the connection. Safe to call more than once.
    ///
    /// Calls still waiting fail with [`RpcError::ServerUnavailable`]; new
    /// calls fail with [`RpcError::ClientClosed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut writer = self.inner.writer.lock().await;
            let _ = writer.shutdown().await;
        }
        if let Some(task) = self.inner.take_reader_task() {
            task.abort();
        }

        let failed = self.inner.shared.pending.fail_all();
        tracing::info!(addr = %self.inner.addr, failed, "client closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Whether the connection has been lost.
    pub fn is_server_shutdown(&self) -> bool {
        self.inner.shared.is_server_shutdown()
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.shared.pending.len()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Address this client dialled.
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }
}

/// Read responses until the stream ends, then fail every pending call.
async fn read_loop(mut reader: BoxedReader, shared: Arc<Shared>, max_frame_len: u32, addr: String) {
    let reason = loop {
        match Message::read_from_limited(&mut reader, max_frame_len).await {
            Ok(msg) if !msg.header.is_response() => {
                tracing::warn!(seq = msg.seq, %addr, "ignoring request frame from server");
            }
            Ok(msg) => {
                let seq = msg.seq;
                if !shared.pending.complete(msg) {
                    tracing::debug!(seq, "discarding response with no pending call");
                }
            }
            Err(e) => break e,
        }
    };

    let failed = shared.shut_down();
    tracing::info!(%addr, %reason, failed, "response reader stopped");
}
