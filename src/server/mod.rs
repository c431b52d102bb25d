//! Server builder, accept loop and graceful shutdown.
//!
//! The [`ServerBuilder`] collects services, then [`ServerBuilder::bind`]
//! freezes the registry, binds the listener and spawns the accept loop.
//! Each accepted connection gets its own dispatch task, spawned on a
//! [`TaskTracker`]:
//!
//! ```text
//! accept loop ──► tracker.spawn(serve_connection) ──┐
//!      │                                             │ task exits
//!      ▼ shutdown signal                             ▼
//!   stop accepting ──► close tracker ──► idle loops exit ──► wait()
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wirecall::handler::Service;
//! use wirecall::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let server = Server::builder()
//!         .address("127.0.0.1:6060")
//!         .register_by_name(
//!             "User",
//!             Service::new().method("SayHello", |(s,): (String,)| async move {
//!                 Ok::<_, String>(s)
//!             }),
//!         )
//!         .bind()
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

mod connection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::config::{Network, ServerConfig};
use crate::error::Result;
use crate::handler::{HandlerRegistry, Object, Service};
use crate::transport::Listener;

use connection::{serve_connection, shutdown_signalled, ConnectionContext};

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(2);

/// Builder for registering services and binding a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    registry: HandlerRegistry,
}

impl ServerBuilder {
    /// Create a builder with default configuration and no services.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: HandlerRegistry::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    /// Set the listen address (`host:port`, or a path for Unix sockets).
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Idle deadline for the next request on a connection.
    ///
    /// Default: none
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Deadline for writing one response.
    ///
    /// Default: 5 seconds
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Register an object under its type name.
    pub fn register<T: Object>(self, object: T) -> Self {
        let name = T::object_name();
        self.register_by_name(name, Arc::new(object).service())
    }

    /// Register a service under an explicit name.
    ///
    /// A name that is already taken is logged and ignored.
    pub fn register_by_name(mut self, name: &str, service: Service) -> Self {
        let methods = service.len();
        match self.registry.insert(name, service) {
            Ok(()) => tracing::debug!(service = name, methods, "service registered"),
            Err(e) => tracing::warn!(error = %e, "ignoring duplicate registration"),
        }
        self
    }

    /// Bind the listener and start accepting connections.
    pub async fn bind(self) -> Result<Server> {
        let listener = Listener::bind(self.config.network, &self.config.address).await?;
        let local_addr = listener.local_addr();
        tracing::info!(
            addr = %local_addr,
            services = ?self.registry.names(),
            "server listening"
        );

        let ctx = Arc::new(ConnectionContext {
            registry: Arc::new(self.registry),
            config: self.config,
        });
        let tracker = TaskTracker::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            ctx,
            tracker.clone(),
            shutdown_rx,
        ));

        Ok(Server {
            local_addr,
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
            tracker,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running server. Dropping it stops the accept loop and closes idle
/// connections; call [`shutdown`](Server::shutdown) to also wait for
/// in-flight requests.
pub struct Server {
    local_addr: String,
    shutdown_tx: watch::Sender<bool>,
    shutting_down: AtomicBool,
    tracker: TaskTracker,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// Number of connection loops still running.
    pub fn running_connections(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Stop accepting, let idle connections close, and wait for every
    /// connection loop to finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            tracing::info!(
                addr = %self.local_addr,
                running = self.tracker.len(),
                "server shutting down"
            );
            self.shutdown_tx.send_replace(true);
        }

        let accept_task = self
            .accept_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "accept loop ended abnormally");
            }
        }

        // Nothing is spawned after the accept loop has stopped.
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!(addr = %self.local_addr, "server stopped");
    }

    /// Like [`shutdown`](Self::shutdown), bounded by `limit`.
    ///
    /// Returns false if connections were still running when time ran out.
    pub async fn shutdown_timeout(&self, limit: Duration) -> bool {
        let drained = tokio::time::timeout(limit, self.shutdown()).await.is_ok();
        if !drained {
            tracing::warn!(
                running = self.tracker.len(),
                "shutdown deadline passed with connections still running"
            );
        }
        drained
    }
}

async fn accept_loop(
    listener: Listener,
    ctx: Arc<ConnectionContext>,
    tracker: TaskTracker,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok(conn) => {
                tracker.spawn(serve_connection(conn, ctx.clone(), shutdown.clone()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed, retrying");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    tracing::debug!(addr = %listener.local_addr(), "accept loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::error::RpcError;

    fn echo_service() -> Service {
        Service::new().method("Echo", |(s,): (String,)| async move { Ok::<_, String>(s) })
    }

    struct Greeter;

    impl Object for Greeter {
        fn service(self: Arc<Self>) -> Service {
            Service::new().method("Hi", move |(): ()| {
                let _me = self.clone();
                async move { Ok::<_, String>("hi".to_string()) }
            })
        }
    }

    #[tokio::test]
    async fn test_bind_and_serve() {
        let server = Server::builder()
            .address("127.0.0.1:0")
            .register_by_name("Echo", echo_service())
            .register(Greeter)
            .bind()
            .await
            .unwrap();

        let client = Client::connect(server.local_addr()).await.unwrap();
        let echoed: String = client.call("Echo.Echo", ("ping",)).await.unwrap();
        assert_eq!(echoed, "ping");

        let hi: String = client.call("Greeter.Hi", ()).await.unwrap();
        assert_eq!(hi, "hi");

        client.close().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let server = Server::builder()
            .address("127.0.0.1:0")
            .register_by_name("Svc", echo_service())
            .register_by_name(
                "Svc",
                Service::new().method("Other", |(): ()| async move { Ok::<u8, String>(1) }),
            )
            .bind()
            .await
            .unwrap();

        let client = Client::connect(server.local_addr()).await.unwrap();
        let echoed: String = client.call("Svc.Echo", ("still here",)).await.unwrap();
        assert_eq!(echoed, "still here");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_failure_is_returned() {
        let first = Server::builder().address("127.0.0.1:0").bind().await.unwrap();
        let taken = first.local_addr().to_string();

        let err = Server::builder().address(taken).bind().await.err().unwrap();
        assert!(matches!(err, RpcError::Connection(_)));
        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_idempotent_and_stops_accepting() {
        let server = Server::builder().address("127.0.0.1:0").bind().await.unwrap();
        let addr = server.local_addr().to_string();

        server.shutdown().await;
        server.shutdown().await;
        assert!(server.is_shutting_down());
        assert_eq!(server.running_connections(), 0);

        assert!(Client::connect(&addr).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_client_leaves_running_count() {
        let server = Server::builder()
            .address("127.0.0.1:0")
            .register_by_name("Echo", echo_service())
            .bind()
            .await
            .unwrap();

        let client = Client::connect(server.local_addr()).await.unwrap();
        let _: String = client.call("Echo.Echo", ("x",)).await.unwrap();
        assert_eq!(server.running_connections(), 1);

        client.close().await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while server.running_connections() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!server.is_shutting_down());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_connections() {
        let server = Server::builder()
            .address("127.0.0.1:0")
            .register_by_name("Echo", echo_service())
            .bind()
            .await
            .unwrap();

        let client = Client::connect(server.local_addr()).await.unwrap();
        let _: String = client.call("Echo.Echo", ("x",)).await.unwrap();
        assert_eq!(server.running_connections(), 1);

        assert!(server.shutdown_timeout(Duration::from_secs(2)).await);
        assert_eq!(server.running_connections(), 0);

        // The reader sees EOF and marks the client unusable.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.is_server_shutdown());
        assert!(matches!(
            client.call::<_, String>("Echo.Echo", ("y",)).await,
            Err(RpcError::ServerUnavailable)
        ));
    }
}
