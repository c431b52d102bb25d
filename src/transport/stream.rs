//! Socket connect/listen for each [`Network`] kind.
//!
//! - TCP: `host:port`, Nagle disabled
//! - Unix: filesystem path, socket file removed on listener drop
//!
//! # Example
//!
//! ```ignore
//! use wirecall::config::Network;
//! use wirecall::transport::{connect, Listener};
//!
//! let listener = Listener::bind(Network::Tcp, "127.0.0.1:0").await?;
//! let addr = listener.local_addr();
//! let conn = connect(Network::Tcp, &addr, Duration::from_secs(1)).await?;
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Network;
use crate::error::{RpcError, Result};

/// Read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An established connection split into halves.
pub struct Connection {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    /// Peer address for logging.
    pub peer: String,
}

impl Connection {
    fn from_tcp(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (reader, writer) = stream.into_split();
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            peer,
        }
    }

    #[cfg(unix)]
    fn from_unix(stream: tokio::net::UnixStream, peer: String) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            peer,
        }
    }
}

/// Dial `address`, failing with [`RpcError::Connection`] on refusal or timeout.
pub async fn connect(network: Network, address: &str, timeout: Duration) -> Result<Connection> {
    let dial = async {
        match network {
            Network::Tcp => TcpStream::connect(address).await.map(Connection::from_tcp),
            #[cfg(unix)]
            Network::Unix => tokio::net::UnixStream::connect(address)
                .await
                .map(|s| Connection::from_unix(s, address.to_string())),
            #[cfg(not(unix))]
            Network::Unix => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    };

    match tokio::time::timeout(timeout, dial).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(RpcError::Connection(format!(
            "Failed to connect to {address}: {e}"
        ))),
        Err(_) => Err(RpcError::Connection(format!(
            "Connecting to {address} timed out after {timeout:?}"
        ))),
    }
}

/// Listening socket.
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: String,
    },
}

impl Listener {
    /// Bind to `address`.
    ///
    /// For Unix sockets a stale socket file at the path is removed first.
    pub async fn bind(network: Network, address: &str) -> Result<Self> {
        let bound = match network {
            Network::Tcp => TcpListener::bind(address).await.map(Listener::Tcp),
            #[cfg(unix)]
            Network::Unix => {
                if std::path::Path::new(address).exists() {
                    std::fs::remove_file(address)?;
                }
                tokio::net::UnixListener::bind(address).map(|listener| Listener::Unix {
                    listener,
                    path: address.to_string(),
                })
            }
            #[cfg(not(unix))]
            Network::Unix => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        };

        bound.map_err(|e| RpcError::Connection(format!("Failed to bind {address}: {e}")))
    }

    /// Accept one connection.
    pub async fn accept(&self) -> std::io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _addr) = listener.accept().await?;
                Ok(Connection::from_tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix { listener, path } => {
                let (stream, _addr) = listener.accept().await?;
                Ok(Connection::from_unix(stream, path.clone()))
            }
        }
    }

    /// Bound address (resolved port for TCP, path for Unix).
    pub fn local_addr(&self) -> String {
        match self {
            Listener::Tcp(listener) => listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            #[cfg(unix)]
            Listener::Unix { path, .. } => path.clone(),
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tcp_connect_and_accept() {
        let listener = Listener::bind(Network::Tcp, "127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr();

        let accept = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            conn.reader.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut conn = connect(Network::Tcp, &addr, Duration::from_secs(1)).await.unwrap();
        conn.writer.write_all(b"ping").await.unwrap();

        assert_eq!(&accept.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = Listener::bind(Network::Tcp, "127.0.0.1:0").await.unwrap();
            listener.local_addr()
        };

        let err = connect(Network::Tcp, &addr, Duration::from_secs(1)).await.err().unwrap();
        assert!(matches!(err, RpcError::Connection(_)));
    }

    #[tokio::test]
    async fn test_bind_in_use_is_connection_error() {
        let first = Listener::bind(Network::Tcp, "127.0.0.1:0").await.unwrap();
        let err = Listener::bind(Network::Tcp, &first.local_addr()).await.err().unwrap();
        assert!(matches!(err, RpcError::Connection(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_file_removed_on_drop() {
        let path = std::env::temp_dir().join(format!("wirecall-test-{}.sock", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let listener = Listener::bind(Network::Unix, &path).await.unwrap();
        assert!(std::path::Path::new(&path).exists());

        let accept = tokio::spawn(async move {
            let _conn = listener.accept().await.unwrap();
        });
        let _conn = connect(Network::Unix, &path, Duration::from_secs(1)).await.unwrap();
        accept.await.unwrap();

        assert!(!std::path::Path::new(&path).exists());
    }
}
