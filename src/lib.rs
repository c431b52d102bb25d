//! # wirecall
//!
//! Binary RPC over TCP or Unix sockets.
//!
//! A client calls `"Object.Method"` on a server with an ordered list of
//! arguments and gets back `[value, error]`. Many calls share one
//! connection; responses are matched to callers by sequence number.
//!
//! ## Architecture
//!
//! - **Wire protocol**: 5-byte header (magic, version, type, compression,
//!   serialization) followed by a length-prefixed body, see [`protocol`]
//! - **Payloads**: MessagePack or JSON ([`codec`]), optionally compressed
//!   with gzip, snappy, zlib or lz4 ([`compress`])
//! - **Client**: shared connection, background response reader, typed stubs
//! - **Server**: per-connection dispatch loops, graceful shutdown
//!
//! ## Example
//!
//! ```ignore
//! use wirecall::handler::Service;
//! use wirecall::{Client, Server};
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let server = Server::builder()
//!         .address("127.0.0.1:0")
//!         .register_by_name(
//!             "User",
//!             Service::new().method("SayHello", |(s,): (String,)| async move {
//!                 Ok::<_, String>(s)
//!             }),
//!         )
//!         .bind()
//!         .await?;
//!
//!     let client = Client::connect(server.local_addr()).await?;
//!     let reply: String = client.call("User.SayHello", ("hello",)).await?;
//!     assert_eq!(reply, "hello");
//!
//!     client.close().await;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod compress;
pub mod config;
pub mod error;
pub mod handler;
pub mod id;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{Client, ClientBuilder, Stub};
pub use config::{ClientConfig, FailMode, Network, ServerConfig};
pub use error::{Result, RpcError};
pub use handler::{Object, Service};
pub use protocol::{Compression, Serialization};
pub use server::{Server, ServerBuilder};
