//! Transport module - TCP and Unix domain socket streams.
//!
//! Connections are split into boxed read and write halves so the client
//! and server can own them independently of the socket kind.

mod stream;

pub use stream::{connect, BoxedReader, BoxedWriter, Connection, Listener};
