//! Handler module - server-side method tables and dispatch.
//!
//! Provides:
//! - [`Service`] - the methods of one registered object, keyed by name
//! - [`Object`] - types that describe their own [`Service`]
//! - [`HandlerRegistry`] - maps object names to services
//!
//! Every method receives its decoded argument list and produces an output
//! list whose last element is the error slot (`null` on success).
//!
//! # Example
//!
//! ```
//! use wirecall::handler::{HandlerRegistry, Service};
//!
//! let service = Service::new()
//!     .method("SayHello", |(s,): (String,)| async move { Ok::<_, String>(s) });
//!
//! let mut registry = HandlerRegistry::new();
//! registry.insert("User", service).unwrap();
//! assert!(registry.lookup("User", "SayHello").is_ok());
//! ```

mod registry;
mod service;

pub use registry::HandlerRegistry;
pub use service::{
    encode_outputs, BoxFuture, MethodHandler, Object, Service, TypedMethod, OUTPUT_ARITY,
};
