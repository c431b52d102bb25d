//! Handler registry mapping object names to services.
//!
//! Populated on the server builder, then frozen behind an `Arc` and read
//! concurrently by every connection without locking.

use std::collections::HashMap;
use std::sync::Arc;

use super::{MethodHandler, Service};
use crate::error::{RpcError, Result};

/// Registry mapping object names to their method tables.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    services: HashMap<String, Service>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `service`. An existing binding is never overwritten.
    pub fn insert(&mut self, name: &str, service: Service) -> Result<()> {
        if self.services.contains_key(name) {
            return Err(RpcError::AlreadyRegistered(name.to_string()));
        }
        self.services.insert(name.to_string(), service);
        Ok(())
    }

    /// Get a service by object name.
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Resolve `object.method` to its handler.
    pub fn lookup(&self, object: &str, method: &str) -> Result<Arc<dyn MethodHandler>> {
        let service = self
            .services
            .get(object)
            .ok_or_else(|| RpcError::UnknownService(object.to_string()))?;

        service
            .get(method)
            .ok_or_else(|| RpcError::UnknownMethod(format!("{object}.{method}")))
    }

    /// Registered object names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
