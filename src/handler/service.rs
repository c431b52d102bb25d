//! Typed method invokers and per-object method tables.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{from_values, Value};
use crate::error::Result;

/// Number of values every method returns: the result plus the error slot.
pub const OUTPUT_ARITY: usize = 2;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A remotely invokable method.
pub trait MethodHandler: Send + Sync + 'static {
    /// Invoke with decoded arguments, returning the encoded output list.
    ///
    /// An `Err` means the arguments could not be bound or the result could
    /// not be encoded; errors returned by the method body travel in the
    /// error slot of an `Ok` output list.
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>>>;
}

/// Build the `[value, error]` output list for a method result.
pub fn encode_outputs<R, E>(result: std::result::Result<R, E>) -> Result<Vec<Value>>
where
    R: Serialize,
    E: Display,
{
    match result {
        Ok(value) => Ok(vec![serde_json::to_value(value)?, Value::Null]),
        Err(e) => Ok(vec![Value::Null, Value::String(e.to_string())]),
    }
}

/// Wrapper that binds decoded arguments to a typed closure.
pub struct TypedMethod<F, T, Fut, R, E>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> (Fut, R, E)>,
}

impl<F, T, Fut, R, E> TypedMethod<F, T, Fut, R, E>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    /// Create a new typed method.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut, R, E> MethodHandler for TypedMethod<F, T, Fut, R, E>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>>> {
        let parsed: T = match from_values(args) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(parsed);
        Box::pin(async move {
            let result = fut.await;
            if let Err(e) = &result {
                tracing::debug!(error = %e, "method returned an error");
            }
            encode_outputs(result)
        })
    }
}

/// The methods of one registered object.
#[derive(Clone, Default)]
pub struct Service {
    methods: HashMap<String, Arc<dyn MethodHandler>>,
}

impl Service {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed method. The closure receives the argument list bound to
    /// `T` (usually a tuple) and returns `Result<R, E>`.
    ///
    /// A name that is already present is logged and ignored.
    pub fn method<F, T, Fut, R, E>(self, name: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        self.handler(name, TypedMethod::new(handler))
    }

    /// Add an untyped method handler.
    pub fn handler(mut self, name: &str, handler: impl MethodHandler) -> Self {
        if self.methods.contains_key(name) {
            tracing::warn!(method = name, "method already defined, ignoring");
            return self;
        }
        self.methods.insert(name.to_string(), Arc::new(handler));
        self
    }

    /// Look up a method by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.methods.get(name).cloned()
    }

    /// Names of all methods, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A type that exposes its methods as a [`Service`].
///
/// ```
/// use std::sync::Arc;
/// use wirecall::handler::{Object, Service};
///
/// struct Greeter;
///
/// impl Object for Greeter {
///     fn service(self: Arc<Self>) -> Service {
///         Service::new().method("Hello", |(): ()| async { Ok::<_, String>("hi") })
///     }
/// }
///
/// assert_eq!(Greeter::object_name(), "Greeter");
/// ```
pub trait Object: Send + Sync + 'static {
    /// Build the method table, sharing `self` between the method closures.
    fn service(self: Arc<Self>) -> Service;

    /// Name used by `register`: the bare type name.
    fn object_name() -> &'static str
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }
}
