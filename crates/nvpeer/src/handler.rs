//! # Handlers
//!
//! A handler is the peer-side code behind a service method. Whether the host
//! waits for it is fixed when the handler is built:
//!
//! - [`Handler::sync`] answers a request with a value or an error.
//! - [`Handler::notify`] is fire-and-forget; the host does not wait.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use nvwire::FromValue;
use nvwire::Value;

use crate::peer::Peer;

/// The error a handler returns. Its message is sent to the host as the
/// response's error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<nvwire::Error> for HandlerError {
    fn from(e: nvwire::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<crate::error::Error> for HandlerError {
    fn from(e: crate::error::Error) -> Self {
        Self::new(e.to_string())
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

type HandlerFn = Arc<dyn Fn(Peer, Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Peer-side code bound to one service method.
#[derive(Clone)]
pub enum Handler {
    /// The host sends a request and waits for the reply.
    Sync(HandlerFn),
    /// The host sends a notification; there is no reply.
    Notify(HandlerFn),
}

impl Handler {
    /// A handler whose result or error is sent back to the host.
    pub fn sync<F, Fut, T>(f: F) -> Self
    where
        F: Fn(Peer, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HandlerError>> + Send + 'static,
        T: Into<Value>,
    {
        Self::Sync(Arc::new(move |peer, args| {
            f(peer, args).map(|r| r.map(Into::into)).boxed()
        }))
    }

    /// A fire-and-forget handler. Errors are only logged.
    pub fn notify<F, Fut>(f: F) -> Self
    where
        F: Fn(Peer, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self::Notify(Arc::new(move |peer, args| {
            f(peer, args).map(|r| r.map(|()| Value::Nil)).boxed()
        }))
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, Self::Sync(_))
    }

    pub(crate) fn invoke(&self, peer: Peer, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        match self {
            Self::Sync(f) | Self::Notify(f) => f(peer, args),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Notify(_) => f.write_str("Handler::Notify"),
        }
    }
}

/// Extracts argument `i` of a handler call. A missing argument reads as nil,
/// so trailing optional arguments can be taken as `Option<T>`.
pub fn arg<T: FromValue>(args: &[Value], i: usize) -> Result<T, HandlerError> {
    let value = args.get(i).cloned().unwrap_or(Value::Nil);
    T::from_value(value).map_err(|e| HandlerError::new(format!("argument {}: {}", i, e)))
}
