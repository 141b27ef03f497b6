//! # RPC Peer
//!
//! One end of a connection to the host. The same connection carries calls in
//! both directions: the peer issues requests to drive the host, and the host
//! issues requests and notifications to run the peer's handlers.
//!
//! ## Architecture
//!
//! - A **writer task** owns the outbound direction. Callers hand it encoded
//!   messages through an unbounded channel, so issuing a call never blocks.
//! - The **read loop** ([`Peer::serve`]) demultiplexes inbound messages.
//!   Responses complete pending calls by msgid; requests and notifications are
//!   each run on their own task.
//! - The **pending table** maps msgids to completion callbacks. Every entry is
//!   completed exactly once, by its response or by the connection failing.
//!
//! ## Invariants
//!
//! - Once the connection fails, every pending call completes with that failure
//!   and every later call fails immediately with it.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::Weak;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use nvwire::FromValue;
use nvwire::Message;
use nvwire::Value;

use crate::error::Error;
use crate::error::Result;
use crate::fault;
use crate::pipeline::Pipeline;
use crate::registry::PeerRegistry;
use crate::registry::SPECS_METHOD;
use crate::transport::Transport;
use crate::transport::TransportError;

/// Called exactly once with the outcome of a call.
pub(crate) type Completion = Box<dyn FnOnce(Result<Value>) + Send + Sync>;

struct PendingCall {
    method: String,
    complete: Completion,
}

struct Inner {
    transport: Arc<dyn Transport>,
    registry: Arc<PeerRegistry>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: DashMap<u32, PendingCall>,
    next_msgid: AtomicU32,
    closed: OnceLock<Error>,
    channel_id: OnceCell<i64>,
}

/// A connection to the host. Cheap to clone; all clones share the connection.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<Inner>,
}

impl Peer {
    /// Creates a peer and spawns its writer task. Must be called inside a
    /// tokio runtime. Nothing is read until [`Peer::serve`] runs.
    pub fn new(transport: Box<dyn Transport>, registry: PeerRegistry) -> Self {
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let (outbound, rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            transport: transport.clone(),
            registry: Arc::new(registry),
            outbound,
            pending: DashMap::new(),
            next_msgid: AtomicU32::new(1),
            closed: OnceLock::new(),
            channel_id: OnceCell::new(),
        });

        tokio::spawn(Self::write_loop(transport, rx, Arc::downgrade(&inner)));

        Self { inner }
    }

    /// Drains the outbound queue into the transport. Holds only a weak
    /// reference so dropping the last `Peer` ends the task.
    async fn write_loop(
        transport: Arc<dyn Transport>,
        mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
        inner: Weak<Inner>,
    ) {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = transport.send(&bytes).await {
                tracing::warn!(error = %e, "write failed");
                if let Some(inner) = inner.upgrade() {
                    Self::fail_all(&inner, Error::Transport(e));
                }
                break;
            }
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.inner.registry
    }

    /// Starts a pipeline on this connection.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.clone())
    }

    /// Calls `method` on the host and waits for its result.
    pub async fn call<T: FromValue>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.go(
            method,
            args,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        let value = rx.await.map_err(|_| Error::Closed)??;
        Ok(T::from_value(value)?)
    }

    /// Sends a notification to the host. Does not wait for anything.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<()> {
        if let Some(err) = self.inner.closed.get() {
            return Err(err.clone());
        }
        let bytes = Message::Notification {
            method: method.to_string(),
            params: args,
        }
        .encode()?;
        self.inner.outbound.send(bytes).map_err(|_| Error::Closed)
    }

    /// The host's id for this connection, fetched once and cached.
    pub async fn channel_id(&self) -> Result<i64> {
        self.inner
            .channel_id
            .get_or_try_init(|| async {
                let (id, _metadata): (i64, Value) = self.call("nvim_get_api_info", Vec::new()).await?;
                Ok::<_, Error>(id)
            })
            .await
            .copied()
    }

    /// Issues a request and arranges for `complete` to receive its outcome.
    /// Never blocks.
    pub(crate) fn go(&self, method: &str, args: Vec<Value>, complete: Completion) {
        let inner = &self.inner;
        if let Some(err) = inner.closed.get() {
            complete(Err(err.clone()));
            return;
        }

        let msgid = inner.next_msgid.fetch_add(1, Ordering::Relaxed);
        let bytes = match (Message::Request {
            msgid,
            method: method.to_string(),
            params: args,
        })
        .encode()
        {
            Ok(bytes) => bytes,
            Err(e) => {
                complete(Err(e.into()));
                return;
            }
        };

        inner.pending.insert(
            msgid,
            PendingCall {
                method: method.to_string(),
                complete,
            },
        );

        // the connection may have failed between the check above and the insert
        if let Some(err) = inner.closed.get() {
            Self::complete(inner, msgid, Err(err.clone()));
            return;
        }

        tracing::trace!(msgid, method, "request");
        if inner.outbound.send(bytes).is_err() {
            Self::complete(inner, msgid, Err(Error::Closed));
        }
    }

    fn complete(inner: &Inner, msgid: u32, result: Result<Value>) -> bool {
        match inner.pending.remove(&msgid) {
            Some((_, call)) => {
                (call.complete)(result);
                true
            }
            None => false,
        }
    }

    /// Marks the connection failed and completes every pending call with `error`.
    fn fail_all(inner: &Inner, error: Error) {
        let _ = inner.closed.set(error);
        let Some(error) = inner.closed.get() else {
            return;
        };
        let keys: Vec<u32> = inner.pending.iter().map(|e| *e.key()).collect();
        tracing::debug!(pending = keys.len(), error = %error, "failing pending calls");
        for key in keys {
            Self::complete(inner, key, Err(error.clone()));
        }
    }

    /// Runs the read loop until the host closes the stream (`Ok`) or the
    /// stream fails (`Err`).
    pub async fn serve(&self) -> Result<()> {
        let outcome = loop {
            match self.inner.transport.recv().await {
                Ok(Some(bytes)) => self.dispatch(&bytes),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let error = match &outcome {
            Ok(()) => TransportError::ConnectionLost("Stream closed".into()),
            Err(e) => {
                tracing::warn!(error = %e, "read failed");
                e.clone()
            }
        };
        Self::fail_all(&self.inner, Error::Transport(error));
        outcome.map_err(Error::from)
    }

    /// Runs [`Peer::serve`] on a background task.
    pub fn spawn_serve(&self) -> JoinHandle<Result<()>> {
        let peer = self.clone();
        tokio::spawn(async move { peer.serve().await })
    }

    fn dispatch(&self, bytes: &[u8]) {
        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "dropping undecodable message");
                return;
            }
        };

        match message {
            Message::Response { msgid, error, result } => {
                let Some((_, call)) = self.inner.pending.remove(&msgid) else {
                    tracing::debug!(msgid, "response for unknown msgid");
                    return;
                };
                (call.complete)(fault::check(&call.method, error, result));
            }
            Message::Request { msgid, method, params } => {
                let peer = self.clone();
                tokio::spawn(async move { peer.answer(msgid, method, params).await });
            }
            Message::Notification { method, params } => {
                let Some(handler) = self.inner.registry.handler(&method).cloned() else {
                    tracing::debug!(method = %method, "notification for unknown method");
                    return;
                };
                let peer = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.invoke(peer, params).await {
                        tracing::warn!(method = %method, error = %e, "notification handler failed");
                    }
                });
            }
        }
    }

    /// Runs the handler for an inbound request and sends the response.
    async fn answer(&self, msgid: u32, method: String, params: Vec<Value>) {
        tracing::debug!(msgid, method = %method, "inbound request");
        let outcome = if method == SPECS_METHOD {
            let specs = self.inner.registry.take_manifest();
            Ok(Value::Array(specs.iter().map(|s| s.to_value()).collect()))
        } else {
            // a notify handler answers nil once it has run
            match self.inner.registry.handler(&method).cloned() {
                Some(handler) => handler.invoke(self.clone(), params).await,
                None => Err(format!("unknown request method: {}", method).into()),
            }
        };

        let (error, result) = match outcome {
            Ok(value) => (Value::Nil, value),
            Err(e) => {
                tracing::debug!(msgid, method = %method, error = %e, "handler returned error");
                (Value::String(e.message), Value::Nil)
            }
        };

        let response = Message::Response { msgid, error, result };
        match response.encode() {
            Ok(bytes) => {
                if self.inner.outbound.send(bytes).is_err() {
                    tracing::debug!(msgid, "connection gone before reply");
                }
            }
            Err(e) => tracing::warn!(msgid, error = %e, "failed to encode reply"),
        }
    }
}
