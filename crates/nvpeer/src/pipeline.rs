//! # Pipelined Calls
//!
//! A [`Pipeline`] issues many calls without waiting for any of them, then waits
//! for all of them at once. Results land in [`Slot`]s as their responses arrive,
//! in whatever order the host answers.
//!
//! ## Architecture
//!
//! Every enqueued call holds a completion token sender. Tokens are collected in
//! chunks of [`CHUNK_SIZE`]: each chunk is a bounded channel with exactly one
//! buffer slot per call it serves, so a completion never has to wait for room.
//! `wait` takes the chunks and drains them in order until it has seen one token
//! per call.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::OnceLock;

use tokio::sync::mpsc;

use nvwire::FromValue;
use nvwire::Value;

use crate::error::Error;
use crate::error::ErrorList;
use crate::error::Result;
use crate::peer::Peer;

/// Calls per completion channel.
pub const CHUNK_SIZE: usize = 32;

/// A write-once cell that receives the result of one pipelined call.
///
/// Filled by the connection's read loop when the response arrives. A call that
/// fails leaves its slot empty.
#[derive(Debug)]
pub struct Slot<T>(Arc<OnceLock<T>>);

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }

    pub fn is_filled(&self) -> bool {
        self.0.get().is_some()
    }

    fn fill(&self, value: T) {
        // a slot passed to two calls keeps the first result
        let _ = self.0.set(value);
    }
}

impl<T: Clone> Slot<T> {
    /// A copy of the result, if it has arrived.
    pub fn value(&self) -> Option<T> {
        self.0.get().cloned()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A batch of calls in flight. Reusable after every [`Pipeline::wait`].
pub struct Pipeline {
    peer: Peer,
    n: usize,
    chunks: VecDeque<mpsc::Receiver<Result<()>>>,
    tail: Option<mpsc::Sender<Result<()>>>,
}

impl Pipeline {
    pub fn new(peer: Peer) -> Self {
        Self {
            peer,
            n: 0,
            chunks: VecDeque::new(),
            tail: None,
        }
    }

    /// Number of calls issued since the last `wait`.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Issues a call without waiting. If `slot` is given, the decoded result is
    /// written to it when the response arrives.
    pub fn enqueue<T>(&mut self, method: &str, args: Vec<Value>, slot: Option<&Slot<T>>)
    where
        T: FromValue + Send + Sync + 'static,
    {
        let token = self.token_sender();
        let slot = slot.cloned();
        self.peer.go(
            method,
            args,
            Box::new(move |result| {
                let outcome = result.and_then(|value| {
                    if let Some(slot) = slot {
                        slot.fill(T::from_value(value)?);
                    }
                    Ok(())
                });
                // the chunk has room for every call it serves
                let _ = token.try_send(outcome);
            }),
        );
        self.n += 1;
    }

    /// Issues a call and returns the slot its result will land in.
    pub fn call<T>(&mut self, method: &str, args: Vec<Value>) -> Slot<T>
    where
        T: FromValue + Send + Sync + 'static,
    {
        let slot = Slot::new();
        self.enqueue(method, args, Some(&slot));
        slot
    }

    /// Issues a call whose result is discarded. Failures still count in `wait`.
    pub fn exec(&mut self, method: &str, args: Vec<Value>) {
        self.enqueue::<Value>(method, args, None);
    }

    fn token_sender(&mut self) -> mpsc::Sender<Result<()>> {
        if self.n % CHUNK_SIZE != 0 {
            if let Some(tx) = &self.tail {
                return tx.clone();
            }
        }
        let (tx, rx) = mpsc::channel(CHUNK_SIZE);
        self.chunks.push_back(rx);
        self.tail = Some(tx.clone());
        tx
    }

    /// Waits until every call issued since the last `wait` has completed.
    ///
    /// Returns `Ok` if none failed, the error itself if exactly one failed, and
    /// [`Error::Batch`] if several did.
    ///
    /// The pipeline is empty as soon as this starts. If the returned future is
    /// dropped early, the calls it was waiting for are abandoned and the
    /// pipeline stays usable.
    pub async fn wait(&mut self) -> Result<()> {
        self.tail = None;
        let mut remaining = std::mem::take(&mut self.n);
        let chunks = std::mem::take(&mut self.chunks);
        let mut errors = Vec::new();

        for mut chunk in chunks {
            let take = remaining.min(CHUNK_SIZE);
            for _ in 0..take {
                match chunk.recv().await {
                    Some(Ok(())) => {}
                    Some(Err(e)) => errors.push(e),
                    None => errors.push(Error::Closed),
                }
            }
            remaining -= take;
        }

        tracing::trace!(failed = errors.len(), "pipeline drained");
        match ErrorList::collapse(errors) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
