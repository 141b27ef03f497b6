//! In-memory transports for testing.
//!
//! Used by this crate's test suite and by downstream plugin tests that want to
//! drive a `Peer` without a real host.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;
use crate::transport::TransportError;

/// A duplex channel transport using tokio mpsc channels.
///
/// Messages sent via `send()` appear on the other end's `recv()` and vice versa.
/// `close()` hangs up: the other end's `recv()` then yields `None`.
pub struct DuplexChannelTransport {
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl DuplexChannelTransport {
    /// Creates a new transport from separate tx and rx channels.
    pub fn new(
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            tx: StdMutex::new(Some(tx)),
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Creates a pair of transports connected to each other.
    ///
    /// Messages sent on `a` are received by `b` and vice versa.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (Self::new(tx_a, rx_b), Self::new(tx_b, rx_a))
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Vec<u8>>> {
        self.tx.lock().ok().and_then(|tx| tx.clone())
    }
}

#[async_trait::async_trait]
impl Transport for DuplexChannelTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let tx = self
            .sender()
            .ok_or_else(|| TransportError::ConnectionLost("Channel closed locally".into()))?;
        tx.send(payload.to_vec())
            .map_err(|_| TransportError::ConnectionLost("Channel closed".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> transport::Result<()> {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        Ok(())
    }
}
